//! Analytical schema description for the structured-query prompt.
//!
//! The warehouse schema is fixed and externally managed; this module only
//! renders it as instruction text. Table layout follows the gold-layer
//! marts: one shipment-level fact table, one per-reading sensor table, a
//! precomputed geospatial heatmap, and a cross-route quality matrix.

pub const FACT_TABLE: &str = "mart_logistics_master";
pub const SENSOR_TABLE: &str = "mart_sensor_detail";
pub const HEATMAP_TABLE: &str = "mart_risk_heatmap";
pub const QUALITY_TABLE: &str = "mart_quality_matrix";

/// Fully qualified, backticked table reference.
pub fn table_reference(dataset: &str, table: &str) -> String {
    format!("`{}.{}`", dataset, table)
}

/// Render the four-table schema block handed to the model.
pub fn schema_prompt(dataset: &str) -> String {
    format!(
        r#"Available tables (always use fully qualified names with backticks):

1. {fact} (Fact Table)
   - Purpose: shipment-level transport stats, volume, damage rates, RISK LEVELS, FATIGUE.
   - Columns:
     - code (STRING): Shipment ID
     - departure_date (DATE): Partition key, date the shipment left origin
     - arrival_date (DATE): Date the shipment reached its destination (NULL while in transit)
     - destination (STRING): Canonical location code, e.g. 'CNSHG'
     - product (STRING), transport_mode (STRING)
     - cumulative_shock_index (FLOAT64): "Fatigue" / cumulative stress score
     - risk_level (STRING): 'Low', 'Medium', 'High', 'Critical'
     - temp_excursion_duration_min (INT64): Minutes outside the valid temperature range
     - is_damaged (BOOL): Damage flag

2. {sensor} (Per-Reading / Granular)
   - Purpose: dynamic threshold queries (e.g. "shock > 7G"), multi-variable correlation.
   - Columns: code (STRING), event_date (DATE), shock_g (FLOAT64), temperature (FLOAT64),
     humidity (FLOAT64), acc_x, acc_y, acc_z, tilt_x, tilt_y, lat (FLOAT64), lon (FLOAT64)

3. {heatmap} (Geospatial)
   - Purpose: "heatmap", "risk map", "where do shocks occur?".
   - Columns: lat_center, lon_center, location_label, risk_score, high_impact_events

4. {quality} (Benchmarking)
   - Purpose: compare performance (A vs B), benchmarking packaging/routes.
   - Columns: transport_mode, package_type, route, damage_rate, avg_fatigue_score, safety_score"#,
        fact = table_reference(dataset, FACT_TABLE),
        sensor = table_reference(dataset, SENSOR_TABLE),
        heatmap = table_reference(dataset, HEATMAP_TABLE),
        quality = table_reference(dataset, QUALITY_TABLE),
    )
}

/// Join guidance and table-selection rules.
pub fn join_guidance(dataset: &str) -> String {
    format!(
        r#"Scenario guidelines:
- Fatigue/stress questions: query cumulative_shock_index from {fact}.
- Benchmarking/comparison questions: query {quality}.
- Composite sensor conditions (e.g. temp < 0 AND shock > 5): query {sensor}.
- Location filtering for sensor data: {sensor} only carries lat/lon, NOT a destination
  name. You MUST JOIN {sensor} t1 with {fact} t2 ON t1.code = t2.code and filter on
  t2.destination. Always qualify every column with its table alias in a join."#,
        fact = table_reference(dataset, FACT_TABLE),
        sensor = table_reference(dataset, SENSOR_TABLE),
        quality = table_reference(dataset, QUALITY_TABLE),
    )
}

/// Disambiguation rules for overloaded business metrics. The two shipment
/// counts are mutually exclusive: a question gets exactly one of them.
pub fn metric_rules() -> &'static str {
    r#"Metric definitions (overloaded terms, pick exactly one):
- "departed count" / "출고 건수": shipments whose journey STARTED in the period.
  Filter: departure_date BETWEEN period_start AND period_end (both boundaries inclusive).
- "in-transit count" / "운송중 건수": shipments ACTIVE at any point during the period.
  Filter: departure_date <= period_end AND (arrival_date IS NULL OR arrival_date >= period_start).
- Never combine the two filters in one query. If the question says only "물동량" or
  "shipment count" without picking a definition AND a date range, ask for clarification
  instead of guessing."#
}
