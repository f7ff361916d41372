//! Structured-query handler: question in, query/clarification/answer out.
//!
//! Three steps per request: generate a query from the prompt (schema,
//! metric rules, code mapping, worked examples, history), execute it at the
//! warehouse boundary, synthesize the rows into prose. Raw model output is
//! parsed into an explicit tagged union before anything touches the
//! executor; unrecognized text never passes through as a query.

use crate::catalog;
use crate::conversation::{format_transcript, ConversationTurn};
use crate::error::Result;
use crate::llm::TextCompletion;
use crate::resolver;
use crate::synthesis::ResultSynthesizer;
use crate::warehouse::{QueryRows, Warehouse};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Sentinel the generation prompt instructs the model to emit instead of a
/// query when the question under-specifies a required filter.
pub const CLARIFICATION_PREFIX: &str = "CLARIFY:";

/// User-facing text for an empty or unparseable generation.
pub const GENERATION_FAILURE_MESSAGE: &str = "SQL 생성 실패: 질문을 이해하지 못했습니다.";

/// Parsed model output. Exactly one state holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Query(String),
    Clarification(String),
    Empty,
}

/// Classify raw model output. Strips code-fence markers first (single
/// backticks survive: generated queries carry backticked table names);
/// the sentinel prefix wins over everything else; leftover emptiness is a
/// generation failure, never a query.
pub fn parse_generation_output(raw: &str) -> GenerationOutcome {
    let cleaned = raw.replace("```sql", "").replace("```", "");
    let cleaned = cleaned.trim();

    if let Some(rest) = cleaned.strip_prefix(CLARIFICATION_PREFIX) {
        let text = rest.trim();
        if text.is_empty() {
            return GenerationOutcome::Empty;
        }
        return GenerationOutcome::Clarification(text.to_string());
    }

    if cleaned.is_empty() {
        return GenerationOutcome::Empty;
    }
    GenerationOutcome::Query(cleaned.to_string())
}

/// Output of one structured-query pass. The dispatcher picks the final
/// answer text from these fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SqlAgentOutput {
    /// Synthesized answer, or the clarification question, or a fixed
    /// generation-failure message. Absent only when execution failed.
    pub natural_response: Option<String>,
    pub generated_sql: Option<String>,
    pub rows: Option<QueryRows>,
    pub error: Option<String>,
}

pub struct SqlAgent {
    llm: Arc<dyn TextCompletion>,
    warehouse: Arc<dyn Warehouse>,
    synthesizer: ResultSynthesizer,
    dataset: String,
    temperature: f32,
    history_window: usize,
}

impl SqlAgent {
    pub fn new(
        llm: Arc<dyn TextCompletion>,
        warehouse: Arc<dyn Warehouse>,
        synthesizer: ResultSynthesizer,
        dataset: String,
        temperature: f32,
        history_window: usize,
    ) -> Self {
        Self {
            llm,
            warehouse,
            synthesizer,
            dataset,
            temperature,
            history_window,
        }
    }

    /// Full generate → execute → synthesize pass. Never raises; every
    /// failure mode lands in the output struct as text.
    pub async fn process(&self, question: &str, history: &[ConversationTurn]) -> SqlAgentOutput {
        let outcome = match self.generate(question, history).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("SQL generation call failed: {}", e);
                return SqlAgentOutput {
                    natural_response: Some(GENERATION_FAILURE_MESSAGE.to_string()),
                    error: Some(e.to_string()),
                    ..Default::default()
                };
            }
        };

        let sql = match outcome {
            GenerationOutcome::Clarification(text) => {
                info!("Clarification requested instead of a query");
                return SqlAgentOutput {
                    natural_response: Some(text),
                    ..Default::default()
                };
            }
            GenerationOutcome::Empty => {
                return SqlAgentOutput {
                    natural_response: Some(GENERATION_FAILURE_MESSAGE.to_string()),
                    error: Some("empty query generated".to_string()),
                    ..Default::default()
                };
            }
            GenerationOutcome::Query(sql) => sql,
        };

        info!("Generated SQL: {}", sql);

        match self.warehouse.run_query(&sql).await {
            Ok(rows) => {
                let answer = self.synthesizer.synthesize(question, &sql, &rows).await;
                SqlAgentOutput {
                    natural_response: Some(answer),
                    generated_sql: Some(sql),
                    rows: Some(rows),
                    error: None,
                }
            }
            Err(e) => {
                warn!("Query execution failed: {}", e);
                SqlAgentOutput {
                    natural_response: None,
                    generated_sql: Some(sql),
                    rows: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn generate(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<GenerationOutcome> {
        let prompt = self.build_prompt(question, history);
        let raw = self.llm.complete(&prompt, self.temperature).await?;
        Ok(parse_generation_output(&raw))
    }

    fn build_prompt(&self, question: &str, history: &[ConversationTurn]) -> String {
        let transcript = format_transcript(history, self.history_window);
        let history_block = if transcript.is_empty() {
            String::new()
        } else {
            format!("Previous conversation:\n{}\n", transcript)
        };

        format!(
            r#"You are a warehouse SQL expert for a cold-chain logistics analytics service.
Your goal is to answer user questions by generating one valid Standard SQL query.

Dataset: `{dataset}`
Current date: {today}

{schema}

{guidance}

{metric_rules}

{mapping}
Example SQLs (few-shot learning):

1. "해상 운송 중 5G 이상 충격 발생 비율" (ratio over sensor readings)
SELECT
    t2.transport_mode,
    COUNTIF(t1.shock_g >= 5) AS high_shock_count,
    COUNT(*) AS total_sensor_readings,
    SAFE_DIVIDE(COUNTIF(t1.shock_g >= 5), COUNT(*)) AS high_shock_ratio
FROM `{dataset}.mart_sensor_detail` t1
JOIN `{dataset}.mart_logistics_master` t2 ON t1.code = t2.code
WHERE t2.transport_mode = 'Ocean'
GROUP BY 1

2. "베트남행 화물 중 습도 이탈 구간" (location filter on sensor data)
SELECT lat, lon, COUNT(*) AS excursion_count
FROM `{dataset}.mart_sensor_detail`
WHERE destination = 'VNSGN' -- WRONG: destination does not exist in mart_sensor_detail
-- CORRECT APPROACH:
-- SELECT t1.lat, t1.lon, COUNT(*) AS excursion_count
-- FROM `{dataset}.mart_sensor_detail` t1
-- JOIN `{dataset}.mart_logistics_master` t2 ON t1.code = t2.code
-- WHERE t2.destination = 'VNSGN'
-- GROUP BY 1, 2

3. "이번 달 중국행 영하 온도 충격 건수" (location + sensor condition)
SELECT
    COUNT(*) AS shock_count_below_zero
FROM `{dataset}.mart_sensor_detail` t1
JOIN `{dataset}.mart_logistics_master` t2 ON t1.code = t2.code
WHERE
    t2.destination IN ('CNSHG', 'CNNBG', 'CNRZH', 'CNLYG')
    AND t1.temperature < 0
    AND t1.shock_g > 0
    AND t1.event_date BETWEEN DATE_TRUNC(CURRENT_DATE(), MONTH) AND CURRENT_DATE()

4. "충격이 가장 컸던 운송 TOP 5" (ranking)
SELECT DISTINCT code, cumulative_shock_index
FROM `{dataset}.mart_logistics_master`
ORDER BY cumulative_shock_index DESC
LIMIT 5
-- Ranking queries MUST deduplicate by the shipment code; without DISTINCT a
-- shipment joined against its sensor readings appears once per reading.

Clarification rule:
If the question under-specifies a required filter (an ambiguous metric such as
"물동량" with no departed/in-transit choice, or a statistic with no date range),
do NOT guess. Respond with the prefix {clarify} followed by ONE short Korean
question asking for the missing piece. Emit nothing else in that case.

Output ONLY the SQL query (or the {clarify} line). No explanations.

{history_block}Question: {question}
SQL Query:"#,
            dataset = self.dataset,
            today = chrono::Local::now().date_naive(),
            schema = catalog::schema_prompt(&self.dataset),
            guidance = catalog::join_guidance(&self.dataset),
            metric_rules = catalog::metric_rules(),
            mapping = resolver::location_mapping_prompt(),
            clarify = CLARIFICATION_PREFIX,
            history_block = history_block,
            question = question,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssistantError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_parse_plain_query() {
        let outcome = parse_generation_output("SELECT 1");
        assert_eq!(outcome, GenerationOutcome::Query("SELECT 1".to_string()));
    }

    #[test]
    fn test_parse_strips_code_fences() {
        let raw = "```sql\nSELECT code FROM t\n```";
        assert_eq!(
            parse_generation_output(raw),
            GenerationOutcome::Query("SELECT code FROM t".to_string())
        );
    }

    #[test]
    fn test_parse_clarification_sentinel() {
        let raw = "CLARIFY: 어느 기간의 물동량을 조회할까요?";
        assert_eq!(
            parse_generation_output(raw),
            GenerationOutcome::Clarification("어느 기간의 물동량을 조회할까요?".to_string())
        );
    }

    #[test]
    fn test_parse_fenced_clarification() {
        let raw = "```\nCLARIFY: 날짜 범위를 알려주세요.\n```";
        assert_eq!(
            parse_generation_output(raw),
            GenerationOutcome::Clarification("날짜 범위를 알려주세요.".to_string())
        );
    }

    #[test]
    fn test_parse_empty_variants() {
        assert_eq!(parse_generation_output(""), GenerationOutcome::Empty);
        assert_eq!(parse_generation_output("   \n"), GenerationOutcome::Empty);
        assert_eq!(parse_generation_output("```sql\n```"), GenerationOutcome::Empty);
        assert_eq!(parse_generation_output("CLARIFY:"), GenerationOutcome::Empty);
    }

    struct FixedLlm {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedLlm {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextCompletion for FixedLlm {
        async fn complete(&self, prompt: &str, _temperature: f32) -> crate::error::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct CountingWarehouse {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Warehouse for CountingWarehouse {
        async fn run_query(&self, _sql: &str) -> crate::error::Result<QueryRows> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AssistantError::Warehouse("backend unavailable".to_string()))
        }
    }

    fn agent_with(reply: &str) -> (SqlAgent, Arc<FixedLlm>, Arc<CountingWarehouse>) {
        let llm = Arc::new(FixedLlm::new(reply));
        let warehouse = Arc::new(CountingWarehouse {
            calls: AtomicUsize::new(0),
        });
        let synthesizer = ResultSynthesizer::new(llm.clone(), 0.0);
        let agent = SqlAgent::new(
            llm.clone(),
            warehouse.clone(),
            synthesizer,
            "coldchain-prod.mart".to_string(),
            0.0,
            6,
        );
        (agent, llm, warehouse)
    }

    #[tokio::test]
    async fn test_empty_generation_never_reaches_executor() {
        let (agent, _llm, warehouse) = agent_with("```sql\n```");
        let output = agent.process("물동량", &[]).await;

        assert_eq!(warehouse.calls.load(Ordering::SeqCst), 0);
        assert_eq!(output.natural_response.as_deref(), Some(GENERATION_FAILURE_MESSAGE));
        assert!(output.generated_sql.is_none());
        assert!(output.error.is_some());
    }

    #[tokio::test]
    async fn test_clarification_skips_executor() {
        let (agent, _llm, warehouse) = agent_with("CLARIFY: 날짜 범위를 알려주세요.");
        let output = agent.process("물동량 알려줘", &[]).await;

        assert_eq!(warehouse.calls.load(Ordering::SeqCst), 0);
        assert_eq!(output.natural_response.as_deref(), Some("날짜 범위를 알려주세요."));
        assert!(output.generated_sql.is_none());
        assert!(output.error.is_none());
    }

    #[tokio::test]
    async fn test_execution_failure_is_captured_as_text() {
        let (agent, _llm, warehouse) = agent_with("SELECT code FROM `coldchain-prod.mart.mart_logistics_master`");
        let output = agent.process("운송 건수", &[]).await;

        assert_eq!(warehouse.calls.load(Ordering::SeqCst), 1);
        assert!(output.natural_response.is_none());
        assert!(output.generated_sql.is_some());
        assert!(output.error.as_deref().unwrap().contains("backend unavailable"));
    }

    #[tokio::test]
    async fn test_prompt_carries_mapping_schema_and_history() {
        let (agent, llm, _warehouse) = agent_with("CLARIFY: x?");
        let history = vec![
            ConversationTurn::user("지난주 얘기였어"),
            ConversationTurn::assistant("네"),
        ];
        agent.process("상하이행 파손율 알려줘", &history).await;

        let prompts = llm.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.contains("CNSHG"));
        assert!(prompt.contains("mart_logistics_master"));
        assert!(prompt.contains("지난주 얘기였어"));
        assert!(prompt.contains("상하이행 파손율 알려줘"));
        assert!(prompt.contains(CLARIFICATION_PREFIX));
    }
}
