//! Dispatcher: route a question, invoke the matching handler, normalize
//! the output into the uniform response shape.
//!
//! All handler singletons are constructed once at process start and shared
//! read-only; one request is one sequential chain of at most three external
//! calls. The dispatcher never raises: every failure mode a handler can
//! produce is already text by the time it lands here.

use crate::charts::{suggest_chart, ChartSuggestion};
use crate::config::Settings;
use crate::conversation::ConversationTurn;
use crate::general::GeneralAgent;
use crate::llm::LlmClient;
use crate::retrieval::RetrievalAgent;
use crate::router::{IntentRouter, RouteLabel};
use crate::sql_agent::SqlAgent;
use crate::synthesis::ResultSynthesizer;
use crate::warehouse::{HttpWarehouseClient, QueryRows};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Uniform response shape, constructed once per request.
#[derive(Debug, Clone, Serialize)]
pub struct FinalResponse {
    #[serde(rename = "answer")]
    pub text: String,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_tabular"
    )]
    pub tabular_data: Option<QueryRows>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_query: Option<String>,

    pub handler_used: RouteLabel,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSuggestion>,
}

/// Rows go out as a list of column-keyed objects, not the internal
/// columns/rows pair.
fn serialize_tabular<S>(
    rows: &Option<QueryRows>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match rows {
        Some(rows) => serializer.collect_seq(rows.to_row_objects()),
        None => serializer.serialize_none(),
    }
}

pub struct Orchestrator {
    router: IntentRouter,
    sql_agent: SqlAgent,
    retrieval_agent: RetrievalAgent,
    general_agent: GeneralAgent,
}

impl Orchestrator {
    /// Dependency-injected constructor; tests pass handlers built on fakes.
    pub fn new(
        router: IntentRouter,
        sql_agent: SqlAgent,
        retrieval_agent: RetrievalAgent,
        general_agent: GeneralAgent,
    ) -> Self {
        Self {
            router,
            sql_agent,
            retrieval_agent,
            general_agent,
        }
    }

    /// Wire up the production service objects from settings. Without an LLM
    /// key the router stays keyword-only for the process lifetime; the
    /// other handlers surface their documented inline errors per request.
    pub fn from_settings(settings: &Settings) -> Self {
        let llm: Arc<LlmClient> = Arc::new(LlmClient::new(
            settings.llm_api_key.clone().unwrap_or_default(),
            settings.llm_model.clone(),
            settings.llm_base_url.clone(),
        ));

        let router = if settings.llm_api_key.is_some() {
            IntentRouter::new(llm.clone(), settings.router_temperature)
        } else {
            info!("No LLM key configured; router runs on the keyword classifier");
            IntentRouter::keyword_only()
        };

        let warehouse = Arc::new(HttpWarehouseClient::new(settings.warehouse_url.clone()));
        let synthesizer = ResultSynthesizer::new(llm.clone(), settings.synthesis_temperature);
        let sql_agent = SqlAgent::new(
            llm.clone(),
            warehouse,
            synthesizer,
            settings.dataset.clone(),
            settings.sql_temperature,
            settings.sql_history_window,
        );
        let retrieval_agent = RetrievalAgent::new(llm.clone(), settings.synthesis_temperature);
        let general_agent = GeneralAgent::new(
            llm,
            settings.general_temperature,
            settings.general_history_window,
        );

        Self::new(router, sql_agent, retrieval_agent, general_agent)
    }

    /// Handle one question against its caller-owned history window.
    pub async fn run(&self, question: &str, history: &[ConversationTurn]) -> FinalResponse {
        let request_id = uuid::Uuid::new_v4();
        info!(%request_id, "Handling question: {}", question);

        let label = self.router.route(question).await;
        info!(%request_id, "Selected handler: {}", label.as_str());

        match label {
            RouteLabel::Sql => {
                let output = self.sql_agent.process(question, history).await;

                let text = if let Some(answer) = output.natural_response {
                    answer
                } else if let Some(error) = &output.error {
                    format!("죄송합니다. 데이터베이스 조회 중 오류가 발생했습니다: {}", error)
                } else if let Some(sql) = &output.generated_sql {
                    format!("생성된 SQL:\n{}", sql)
                } else {
                    crate::sql_agent::GENERATION_FAILURE_MESSAGE.to_string()
                };

                let chart = output.rows.as_ref().and_then(suggest_chart);
                FinalResponse {
                    text,
                    tabular_data: output.rows,
                    generated_query: output.generated_sql,
                    handler_used: RouteLabel::Sql,
                    chart,
                }
            }
            RouteLabel::Retrieval => {
                let output = self.retrieval_agent.process(question).await;
                FinalResponse {
                    text: output.answer,
                    tabular_data: None,
                    generated_query: None,
                    handler_used: RouteLabel::Retrieval,
                    chart: None,
                }
            }
            RouteLabel::General => {
                let answer = self.general_agent.process(question, history).await;
                FinalResponse {
                    text: answer,
                    tabular_data: None,
                    generated_query: None,
                    handler_used: RouteLabel::General,
                    chart: None,
                }
            }
        }
    }
}
