//! Result synthesizer: tabular rows back into prose.

use crate::error::Result;
use crate::llm::TextCompletion;
use crate::warehouse::QueryRows;
use std::sync::Arc;
use tracing::warn;

/// Fixed phrasing for an empty result set. Returned verbatim; the empty
/// case is decided in code, before any model call, so the answer can never
/// be a fabricated summary.
pub const NO_MATCHING_DATA: &str = "해당 조건에 맞는 데이터가 없습니다.";

pub struct ResultSynthesizer {
    llm: Arc<dyn TextCompletion>,
    temperature: f32,
}

impl ResultSynthesizer {
    pub fn new(llm: Arc<dyn TextCompletion>, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    /// Turn a row-set into a natural-language answer. Never fails: a model
    /// error becomes an inline error answer.
    pub async fn synthesize(&self, question: &str, sql: &str, rows: &QueryRows) -> String {
        if rows.is_empty() {
            return NO_MATCHING_DATA.to_string();
        }

        match self.summarize(question, sql, rows).await {
            Ok(text) => {
                // Guard: with rows present, a claim of absent data is the
                // one summary the model is not allowed to make.
                if text.contains(NO_MATCHING_DATA) {
                    warn!("Synthesis claimed missing data for a non-empty result, using plain rendering");
                    return format!("조회 결과 {}건입니다.\n{}", rows.row_count(), rows.to_table_string());
                }
                text
            }
            Err(e) => format!("결과 해석 중 오류: {}", e),
        }
    }

    async fn summarize(&self, question: &str, sql: &str, rows: &QueryRows) -> Result<String> {
        let prompt = format!(
            r#"You are a helpful assistant for a cold-chain logistics analytics service.
Based on the SQL query result, provide a natural language answer to the user's question.
Answer in Korean (한국어).

Rules:
- Summarize ONLY values that appear in the query result below.
- Never state that no data was found: the result below is non-empty.
- Do not round numbers or convert units.
- Keep the answer concise and informative.

User Question: {question}
SQL Query: {sql}
Query Result:
{table}

Answer:"#,
            question = question,
            sql = sql,
            table = rows.to_table_string(),
        );

        self.llm.complete(&prompt, self.temperature).await
    }
}
