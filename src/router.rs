//! Intent router: classify a question into one of three handler labels.
//!
//! The LLM classification is the primary strategy; a canonical keyword
//! classifier is the explicit fallback, used both when the model returns an
//! invalid label and for the whole process lifetime when no LLM client is
//! available at startup. Routing never raises.

use crate::error::Result;
use crate::llm::TextCompletion;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteLabel {
    Sql,
    Retrieval,
    General,
}

impl RouteLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteLabel::Sql => "SQL_AGENT",
            RouteLabel::Retrieval => "RETRIEVAL_AGENT",
            RouteLabel::General => "GENERAL_AGENT",
        }
    }

    /// Parse raw model output into a label. Strips code fences, backticks
    /// and surrounding prose; returns None unless exactly one label token
    /// is present after cleanup.
    pub fn parse(raw: &str) -> Option<RouteLabel> {
        let cleaned = raw.replace("```", " ").replace('`', " ");
        let cleaned = cleaned.trim();

        let candidates = [RouteLabel::Sql, RouteLabel::Retrieval, RouteLabel::General];
        for label in candidates {
            if cleaned == label.as_str() {
                return Some(label);
            }
        }

        // Tolerate stray words around the token, but refuse ambiguous output
        let found: Vec<RouteLabel> = candidates
            .into_iter()
            .filter(|l| cleaned.contains(l.as_str()))
            .collect();
        match found.as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }
}

const GENERAL_KEYWORDS: &[&str] = &[
    "안녕",
    "반가워",
    "고마워",
    "hello",
    "hi ",
    "thank",
    "누구",
    "who are you",
    "뭘 할 수",
    "무엇을 할 수",
    "what can you do",
    "소개",
];

const SQL_KEYWORDS: &[&str] = &[
    "count",
    "how many",
    "average",
    "percentage",
    "volume",
    "rate",
    "temperature",
    "humidity",
    "shock",
    "stats",
    "건수",
    "몇 건",
    "몇건",
    "평균",
    "비율",
    "파손율",
    "물동량",
    "온도",
    "습도",
    "충격",
    "통계",
];

lazy_static! {
    // A run of three or more digits, optionally code-prefixed
    // ("SHP-1042", "run_2024", "1042"), reads as a shipment/period
    // identifier; specificity implies structured-query routing. No word
    // boundaries: Korean particles attach directly to digits.
    static ref ID_TOKEN: Regex = Regex::new(r"(?i)[a-z]{0,8}[-_]?\d{3,}").unwrap();
}

/// Canonical rule-based classifier. Pure function of the question; shared
/// by the invalid-label fallback and the LLM-unavailable mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn classify(&self, question: &str) -> RouteLabel {
        let lowered = question.to_lowercase();

        if GENERAL_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return RouteLabel::General;
        }
        if SQL_KEYWORDS.iter().any(|k| lowered.contains(k)) || ID_TOKEN.is_match(&lowered) {
            return RouteLabel::Sql;
        }
        RouteLabel::Retrieval
    }
}

fn router_prompt(question: &str) -> String {
    format!(
        r#"You are the routing assistant for a cold-chain logistics data service.
Route the user's question to the appropriate agent.

Agents:
1. SQL_AGENT: questions about quantifiable data: transport volumes, shipment counts,
   deviation rates, damage rates, shock counts, sensor summaries, anything mentioning a
   shipment ID or a number. (e.g. "베트남행 운송 몇 건이야?", "지난주 평균 온도는?",
   "SHP-1042 충격 이력 보여줘")
2. RETRIEVAL_AGENT: questions about definitions, guidelines, policies, or why a metric is
   computed the way it is. (e.g. "일탈률이 뭐야?", "충격 측정 기준 설명해줘",
   "겨울철 운송 정책은?")
3. GENERAL_AGENT: greetings, small talk, questions about what this assistant can do.
   (e.g. "안녕", "뭘 할 수 있어?")

Priority rules:
- Questions carrying numbers, IDs, dates or units favor SQL_AGENT.
- "Why"/"how"/"what is" definition questions favor RETRIEVAL_AGENT.
- Greetings and capability questions favor GENERAL_AGENT.
- A question mixing a numeric ask with definitional wording favors SQL_AGENT.
- Output ONLY the agent name: SQL_AGENT, RETRIEVAL_AGENT, or GENERAL_AGENT.

Question: {question}
Agent:"#
    )
}

/// Router with LLM-primary / keyword-fallback strategy selection.
pub struct IntentRouter {
    llm: Option<Arc<dyn TextCompletion>>,
    temperature: f32,
    fallback: KeywordClassifier,
}

impl IntentRouter {
    pub fn new(llm: Arc<dyn TextCompletion>, temperature: f32) -> Self {
        Self {
            llm: Some(llm),
            temperature,
            fallback: KeywordClassifier,
        }
    }

    /// Keyword-only router for processes started without an LLM backend.
    /// The choice is permanent for the process lifetime; there is no retry.
    pub fn keyword_only() -> Self {
        Self {
            llm: None,
            temperature: 0.0,
            fallback: KeywordClassifier,
        }
    }

    /// Classify a question. Always returns a label; never raises.
    pub async fn route(&self, question: &str) -> RouteLabel {
        let llm = match &self.llm {
            Some(llm) => llm,
            None => return self.fallback.classify(question),
        };

        match self.try_llm_route(llm.as_ref(), question).await {
            Ok(Some(label)) => label,
            Ok(None) => self.fallback.classify(question),
            Err(e) => {
                warn!("Router LLM call failed, defaulting to SQL_AGENT: {}", e);
                RouteLabel::Sql
            }
        }
    }

    async fn try_llm_route(
        &self,
        llm: &dyn TextCompletion,
        question: &str,
    ) -> Result<Option<RouteLabel>> {
        let raw = llm.complete(&router_prompt(question), self.temperature).await?;
        Ok(RouteLabel::parse(&raw))
    }
}
