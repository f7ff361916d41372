//! Document/glossary handler for definitional questions.

use crate::error::Result;
use crate::llm::TextCompletion;
use crate::resolver::{match_glossary_entries, GlossaryEntry, GLOSSARY};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutput {
    pub answer: String,
    pub sources: Vec<String>,
}

pub struct RetrievalAgent {
    llm: Arc<dyn TextCompletion>,
    temperature: f32,
}

impl RetrievalAgent {
    pub fn new(llm: Arc<dyn TextCompletion>, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    /// Answer a definitional question from the glossary. Retrieval is
    /// substring containment; with no hit the whole glossary becomes the
    /// context (it is small) rather than answering from nothing.
    pub async fn process(&self, question: &str) -> RetrievalOutput {
        let matched = match_glossary_entries(question);
        let (context_entries, sources): (Vec<&GlossaryEntry>, Vec<String>) = if matched.is_empty() {
            info!("No glossary term matched, using the full glossary as context");
            (
                GLOSSARY.iter().collect(),
                GLOSSARY.iter().map(|e| e.term.clone()).collect(),
            )
        } else {
            let sources = matched.iter().map(|e| e.term.clone()).collect();
            (matched, sources)
        };

        let context = context_entries
            .iter()
            .map(|e| format!("- {}: {}", e.term, e.definition))
            .collect::<Vec<_>>()
            .join("\n");

        let answer = match self.explain(question, &context).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Glossary explanation call failed, returning raw definitions: {}", e);
                format!("용어 정의:\n{}", context)
            }
        };

        RetrievalOutput { answer, sources }
    }

    async fn explain(&self, question: &str, context: &str) -> Result<String> {
        let prompt = format!(
            r#"You are a documentation assistant for a cold-chain logistics analytics service.
Answer the user's question using ONLY the glossary context below. Answer in Korean.
If the asked term is not covered by the context, say explicitly that the term is not
in the glossary. Do not invent a definition.

Glossary context:
{context}

Question: {question}
Answer:"#
        );
        self.llm.complete(&prompt, self.temperature).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssistantError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingLlm {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextCompletion for RecordingLlm {
        async fn complete(&self, prompt: &str, _temperature: f32) -> crate::error::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl TextCompletion for FailingLlm {
        async fn complete(&self, _prompt: &str, _temperature: f32) -> crate::error::Result<String> {
            Err(AssistantError::Llm("no backend".to_string()))
        }
    }

    #[tokio::test]
    async fn test_matched_term_becomes_context_and_source() {
        let llm = Arc::new(RecordingLlm {
            reply: "일탈률은 임계값을 벗어난 비율입니다.".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let agent = RetrievalAgent::new(llm.clone(), 0.0);

        let output = agent.process("일탈률이 뭐야?").await;

        assert_eq!(output.sources, vec!["일탈률".to_string()]);
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("일탈률"));
        assert!(prompts[0].contains("excursion rate"));
        // Unmatched entries stay out of the context
        assert!(!prompts[0].contains("파손율"));
    }

    #[tokio::test]
    async fn test_no_match_falls_back_to_full_glossary() {
        let llm = Arc::new(RecordingLlm {
            reply: "해당 용어는 용어집에 없습니다.".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let agent = RetrievalAgent::new(llm.clone(), 0.0);

        let output = agent.process("겨울철 운송 정책 알려줘").await;

        assert_eq!(output.sources.len(), GLOSSARY.len());
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("파손율"));
        assert!(prompts[0].contains("물동량"));
    }

    #[tokio::test]
    async fn test_llm_failure_returns_definitions_directly() {
        let agent = RetrievalAgent::new(Arc::new(FailingLlm), 0.0);
        let output = agent.process("일탈률이 뭐야?").await;

        assert!(output.answer.contains("용어 정의"));
        assert!(output.answer.contains("일탈률"));
        assert_eq!(output.sources, vec!["일탈률".to_string()]);
    }
}
