//! Conversational handler for greetings and capability questions.

use crate::conversation::{format_transcript, ConversationTurn};
use crate::llm::TextCompletion;
use std::sync::Arc;
use tracing::warn;

pub struct GeneralAgent {
    llm: Arc<dyn TextCompletion>,
    temperature: f32,
    history_window: usize,
}

impl GeneralAgent {
    pub fn new(llm: Arc<dyn TextCompletion>, temperature: f32, history_window: usize) -> Self {
        Self {
            llm,
            temperature,
            history_window,
        }
    }

    /// Answer a conversational turn. Never raises: a model failure becomes
    /// a fixed Korean apology with the error text embedded.
    pub async fn process(&self, question: &str, history: &[ConversationTurn]) -> String {
        let transcript = format_transcript(history, self.history_window);
        let prompt = format!(
            r#"You are the Cold-Chain Intelligent Assistant, an AI assistant for logistics data analysis.

Your capabilities:
1. Data analysis: shipment volumes, damage rates, shock events, temperature excursions.
2. Risk management: identifying high-risk routes, risk heatmaps.
3. Documentation: definitions of metrics like 일탈률 and 누적 충격 지수.

Your rules:
- Answer greetings and capability questions clearly and professionally.
- NEVER invent statistics or concrete figures. If the user wants specific data or a
  policy document, ask exactly ONE clarifying question pointing them to phrase it as a
  data question (e.g. "베트남행 파손율 보여줘") or a definition question.

Tone: professional, helpful, concise. Korean language is preferred.

Previous conversation:
{transcript}
User Question: {question}
Answer:"#
        );

        match self.llm.complete(&prompt, self.temperature).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Conversational handler LLM call failed: {}", e);
                format!("죄송합니다. 일반 대화를 처리하는 중 오류가 발생했습니다: {}", e)
            }
        }
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
            Err(AssistantError::Llm("quota exceeded".to_string()))
        }
    }

    #[tokio::test]
    async fn test_history_window_is_ten_turns() {
        let llm = Arc::new(RecordingLlm {
            reply: "안녕하세요!".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let agent = GeneralAgent::new(llm.clone(), 0.7, 10);

        let history: Vec<ConversationTurn> = (0..14)
            .map(|i| ConversationTurn::user(format!("턴{}", i)))
            .collect();
        agent.process("안녕", &history).await;

        let prompts = llm.prompts.lock().unwrap();
        assert!(!prompts[0].contains("턴3"));
        assert!(prompts[0].contains("턴4"));
        assert!(prompts[0].contains("턴13"));
    }

    #[tokio::test]
    async fn test_llm_failure_returns_korean_apology() {
        let agent = GeneralAgent::new(Arc::new(FailingLlm), 0.7, 10);
        let answer = agent.process("안녕", &[]).await;

        assert!(answer.contains("죄송합니다. 일반 대화를 처리하는 중 오류가 발생했습니다"));
        assert!(answer.contains("quota exceeded"));
    }
}
