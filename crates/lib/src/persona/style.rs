//! Persona replies: one line in the persona's voice, grounded on the quote corpus.

use std::sync::Arc;

use crate::llm::{GenerationError, TextGenerator};
use crate::persona::PERSONA_NAME;

fn style_prompt(topic: &str, style_context: &str) -> String {
    format!(
        "以下是「{PERSONA_NAME}」說過的話，請模仿這種語氣和用詞：\n\
         {style_context}\n\n\
         現在有人提到「{topic}」。請用同樣的口吻回一句話，只要一行，內容要扣緊這個主題。\n\
         不要加引號或任何說明，也絕對不要出現「{PERSONA_NAME}」這個詞。"
    )
}

/// Wraps the persona-style generative call. No retry.
#[derive(Clone)]
pub struct StyleResponder {
    generator: Arc<dyn TextGenerator>,
}

impl StyleResponder {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Returns the model's line as-is. A blank answer is `EmptyGeneration`.
    pub async fn respond_in_style(
        &self,
        topic_or_message: &str,
        style_context: &str,
    ) -> Result<String, GenerationError> {
        let prompt = style_prompt(topic_or_message, style_context);
        let line = self.generator.generate(&prompt).await?;
        if line.trim().is_empty() {
            return Err(GenerationError::EmptyGeneration);
        }
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Echo {
        answer: String,
        last_prompt: Mutex<Option<String>>,
    }

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            Ok(self.answer.clone())
        }
    }

    #[tokio::test]
    async fn returns_line_unmodified_and_embeds_context() {
        let generator = Arc::new(Echo {
            answer: "  貨出得去，人進得來  ".to_string(),
            last_prompt: Mutex::new(None),
        });
        let responder = StyleResponder::new(generator.clone());
        let line = responder
            .respond_in_style("經濟", "做就對了！\n庶民最大")
            .await
            .unwrap();
        assert_eq!(line, "  貨出得去，人進得來  ");
        let prompt = generator.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("庶民最大"));
        assert!(prompt.contains("「經濟」"));
    }

    #[tokio::test]
    async fn blank_answer_is_empty_generation() {
        let responder = StyleResponder::new(Arc::new(Echo {
            answer: " \n\t".to_string(),
            last_prompt: Mutex::new(None),
        }));
        let err = responder.respond_in_style("經濟", "ctx").await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyGeneration));
    }
}
