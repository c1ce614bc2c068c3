//! Multi-turn chat with a rolling history.

use std::sync::{Arc, Mutex};

use futures::stream::BoxStream;
use futures::StreamExt;

use super::generate::{Content, GenerateRequest};
use super::GeminiClient;
use crate::error::Result;

/// A chat session: system instruction plus alternating user/model history.
///
/// An exchange is only committed to history once the reply fully arrives, so
/// a failed or abandoned exchange leaves the transcript unchanged.
#[derive(Debug, Clone)]
pub struct CoachChat {
    client: GeminiClient,
    model: String,
    system_instruction: String,
    history: Arc<Mutex<Vec<Content>>>,
}

impl CoachChat {
    pub fn new(
        client: GeminiClient,
        model: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            system_instruction: system_instruction.into(),
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of the committed conversation history.
    pub fn history(&self) -> Vec<Content> {
        self.history.lock().expect("chat history lock").clone()
    }

    fn request_for(&self, message: &str) -> GenerateRequest {
        let mut contents = self.history();
        contents.push(Content::user_text(message));
        GenerateRequest {
            contents,
            system_instruction: Some(self.system_instruction.clone()),
            ..Default::default()
        }
    }

    fn commit(history: &Mutex<Vec<Content>>, message: &str, reply: &str) {
        let mut guard = history.lock().expect("chat history lock");
        guard.push(Content::user_text(message));
        guard.push(Content::model_text(reply));
    }

    /// Send a message and wait for the full reply.
    pub async fn send(&mut self, message: &str) -> Result<String> {
        let request = self.request_for(message);
        let response = self.client.generate_content(&self.model, &request).await?;
        Self::commit(&self.history, message, &response.text);
        Ok(response.text)
    }

    /// Send a message and stream the reply as text deltas.
    ///
    /// The exchange is committed to history when the stream finishes without
    /// an error.
    pub async fn send_stream(
        &mut self,
        message: &str,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let request = self.request_for(message);
        let mut inner = self.client.stream_content(&self.model, &request).await?;

        let history = Arc::clone(&self.history);
        let message = message.to_string();

        let stream = async_stream::stream! {
            let mut reply = String::new();
            let mut failed = false;
            while let Some(delta) = inner.next().await {
                match delta {
                    Ok(text) => {
                        reply.push_str(&text);
                        yield Ok(text);
                    }
                    Err(e) => {
                        failed = true;
                        yield Err(e);
                        break;
                    }
                }
            }
            if !failed {
                CoachChat::commit(&history, &message, &reply);
            }
        };

        Ok(Box::pin(stream))
    }
}
