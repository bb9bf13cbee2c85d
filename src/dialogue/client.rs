use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::messages::{ChatResponse, TextChatRequest};
use crate::audio::EncodedAudio;

/// One assistant reply, normalized across transports
#[derive(Debug, Clone)]
pub struct DialogueReply {
    /// Server-side transcription of the uploaded audio, when the utterance
    /// was a chunk
    pub transcript: Option<String>,
    /// Assistant text
    pub text: String,
    /// Synthesized reply audio, still transport-encoded
    pub audio: Option<EncodedAudio>,
    /// Backend asked to end the conversation after this reply
    pub should_end: bool,
}

/// Failure of one dialogue request.
///
/// None of the variants carry retry guidance; the coordinator handles every
/// failure the same way (one fallback turn, resume listening).
#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("server error: HTTP {status}: {body}")]
    Server { status: u16, body: String },

    #[error("backend error: {0}")]
    Application(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("realtime channel closed")]
    ChannelClosed,

    #[error("timed out waiting for a reply")]
    Timeout,

    #[error("{0} is not supported on this transport")]
    Unsupported(&'static str),
}

impl From<reqwest::Error> for DialogueError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            DialogueError::Timeout
        } else {
            DialogueError::Transport(error.to_string())
        }
    }
}

/// Remote dialogue endpoint: one utterance in, one reply out
#[async_trait::async_trait]
pub trait Dialogue: Send + Sync {
    async fn send_text(&self, query: &str) -> Result<DialogueReply, DialogueError>;

    async fn send_audio(&self, wav: Vec<u8>) -> Result<DialogueReply, DialogueError>;

    /// Opening exchange issued on call start
    async fn greet(&self) -> Result<DialogueReply, DialogueError> {
        self.send_text("hello").await
    }

    /// Release any long-lived channel; a no-op for request/response
    /// transports
    async fn close(&self) {}
}

/// HTTP dialogue client for the `/text-chat` and `/voice-chat` endpoints
#[derive(Debug, Clone)]
pub struct HttpDialogue {
    client: reqwest::Client,
    base_url: String,
    driver_id: String,
    session_id: String,
}

impl HttpDialogue {
    pub fn new(
        base_url: impl Into<String>,
        driver_id: impl Into<String>,
        session_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DialogueError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DialogueError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            driver_id: driver_id.into(),
            session_id: session_id.into(),
        })
    }

    async fn parse(response: reqwest::Response) -> Result<DialogueReply, DialogueError> {
        if !response.status().is_success() {
            return Err(DialogueError::Server {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| DialogueError::InvalidResponse(e.to_string()))?;

        body.into_reply()
    }
}

impl ChatResponse {
    /// Normalize a chat response body, surfacing the embedded `error` field
    pub fn into_reply(self) -> Result<DialogueReply, DialogueError> {
        if let Some(error) = self.error {
            return Err(DialogueError::Application(error));
        }

        let text = self
            .text_response
            .ok_or_else(|| DialogueError::InvalidResponse("missing text_response".to_string()))?;

        Ok(DialogueReply {
            transcript: self.text_input,
            text,
            audio: self.audio_response.map(EncodedAudio::from_wire),
            should_end: self.should_end.unwrap_or(false),
        })
    }
}

#[async_trait::async_trait]
impl Dialogue for HttpDialogue {
    async fn send_text(&self, query: &str) -> Result<DialogueReply, DialogueError> {
        let url = format!("{}/text-chat", self.base_url);
        debug!("Sending text query to {}", url);

        let request = TextChatRequest {
            query: query.to_string(),
            driver_id: self.driver_id.clone(),
            session_id: self.session_id.clone(),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        Self::parse(response).await
    }

    async fn send_audio(&self, wav: Vec<u8>) -> Result<DialogueReply, DialogueError> {
        let url = format!("{}/voice-chat", self.base_url);
        debug!("Uploading {} byte chunk to {}", wav.len(), url);

        let part = Part::bytes(wav)
            .file_name("chunk.wav")
            .mime_str("audio/wav")
            .map_err(|e| DialogueError::InvalidResponse(e.to_string()))?;

        let form = Form::new()
            .part("audio", part)
            .text("driver_id", self.driver_id.clone())
            .text("session_id", self.session_id.clone());

        let response = self.client.post(&url).multipart(form).send().await?;
        Self::parse(response).await
    }
}
