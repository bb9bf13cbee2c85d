use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::client::{Dialogue, DialogueError, DialogueReply};
use super::messages::{ClientEvent, ServerEvent};
use crate::audio::EncodedAudio;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Realtime dialogue channel.
///
/// Audio chunks go out as `audio_stream` events; the backend answers with an
/// optional `transcription` event followed by one `ai_response`. The socket
/// is exclusive to one session; the mutex also makes one-request-in-flight
/// hold on this transport by construction.
pub struct StreamDialogue {
    user_id: String,
    timeout: Duration,
    ws: Mutex<WsStream>,
}

impl StreamDialogue {
    pub async fn connect(
        url: &str,
        user_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DialogueError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| DialogueError::Transport(e.to_string()))?;

        info!("Realtime channel connected: {}", url);

        Ok(Self {
            user_id: user_id.into(),
            timeout,
            ws: Mutex::new(ws),
        })
    }

    async fn request(&self, event: &ClientEvent) -> Result<DialogueReply, DialogueError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| DialogueError::InvalidResponse(e.to_string()))?;

        let mut ws = self.ws.lock().await;

        ws.send(Message::Text(payload))
            .await
            .map_err(|e| DialogueError::Transport(e.to_string()))?;

        tokio::time::timeout(self.timeout, Self::await_reply(&mut ws))
            .await
            .map_err(|_| DialogueError::Timeout)?
    }

    async fn await_reply(ws: &mut WsStream) -> Result<DialogueReply, DialogueError> {
        let mut transcript: Option<String> = None;

        while let Some(message) = ws.next().await {
            let message = message.map_err(|e| DialogueError::Transport(e.to_string()))?;

            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => return Err(DialogueError::ChannelClosed),
                _ => continue,
            };

            match serde_json::from_str::<ServerEvent>(&text) {
                Ok(ServerEvent::Transcription { text }) => {
                    debug!("Transcription received: {}", text);
                    transcript = Some(text);
                }
                Ok(ServerEvent::AiResponse {
                    text,
                    audio,
                    should_end,
                }) => {
                    return Ok(DialogueReply {
                        transcript,
                        text,
                        audio: audio.map(EncodedAudio::from_wire),
                        should_end,
                    });
                }
                Ok(ServerEvent::Error { message }) => {
                    return Err(DialogueError::Application(message));
                }
                Err(e) => {
                    warn!("Ignoring unrecognized channel event: {}", e);
                }
            }
        }

        Err(DialogueError::ChannelClosed)
    }
}

#[async_trait::async_trait]
impl Dialogue for StreamDialogue {
    async fn send_text(&self, _query: &str) -> Result<DialogueReply, DialogueError> {
        Err(DialogueError::Unsupported("text queries"))
    }

    async fn send_audio(&self, wav: Vec<u8>) -> Result<DialogueReply, DialogueError> {
        let encoded = EncodedAudio::from_bytes_data_url("audio/wav", &wav);
        let event = ClientEvent::AudioStream {
            data: Some(encoded.as_str().to_string()),
            user_id: self.user_id.clone(),
            is_welcome: false,
        };
        self.request(&event).await
    }

    async fn greet(&self) -> Result<DialogueReply, DialogueError> {
        let event = ClientEvent::AudioStream {
            data: None,
            user_id: self.user_id.clone(),
            is_welcome: true,
        };
        self.request(&event).await
    }

    async fn close(&self) {
        let mut ws = self.ws.lock().await;
        if let Err(e) = ws.close(None).await {
            debug!("Channel close: {}", e);
        }
    }
}
