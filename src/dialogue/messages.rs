use serde::{Deserialize, Serialize};

/// Request body for `POST /text-chat`
#[derive(Debug, Serialize)]
pub struct TextChatRequest {
    pub query: String,
    pub driver_id: String,
    pub session_id: String,
}

/// Response body shared by `/text-chat` and `/voice-chat`.
///
/// `audio_response` is transport-encoded (hex pairs or a base64 data URL);
/// `text_input` is the server-side transcription of an uploaded chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_end: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Client-to-server events on the realtime channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "audio_stream")]
    AudioStream {
        /// Data-URL-encoded audio; absent on welcome requests
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "isWelcome", default)]
        is_welcome: bool,
    },
}

/// Server-to-client events on the realtime channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "transcription")]
    Transcription { text: String },

    #[serde(rename = "ai_response")]
    AiResponse {
        text: String,
        #[serde(default)]
        audio: Option<String>,
        #[serde(rename = "shouldEnd", default)]
        should_end: bool,
    },

    #[serde(rename = "error")]
    Error { message: String },
}
