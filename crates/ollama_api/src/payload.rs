use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::OllamaApiError;
use crate::headers::{HEADER_CONTENT_TYPE, JSON_CONTENT_TYPE};

pub const CHAT_PATH: &str = "/api/chat";
pub const TAGS_PATH: &str = "/api/tags";

/// Author of one conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversation message as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Request body for `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Default: true.
    #[serde(default = "default_true")]
    pub stream: bool,
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

fn default_true() -> bool {
    true
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            stream: true,
            model: model.into(),
            messages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire-neutral description of one request against the model server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    /// Short `METHOD /path` label used in error context.
    pub fn context(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Encode a conversation as a streaming chat request body.
///
/// Messages are written in the given order with role and content unchanged.
pub fn encode_chat_request(
    messages: &[ChatMessage],
    model: &str,
) -> Result<Vec<u8>, OllamaApiError> {
    let request = ChatRequest::new(model, messages.to_vec());
    Ok(serde_json::to_vec(&request)?)
}

pub fn chat_request(body: Vec<u8>) -> ApiRequest {
    let mut headers = BTreeMap::new();
    headers.insert(
        HEADER_CONTENT_TYPE.to_string(),
        JSON_CONTENT_TYPE.to_string(),
    );
    ApiRequest {
        method: Method::Post,
        path: CHAT_PATH.to_string(),
        headers,
        body: Some(body),
    }
}

pub fn list_models_request() -> ApiRequest {
    ApiRequest {
        method: Method::Get,
        path: TAGS_PATH.to_string(),
        headers: BTreeMap::new(),
        body: None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn chat_body_has_stream_model_and_ordered_messages() {
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("again"),
        ];
        let body = encode_chat_request(&messages, "llama3.2:3b").expect("encode");
        let value: Value = serde_json::from_slice(&body).expect("valid json");

        assert_eq!(
            value,
            json!({
                "stream": true,
                "model": "llama3.2:3b",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"},
                    {"role": "user", "content": "again"},
                ],
            })
        );
    }

    #[test]
    fn chat_request_is_a_json_post() {
        let request = chat_request(b"{}".to_vec());
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, CHAT_PATH);
        assert_eq!(
            request.headers.get(HEADER_CONTENT_TYPE).map(String::as_str),
            Some(JSON_CONTENT_TYPE)
        );
        assert_eq!(request.context(), "POST /api/chat");
    }

    #[test]
    fn list_models_request_is_a_bodyless_get() {
        let request = list_models_request();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, TAGS_PATH);
        assert!(request.body.is_none());
    }
}
