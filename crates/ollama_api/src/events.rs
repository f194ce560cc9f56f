use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OllamaApiError;
use crate::payload::TAGS_PATH;

/// One decoded line of a streamed chat response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Assistant text carried by this line; empty when absent.
    pub delta_text: String,
    /// Server marked this line as the last one.
    pub done: bool,
    /// Server-side failure reported inside the stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decode one NDJSON line.
///
/// Returns `None` when the line is not valid JSON. Missing fields default:
/// `message.content` to `""` and `done` to `false`.
pub fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let value = serde_json::from_slice::<Value>(line).ok()?;

    let delta_text = value
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .unwrap_or("")
        .to_owned();
    let done = value
        .get("done")
        .and_then(|done| done.as_bool())
        .unwrap_or(false);
    let error = value
        .get("error")
        .and_then(|error| error.as_str())
        .map(ToString::to_string);

    Some(StreamEvent {
        delta_text,
        done,
        error,
    })
}

/// Decode a `GET /api/tags` body into model names, in server order.
///
/// A missing or empty `models` array yields an empty list. Entries without a
/// string `name` are skipped. Only a body that is not JSON at all fails.
pub fn decode_models_response(body: &[u8]) -> Result<Vec<String>, OllamaApiError> {
    let value = serde_json::from_slice::<Value>(body).map_err(|error| OllamaApiError::Decode {
        context: format!("GET {TAGS_PATH}"),
        message: error.to_string(),
    })?;

    let names = value
        .get("models")
        .and_then(|models| models.as_array())
        .map(|models| {
            models
                .iter()
                .filter_map(|model| model.get("name"))
                .filter_map(|name| name.as_str())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_and_done_are_extracted() {
        let event = decode_line(
            br#"{"model":"m","message":{"role":"assistant","content":"Hel"},"done":false}"#,
        )
        .expect("valid line");
        assert_eq!(event.delta_text, "Hel");
        assert!(!event.done);
        assert_eq!(event.error, None);
    }

    #[test]
    fn final_line_without_message_is_done_with_empty_delta() {
        let event = decode_line(br#"{"done":true,"total_duration":12}"#).expect("valid line");
        assert_eq!(
            event,
            StreamEvent {
                delta_text: String::new(),
                done: true,
                error: None,
            }
        );
    }

    #[test]
    fn malformed_lines_decode_to_none() {
        for line in [
            &b""[..],
            b"   ",
            b"{",
            b"{\"message\":",
            b"data: {\"done\":true}",
            b"\xff\xfe",
        ] {
            assert_eq!(decode_line(line), None, "line {line:?}");
        }
    }

    #[test]
    fn wrongly_typed_fields_fall_back_to_defaults() {
        let event = decode_line(br#"{"message":{"content":7},"done":"yes"}"#).expect("json");
        assert_eq!(event.delta_text, "");
        assert!(!event.done);
    }

    #[test]
    fn in_stream_error_is_captured() {
        let event = decode_line(br#"{"error":"model runner crashed"}"#).expect("json");
        assert_eq!(event.error.as_deref(), Some("model runner crashed"));
    }

    #[test]
    fn models_are_listed_in_order() {
        let names = decode_models_response(
            br#"{"models":[{"name":"llama3.2:3b","size":1},{"name":"qwen2.5:7b"}]}"#,
        )
        .expect("decode");
        assert_eq!(names, vec!["llama3.2:3b", "qwen2.5:7b"]);
    }

    #[test]
    fn empty_or_missing_models_yield_empty_list() {
        assert!(decode_models_response(br#"{"models":[]}"#).unwrap().is_empty());
        assert!(decode_models_response(br#"{}"#).unwrap().is_empty());
        assert!(decode_models_response(br#"{"models":null}"#).unwrap().is_empty());
    }

    #[test]
    fn nameless_entries_are_skipped() {
        let names =
            decode_models_response(br#"{"models":[{"size":3},{"name":"a"},{"name":5}]}"#).unwrap();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn non_json_models_body_is_a_decode_error() {
        let error = decode_models_response(b"<html>").unwrap_err();
        assert!(matches!(error, OllamaApiError::Decode { .. }));
    }
}
