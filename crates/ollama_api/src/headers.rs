use std::collections::BTreeMap;

use crate::config::OllamaApiConfig;
use crate::payload::ApiRequest;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_USER_AGENT: &str = "user-agent";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Build a deterministic header map for one request.
///
/// Precedence, lowest first: transport defaults, configured extra headers,
/// headers carried by the request itself. Keys are lowercased.
pub fn build_headers(config: &OllamaApiConfig, request: &ApiRequest) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    headers.insert(HEADER_ACCEPT.to_owned(), JSON_CONTENT_TYPE.to_owned());
    let ua = config
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(default_user_agent);
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in config.extra_headers.iter().chain(request.headers.iter()) {
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        headers.insert(key, value.trim().to_owned());
    }

    headers
}

fn default_user_agent() -> String {
    format!("vilm/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{chat_request, list_models_request};

    #[test]
    fn defaults_include_accept_and_user_agent() {
        let headers = build_headers(&OllamaApiConfig::default(), &list_models_request());
        assert_eq!(headers.get(HEADER_ACCEPT).unwrap(), JSON_CONTENT_TYPE);
        assert!(headers.get(HEADER_USER_AGENT).unwrap().starts_with("vilm/"));
        assert!(!headers.contains_key(HEADER_CONTENT_TYPE));
    }

    #[test]
    fn request_headers_override_configured_extras() {
        let config = OllamaApiConfig::default()
            .with_user_agent("editor-plugin/2")
            .insert_header("X-Trace", " abc ")
            .insert_header("Content-Type", "text/plain");
        let headers = build_headers(&config, &chat_request(Vec::new()));

        assert_eq!(headers.get("x-trace").unwrap(), "abc");
        assert_eq!(headers.get(HEADER_USER_AGENT).unwrap(), "editor-plugin/2");
        assert_eq!(headers.get(HEADER_CONTENT_TYPE).unwrap(), JSON_CONTENT_TYPE);
    }
}
