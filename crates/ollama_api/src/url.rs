use crate::error::OllamaApiError;

/// Default base URL of a locally served Ollama instance.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Normalize a configured base URL.
///
/// Normalization rules:
/// 1) blank input falls back to [`DEFAULT_BASE_URL`]
/// 2) surrounding whitespace and trailing `/` are removed
/// 3) the result must parse as an absolute `http` or `https` URL
pub fn normalize_base_url(input: &str) -> Result<String, OllamaApiError> {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    let parsed = ::url::Url::parse(trimmed)
        .map_err(|error| OllamaApiError::InvalidBaseUrl(format!("{trimmed}: {error}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(OllamaApiError::InvalidBaseUrl(format!(
            "{trimmed}: unsupported scheme '{}'",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(OllamaApiError::InvalidBaseUrl(format!(
            "{trimmed}: missing host"
        )));
    }

    Ok(trimmed.to_string())
}

/// Join a normalized base URL and an endpoint path such as `/api/chat`.
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_base_url_falls_back_to_local_default() {
        assert_eq!(normalize_base_url("  ").unwrap(), DEFAULT_BASE_URL);
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        assert_eq!(
            normalize_base_url("http://gpu-box:11434//").unwrap(),
            "http://gpu-box:11434"
        );
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        let error = normalize_base_url("ftp://localhost:11434").unwrap_err();
        assert!(matches!(error, OllamaApiError::InvalidBaseUrl(_)));
        assert!(error.to_string().contains("unsupported scheme 'ftp'"));
    }

    #[test]
    fn unparseable_base_url_is_rejected() {
        assert!(matches!(
            normalize_base_url("localhost without scheme"),
            Err(OllamaApiError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn endpoint_url_joins_with_single_slash() {
        assert_eq!(
            endpoint_url("http://localhost:11434/", "/api/tags"),
            "http://localhost:11434/api/tags"
        );
        assert_eq!(
            endpoint_url("http://localhost:11434/proxy", "api/chat"),
            "http://localhost:11434/proxy/api/chat"
        );
    }
}
