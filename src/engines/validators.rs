// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::traits::EngineError;
use url::Url;

/// 校验并解析抓取URL
///
/// 引擎层只接受 http/https 绝对URL；其余情况是永久失败，不会重试
pub fn checked_url(url_str: &str) -> Result<Url, EngineError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidUrl("empty URL".to_string()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| EngineError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(EngineError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_url_accepts_http_and_https() {
        assert!(checked_url("http://example.com").is_ok());
        assert!(checked_url("https://example.com/path?q=1").is_ok());
    }

    #[test]
    fn test_checked_url_rejects_empty() {
        assert!(matches!(
            checked_url("   "),
            Err(EngineError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_checked_url_rejects_malformed() {
        assert!(matches!(
            checked_url("http//broken"),
            Err(EngineError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_checked_url_rejects_unsupported_scheme() {
        assert!(matches!(
            checked_url("ftp://example.com"),
            Err(EngineError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            checked_url("file:///etc/passwd"),
            Err(EngineError::UnsupportedScheme(s)) if s == "file"
        ));
    }
}
