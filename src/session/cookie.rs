use anyhow::{Context, Result};
use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

pub const SESSION_COOKIE_NAME: &str = "ttb-auth";

/// Generate an opaque 256-bit session token for the cookie.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so the raw value is never kept server-side.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

pub(crate) fn session_cookie(
    token: &str,
    ttl_seconds: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_url_safe() -> anyhow::Result<()> {
        let first = generate_session_token()?;
        let second = generate_session_token()?;
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(
            first
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        Ok(())
    }

    #[test]
    fn hash_is_stable_and_not_the_token() {
        let hash = hash_session_token("abc");
        assert_eq!(hash, hash_session_token("abc"));
        assert_ne!(hash, b"abc".to_vec());
        assert_eq!(hash.len(), 32);
    }

    #[test]
    fn cookie_attributes() -> anyhow::Result<()> {
        let cookie = session_cookie("tok", 900, false)?;
        assert_eq!(
            cookie.to_str()?,
            "ttb-auth=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=900"
        );
        let secure = session_cookie("tok", 900, true)?;
        assert!(secure.to_str()?.ends_with("; Secure"));
        let cleared = clear_session_cookie(false)?;
        assert!(cleared.to_str()?.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn extracts_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; ttb-auth=abc123; lang=en"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn missing_or_empty_cookie_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);
        headers.insert(COOKIE, HeaderValue::from_static("ttb-auth="));
        assert_eq!(extract_session_token(&headers), None);
    }
}
