//! Shared HTTP plumbing for the remote APIs.
//!
//! Europe PMC and Ollama traffic goes through a retry-middleware client
//! (transient 429/5xx failures are retried with exponential backoff). The
//! homepage scraper deliberately uses a plain client: a scrape failure must
//! be classified into a status label, not papered over by retries.

use std::borrow::Cow;
use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::RetryTransientMiddleware;
use reqwest_retry::policies::ExponentialBackoff;

use crate::error::AnnotateError;

pub mod europepmc;
pub mod ollama;

/// Hard ceiling on any API response body we are willing to buffer.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Build a client with per-request timeout and transient-error retries.
pub fn retry_client(
    timeout: Duration,
    max_retries: u32,
) -> Result<ClientWithMiddleware, AnnotateError> {
    let inner = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(AnnotateError::from)?;
    let policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
    Ok(ClientBuilder::new(inner)
        .with(RetryTransientMiddleware::new_with_policy(policy))
        .build())
}

/// Resolve an API base URL, allowing env-var override (test servers, mirrors).
pub fn env_base(default: &'static str, env_var: &str) -> Cow<'static, str> {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Cow::Owned(value.trim().to_string()),
        _ => Cow::Borrowed(default),
    }
}

/// Read a response body, refusing to buffer more than [`MAX_BODY_BYTES`].
pub async fn read_limited_body(
    mut resp: reqwest::Response,
    api: &str,
) -> Result<Vec<u8>, AnnotateError> {
    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        if body.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(AnnotateError::api(
                api,
                format!("response body exceeds {MAX_BODY_BYTES} bytes"),
            ));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Short printable excerpt of a response body for error messages.
pub fn body_excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let collapsed = crate::utils::text::normalize_whitespace(&text);
    crate::utils::text::truncate_chars(&collapsed, 200)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_base_prefers_env_var() {
        // Isolated variable name so parallel tests don't race.
        unsafe { std::env::set_var("ANNOTATE_TEST_BASE", "http://127.0.0.1:9") };
        assert_eq!(
            env_base("https://default.example", "ANNOTATE_TEST_BASE").as_ref(),
            "http://127.0.0.1:9"
        );
        unsafe { std::env::remove_var("ANNOTATE_TEST_BASE") };
        assert_eq!(
            env_base("https://default.example", "ANNOTATE_TEST_BASE").as_ref(),
            "https://default.example"
        );
    }

    #[test]
    fn body_excerpt_collapses_and_truncates() {
        let excerpt = body_excerpt("line one\nline   two".as_bytes());
        assert_eq!(excerpt, "line one line two");
        let long = "a".repeat(500);
        assert_eq!(body_excerpt(long.as_bytes()).len(), 200);
    }
}
