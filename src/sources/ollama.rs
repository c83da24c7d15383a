//! Client for a locally hosted Ollama generation endpoint.
//!
//! The generate API streams line-delimited JSON fragments; the client
//! reassembles the `response` fields, extracts the outermost JSON object and
//! appends every exchange to an audit log so scoring runs can be replayed.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::config::{Config, OllamaConfig};
use crate::error::AnnotateError;

#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest_middleware::ClientWithMiddleware,
    probe_client: reqwest::Client,
    base: String,
    options: OllamaConfig,
    log_path: PathBuf,
}

impl OllamaClient {
    pub fn new(config: &Config) -> Result<Self, AnnotateError> {
        let options = config.ollama.clone();
        Ok(Self {
            client: crate::sources::retry_client(Duration::from_secs(options.timeout), 3)?,
            probe_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .map_err(AnnotateError::from)?,
            base: options.host.trim_end_matches('/').to_string(),
            options,
            log_path: config.logging.llm_log.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.options.model
    }

    /// Submit a prompt and return the extracted JSON object text.
    pub async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String, AnnotateError> {
        let model = model.unwrap_or(&self.options.model);
        let mut payload = json!({
            "model": model,
            "prompt": prompt,
            "temperature": self.options.temperature,
            "top_p": self.options.top_p,
        });
        if let Some(seed) = self.options.seed {
            payload["seed"] = json!(seed);
        }

        let resp = self
            .client
            .post(format!("{}/api/generate", self.base))
            .json(&payload)
            .send()
            .await
            .map_err(|err| self.unreachable(err))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|err| {
            AnnotateError::ModelUnreachable(format!("failed to read Ollama response: {err}"))
        })?;

        if status == reqwest::StatusCode::NOT_FOUND && body.contains("not found") {
            return Err(AnnotateError::ModelNotFound {
                model: model.to_string(),
            });
        }
        if !status.is_success() {
            return Err(AnnotateError::ModelUnreachable(format!(
                "Ollama HTTP error: {status}"
            )));
        }

        let combined: String = body
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|obj| obj.get("response").and_then(Value::as_str).map(str::to_string))
            .collect();

        let extracted = extract_json_object(&combined).or_else(|| extract_json_object(&body));
        match extracted {
            Some(json_text) => {
                self.log_exchange(&payload, &json_text, true);
                Ok(json_text)
            }
            None => {
                self.log_exchange(&payload, &combined, false);
                Err(AnnotateError::ModelInvalidJson(
                    "No valid JSON object found in Ollama response".to_string(),
                ))
            }
        }
    }

    /// Lightweight health probe: any 2xx from `/api/tags` counts as healthy.
    pub async fn ping(&self) -> Result<(), AnnotateError> {
        let url = format!("{}/api/tags", self.base);
        match self.probe_client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(AnnotateError::ModelUnreachable(format!(
                "Ollama service at {} answered HTTP {}",
                self.base,
                resp.status()
            ))),
            Err(err) if err.is_timeout() => Err(AnnotateError::ModelUnreachable(format!(
                "Timeout: Ollama service at {} took too long to respond",
                self.base
            ))),
            Err(err) if err.is_connect() => Err(AnnotateError::ModelUnreachable(format!(
                "Connection failed: Ollama service not available at {}",
                self.base
            ))),
            Err(err) => Err(AnnotateError::ModelUnreachable(format!(
                "Request failed: {err}"
            ))),
        }
    }

    fn unreachable(&self, err: reqwest_middleware::Error) -> AnnotateError {
        AnnotateError::ModelUnreachable(format!(
            "Failed to connect to Ollama at {}: {err}",
            self.base
        ))
    }

    /// Append the request/response pair to the audit log. Logging must never
    /// fail a scoring call, so every error here is swallowed.
    fn log_exchange(&self, payload: &Value, response_text: &str, is_json: bool) {
        let result: std::io::Result<()> = (|| {
            use std::io::Write;
            if let Some(parent) = self.log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.log_path)?;
            let timestamp = OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| "unknown".to_string());
            let pretty_response = if is_json {
                serde_json::from_str::<Value>(response_text)
                    .and_then(|v| serde_json::to_string_pretty(&v))
                    .unwrap_or_else(|_| response_text.to_string())
            } else {
                response_text.to_string()
            };
            // One write per exchange so concurrent workers append whole
            // records.
            let record = format!(
                "==== BEGIN OLLAMA REQUEST\n\
                 timestamp: {timestamp}\n\
                 {}\n\
                 ---- RESPONSE\n\
                 {pretty_response}\n\
                 ==== END OLLAMA REQUEST\n\n",
                serde_json::to_string_pretty(payload).unwrap_or_default()
            );
            file.write_all(record.as_bytes())
        })();
        if let Err(err) = result {
            debug!(error = %err, "Failed to append to Ollama audit log");
        }
    }
}

/// Locate the outermost `{…}` span and return it when it parses as JSON.
fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let candidate = &text[start..=end];
    serde_json::from_str::<Value>(candidate).ok()?;
    Some(candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base: &str) -> OllamaClient {
        let mut config = Config::default();
        config.ollama.host = base.to_string();
        config.ollama.model = "llama3.2".to_string();
        config.logging.llm_log =
            std::env::temp_dir().join(format!("annotate-ollama-{}.log", std::process::id()));
        OllamaClient::new(&config).unwrap()
    }

    #[test]
    fn extract_json_object_finds_outermost_span() {
        assert_eq!(
            extract_json_object("noise {\"a\": 1} trailing").as_deref(),
            Some("{\"a\": 1}")
        );
        assert!(extract_json_object("no braces here").is_none());
        assert!(extract_json_object("{broken").is_none());
    }

    #[tokio::test]
    async fn generate_assembles_ndjson_fragments() {
        let server = MockServer::start().await;
        let ndjson = concat!(
            "{\"response\": \"{\\\"tool\"}\n",
            "{\"response\": \"_name\\\": \\\"X\\\"}\"}\n",
            "{\"done\": true}\n"
        );
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({"model": "llama3.2"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(ndjson))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let out = client.generate("prompt", None).await.unwrap();
        assert_eq!(out, "{\"tool_name\": \"X\"}");
    }

    #[tokio::test]
    async fn generate_flags_missing_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string("model 'llama3.2' not found"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.generate("prompt", None).await.unwrap_err();
        assert!(matches!(err, AnnotateError::ModelNotFound { .. }));
    }

    #[tokio::test]
    async fn generate_reports_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{\"response\": \"no json here\"}\n"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.generate("prompt", None).await.unwrap_err();
        assert!(matches!(err, AnnotateError::ModelInvalidJson(_)));
    }

    #[tokio::test]
    async fn ping_accepts_any_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": []
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.ping().await.is_ok());
    }

    #[tokio::test]
    async fn ping_reports_unhealthy_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, AnnotateError::ModelUnreachable(_)));
    }
}
