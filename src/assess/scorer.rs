//! LLM scoring with bounded schema-repair retries.
//!
//! Attempt state machine: a transport failure fails fast (the orchestrator
//! downgrades to heuristics); a parse or schema failure re-prompts with the
//! prior errors appended, up to `schema_retries` extra attempts.

use serde_json::Value;
use tracing::debug;

use crate::assess::normalize::normalize_response;
use crate::assess::prompt::PromptBuilder;
use crate::assess::schema::validate_response;
use crate::config::Config;
use crate::entities::candidate::Candidate;
use crate::entities::score::{ModelParams, ScoreRecord};
use crate::error::AnnotateError;
use crate::sources::ollama::OllamaClient;

pub struct Scorer {
    client: OllamaClient,
    model: String,
    prompt_builder: PromptBuilder,
    schema_retries: u32,
}

struct RetryOutcome {
    response: Value,
    params: ModelParams,
}

impl Scorer {
    pub fn new(config: &Config, model_override: Option<String>) -> Result<Self, AnnotateError> {
        let client = OllamaClient::new(config)?;
        let model = model_override
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| config.ollama.model.clone());
        Ok(Self {
            client,
            model,
            prompt_builder: PromptBuilder::new(config.prompt_template().to_string()),
            schema_retries: config.ollama.schema_retries(),
        })
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Score one candidate. Errors are typed: `ModelUnreachable` /
    /// `ModelNotFound` surface immediately, `ModelInvalidJson` / `ModelSchema`
    /// only after the retry budget is spent.
    pub async fn score_candidate(
        &self,
        candidate: &Candidate,
    ) -> Result<ScoreRecord, AnnotateError> {
        if candidate.display_title().trim().is_empty() {
            return Err(AnnotateError::InvalidArgument(
                "Candidate must have either 'title' or 'name'".to_string(),
            ));
        }

        let base_prompt = self.prompt_builder.build(candidate);
        let origin_types = PromptBuilder::origin_types(candidate);

        let outcome = self.run_attempts(&base_prompt).await?;
        Ok(normalize_response(
            &outcome.response,
            candidate,
            &self.model,
            outcome.params,
            origin_types,
        ))
    }

    async fn run_attempts(&self, base_prompt: &str) -> Result<RetryOutcome, AnnotateError> {
        let max_attempts = 1 + self.schema_retries;
        let mut errors_history: Vec<Vec<String>> = Vec::new();
        let mut last_errors: Vec<String> = Vec::new();

        for attempt in 0..max_attempts {
            let prompt = if attempt == 0 {
                base_prompt.to_string()
            } else {
                PromptBuilder::augment(base_prompt, &last_errors)
            };

            let raw = match self.client.generate(&prompt, Some(&self.model)).await {
                Ok(raw) => raw,
                Err(AnnotateError::ModelInvalidJson(message)) => {
                    last_errors = vec![message];
                    errors_history.push(last_errors.clone());
                    if attempt + 1 == max_attempts {
                        return Err(AnnotateError::ModelInvalidJson(
                            "No valid JSON object found after retries".to_string(),
                        ));
                    }
                    continue;
                }
                // Transport failures are not repairable by re-prompting.
                Err(err) => return Err(err),
            };

            let response: Value = match serde_json::from_str(&raw) {
                Ok(response) => response,
                Err(err) => {
                    last_errors = vec![format!("JSON parse error: {err}")];
                    errors_history.push(last_errors.clone());
                    if attempt + 1 == max_attempts {
                        return Err(AnnotateError::ModelInvalidJson(err.to_string()));
                    }
                    continue;
                }
            };

            let validation_errors = validate_response(&response);
            if !validation_errors.is_empty() {
                debug!(attempt, errors = ?validation_errors, "Schema validation failed");
                last_errors = validation_errors.clone();
                errors_history.push(validation_errors.clone());
                if attempt + 1 == max_attempts {
                    return Err(AnnotateError::ModelSchema(validation_errors.join("; ")));
                }
                continue;
            }

            return Ok(RetryOutcome {
                response,
                params: ModelParams {
                    attempts: attempt + 1,
                    prompt_augmented: attempt > 0 && !errors_history.is_empty(),
                    schema_errors: errors_history,
                },
            });
        }

        Err(AnnotateError::ModelInvalidJson(
            "empty response payload".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, schema_retries: i64) -> Config {
        let mut config = Config::default();
        config.ollama.host = server.uri();
        config.ollama.schema_retries = schema_retries;
        config.logging.llm_log =
            std::env::temp_dir().join(format!("annotate-scorer-{}.log", std::process::id()));
        config
    }

    fn candidate() -> Candidate {
        serde_json::from_value(json!({
            "title": "SpecTool",
            "homepage": "https://tool.example",
            "urls": ["https://tool.example"],
            "publication_ids": ["pmid:12345"]
        }))
        .unwrap()
    }

    fn ndjson_for(payload: &Value) -> String {
        let obj = json!({"response": payload.to_string()});
        format!("{obj}\n{{\"done\": true}}\n")
    }

    fn valid_payload() -> Value {
        json!({
            "tool_name": "SpecTool",
            "homepage": "https://tool.example",
            "publication_ids": ["pmid:12345"],
            "bio_subscores": {"A1": 1, "A2": 1, "A3": 1, "A4": 1, "A5": 1},
            "documentation_subscores": {"B1": 1, "B2": 1, "B3": 1, "B4": 1, "B5": 1},
            "confidence_score": 0.9,
            "concise_description": "Does things.",
            "rationale": "Because."
        })
    }

    #[tokio::test]
    async fn first_attempt_success_has_no_diagnostics() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ndjson_for(&valid_payload())))
            .mount(&server)
            .await;

        let scorer = Scorer::new(&config_for(&server, 1), None).unwrap();
        let record = scorer.score_candidate(&candidate()).await.unwrap();
        assert_eq!(record.model_params.attempts, 1);
        assert!(!record.model_params.prompt_augmented);
        assert_eq!(record.bio_score, 1.0);
        assert_eq!(record.documentation_score, 1.0);
    }

    #[tokio::test]
    async fn schema_failure_retries_with_augmented_prompt() {
        let server = MockServer::start().await;
        let mut invalid = valid_payload();
        invalid["documentation_subscores"]["B5"] = json!("invalid");

        // Attempt 1: invalid payload.
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ndjson_for(&invalid)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        // Attempt 2 must carry the repair preface and the prior error.
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_string_contains(
                "did not validate against the JSON schema",
            ))
            .and(body_string_contains("documentation_subscores.B5"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ndjson_for(&valid_payload())))
            .mount(&server)
            .await;

        let scorer = Scorer::new(&config_for(&server, 1), None).unwrap();
        let record = scorer.score_candidate(&candidate()).await.unwrap();
        assert_eq!(record.model_params.attempts, 2);
        assert!(record.model_params.prompt_augmented);
        assert_eq!(record.model_params.schema_errors.len(), 1);
        assert_eq!(record.bio_score, 1.0);
    }

    #[tokio::test]
    async fn exhausted_schema_retries_surface_a_typed_error() {
        let server = MockServer::start().await;
        let mut invalid = valid_payload();
        invalid.as_object_mut().unwrap().remove("rationale");
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ndjson_for(&invalid)))
            .mount(&server)
            .await;

        let scorer = Scorer::new(&config_for(&server, 1), None).unwrap();
        let err = scorer.score_candidate(&candidate()).await.unwrap_err();
        assert!(matches!(err, AnnotateError::ModelSchema(_)));
        assert!(err.to_string().contains("rationale"));
    }

    #[tokio::test]
    async fn zero_retries_means_exactly_one_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{\"response\": \"not json at all\"}\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let scorer = Scorer::new(&config_for(&server, 0), None).unwrap();
        let err = scorer.score_candidate(&candidate()).await.unwrap_err();
        assert!(matches!(err, AnnotateError::ModelInvalidJson(_)));
    }

    #[tokio::test]
    async fn untitled_candidates_are_rejected() {
        let server = MockServer::start().await;
        let scorer = Scorer::new(&config_for(&server, 0), None).unwrap();
        let blank: Candidate = serde_json::from_value(json!({"description": "x"})).unwrap();
        let err = scorer.score_candidate(&blank).await.unwrap_err();
        assert!(matches!(err, AnnotateError::InvalidArgument(_)));
    }
}
