use thiserror::Error;

/// Crate-wide error type. Components below the pipeline orchestrator only
/// surface failures through these variants; nothing panics on bad remote data.
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// The model endpoint could not be reached (connect, timeout, TLS, HTTP
    /// transport). Triggers the heuristic downgrade, never a schema retry.
    #[error("Ollama unreachable: {0}")]
    ModelUnreachable(String),

    /// The model endpoint answered 404 with a "not found" body, i.e. the
    /// requested model is not pulled on the server.
    #[error("Model '{model}' not found in Ollama. Available models: ollama list")]
    ModelNotFound { model: String },

    /// The model replied but no JSON object could be extracted, even after
    /// the configured schema retries.
    #[error("LLM scoring produced invalid JSON after retries: {0}")]
    ModelInvalidJson(String),

    /// The model's JSON failed schema validation on every attempt.
    #[error("LLM scoring response violated schema after retries: {0}")]
    ModelSchema(String),

    /// A remote API returned an unusable response.
    #[error("{api} API error: {message}")]
    Api { api: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AnnotateError {
    pub fn api(api: &str, message: impl Into<String>) -> Self {
        Self::Api {
            api: api.to_string(),
            message: message.into(),
        }
    }
}

impl From<reqwest_middleware::Error> for AnnotateError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => Self::Api {
                api: "http".to_string(),
                message: e.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for AnnotateError {
    fn from(err: reqwest::Error) -> Self {
        Self::Api {
            api: "http".to_string(),
            message: err.to_string(),
        }
    }
}
