use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenBiError {
    #[error("Profile error: {0}")]
    Profile(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("State error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, GenBiError>;
