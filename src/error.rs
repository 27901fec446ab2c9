use reqwest::StatusCode;
use thiserror::Error;

/// Why an incoming aggregate payload was rejected.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload has no questions field")]
    MissingQuestions,

    #[error("Question has neither question_id nor id")]
    MissingQuestionId,

    #[error("Unknown question type '{kind}' for question {question_id}")]
    UnknownType { question_id: String, kind: String },
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error("Could not reach the results service: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Could not read the survey results: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid results endpoint: {0}")]
    Endpoint(#[from] ConfigError),
}

impl LoadError {
    /// Text shown inline in the results page.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("connect: {0}")]
    Connect(String),

    #[error("read: {0}")]
    Read(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL in {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("URL cannot carry path segments: {0}")]
    NotABase(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}
