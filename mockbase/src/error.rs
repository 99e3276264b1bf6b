use thiserror::Error;

#[derive(Error, Debug)]
pub enum MockbaseError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Type error: column '{column}' expects {expected}, got {actual}")]
    Type {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Format error: column '{column}' value {value} does not match /{pattern}/")]
    Format {
        column: String,
        value: String,
        pattern: String,
    },

    #[error("Uniqueness error: column '{column}' already has value {value}")]
    Uniqueness { column: String, value: String },

    #[error("Reference error: column '{column}' points to missing {resource}/{id}")]
    Reference {
        column: String,
        resource: String,
        id: String,
    },

    #[error("Relationship error: {0}")]
    Relationship(String),

    #[error("Record not found: {resource}/{id}")]
    NotFound { resource: String, id: u64 },

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MockbaseError {
    /// True for errors caused by the caller's input rather than by the store or
    /// its backing files.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MockbaseError::Validation(_)
                | MockbaseError::Type { .. }
                | MockbaseError::Format { .. }
                | MockbaseError::Uniqueness { .. }
                | MockbaseError::Reference { .. }
                | MockbaseError::NotFound { .. }
                | MockbaseError::UnknownResource(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MockbaseError>;
