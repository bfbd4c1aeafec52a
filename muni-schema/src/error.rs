use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("payload is not valid json: {0}")]
    Json(String),

    #[error("expected a FeatureCollection, got '{0}'")]
    NotFeatureCollection(String),

    #[error("feature collection is missing 'features'")]
    MissingFeatures,

    #[error("feature at index {0} has no id")]
    MissingFeatureId(usize),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("{0}")]
    Rejected(String),
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Json(err.to_string())
    }
}
