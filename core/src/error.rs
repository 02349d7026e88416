use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store unavailable at '{path}': {source}")]
    StoreUnavailable {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A generated dataset broke a cross-entity invariant.
    /// Never a runtime condition: it means the generator is wrong.
    #[error("Referential integrity violation in {entity}: {detail}")]
    ReferentialIntegrity { entity: &'static str, detail: String },

    #[error("Invalid {entity} record: {detail}")]
    InvalidRecord { entity: &'static str, detail: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    pub fn invalid_record(entity: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidRecord { entity, detail: detail.into() }
    }

    pub fn integrity(entity: &'static str, detail: impl Into<String>) -> Self {
        Self::ReferentialIntegrity { entity, detail: detail.into() }
    }
}

pub type SimResult<T> = Result<T, SimError>;
