use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("quote text is empty")]
    EmptyInput,
    #[error("quote {requested} does not exist ({count} on file)")]
    InvalidIndex { requested: i64, count: usize },
    #[error("stored quotes could not be decoded: {0}")]
    Deserialization(String),
    #[error("quotes could not be persisted: {0}")]
    Persistence(String),
}

impl StoreError {
    /// Input problems are answered with guidance text; everything else is a real failure.
    pub fn is_user_input(&self) -> bool {
        matches!(self, Self::EmptyInput | Self::InvalidIndex { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("{kind} `{key}` was not found")]
    NotFound { kind: &'static str, key: String },
    #[error("host call failed: {0}")]
    Unavailable(String),
}

impl HostError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound { kind, key: key.into() }
    }
}

/// Failures a command cannot answer with guidance text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => "service_unavailable",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => {
                "Quotes could not be loaded or saved right now. Please retry shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Store(error) => {
                InterfaceError::ServiceUnavailable { message: error.to_string(), correlation_id }
            }
        }
    }
}
