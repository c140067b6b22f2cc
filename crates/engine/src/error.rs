use crate::{provider::ProviderError, store::StoreError};

/// Stable error codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed input.
    InvalidArgument,
    /// Duplicate email, contact, wallet, or occupied slot at signup.
    AlreadyExists,
    /// Sponsor or placement target missing.
    NotFound,
    /// Inactive sponsor, occupied position, ineligible claim, or
    /// insufficient balance.
    FailedPrecondition,
    /// Rate limited.
    ResourceExhausted,
    /// Unexpected store or provider failure.
    Internal,
    /// Transaction conflict that survived the bounded retries.
    Aborted,
}

/// Error type for `uptree-engine`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A uniqueness check failed.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// A referenced member does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A precondition of the operation does not hold.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    /// Denied by the rate-limit pre-check.
    #[error("rate limited")]
    RateLimited,
    /// Transaction conflict after exhausting retries.
    #[error("transaction aborted after {attempts} attempts")]
    Aborted {
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// Model error.
    #[error("model: {0}")]
    Model(#[from] uptree_model::Error),
    /// Store error.
    #[error("store: {0}")]
    Store(#[from] StoreError),
    /// Identity provider error.
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),
}

impl Error {
    /// Get the stable code of the error.
    pub fn code(&self) -> ErrorCode {
        use uptree_model::Error as Model;
        match self {
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::AlreadyExists(_) => ErrorCode::AlreadyExists,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::FailedPrecondition(_) => ErrorCode::FailedPrecondition,
            Self::RateLimited => ErrorCode::ResourceExhausted,
            Self::Aborted { .. } => ErrorCode::Aborted,
            Self::Model(err) => match err {
                Model::MemberNotFound => ErrorCode::NotFound,
                Model::InactiveSponsor
                | Model::SlotOccupied(_)
                | Model::ClaimNotEligible
                | Model::EmptyClaim
                | Model::RankNotUnlocked(_) => ErrorCode::FailedPrecondition,
                Model::InvalidArgument(_) | Model::BuildParams(_) => ErrorCode::InvalidArgument,
                _ => ErrorCode::Internal,
            },
            Self::Store(err) => match err {
                StoreError::NotFound => ErrorCode::NotFound,
                StoreError::Conflict => ErrorCode::Aborted,
                StoreError::InsufficientBalance => ErrorCode::FailedPrecondition,
                StoreError::Unavailable(_) => ErrorCode::Internal,
            },
            Self::Provider(err) => match err {
                ProviderError::AlreadyExists => ErrorCode::AlreadyExists,
                ProviderError::NotFound => ErrorCode::NotFound,
                ProviderError::Unavailable(_) => ErrorCode::Internal,
            },
        }
    }

    /// Build the structured payload surfaced to callers.
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// The structured error surfaced at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorPayload {
    /// Stable code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_over_the_wire() {
        let payload = Error::FailedPrecondition("Position already occupied".into()).payload();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["code"], "FAILED_PRECONDITION");
        assert_eq!(json["message"], "failed precondition: Position already occupied");
    }

    #[test]
    fn model_errors_map_to_the_taxonomy() {
        assert_eq!(
            Error::from(uptree_model::Error::MemberNotFound).code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            Error::from(uptree_model::Error::InactiveSponsor).code(),
            ErrorCode::FailedPrecondition
        );
        assert_eq!(
            Error::from(uptree_model::Error::Overflow).code(),
            ErrorCode::Internal
        );
        assert_eq!(Error::from(StoreError::Conflict).code(), ErrorCode::Aborted);
    }
}
