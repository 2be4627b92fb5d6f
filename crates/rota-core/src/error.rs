use thiserror::Error;

#[derive(Debug, Error)]
pub enum RotaError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition: {entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("attempt limit of {limit} reached, no further submissions accepted")]
    AttemptLimitExceeded { limit: i32 },

    #[error("this request has already been reviewed with that status")]
    AlreadyReviewed,

    #[error("conflicting update: {0}")]
    ConflictingUpdate(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RotaError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidTransition { .. } => 409,
            Self::AttemptLimitExceeded { .. } => 400,
            Self::AlreadyReviewed => 400,
            Self::ConflictingUpdate(_) => 409,
            Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_not_found() {
        assert_eq!(RotaError::NotFound("x".into()).http_status(), 404);
    }

    #[test]
    fn http_status_invalid_transition() {
        let e = RotaError::InvalidTransition {
            entity: "user_task",
            from: "approved".into(),
            to: "under_review".into(),
        };
        assert_eq!(e.http_status(), 409);
    }

    #[test]
    fn http_status_attempt_limit() {
        assert_eq!(
            RotaError::AttemptLimitExceeded { limit: 3 }.http_status(),
            400
        );
    }

    #[test]
    fn http_status_already_reviewed() {
        assert_eq!(RotaError::AlreadyReviewed.http_status(), 400);
    }

    #[test]
    fn http_status_conflicting_update() {
        assert_eq!(RotaError::ConflictingUpdate("x".into()).http_status(), 409);
    }

    #[test]
    fn http_status_internal() {
        let e = RotaError::Internal(anyhow::anyhow!("boom"));
        assert_eq!(e.http_status(), 500);
    }

    #[test]
    fn display_invalid_transition() {
        let e = RotaError::InvalidTransition {
            entity: "request",
            from: "rejected".into(),
            to: "approved".into(),
        };
        assert_eq!(
            e.to_string(),
            "invalid transition: request cannot move from rejected to approved"
        );
    }

    #[test]
    fn display_attempt_limit() {
        let e = RotaError::AttemptLimitExceeded { limit: 3 };
        assert_eq!(
            e.to_string(),
            "attempt limit of 3 reached, no further submissions accepted"
        );
    }

    #[test]
    fn display_not_found() {
        let e = RotaError::NotFound("user_task 42".into());
        assert_eq!(e.to_string(), "not found: user_task 42");
    }
}
