//! Error taxonomy shared by the backends and the coordinator

use thiserror::Error;

/// Egress IP provisioning errors
#[derive(Error, Debug)]
pub enum EgressIpError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("not assigned: {0}")]
    NotAssigned(String),

    /// Opaque failure of a backend call, message kept verbatim.
    #[error("{0}")]
    Backend(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The second step failed and so did its compensation. Cloud and cluster
    /// now disagree about the address and an operator has to reconcile them.
    #[error("state divergence while {operation}: {source}; rollback failed: {compensation}")]
    StateDivergence {
        operation: String,
        source: Box<EgressIpError>,
        compensation: Box<EgressIpError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classification of [`EgressIpError`] independent of the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    CapacityExceeded,
    NotAssigned,
    BackendError,
    NotImplemented,
    Cancelled,
    InvalidConfig,
    StateDivergence,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not-found"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::CapacityExceeded => write!(f, "capacity-exceeded"),
            ErrorKind::NotAssigned => write!(f, "not-assigned"),
            ErrorKind::BackendError => write!(f, "backend-error"),
            ErrorKind::NotImplemented => write!(f, "not-implemented"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::InvalidConfig => write!(f, "invalid-config"),
            ErrorKind::StateDivergence => write!(f, "state-divergence"),
        }
    }
}

impl EgressIpError {
    pub fn backend(message: impl std::fmt::Display) -> Self {
        Self::Backend(message.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EgressIpError::NotFound(_) => ErrorKind::NotFound,
            EgressIpError::Conflict(_) => ErrorKind::Conflict,
            EgressIpError::CapacityExceeded(_) => ErrorKind::CapacityExceeded,
            EgressIpError::NotAssigned(_) => ErrorKind::NotAssigned,
            EgressIpError::Backend(_) | EgressIpError::Io(_) | EgressIpError::Json(_) => {
                ErrorKind::BackendError
            }
            EgressIpError::NotImplemented(_) => ErrorKind::NotImplemented,
            EgressIpError::Cancelled(_) => ErrorKind::Cancelled,
            EgressIpError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            EgressIpError::StateDivergence { .. } => ErrorKind::StateDivergence,
        }
    }

    /// Divergent state must not be retried blindly.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::StateDivergence
    }

    /// True when the error says the address simply is not there.
    pub fn is_absent(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotAssigned | ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, EgressIpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divergence_carries_both_messages() {
        let err = EgressIpError::StateDivergence {
            operation: "adding ip".to_string(),
            source: Box::new(EgressIpError::backend("cluster busy")),
            compensation: Box::new(EgressIpError::backend("ec2 throttled")),
        };

        let message = err.to_string();
        assert!(message.contains("cluster busy"));
        assert!(message.contains("ec2 throttled"));
        assert_eq!(err.kind(), ErrorKind::StateDivergence);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_backend_message_is_verbatim() {
        let err = EgressIpError::backend("cluster busy");
        assert_eq!(err.to_string(), "cluster busy");
        assert_eq!(err.kind(), ErrorKind::BackendError);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_absent_kinds() {
        assert!(EgressIpError::NotAssigned("x".into()).is_absent());
        assert!(EgressIpError::NotFound("x".into()).is_absent());
        assert!(!EgressIpError::Conflict("x".into()).is_absent());
    }
}
