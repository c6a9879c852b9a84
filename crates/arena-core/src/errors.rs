/// Failure to decode an inbound frame into a player state.
/// Recoverable: the connection keeps receiving.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl DecodeError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "invalid_json",
            Self::NotAnObject(_) => "not_an_object",
        }
    }
}

/// Failure to hand a message to one recipient's outbound queue.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("send queue full")]
    QueueFull,
    #[error("connection closed")]
    Closed,
}

impl SendError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::QueueFull => "queue_full",
            Self::Closed => "closed",
        }
    }
}

/// Balance ledger failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),
    #[error("balance overflow: {balance} + {amount}")]
    Overflow { balance: u64, amount: u64 },
}

impl LedgerError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "invalid_amount",
            Self::Overflow { .. } => "overflow",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_from_serde() {
        let err: DecodeError = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert_eq!(err.error_kind(), "invalid_json");
        assert!(err.to_string().starts_with("invalid JSON"));
    }

    #[test]
    fn not_an_object_message() {
        let err = DecodeError::NotAnObject("array");
        assert_eq!(err.to_string(), "state must be a JSON object, got array");
        assert_eq!(err.error_kind(), "not_an_object");
    }

    #[test]
    fn send_error_kinds() {
        assert_eq!(SendError::QueueFull.error_kind(), "queue_full");
        assert_eq!(SendError::Closed.error_kind(), "closed");
    }

    #[test]
    fn ledger_error_display() {
        assert_eq!(
            LedgerError::InvalidAmount(-5).to_string(),
            "amount must be positive, got -5"
        );
        let overflow = LedgerError::Overflow { balance: u64::MAX, amount: 1 };
        assert_eq!(overflow.error_kind(), "overflow");
    }
}
