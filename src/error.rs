//! Errors surfaced by the event core.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`EventError::QueueEmpty`] | `EVENT_QUEUE_EMPTY` | Yes |
//! | [`EventError::AlreadySequenced`] | `EVENT_ALREADY_SEQUENCED` | No |
//! | [`EventError::Malformed`] | `EVENT_MALFORMED` | No |
//! | [`EventError::Codec`] | `EVENT_CODEC` | No |
//!
//! Nothing here is retried automatically. A `QueueEmpty` read leaves the
//! queue untouched, so the caller can simply try again later.

use thiserror::Error;

use crate::events::{EventId, EventType};

#[derive(Debug, Error)]
pub enum EventError {
    /// `dequeue` was called with nothing stored.
    #[error("event queue is empty")]
    QueueEmpty,

    /// An event that already carries a sequence number was offered to a queue.
    /// Producers must hand over unstamped events.
    #[error("event {event_id} already carries seq {seq}")]
    AlreadySequenced { event_id: EventId, seq: u64 },

    /// Payload failed validation at construction time.
    #[error("malformed {event_type} event: {reason}")]
    Malformed {
        event_type: EventType,
        reason: String,
    },

    #[error("event codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl EventError {
    pub(crate) fn malformed(event_type: EventType, reason: impl Into<String>) -> Self {
        Self::Malformed {
            event_type,
            reason: reason.into(),
        }
    }

    /// Machine-readable code, always prefixed with `EVENT_`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueueEmpty => "EVENT_QUEUE_EMPTY",
            Self::AlreadySequenced { .. } => "EVENT_ALREADY_SEQUENCED",
            Self::Malformed { .. } => "EVENT_MALFORMED",
            Self::Codec(_) => "EVENT_CODEC",
        }
    }

    /// Whether calling again later may succeed without changing the input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::QueueEmpty)
    }
}

pub type Result<T> = std::result::Result<T, EventError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<EventError> {
        vec![
            EventError::QueueEmpty,
            EventError::AlreadySequenced {
                event_id: EventId::new(),
                seq: 3,
            },
            EventError::malformed(EventType::Order, "x"),
            EventError::Codec(serde_json::from_str::<u64>("nope").unwrap_err()),
        ]
    }

    #[test]
    fn codes_share_prefix() {
        for err in all_variants() {
            assert!(err.code().starts_with("EVENT_"), "{}", err.code());
            assert_eq!(err.code(), err.code().to_uppercase());
        }
    }

    #[test]
    fn only_empty_read_is_recoverable() {
        let recoverable: Vec<_> = all_variants()
            .into_iter()
            .filter(|e| e.is_recoverable())
            .map(|e| e.code())
            .collect();
        assert_eq!(recoverable, vec!["EVENT_QUEUE_EMPTY"]);
    }

    #[test]
    fn malformed_message_names_type() {
        let err = EventError::malformed(EventType::CorporateAction, "split needs a ratio");
        assert_eq!(
            err.to_string(),
            "malformed CORPORATE_ACTION event: split needs a ratio"
        );
    }
}
