//! Change signals.
//!
//! Upstream mutations that make cached statistics stale. The coordinator
//! never sees these; they exist for logging and for filtering out changes
//! that cannot affect any statistic.

use std::fmt;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{ItemId, TermId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSignal {
    /// An item was created or updated.
    ItemSaved { item_id: ItemId, item_type: String },
    ItemDeleted { item_id: ItemId, item_type: String },
    /// A term was created, renamed, re-parented or deleted.
    TermChanged { category: String, term_id: TermId },
    /// The per-item numeric field changed.
    NumericFieldChanged { item_id: ItemId },
    /// Statistic types were switched on or off.
    SupportConfigChanged,
    Manual { reason: String },
}

impl ChangeSignal {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ItemSaved { .. } => "item_saved",
            Self::ItemDeleted { .. } => "item_deleted",
            Self::TermChanged { .. } => "term_changed",
            Self::NumericFieldChanged { .. } => "numeric_field_changed",
            Self::SupportConfigChanged => "support_config_changed",
            Self::Manual { .. } => "manual",
        }
    }

    /// Item type the change is scoped to, when it is scoped to one.
    pub fn item_type(&self) -> Option<&str> {
        match self {
            Self::ItemSaved { item_type, .. } | Self::ItemDeleted { item_type, .. } => {
                Some(item_type.as_str())
            }
            _ => None,
        }
    }
}

impl fmt::Display for ChangeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ItemSaved { item_id, item_type } | Self::ItemDeleted { item_id, item_type } => {
                write!(f, "{} {item_type}#{item_id}", self.kind())
            }
            Self::TermChanged { category, term_id } => {
                write!(f, "{} {category}#{term_id}", self.kind())
            }
            Self::NumericFieldChanged { item_id } => write!(f, "{} #{item_id}", self.kind()),
            Self::SupportConfigChanged => f.write_str(self.kind()),
            Self::Manual { reason } => write!(f, "{} ({reason})", self.kind()),
        }
    }
}

/// A signal stamped for correlation in logs.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub id: Uuid,
    pub signal: ChangeSignal,
    pub received_at: OffsetDateTime,
}

impl ChangeEvent {
    pub fn new(signal: ChangeSignal) -> Self {
        Self {
            id: Uuid::new_v4(),
            signal,
            received_at: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_item_signals_carry_an_item_type() {
        let saved = ChangeSignal::ItemSaved {
            item_id: 7,
            item_type: "event".to_string(),
        };
        assert_eq!(saved.item_type(), Some("event"));
        assert_eq!(saved.to_string(), "item_saved event#7");

        let term = ChangeSignal::TermChanged {
            category: "venue".to_string(),
            term_id: 3,
        };
        assert_eq!(term.item_type(), None);
        assert_eq!(term.to_string(), "term_changed venue#3");
    }

    #[test]
    fn events_get_distinct_ids() {
        let first = ChangeEvent::new(ChangeSignal::SupportConfigChanged);
        let second = ChangeEvent::new(ChangeSignal::SupportConfigChanged);
        assert_ne!(first.id, second.id);
    }
}
