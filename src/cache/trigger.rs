//! Change trigger.
//!
//! Entry point for adapters that watch the item store. Filters out changes
//! that cannot affect any statistic and forwards the rest to the
//! coordinator.

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::repos::SupportConfigProvider;
use crate::domain::types::{ItemId, TermId};

use super::config::StatsCacheConfig;
use super::coordinator::{InvalidationCoordinator, InvalidationOutcome, ScheduleOutcome};
use super::events::{ChangeEvent, ChangeSignal};

/// # Usage
///
/// ```ignore
/// // after an event is saved:
/// trigger.item_saved(event.id, "event");
/// ```
pub struct ChangeTrigger {
    config: StatsCacheConfig,
    support: Arc<dyn SupportConfigProvider>,
    coordinator: Arc<InvalidationCoordinator>,
}

impl ChangeTrigger {
    pub fn new(
        config: StatsCacheConfig,
        support: Arc<dyn SupportConfigProvider>,
        coordinator: Arc<InvalidationCoordinator>,
    ) -> Self {
        Self {
            config,
            support,
            coordinator,
        }
    }

    /// Forward a change to the coordinator. Returns `None` when the change
    /// was ignored.
    pub fn signal(&self, signal: ChangeSignal) -> Option<InvalidationOutcome> {
        let event = ChangeEvent::new(signal);

        if !self.config.enabled {
            debug!(event_id = %event.id, signal = %event.signal, "Change ignored: cache disabled");
            return None;
        }

        if let Some(item_type) = event.signal.item_type()
            && !self.support.support_config().is_item_type_enabled(item_type)
        {
            debug!(
                event_id = %event.id,
                item_type,
                "Change ignored: item type has no statistics enabled"
            );
            return None;
        }

        info!(
            event_id = %event.id,
            signal = %event.signal,
            kind = event.signal.kind(),
            "Statistics change received"
        );
        Some(self.coordinator.on_change_signal())
    }

    pub fn item_saved(&self, item_id: ItemId, item_type: &str) -> Option<InvalidationOutcome> {
        self.signal(ChangeSignal::ItemSaved {
            item_id,
            item_type: item_type.to_string(),
        })
    }

    pub fn item_deleted(&self, item_id: ItemId, item_type: &str) -> Option<InvalidationOutcome> {
        self.signal(ChangeSignal::ItemDeleted {
            item_id,
            item_type: item_type.to_string(),
        })
    }

    pub fn term_changed(&self, category: &str, term_id: TermId) -> Option<InvalidationOutcome> {
        self.signal(ChangeSignal::TermChanged {
            category: category.to_string(),
            term_id,
        })
    }

    pub fn numeric_field_changed(&self, item_id: ItemId) -> Option<InvalidationOutcome> {
        self.signal(ChangeSignal::NumericFieldChanged { item_id })
    }

    pub fn support_config_changed(&self) -> Option<InvalidationOutcome> {
        self.signal(ChangeSignal::SupportConfigChanged)
    }

    pub fn manual(&self, reason: &str) -> Option<InvalidationOutcome> {
        self.signal(ChangeSignal::Manual {
            reason: reason.to_string(),
        })
    }

    /// Arm a regeneration pass without clearing anything.
    pub fn warmup_on_startup(&self) -> Option<ScheduleOutcome> {
        if !self.config.enabled {
            debug!("Startup warmup skipped: cache disabled");
            return None;
        }
        Some(self.coordinator.schedule_regeneration())
    }

    pub fn coordinator(&self) -> &Arc<InvalidationCoordinator> {
        &self.coordinator
    }
}
