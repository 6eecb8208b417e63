//! Fee journal access.

use super::core::Ledger;
use super::results::LedgerError;
use crate::journal::{FeeEvent, FeeEventType, FeeRecord, FeeStats, FeeVault};
use crate::types::{AccountId, TimeRange};
use std::collections::BTreeMap;

impl Ledger {
    /// Append an externally produced fee event, e.g. a compensating entry.
    pub fn record_fee_event(&mut self, record: FeeRecord) -> Result<u64, LedgerError> {
        let event_id = self.journal.record(record).inspect_err(|e| {
            tracing::warn!(error = %e, "fee event rejected");
        })?;
        tracing::info!(event_id, event_type = ?record.event_type, total_fee = record.total_fee, "fee event recorded");
        Ok(event_id)
    }

    pub fn fee_stats(&self, range: Option<TimeRange>) -> BTreeMap<FeeEventType, FeeStats> {
        self.journal.stats_by_event_type(range)
    }

    pub fn fee_events(&self) -> &[FeeEvent] {
        self.journal.events()
    }

    pub fn fee_events_for(&self, owner: AccountId) -> Vec<&FeeEvent> {
        self.journal.events_for(owner)
    }

    pub fn fee_vault(&self) -> FeeVault {
        self.journal.vault()
    }
}
