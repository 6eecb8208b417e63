//! Funding index reads and rate updates.

use super::core::Ledger;
use super::results::LedgerError;
use crate::events::{BasktInitializedEvent, EventPayload, FundingRateUpdatedEvent};
use crate::funding::FundingIndex;
use crate::types::{BasktId, Bps};

impl Ledger {
    /// Seed a basket's index at zero with a zero rate.
    pub fn initialize_baskt(&mut self, baskt_id: BasktId) -> Result<(), LedgerError> {
        if !self.funding.initialize(baskt_id, self.current_time) {
            return Err(LedgerError::BasktAlreadyInitialized(baskt_id));
        }
        tracing::info!(baskt = %baskt_id, "baskt initialized");
        self.emit_event(EventPayload::BasktInitialized(BasktInitializedEvent { baskt_id }));
        Ok(())
    }

    /// Index at the ledger's current time. Pure read.
    pub fn current_index(&self, baskt_id: BasktId) -> Result<i128, LedgerError> {
        let index = self.funding.get(baskt_id).ok_or(LedgerError::BasktNotFound(baskt_id))?;
        index
            .index_at(self.current_time, self.config.funding.index_scale)
            .ok_or(LedgerError::MathOverflow)
    }

    /// Fold accrual at the old rate, then switch to `new_rate`.
    pub fn update_rate(&mut self, baskt_id: BasktId, new_rate: Bps) -> Result<(), LedgerError> {
        let now = self.current_time;
        let scale = self.config.funding.index_scale;
        let index = self
            .funding
            .get_mut(baskt_id)
            .ok_or(LedgerError::BasktNotFound(baskt_id))?;

        let old_rate = index.current_rate;
        index.update_rate(new_rate, now, scale).ok_or(LedgerError::MathOverflow)?;
        let cumulative_index = index.cumulative_index;

        tracing::info!(baskt = %baskt_id, %old_rate, %new_rate, cumulative_index, "funding rate updated");
        self.emit_event(EventPayload::FundingRateUpdated(FundingRateUpdatedEvent {
            baskt_id,
            old_rate,
            new_rate,
            cumulative_index,
        }));
        Ok(())
    }

    pub fn funding_index(&self, baskt_id: BasktId) -> Option<&FundingIndex> {
        self.funding.get(baskt_id)
    }

    pub fn baskets(&self) -> Vec<BasktId> {
        let mut ids: Vec<BasktId> = self.funding.baskets().copied().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LedgerConfig;
    use crate::engine::{Ledger, LedgerError};
    use crate::price_feed::MockPriceFeed;
    use crate::types::{BasktId, Bps, Timestamp};

    fn ledger() -> Ledger {
        Ledger::new(LedgerConfig::default(), Box::new(MockPriceFeed::new()))
    }

    #[test]
    fn test_uninitialized_baskt() {
        let mut ledger = ledger();
        assert!(matches!(ledger.current_index(BasktId(1)), Err(LedgerError::BasktNotFound(_))));
        assert!(matches!(
            ledger.update_rate(BasktId(1), Bps::new(5)),
            Err(LedgerError::BasktNotFound(_))
        ));
    }

    #[test]
    fn test_initialize_twice() {
        let mut ledger = ledger();
        ledger.initialize_baskt(BasktId(1)).unwrap();
        assert!(matches!(
            ledger.initialize_baskt(BasktId(1)),
            Err(LedgerError::BasktAlreadyInitialized(_))
        ));
        assert_eq!(ledger.baskets(), vec![BasktId(1)]);
    }

    #[test]
    fn test_rate_update_is_identity_at_same_time() {
        let mut ledger = ledger();
        ledger.initialize_baskt(BasktId(1)).unwrap();
        ledger.update_rate(BasktId(1), Bps::new(25)).unwrap();
        ledger.set_time(Timestamp::from_secs(500));

        let before = ledger.current_index(BasktId(1)).unwrap();
        ledger.update_rate(BasktId(1), Bps::new(-40)).unwrap();
        assert_eq!(ledger.current_index(BasktId(1)).unwrap(), before);
        assert_eq!(before, 12_500);

        ledger.advance_time(100);
        assert_eq!(ledger.current_index(BasktId(1)).unwrap(), 12_500 - 4_000);
    }
}
