// 5.0: funding index. one cumulative accumulator per basket, advanced by a signed bps rate.
// reads fold elapsed time lazily; only an explicit rate update persists the fold.
// 5.1 has the per-position settlement math at the bottom.

use crate::config::FundingConfig;
use crate::math::mul_div_signed;
use crate::types::{BasktId, Bps, Side, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingIndex {
    pub baskt_id: BasktId,
    pub cumulative_index: i128,
    pub current_rate: Bps,
    pub last_update: Timestamp,
}

impl FundingIndex {
    pub fn new(baskt_id: BasktId, timestamp: Timestamp) -> Self {
        Self {
            baskt_id,
            cumulative_index: 0,
            current_rate: Bps::new(0),
            last_update: timestamp,
        }
    }

    /// Index at `now` without mutating anything.
    pub fn index_at(&self, now: Timestamp, index_scale: i64) -> Option<i128> {
        let accrued = accrued_index(self.current_rate, self.last_update.seconds_until(now), index_scale)?;
        self.cumulative_index.checked_add(accrued)
    }

    /// Fold accrual at the current rate into the stored index, then switch rates.
    /// Accrual up to `now` is locked in at the old rate, so a new rate never backdates.
    pub fn update_rate(&mut self, new_rate: Bps, now: Timestamp, index_scale: i64) -> Option<()> {
        let folded = self.index_at(now, index_scale)?;
        self.cumulative_index = folded;
        self.current_rate = new_rate;
        // a clock that moved backwards keeps the later checkpoint
        self.last_update = self.last_update.max(now);
        Some(())
    }
}

// 5.0.1: rate * elapsed / scale, truncated toward zero
pub fn accrued_index(rate: Bps, elapsed_secs: i64, index_scale: i64) -> Option<i128> {
    mul_div_signed(rate.value() as i128, elapsed_secs as i128, index_scale as i128)
}

/// All basket indexes. Baskets must be initialized before they can accrue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundingIndexLedger {
    indexes: HashMap<BasktId, FundingIndex>,
}

impl FundingIndexLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, baskt_id: BasktId) -> bool {
        self.indexes.contains_key(&baskt_id)
    }

    /// Seeds a zero index at zero rate. Returns false if the basket already has one.
    pub fn initialize(&mut self, baskt_id: BasktId, now: Timestamp) -> bool {
        if self.indexes.contains_key(&baskt_id) {
            return false;
        }
        self.indexes.insert(baskt_id, FundingIndex::new(baskt_id, now));
        true
    }

    pub fn get(&self, baskt_id: BasktId) -> Option<&FundingIndex> {
        self.indexes.get(&baskt_id)
    }

    pub fn get_mut(&mut self, baskt_id: BasktId) -> Option<&mut FundingIndex> {
        self.indexes.get_mut(&baskt_id)
    }

    pub fn baskets(&self) -> impl Iterator<Item = &BasktId> {
        self.indexes.keys()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

// 5.1: what a position owes for an index move. positive = position pays.
// longs pay when the index rises, shorts receive.
pub fn funding_owed(
    side: Side,
    size: u64,
    from_index: i128,
    to_index: i128,
    config: &FundingConfig,
) -> Option<i64> {
    let delta = to_index.checked_sub(from_index)?;
    let signed_size = (size as i128).checked_mul(side.sign() as i128)?;
    let owed = mul_div_signed(signed_size, delta, config.payment_divisor as i128)?;
    i64::try_from(owed).ok()
}

/// A year of funding at `rate`, as bps of position size. Reporting only.
pub fn annualized_rate_bps(rate: Bps, config: &FundingConfig) -> Option<i128> {
    const SECONDS_PER_YEAR: i128 = 365 * 24 * 3_600;
    let per_year = (rate.value() as i128).checked_mul(SECONDS_PER_YEAR)?;
    let divisor = (config.index_scale as i128).checked_mul(config.payment_divisor as i128)?;
    mul_div_signed(per_year, 10_000, divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FundingConfig {
        FundingConfig::default()
    }

    #[test]
    fn index_accrues_lazily() {
        let mut index = FundingIndex::new(BasktId(1), Timestamp::from_secs(0));
        index.update_rate(Bps::new(10), Timestamp::from_secs(0), 1).unwrap();

        assert_eq!(index.index_at(Timestamp::from_secs(100), 1), Some(1_000));
        // reading did not persist anything
        assert_eq!(index.cumulative_index, 0);
    }

    #[test]
    fn index_scale_divides_accrual() {
        let mut index = FundingIndex::new(BasktId(1), Timestamp::from_secs(0));
        index.update_rate(Bps::new(10), Timestamp::from_secs(0), 60).unwrap();

        // 10 * 90 / 60 = 15
        assert_eq!(index.index_at(Timestamp::from_secs(90), 60), Some(15));
    }

    #[test]
    fn rate_update_folds_old_rate() {
        let mut index = FundingIndex::new(BasktId(1), Timestamp::from_secs(0));
        index.update_rate(Bps::new(10), Timestamp::from_secs(0), 1).unwrap();
        index.update_rate(Bps::new(-5), Timestamp::from_secs(100), 1).unwrap();

        assert_eq!(index.cumulative_index, 1_000);
        assert_eq!(index.last_update, Timestamp::from_secs(100));
        // 1000 - 5 * 50
        assert_eq!(index.index_at(Timestamp::from_secs(150), 1), Some(750));
    }

    #[test]
    fn update_then_read_same_time_is_identity() {
        let mut index = FundingIndex::new(BasktId(1), Timestamp::from_secs(0));
        index.update_rate(Bps::new(7), Timestamp::from_secs(0), 1).unwrap();

        let before = index.index_at(Timestamp::from_secs(40), 1).unwrap();
        index.update_rate(Bps::new(99), Timestamp::from_secs(40), 1).unwrap();
        assert_eq!(index.index_at(Timestamp::from_secs(40), 1).unwrap(), before);
    }

    #[test]
    fn ledger_initialize_once() {
        let mut ledger = FundingIndexLedger::new();
        assert!(ledger.initialize(BasktId(1), Timestamp::from_secs(0)));
        assert!(!ledger.initialize(BasktId(1), Timestamp::from_secs(5)));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(BasktId(1)).unwrap().cumulative_index, 0);
    }

    #[test]
    fn long_pays_short_receives() {
        // 100 bps held for one hour on size 1_000_000 = 1% of size
        let delta = 100 * 3_600;
        let long = funding_owed(Side::Long, 1_000_000, 0, delta, &config()).unwrap();
        let short = funding_owed(Side::Short, 1_000_000, 0, delta, &config()).unwrap();

        assert_eq!(long, 10_000);
        assert_eq!(short, -10_000);
    }

    #[test]
    fn no_index_move_no_funding() {
        assert_eq!(funding_owed(Side::Long, 100, 42, 42, &config()), Some(0));
    }

    #[test]
    fn annualized_reporting() {
        // 1 bps held for a year: 31_536_000 index units / 36_000_000 * 10_000
        assert_eq!(annualized_rate_bps(Bps::new(1), &config()), Some(8_760));
    }
}
