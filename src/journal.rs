// 10.0 journal.rs: append-only fee journal. one FeeEvent per fee-generating action,
// never edited or removed. a correction is a new compensating event.
// 10.1 stats are plain integer sums over the stored events, so they match exactly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::LedgerError;
use crate::types::{AccountId, PoolId, PositionId, TimeRange, Timestamp, WithdrawalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeEventType {
    PositionOpened,
    PositionClosed,
    PositionLiquidated,
    LiquidityAdded,
    LiquidityRemoved,
}

impl FeeEventType {
    pub const ALL: [FeeEventType; 5] = [
        FeeEventType::PositionOpened,
        FeeEventType::PositionClosed,
        FeeEventType::PositionLiquidated,
        FeeEventType::LiquidityAdded,
        FeeEventType::LiquidityRemoved,
    ];
}

// what the fee was charged on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeSubject {
    Position(PositionId),
    Pool(PoolId),
    Withdrawal(WithdrawalId),
}

// input to record(). the journal assigns the id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRecord {
    pub event_type: FeeEventType,
    pub owner: AccountId,
    pub fee_to_treasury: u64,
    pub fee_to_blp: u64,
    pub total_fee: u64,
    pub timestamp: Timestamp,
    pub subject: FeeSubject,
}

impl FeeRecord {
    pub fn is_balanced(&self) -> bool {
        self.fee_to_treasury.checked_add(self.fee_to_blp) == Some(self.total_fee)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEvent {
    pub event_id: u64,
    pub event_type: FeeEventType,
    pub owner: AccountId,
    pub fee_to_treasury: u64,
    pub fee_to_blp: u64,
    pub total_fee: u64,
    pub timestamp: Timestamp,
    pub subject: FeeSubject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeStats {
    pub count: u64,
    pub total_fees: u64,
    pub total_fees_to_treasury: u64,
    pub total_fees_to_blp: u64,
}

impl FeeStats {
    fn add(&mut self, event: &FeeEvent) {
        self.count += 1;
        self.total_fees += event.total_fee;
        self.total_fees_to_treasury += event.fee_to_treasury;
        self.total_fees_to_blp += event.fee_to_blp;
    }
}

/// Running treasury / BLP totals across every recorded event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeVault {
    pub treasury: u64,
    pub blp: u64,
}

impl FeeVault {
    pub fn total(&self) -> u64 {
        self.treasury + self.blp
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeEventJournal {
    events: Vec<FeeEvent>,
    next_event_id: u64,
    vault: FeeVault,
}

impl Default for FeeEventJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl FeeEventJournal {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_event_id: 1,
            vault: FeeVault::default(),
        }
    }

    pub fn record(&mut self, record: FeeRecord) -> Result<u64, LedgerError> {
        if !record.is_balanced() {
            return Err(LedgerError::InvalidEvent {
                total_fee: record.total_fee,
                fee_to_treasury: record.fee_to_treasury,
                fee_to_blp: record.fee_to_blp,
            });
        }
        let treasury = self.vault.treasury.checked_add(record.fee_to_treasury).ok_or(LedgerError::MathOverflow)?;
        let blp = self.vault.blp.checked_add(record.fee_to_blp).ok_or(LedgerError::MathOverflow)?;

        let event_id = self.next_event_id;
        self.next_event_id += 1;
        self.vault = FeeVault { treasury, blp };
        self.events.push(FeeEvent {
            event_id,
            event_type: record.event_type,
            owner: record.owner,
            fee_to_treasury: record.fee_to_treasury,
            fee_to_blp: record.fee_to_blp,
            total_fee: record.total_fee,
            timestamp: record.timestamp,
            subject: record.subject,
        });
        Ok(event_id)
    }

    // 10.2: per type totals, optionally restricted to an inclusive time window
    pub fn stats_by_event_type(&self, range: Option<TimeRange>) -> BTreeMap<FeeEventType, FeeStats> {
        let mut stats = BTreeMap::new();
        for event in self.events.iter().filter(|e| range.map_or(true, |r| r.contains(e.timestamp))) {
            stats.entry(event.event_type).or_insert_with(FeeStats::default).add(event);
        }
        stats
    }

    pub fn events(&self) -> &[FeeEvent] {
        &self.events
    }

    pub fn events_for(&self, owner: AccountId) -> Vec<&FeeEvent> {
        self.events.iter().filter(|e| e.owner == owner).collect()
    }

    pub fn get(&self, event_id: u64) -> Option<&FeeEvent> {
        // ids are dense and start at 1
        let index = usize::try_from(event_id.checked_sub(1)?).ok()?;
        self.events.get(index)
    }

    pub fn vault(&self) -> FeeVault {
        self.vault
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(event_type: FeeEventType, treasury: u64, blp: u64, at: i64) -> FeeRecord {
        FeeRecord {
            event_type,
            owner: AccountId(1),
            fee_to_treasury: treasury,
            fee_to_blp: blp,
            total_fee: treasury + blp,
            timestamp: Timestamp::from_secs(at),
            subject: FeeSubject::Pool(PoolId(1)),
        }
    }

    #[test]
    fn record_assigns_sequential_ids() {
        let mut journal = FeeEventJournal::new();
        assert_eq!(journal.record(record(FeeEventType::LiquidityAdded, 3, 7, 0)).unwrap(), 1);
        assert_eq!(journal.record(record(FeeEventType::LiquidityAdded, 0, 0, 1)).unwrap(), 2);
        assert_eq!(journal.get(2).unwrap().timestamp, Timestamp::from_secs(1));
        assert!(journal.get(0).is_none());
        assert!(journal.get(3).is_none());
    }

    #[test]
    fn unbalanced_record_rejected() {
        let mut journal = FeeEventJournal::new();
        let mut bad = record(FeeEventType::PositionClosed, 3, 7, 0);
        bad.total_fee = 11;

        assert!(matches!(journal.record(bad), Err(LedgerError::InvalidEvent { total_fee: 11, .. })));
        assert!(journal.is_empty());
        assert_eq!(journal.vault(), FeeVault::default());
    }

    #[test]
    fn stats_sum_exactly() {
        let mut journal = FeeEventJournal::new();
        journal.record(record(FeeEventType::PositionOpened, 1, 2, 10)).unwrap();
        journal.record(record(FeeEventType::PositionOpened, 4, 5, 20)).unwrap();
        journal.record(record(FeeEventType::LiquidityRemoved, 900, 2_100, 30)).unwrap();

        let stats = journal.stats_by_event_type(None);
        assert_eq!(
            stats[&FeeEventType::PositionOpened],
            FeeStats { count: 2, total_fees: 12, total_fees_to_treasury: 5, total_fees_to_blp: 7 }
        );
        assert_eq!(stats[&FeeEventType::LiquidityRemoved].total_fees, 3_000);
        assert!(!stats.contains_key(&FeeEventType::PositionClosed));

        let vault = journal.vault();
        assert_eq!(vault.treasury, 905);
        assert_eq!(vault.total(), 3_012);
    }

    #[test]
    fn stats_respect_range() {
        let mut journal = FeeEventJournal::new();
        journal.record(record(FeeEventType::PositionClosed, 1, 1, 10)).unwrap();
        journal.record(record(FeeEventType::PositionClosed, 1, 1, 20)).unwrap();
        journal.record(record(FeeEventType::PositionClosed, 1, 1, 30)).unwrap();

        let range = TimeRange::new(Timestamp::from_secs(15), Timestamp::from_secs(30));
        let stats = journal.stats_by_event_type(Some(range));
        assert_eq!(stats[&FeeEventType::PositionClosed].count, 2);
    }

    #[test]
    fn event_type_wire_names() {
        let json = serde_json::to_string(&FeeEventType::PositionLiquidated).unwrap();
        assert_eq!(json, "\"POSITION_LIQUIDATED\"");
    }
}
