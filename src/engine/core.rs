// 8.0 engine/core.rs: the ledger. holds orders, positions, funding indexes, the pool,
// its withdrawal queue, the fee journal and the audit log.

use super::results::LedgerError;
use crate::config::LedgerConfig;
use crate::events::{Event, EventCollector, EventEmitter, EventPayload};
use crate::funding::FundingIndexLedger;
use crate::journal::{FeeEventJournal, FeeEventType, FeeRecord, FeeSubject};
use crate::math::split_fee;
use crate::order::OrderBook;
use crate::pool::LiquidityPool;
use crate::position::PositionBook;
use crate::price_feed::PriceOracleFeed;
use crate::types::{AccountId, BasktId, OrderId, PositionId, Price, Timestamp, WithdrawalId};
use crate::withdrawal::WithdrawalQueue;
use serde::{Deserialize, Serialize};

/** 8.1: main ledger struct. all state lives here */
#[derive(Debug)]
pub struct Ledger {
    pub(super) config: LedgerConfig,
    pub(super) oracle: Box<dyn PriceOracleFeed + Send + Sync>,
    pub(super) orders: OrderBook,
    pub(super) positions: PositionBook,
    pub(super) funding: FundingIndexLedger,
    pub(super) pool: LiquidityPool,
    pub(super) queue: WithdrawalQueue,
    pub(super) journal: FeeEventJournal,
    pub(super) events: EventCollector,
    pub(super) next_order_id: u64,
    pub(super) next_position_id: u64,
    pub(super) next_withdrawal_id: u64,
    pub(super) current_time: Timestamp,
}

/// Everything but the oracle, for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub config: LedgerConfig,
    pub orders: OrderBook,
    pub positions: PositionBook,
    pub funding: FundingIndexLedger,
    pub pool: LiquidityPool,
    pub queue: WithdrawalQueue,
    pub journal: FeeEventJournal,
    pub events: EventCollector,
    pub next_order_id: u64,
    pub next_position_id: u64,
    pub next_withdrawal_id: u64,
    pub current_time: Timestamp,
}

impl Ledger {
    pub fn new(config: LedgerConfig, oracle: Box<dyn PriceOracleFeed + Send + Sync>) -> Self {
        let pool = LiquidityPool::new(config.pool.pool_id, config.pool.min_liquidity_buffer_bps);
        let events = EventCollector::new(config.max_events);
        Self {
            config,
            oracle,
            orders: OrderBook::new(),
            positions: PositionBook::new(),
            funding: FundingIndexLedger::new(),
            pool,
            queue: WithdrawalQueue::new(),
            journal: FeeEventJournal::new(),
            events,
            next_order_id: 1,
            next_position_id: 1,
            next_withdrawal_id: 1,
            current_time: Timestamp::from_secs(0),
        }
    }

    /// Like `new`, but rejects an inconsistent config.
    pub fn with_config(config: LedgerConfig, oracle: Box<dyn PriceOracleFeed + Send + Sync>) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self::new(config, oracle))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, secs: i64) {
        self.current_time = self.current_time.plus_secs(secs);
    }

    /// Current oracle price for a basket, checked against the oracle rules.
    pub fn oracle_price(&self, baskt_id: BasktId) -> Result<Price, LedgerError> {
        let quote = self
            .oracle
            .get_price(baskt_id)
            .ok_or(crate::price_feed::PriceFeedError::Unavailable(baskt_id))?;
        let price = quote.validate(
            self.current_time,
            self.config.oracle.max_price_age_secs,
            self.config.oracle.max_confidence_bps,
        )?;
        Ok(price)
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        self.events.recent(count)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            config: self.config.clone(),
            orders: self.orders.clone(),
            positions: self.positions.clone(),
            funding: self.funding.clone(),
            pool: self.pool.clone(),
            queue: self.queue.clone(),
            journal: self.journal.clone(),
            events: self.events.clone(),
            next_order_id: self.next_order_id,
            next_position_id: self.next_position_id,
            next_withdrawal_id: self.next_withdrawal_id,
            current_time: self.current_time,
        }
    }

    pub fn restore(snapshot: LedgerSnapshot, oracle: Box<dyn PriceOracleFeed + Send + Sync>) -> Result<Self, LedgerError> {
        snapshot.config.validate()?;
        tracing::info!(
            orders = snapshot.orders.order_count(),
            positions = snapshot.positions.len(),
            time = %snapshot.current_time,
            "ledger restored"
        );
        Ok(Self {
            config: snapshot.config,
            oracle,
            orders: snapshot.orders,
            positions: snapshot.positions,
            funding: snapshot.funding,
            pool: snapshot.pool,
            queue: snapshot.queue,
            journal: snapshot.journal,
            events: snapshot.events,
            next_order_id: snapshot.next_order_id,
            next_position_id: snapshot.next_position_id,
            next_withdrawal_id: snapshot.next_withdrawal_id,
            current_time: snapshot.current_time,
        })
    }

    pub(super) fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }

    pub(super) fn next_position_id(&mut self) -> PositionId {
        let id = PositionId(self.next_position_id);
        self.next_position_id += 1;
        id
    }

    pub(super) fn next_withdrawal_id(&mut self) -> WithdrawalId {
        let id = WithdrawalId(self.next_withdrawal_id);
        self.next_withdrawal_id += 1;
        id
    }

    // split by the configured treasury share and append to the journal
    pub(super) fn record_fee(
        &mut self,
        event_type: FeeEventType,
        owner: AccountId,
        fee: u64,
        subject: FeeSubject,
    ) -> Result<u64, LedgerError> {
        let (fee_to_treasury, fee_to_blp) =
            split_fee(fee, self.config.fees.treasury_share_bps).ok_or(LedgerError::MathOverflow)?;
        self.journal.record(FeeRecord {
            event_type,
            owner,
            fee_to_treasury,
            fee_to_blp,
            total_fee: fee,
            timestamp: self.current_time,
            subject,
        })
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(self.events.next_id(), self.current_time, payload);
        tracing::debug!(event_id = event.id.0, payload = ?event.payload, "event");
        self.events.emit(event);
    }
}
