// 11.0: every ledger state change produces an event. used for audit trails and for
// notifying external systems. fee accounting lives in the journal, not here.
// the EventPayload enum lists all event types.

use crate::types::{AccountId, BasktId, Bps, OrderId, PoolId, PositionId, Price, Side, Timestamp, WithdrawalId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Order events
    OrderSubmitted(OrderSubmittedEvent),
    OrderFilled(OrderFilledEvent),
    OrderCancelled(OrderCancelledEvent),

    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionClosedEvent),
    FundingSettled(FundingSettledEvent),

    // Funding index events
    BasktInitialized(BasktInitializedEvent),
    FundingRateUpdated(FundingRateUpdatedEvent),

    // Pool events
    PoolInitialized(PoolInitializedEvent),
    PoolConfigured(PoolConfiguredEvent),
    LiquidityDeposited(LiquidityDepositedEvent),

    // Withdrawal queue events
    WithdrawalQueued(WithdrawalQueuedEvent),
    WithdrawalProcessed(WithdrawalProcessedEvent),
    WithdrawalDeferred(WithdrawalDeferredEvent),
    WithdrawalCancelled(WithdrawalCancelledEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSubmittedEvent {
    pub order_id: OrderId,
    pub owner: AccountId,
    pub baskt_id: BasktId,
    pub side: Side,
    pub size: u64,
    pub collateral: u64,
    pub target_position: Option<PositionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFilledEvent {
    pub order_id: OrderId,
    pub position_id: PositionId,
    pub fill_price: Price,
    pub oracle_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order_id: OrderId,
    pub owner: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub position_id: PositionId,
    pub owner: AccountId,
    pub baskt_id: BasktId,
    pub side: Side,
    pub size: u64,
    pub collateral: u64,
    pub entry_price: Price,
    pub entry_funding_index: i128,
    pub fee: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub position_id: PositionId,
    pub owner: AccountId,
    pub exit_price: Price,
    pub realized_pnl: i64,
    pub fee: u64,
    pub collateral_returned: u64,
    pub close_reason: CloseReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    UserClosed,
    Liquidation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingSettledEvent {
    pub position_id: PositionId,
    pub baskt_id: BasktId,
    // positive = paid by the position
    pub payment: i64,
    pub funding_index: i128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasktInitializedEvent {
    pub baskt_id: BasktId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingRateUpdatedEvent {
    pub baskt_id: BasktId,
    pub old_rate: Bps,
    pub new_rate: Bps,
    pub cumulative_index: i128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolInitializedEvent {
    pub pool_id: PoolId,
    pub deposit_fee_bps: Bps,
    pub withdrawal_fee_bps: Bps,
    pub min_deposit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfiguredEvent {
    pub pool_id: PoolId,
    pub deposit_fee_bps: Bps,
    pub withdrawal_fee_bps: Bps,
    pub min_deposit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityDepositedEvent {
    pub provider: AccountId,
    pub amount: u64,
    pub fee: u64,
    pub shares_issued: u64,
    pub total_liquidity: u64,
    pub total_shares: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalQueuedEvent {
    pub withdrawal_id: WithdrawalId,
    pub provider: AccountId,
    pub lp_amount: u64,
    pub queue_position: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalProcessedEvent {
    pub withdrawal_id: WithdrawalId,
    pub provider: AccountId,
    pub lp_amount: u64,
    pub net_amount: u64,
    pub fee: u64,
    pub total_liquidity: u64,
    pub total_shares: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalDeferredEvent {
    pub withdrawal_id: WithdrawalId,
    pub requested: u64,
    pub available: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalCancelledEvent {
    pub withdrawal_id: WithdrawalId,
    pub provider: AccountId,
    pub lp_amount: u64,
}

pub trait EventEmitter {
    fn emit(&mut self, event: Event);
}

/// Bounded in-memory event log. Oldest events fall off once `max_events` is hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCollector {
    events: Vec<Event>,
    next_id: u64,
    max_events: usize,
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl EventCollector {
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            max_events,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl EventEmitter for EventCollector {
    fn emit(&mut self, event: Event) {
        self.events.push(event);

        if self.events.len() > self.max_events {
            let drain_count = self.events.len() - self.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cancelled(order: u64) -> EventPayload {
        EventPayload::OrderCancelled(OrderCancelledEvent {
            order_id: OrderId(order),
            owner: AccountId(1),
        })
    }

    #[test]
    fn event_collector() {
        let mut collector = EventCollector::new(10);

        let event = Event::new(collector.next_id(), Timestamp::from_secs(1), cancelled(1));
        collector.emit(event);
        assert_eq!(collector.events().len(), 1);
        assert_eq!(collector.events()[0].id, EventId(1));

        collector.clear();
        assert!(collector.events().is_empty());
    }

    #[test]
    fn retention_drops_oldest() {
        let mut collector = EventCollector::new(2);
        for order in 1..=3 {
            let id = collector.next_id();
            collector.emit(Event::new(id, Timestamp::from_secs(order as i64), cancelled(order)));
        }

        let ids: Vec<u64> = collector.events().iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(collector.recent(1)[0].id, EventId(3));
    }

    #[test]
    fn payload_serializes() {
        let payload = EventPayload::WithdrawalDeferred(WithdrawalDeferredEvent {
            withdrawal_id: WithdrawalId(4),
            requested: 997_000,
            available: 10,
        });
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("WithdrawalDeferred"));
    }
}
