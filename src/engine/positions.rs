//! Position lifecycle: open on fill, funding checkpoints, close and liquidation.

use super::core::Ledger;
use super::results::{CloseResult, LedgerError, LiquidationResult};
use crate::events::{
    CloseReason, EventPayload, FundingSettledEvent, OrderCancelledEvent, PositionClosedEvent, PositionOpenedEvent,
};
use crate::journal::{FeeEventType, FeeSubject};
use crate::margin::{evaluate_health, MarginHealth};
use crate::math::mul_bps;
use crate::order::OrderAction;
use crate::position::{collateral_payout, Position, PositionStatus};
use crate::types::{AccountId, BasktId, OrderId, PositionId, Price};

impl Ledger {
    /// Turn a pending open order into a position at `entry_price`. The opening fee
    /// comes out of the order's collateral.
    pub fn open_position(&mut self, order_id: OrderId, entry_price: Price) -> Result<Position, LedgerError> {
        let order = self.pending_order(order_id)?;
        if order.action != OrderAction::Open {
            return Err(LedgerError::WrongOrderAction(order_id));
        }

        let funding_index = self.current_index(order.baskt_id)?;
        let notional = entry_price.notional(order.size).ok_or(LedgerError::MathOverflow)?;
        let fee = mul_bps(notional, self.config.fees.opening_fee_bps).ok_or(LedgerError::MathOverflow)?;
        if fee > order.collateral {
            return Err(LedgerError::InvalidCollateral { provided: order.collateral, required: fee });
        }

        let position_id = self.next_position_id();
        let position = Position::new(
            position_id,
            order.owner,
            order.baskt_id,
            order.side,
            order.size,
            order.collateral - fee,
            entry_price,
            funding_index,
            order_id,
            self.current_time,
        );
        self.positions.insert(position.clone());
        self.mark_order_filled(order_id, entry_price)?;
        self.record_fee(FeeEventType::PositionOpened, order.owner, fee, FeeSubject::Position(position_id))?;

        tracing::info!(
            position_id = position_id.0,
            owner = %order.owner,
            baskt = %order.baskt_id,
            side = ?order.side,
            size = order.size,
            entry = %entry_price,
            fee,
            "position opened"
        );
        self.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
            position_id,
            owner: position.owner,
            baskt_id: position.baskt_id,
            side: position.side,
            size: position.size,
            collateral: position.collateral,
            entry_price,
            entry_funding_index: funding_index,
            fee,
        }));

        Ok(position)
    }

    /// Close an open position at `exit_price`, settling funding first.
    /// Any close order still pending against the position is cancelled.
    pub fn close_position(&mut self, position_id: PositionId, exit_price: Price) -> Result<CloseResult, LedgerError> {
        let result = self.settle_exit(position_id, exit_price, PositionStatus::Closed)?;
        self.cancel_stranded_closes(position_id);
        Ok(result)
    }

    /// Liquidate a position whose equity has fallen below maintenance margin.
    pub fn liquidate_position(
        &mut self,
        position_id: PositionId,
        liquidation_price: Price,
    ) -> Result<LiquidationResult, LedgerError> {
        let health = self.margin_health(position_id, liquidation_price)?;
        let MarginHealth::Insufficient { equity, maintenance, shortfall } = health else {
            return Err(LedgerError::PositionHealthy(position_id));
        };

        tracing::warn!(
            position_id = position_id.0,
            equity,
            maintenance,
            shortfall,
            price = %liquidation_price,
            "liquidating position"
        );
        let close = self.settle_exit(position_id, liquidation_price, PositionStatus::Liquidated)?;
        self.cancel_stranded_closes(position_id);

        Ok(LiquidationResult {
            position_id,
            pnl: close.pnl,
            fee_paid: close.fee_paid,
            collateral_returned: close.collateral_returned,
            equity,
            maintenance,
        })
    }

    /// Checkpoint funding on an open position without closing it.
    pub fn settle_funding(&mut self, position_id: PositionId) -> Result<i64, LedgerError> {
        let baskt_id = self.open_position_ref(position_id)?.baskt_id;
        let index = self.current_index(baskt_id)?;

        let position = self
            .positions
            .get_mut(position_id)
            .ok_or(LedgerError::PositionNotFound(position_id))?;
        let payment = position
            .settle_funding(index, &self.config.funding)
            .ok_or(LedgerError::MathOverflow)?;

        tracing::debug!(position_id = position_id.0, payment, index, "funding settled");
        self.emit_event(EventPayload::FundingSettled(FundingSettledEvent {
            position_id,
            baskt_id,
            payment,
            funding_index: index,
        }));
        Ok(payment)
    }

    pub fn margin_health(&self, position_id: PositionId, mark_price: Price) -> Result<MarginHealth, LedgerError> {
        let position = self.open_position_ref(position_id)?;
        let index = self.current_index(position.baskt_id)?;
        evaluate_health(position, mark_price, index, &self.config.margin, &self.config.funding)
            .ok_or(LedgerError::MathOverflow)
    }

    pub fn is_liquidatable(&self, position_id: PositionId, mark_price: Price) -> Result<bool, LedgerError> {
        Ok(self.margin_health(position_id, mark_price)?.is_insufficient())
    }

    pub fn get_position(&self, position_id: PositionId) -> Option<&Position> {
        self.positions.get(position_id)
    }

    pub fn positions_for(&self, owner: AccountId) -> Vec<&Position> {
        self.positions.positions_for(owner)
    }

    pub fn open_positions(&self, baskt_id: BasktId) -> Vec<&Position> {
        self.positions.open_for_baskt(baskt_id)
    }

    /// (long, short) open size on a basket
    pub fn open_interest(&self, baskt_id: BasktId) -> (u64, u64) {
        self.positions.open_interest(baskt_id)
    }

    fn open_position_ref(&self, position_id: PositionId) -> Result<&Position, LedgerError> {
        let position = self
            .positions
            .get(position_id)
            .ok_or(LedgerError::PositionNotFound(position_id))?;
        if !position.is_open() {
            return Err(LedgerError::PositionNotOpen(position_id));
        }
        Ok(position)
    }

    // a close order can't fill once its target is gone
    pub(super) fn cancel_stranded_closes(&mut self, position_id: PositionId) {
        for order_id in self.orders.pending_closes_for(position_id) {
            let Some(order) = self.orders.get_mut(order_id) else { continue };
            order.mark_cancelled();
            let owner = order.owner;

            tracing::info!(order_id = order_id.0, position_id = position_id.0, "close order cancelled, position gone");
            self.emit_event(EventPayload::OrderCancelled(OrderCancelledEvent { order_id, owner }));
        }
    }

    // shared by close and liquidation. everything is computed on a copy first so a
    // failure leaves the stored position untouched
    pub(super) fn settle_exit(
        &mut self,
        position_id: PositionId,
        exit_price: Price,
        status: PositionStatus,
    ) -> Result<CloseResult, LedgerError> {
        let mut position = self.open_position_ref(position_id)?.clone();
        let index = self.current_index(position.baskt_id)?;

        let funding_settled = position
            .settle_funding(index, &self.config.funding)
            .ok_or(LedgerError::MathOverflow)?;
        let pnl = position.realized_pnl_at(exit_price).ok_or(LedgerError::MathOverflow)?;

        let (fee_bps, event_type, reason) = match status {
            PositionStatus::Liquidated => (
                self.config.fees.liquidation_fee_bps,
                FeeEventType::PositionLiquidated,
                CloseReason::Liquidation,
            ),
            _ => (self.config.fees.closing_fee_bps, FeeEventType::PositionClosed, CloseReason::UserClosed),
        };
        let notional = position.notional(exit_price).ok_or(LedgerError::MathOverflow)?;
        let fee = mul_bps(notional, fee_bps).ok_or(LedgerError::MathOverflow)?;

        // the fee can't take more than the position has left
        let remaining = collateral_payout(position.collateral, pnl, 0);
        let fee_paid = fee.min(remaining);
        let collateral_returned = remaining - fee_paid;

        position.mark_closed(status, exit_price, pnl, self.current_time);
        let owner = position.owner;
        let baskt_id = position.baskt_id;
        if let Some(stored) = self.positions.get_mut(position_id) {
            *stored = position;
        }

        self.record_fee(event_type, owner, fee_paid, FeeSubject::Position(position_id))?;

        if funding_settled != 0 {
            self.emit_event(EventPayload::FundingSettled(FundingSettledEvent {
                position_id,
                baskt_id,
                payment: funding_settled,
                funding_index: index,
            }));
        }
        tracing::info!(
            position_id = position_id.0,
            owner = %owner,
            status = ?status,
            exit = %exit_price,
            pnl,
            fee = fee_paid,
            returned = collateral_returned,
            "position closed"
        );
        self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
            position_id,
            owner,
            exit_price,
            realized_pnl: pnl,
            fee: fee_paid,
            collateral_returned,
            close_reason: reason,
        }));

        Ok(CloseResult {
            position_id,
            pnl,
            fee_paid,
            funding_settled,
            collateral_returned,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LedgerConfig;
    use crate::engine::{Ledger, LedgerError};
    use crate::events::{EventPayload, OrderCancelledEvent};
    use crate::journal::FeeEventType;
    use crate::order::{OrderRequest, OrderStatus};
    use crate::position::PositionStatus;
    use crate::price_feed::MockPriceFeed;
    use crate::types::{AccountId, BasktId, Bps, PositionId, Price, Side, Timestamp};
    use rust_decimal_macros::dec;

    fn ledger_with(config: LedgerConfig) -> Ledger {
        let feed = MockPriceFeed::new();
        feed.set_price(BasktId(1), 50, Timestamp::from_secs(0));
        let mut ledger = Ledger::new(config, Box::new(feed));
        ledger.initialize_baskt(BasktId(1)).unwrap();
        ledger
    }

    fn open_long(ledger: &mut Ledger, collateral: u64) -> PositionId {
        let order = ledger
            .submit_order(OrderRequest::open(AccountId(1), BasktId(1), Side::Long, 100, collateral))
            .unwrap();
        ledger.open_position(order.id, Price::from_int(50).unwrap()).unwrap().id
    }

    fn no_fees() -> LedgerConfig {
        let mut config = LedgerConfig::default();
        config.fees.opening_fee_bps = Bps::new(0);
        config.fees.closing_fee_bps = Bps::new(0);
        config
    }

    #[test]
    fn test_open_takes_fee_from_collateral() {
        let mut ledger = ledger_with(LedgerConfig::default());
        let id = open_long(&mut ledger, 10_000);

        // 5000 notional at 10 bps
        let position = ledger.get_position(id).unwrap();
        assert_eq!(position.collateral, 9_995);
        assert_eq!(position.entry_funding_index, 0);
        assert_eq!(ledger.get_order(position.opened_by).unwrap().status, OrderStatus::Filled);

        let stats = ledger.fee_stats(None);
        assert_eq!(stats[&FeeEventType::PositionOpened].total_fees, 5);
    }

    #[test]
    fn test_close_pnl_without_funding() {
        let mut ledger = ledger_with(no_fees());
        let id = open_long(&mut ledger, 10_000);

        let result = ledger.close_position(id, Price::from_int(55).unwrap()).unwrap();
        assert_eq!(result.pnl, 500);
        assert_eq!(result.fee_paid, 0);
        assert_eq!(result.collateral_returned, 10_500);

        let position = ledger.get_position(id).unwrap();
        assert_eq!(position.status, PositionStatus::Closed);
        assert_eq!(position.realized_pnl, Some(500));
    }

    #[test]
    fn test_close_twice_fails() {
        let mut ledger = ledger_with(no_fees());
        let id = open_long(&mut ledger, 10_000);
        ledger.close_position(id, Price::from_int(55).unwrap()).unwrap();

        assert!(matches!(
            ledger.close_position(id, Price::from_int(55).unwrap()),
            Err(LedgerError::PositionNotOpen(_))
        ));
    }

    #[test]
    fn test_funding_reduces_long_pnl() {
        let mut config = no_fees();
        config.funding.payment_divisor = 1_000;
        let mut ledger = ledger_with(config);
        let id = open_long(&mut ledger, 10_000);

        ledger.update_rate(BasktId(1), Bps::new(10)).unwrap();
        ledger.advance_time(60);

        // index 600, 100 * 600 / 1000 = 60 owed
        assert_eq!(ledger.settle_funding(id).unwrap(), 60);
        ledger.advance_time(40);

        let result = ledger.close_position(id, Price::from_int(55).unwrap()).unwrap();
        assert_eq!(result.funding_settled, 40);
        assert_eq!(result.pnl, 500 - 100);
        assert_eq!(ledger.get_position(id).unwrap().funding_accumulated, 100);
    }

    #[test]
    fn test_healthy_position_not_liquidated() {
        let mut ledger = ledger_with(no_fees());
        let id = open_long(&mut ledger, 10_000);

        let price = Price::new(dec!(49)).unwrap();
        assert!(!ledger.is_liquidatable(id, price).unwrap());
        assert!(matches!(ledger.liquidate_position(id, price), Err(LedgerError::PositionHealthy(_))));
        assert!(ledger.get_position(id).unwrap().is_open());
    }

    #[test]
    fn test_liquidation_below_maintenance() {
        let mut ledger = ledger_with(no_fees());
        let id = open_long(&mut ledger, 500);

        // equity 500 - 300 = 200 < 4700 * 5%
        let price = Price::from_int(47).unwrap();
        assert!(ledger.is_liquidatable(id, price).unwrap());

        let result = ledger.liquidate_position(id, price).unwrap();
        assert_eq!(result.pnl, -300);
        assert_eq!(result.equity, 200);
        assert_eq!(result.maintenance, 235);
        // 1% of 4700
        assert_eq!(result.fee_paid, 47);
        assert_eq!(result.collateral_returned, 153);

        assert_eq!(ledger.get_position(id).unwrap().status, PositionStatus::Liquidated);
        assert!(ledger.fee_stats(None).contains_key(&FeeEventType::PositionLiquidated));
    }

    #[test]
    fn test_liquidation_cancels_pending_close() {
        let mut ledger = ledger_with(no_fees());
        let id = open_long(&mut ledger, 500);
        let close = ledger.submit_close_order(AccountId(1), id).unwrap();

        ledger.liquidate_position(id, Price::from_int(47).unwrap()).unwrap();

        assert_eq!(ledger.get_order(close.id).unwrap().status, OrderStatus::Cancelled);
        assert!(ledger.pending_orders(BasktId(1)).is_empty());
        assert!(matches!(
            ledger.recent_events(1)[0].payload,
            EventPayload::OrderCancelled(OrderCancelledEvent { order_id, .. }) if order_id == close.id
        ));
        assert!(matches!(
            ledger.fill_order_at_oracle(close.id),
            Err(LedgerError::OrderNotPending { status: OrderStatus::Cancelled, .. })
        ));
    }

    #[test]
    fn test_direct_close_cancels_pending_close() {
        let mut ledger = ledger_with(no_fees());
        let id = open_long(&mut ledger, 10_000);
        let close = ledger.submit_close_order(AccountId(1), id).unwrap();

        ledger.close_position(id, Price::from_int(55).unwrap()).unwrap();
        assert_eq!(ledger.get_order(close.id).unwrap().status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_open_rejects_fee_above_collateral() {
        let mut config = LedgerConfig::default();
        config.fees.opening_fee_bps = Bps::new(1_000);
        config.margin.initial_margin_bps = Bps::new(500);
        config.margin.maintenance_margin_bps = Bps::new(100);
        let mut ledger = ledger_with(config);

        let order = ledger
            .submit_order(OrderRequest::open(AccountId(1), BasktId(1), Side::Long, 100, 300))
            .unwrap();
        assert!(matches!(
            ledger.open_position(order.id, Price::from_int(50).unwrap()),
            Err(LedgerError::InvalidCollateral { provided: 300, required: 500 })
        ));
        assert!(ledger.get_order(order.id).unwrap().is_pending());
    }
}
