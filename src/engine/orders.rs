//! Order submission, fills and cancellation.

use super::core::Ledger;
use super::results::LedgerError;
use crate::events::{EventPayload, OrderCancelledEvent, OrderFilledEvent, OrderSubmittedEvent};
use crate::order::{required_collateral, Order, OrderAction, OrderRequest};
use crate::position::{Position, PositionStatus};
use crate::price_feed::PriceQuote;
use crate::types::{AccountId, OrderId, PositionId, Price};

impl Ledger {
    /// Validate and store a new order in Pending status.
    pub fn submit_order(&mut self, request: OrderRequest) -> Result<Order, LedgerError> {
        if request.size == 0 {
            return Err(LedgerError::InvalidSize { size: 0 });
        }
        if !self.funding.contains(request.baskt_id) {
            return Err(LedgerError::BasktNotFound(request.baskt_id));
        }

        match request.action {
            OrderAction::Open => {
                let price = self.oracle_price(request.baskt_id)?;
                let required = required_collateral(request.size, price, self.config.margin.initial_margin_bps)
                    .ok_or(LedgerError::MathOverflow)?;
                if request.collateral < required {
                    tracing::warn!(
                        owner = %request.owner,
                        provided = request.collateral,
                        required,
                        "order rejected: collateral below initial margin"
                    );
                    return Err(LedgerError::InvalidCollateral { provided: request.collateral, required });
                }
            }
            OrderAction::Close => self.validate_close_request(&request)?,
        }

        let order_id = self.next_order_id();
        let order = Order::from_request(order_id, &request, self.current_time);
        self.orders.insert(order.clone());

        tracing::info!(
            order_id = order_id.0,
            owner = %order.owner,
            baskt = %order.baskt_id,
            action = ?order.action,
            size = order.size,
            "order submitted"
        );
        self.emit_event(EventPayload::OrderSubmitted(OrderSubmittedEvent {
            order_id,
            owner: order.owner,
            baskt_id: order.baskt_id,
            side: order.side,
            size: order.size,
            collateral: order.collateral,
            target_position: order.target_position,
        }));

        Ok(order)
    }

    /// Submit a close order for the whole of an open position.
    pub fn submit_close_order(&mut self, owner: AccountId, position_id: PositionId) -> Result<Order, LedgerError> {
        let position = self
            .positions
            .get(position_id)
            .ok_or(LedgerError::PositionNotFound(position_id))?;
        let request = OrderRequest::close(owner, position.baskt_id, position.side, position.size, position_id);
        self.submit_order(request)
    }

    // a close must name an open position the submitter owns, same basket/side/size
    fn validate_close_request(&self, request: &OrderRequest) -> Result<(), LedgerError> {
        let Some(position_id) = request.target_position else {
            return Err(LedgerError::InvalidSize { size: request.size });
        };
        let position = self
            .positions
            .get(position_id)
            .ok_or(LedgerError::PositionNotFound(position_id))?;

        if position.owner != request.owner {
            return Err(LedgerError::Unauthorized { requester: request.owner });
        }
        if !position.is_open() {
            return Err(LedgerError::PositionNotOpen(position_id));
        }
        if position.baskt_id != request.baskt_id || position.side != request.side {
            return Err(LedgerError::CloseMismatch(position_id));
        }
        if position.size != request.size {
            return Err(LedgerError::InvalidSize { size: request.size });
        }
        if self.orders.has_pending_close(position_id) {
            return Err(LedgerError::ClosePending(position_id));
        }
        Ok(())
    }

    /// Fill a pending order at `entry_price` once the oracle quote checks out.
    /// Open orders create a position; close orders close their target.
    pub fn fill_order(
        &mut self,
        order_id: OrderId,
        entry_price: Price,
        oracle_quote: PriceQuote,
    ) -> Result<Position, LedgerError> {
        let order = self.pending_order(order_id)?;

        let oracle_price = oracle_quote
            .validate(
                self.current_time,
                self.config.oracle.max_price_age_secs,
                self.config.oracle.max_confidence_bps,
            )
            .map_err(|e| {
                tracing::warn!(order_id = order_id.0, error = %e, "fill rejected by oracle check");
                LedgerError::from(e)
            })?;

        let position = match order.action {
            OrderAction::Open => self.open_position(order_id, entry_price)?,
            OrderAction::Close => {
                let position_id = order
                    .target_position
                    .ok_or(LedgerError::InvalidSize { size: order.size })?;
                self.settle_exit(position_id, entry_price, PositionStatus::Closed)?;
                self.mark_order_filled(order_id, entry_price)?;
                self.positions
                    .get(position_id)
                    .cloned()
                    .ok_or(LedgerError::PositionNotFound(position_id))?
            }
        };

        self.emit_event(EventPayload::OrderFilled(OrderFilledEvent {
            order_id,
            position_id: position.id,
            fill_price: entry_price,
            oracle_price,
        }));

        Ok(position)
    }

    /// Fill at the feed's current price, used as both entry and oracle price.
    pub fn fill_order_at_oracle(&mut self, order_id: OrderId) -> Result<Position, LedgerError> {
        let baskt_id = self.pending_order(order_id)?.baskt_id;
        let quote = self
            .oracle
            .get_price(baskt_id)
            .ok_or(crate::price_feed::PriceFeedError::Unavailable(baskt_id))?;
        let price = quote.to_price()?;
        self.fill_order(order_id, price, quote)
    }

    /// Cancel a pending order. Only its owner may do so.
    pub fn cancel_order(&mut self, order_id: OrderId, requester: AccountId) -> Result<(), LedgerError> {
        let order = self
            .orders
            .get_mut(order_id)
            .ok_or(LedgerError::OrderNotFound(order_id))?;

        if order.owner != requester {
            return Err(LedgerError::Unauthorized { requester });
        }
        if !order.is_pending() {
            return Err(LedgerError::OrderNotPending { order_id, status: order.status });
        }

        order.mark_cancelled();
        let owner = order.owner;

        tracing::info!(order_id = order_id.0, owner = %owner, "order cancelled");
        self.emit_event(EventPayload::OrderCancelled(OrderCancelledEvent { order_id, owner }));
        Ok(())
    }

    pub fn get_order(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn orders_for(&self, owner: AccountId) -> Vec<&Order> {
        self.orders.orders_for(owner)
    }

    pub fn pending_orders(&self, baskt_id: crate::types::BasktId) -> Vec<&Order> {
        self.orders.pending_for_baskt(baskt_id)
    }

    pub(super) fn pending_order(&self, order_id: OrderId) -> Result<Order, LedgerError> {
        let order = self.orders.get(order_id).ok_or(LedgerError::OrderNotFound(order_id))?;
        if !order.is_pending() {
            return Err(LedgerError::OrderNotPending { order_id, status: order.status });
        }
        Ok(order.clone())
    }

    pub(super) fn mark_order_filled(&mut self, order_id: OrderId, price: Price) -> Result<(), LedgerError> {
        let now = self.current_time;
        let order = self.orders.get_mut(order_id).ok_or(LedgerError::OrderNotFound(order_id))?;
        order.mark_filled(price, now);
        Ok(())
    }
}
