//! Order intents and the order book.
//!
//! An order is an owner's request to open or close exposure on a basket. It sits
//! `Pending` until a matcher fills it at an entry price, or until the owner
//! cancels it. `Filled` and `Cancelled` are terminal.

use crate::math::mul_bps;
use crate::types::{AccountId, BasktId, Bps, OrderId, PositionId, Price, Side, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// What the order does when filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    /// Create a new position.
    Open,
    /// Close an existing position.
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// What a caller submits. The ledger assigns id, status and timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub owner: AccountId,
    pub baskt_id: BasktId,
    pub side: Side,
    pub action: OrderAction,
    pub size: u64,
    pub collateral: u64,
    pub target_position: Option<PositionId>,
}

impl OrderRequest {
    pub fn open(owner: AccountId, baskt_id: BasktId, side: Side, size: u64, collateral: u64) -> Self {
        Self {
            owner,
            baskt_id,
            side,
            action: OrderAction::Open,
            size,
            collateral,
            target_position: None,
        }
    }

    pub fn close(owner: AccountId, baskt_id: BasktId, side: Side, size: u64, target: PositionId) -> Self {
        Self {
            owner,
            baskt_id,
            side,
            action: OrderAction::Close,
            size,
            collateral: 0,
            target_position: Some(target),
        }
    }
}

/// A basket order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner: AccountId,
    pub baskt_id: BasktId,
    pub side: Side,
    pub action: OrderAction,
    pub size: u64,
    pub collateral: u64,
    /// Set for Close orders only
    pub target_position: Option<PositionId>,
    pub status: OrderStatus,
    pub created_at: Timestamp,
    pub filled_at: Option<Timestamp>,
    pub fill_price: Option<Price>,
}

impl Order {
    pub fn new_open(
        id: OrderId,
        owner: AccountId,
        baskt_id: BasktId,
        side: Side,
        size: u64,
        collateral: u64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            owner,
            baskt_id,
            side,
            action: OrderAction::Open,
            size,
            collateral,
            target_position: None,
            status: OrderStatus::Pending,
            created_at: timestamp,
            filled_at: None,
            fill_price: None,
        }
    }

    pub fn new_close(
        id: OrderId,
        owner: AccountId,
        baskt_id: BasktId,
        side: Side,
        size: u64,
        target: PositionId,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            owner,
            baskt_id,
            side,
            action: OrderAction::Close,
            size,
            collateral: 0,
            target_position: Some(target),
            status: OrderStatus::Pending,
            created_at: timestamp,
            filled_at: None,
            fill_price: None,
        }
    }

    pub fn from_request(id: OrderId, request: &OrderRequest, timestamp: Timestamp) -> Self {
        match (request.action, request.target_position) {
            (OrderAction::Close, Some(target)) => Self::new_close(
                id,
                request.owner,
                request.baskt_id,
                request.side,
                request.size,
                target,
                timestamp,
            ),
            _ => Self::new_open(
                id,
                request.owner,
                request.baskt_id,
                request.side,
                request.size,
                request.collateral,
                timestamp,
            ),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    pub fn is_long(&self) -> bool {
        self.side.is_long()
    }

    pub fn mark_filled(&mut self, price: Price, timestamp: Timestamp) {
        debug_assert!(self.is_pending(), "only pending orders fill");
        self.status = OrderStatus::Filled;
        self.fill_price = Some(price);
        self.filled_at = Some(timestamp);
    }

    pub fn mark_cancelled(&mut self) {
        debug_assert!(self.is_pending(), "only pending orders cancel");
        self.status = OrderStatus::Cancelled;
    }
}

/// Collateral needed to open `size` at `price`: notional * initial margin.
pub fn required_collateral(size: u64, price: Price, initial_margin: Bps) -> Option<u64> {
    let notional = price.notional(size)?;
    mul_bps(notional, initial_margin)
}

/// All orders, keyed by id, with an owner index for lookups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    orders: HashMap<OrderId, Order>,
    /// owner -> order ids in submission order
    by_owner: HashMap<AccountId, Vec<OrderId>>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, order: Order) {
        self.by_owner.entry(order.owner).or_default().push(order.id);
        self.orders.insert(order.id, order);
    }

    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    pub fn get_mut(&mut self, order_id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(&order_id)
    }

    pub fn orders_for(&self, owner: AccountId) -> Vec<&Order> {
        self.by_owner
            .get(&owner)
            .map(|ids| ids.iter().filter_map(|id| self.orders.get(id)).collect())
            .unwrap_or_default()
    }

    /// Pending orders for a basket, oldest first.
    pub fn pending_for_baskt(&self, baskt_id: BasktId) -> Vec<&Order> {
        let sorted: BTreeMap<OrderId, &Order> = self
            .orders
            .values()
            .filter(|o| o.baskt_id == baskt_id && o.is_pending())
            .map(|o| (o.id, o))
            .collect();
        sorted.into_values().collect()
    }

    /// Whether a pending close order already targets this position.
    pub fn has_pending_close(&self, position_id: PositionId) -> bool {
        self.orders
            .values()
            .any(|o| o.is_pending() && o.target_position == Some(position_id))
    }

    /// Pending close orders targeting a position, oldest first.
    pub fn pending_closes_for(&self, position_id: PositionId) -> Vec<OrderId> {
        let mut ids: Vec<OrderId> = self
            .orders
            .values()
            .filter(|o| o.is_pending() && o.target_position == Some(position_id))
            .map(|o| o.id)
            .collect();
        ids.sort();
        ids
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn pending_count(&self) -> usize {
        self.orders.values().filter(|o| o.is_pending()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
