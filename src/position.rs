// 4.0: position tracking. pnl = (exit - entry) * size * direction - funding.
// a position is opened once, settles funding any number of times, and closes once.

use crate::config::FundingConfig;
use crate::funding::funding_owed;
use crate::types::{AccountId, BasktId, OrderId, PositionId, Price, Side, Timestamp};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
    Liquidated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub owner: AccountId,
    pub baskt_id: BasktId,
    pub side: Side,
    pub size: u64,
    pub collateral: u64,
    pub entry_price: Price,
    pub entry_funding_index: i128,
    pub last_funding_index: i128,
    // positive = paid by the position so far
    pub funding_accumulated: i64,
    pub status: PositionStatus,
    pub opened_by: OrderId,
    pub timestamp_open: Timestamp,
    pub timestamp_close: Option<Timestamp>,
    pub exit_price: Option<Price>,
    pub realized_pnl: Option<i64>,
}

impl Position {
    pub fn new(
        id: PositionId,
        owner: AccountId,
        baskt_id: BasktId,
        side: Side,
        size: u64,
        collateral: u64,
        entry_price: Price,
        funding_index: i128,
        opened_by: OrderId,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            owner,
            baskt_id,
            side,
            size,
            collateral,
            entry_price,
            entry_funding_index: funding_index,
            last_funding_index: funding_index,
            funding_accumulated: 0,
            status: PositionStatus::Open,
            opened_by,
            timestamp_open: timestamp,
            timestamp_close: None,
            exit_price: None,
            realized_pnl: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn is_long(&self) -> bool {
        self.side.is_long()
    }

    // 4.1: paper gains/losses from price alone
    pub fn price_pnl(&self, mark_price: Price) -> Option<i64> {
        calculate_price_pnl(self.side, self.size, self.entry_price, mark_price)
    }

    /// Funding owed since the last checkpoint, not yet folded into `funding_accumulated`.
    pub fn pending_funding(&self, current_index: i128, config: &FundingConfig) -> Option<i64> {
        funding_owed(self.side, self.size, self.last_funding_index, current_index, config)
    }

    /// Checkpoint funding up to `current_index`. Returns the amount just settled.
    pub fn settle_funding(&mut self, current_index: i128, config: &FundingConfig) -> Option<i64> {
        let owed = self.pending_funding(current_index, config)?;
        self.funding_accumulated = self.funding_accumulated.checked_add(owed)?;
        self.last_funding_index = current_index;
        Some(owed)
    }

    // 4.2: collateral + price pnl - all funding. this vs maintenance decides liquidation
    pub fn equity(&self, mark_price: Price, current_index: i128, config: &FundingConfig) -> Option<i64> {
        let pnl = self.price_pnl(mark_price)?;
        let pending = self.pending_funding(current_index, config)?;
        let collateral = i64::try_from(self.collateral).ok()?;
        collateral
            .checked_add(pnl)?
            .checked_sub(self.funding_accumulated)?
            .checked_sub(pending)
    }

    pub fn notional(&self, price: Price) -> Option<u64> {
        price.notional(self.size)
    }

    /// Realized pnl once funding has been settled: price pnl minus accumulated funding.
    pub fn realized_pnl_at(&self, exit_price: Price) -> Option<i64> {
        self.price_pnl(exit_price)?.checked_sub(self.funding_accumulated)
    }

    pub fn mark_closed(&mut self, status: PositionStatus, exit_price: Price, pnl: i64, timestamp: Timestamp) {
        debug_assert!(self.is_open(), "position already closed");
        debug_assert!(status != PositionStatus::Open);
        self.status = status;
        self.exit_price = Some(exit_price);
        self.realized_pnl = Some(pnl);
        self.timestamp_close = Some(timestamp);
    }
}

// 4.3: the pnl formula. (exit - entry) * size * direction, truncated to micro-units
pub fn calculate_price_pnl(side: Side, size: u64, entry_price: Price, exit_price: Price) -> Option<i64> {
    let move_per_unit = exit_price.value().checked_sub(entry_price.value())?;
    let pnl = move_per_unit
        .checked_mul(Decimal::from(size))?
        .checked_mul(Decimal::from(side.sign()))?;
    pnl.trunc().to_i64()
}

/// What a trader walks away with after a close: collateral + pnl - fee, floored at zero.
pub fn collateral_payout(collateral: u64, pnl: i64, fee: u64) -> u64 {
    let gross = collateral as i128 + pnl as i128 - fee as i128;
    gross.clamp(0, u64::MAX as i128) as u64
}

/// All positions ever opened. Closed ones stay for history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionBook {
    positions: HashMap<PositionId, Position>,
    by_owner: HashMap<AccountId, Vec<PositionId>>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, position: Position) {
        self.by_owner.entry(position.owner).or_default().push(position.id);
        self.positions.insert(position.id, position);
    }

    pub fn get(&self, position_id: PositionId) -> Option<&Position> {
        self.positions.get(&position_id)
    }

    pub fn get_mut(&mut self, position_id: PositionId) -> Option<&mut Position> {
        self.positions.get_mut(&position_id)
    }

    pub fn positions_for(&self, owner: AccountId) -> Vec<&Position> {
        self.by_owner
            .get(&owner)
            .map(|ids| ids.iter().filter_map(|id| self.positions.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn open_for_baskt(&self, baskt_id: BasktId) -> Vec<&Position> {
        let mut open: Vec<&Position> = self
            .positions
            .values()
            .filter(|p| p.baskt_id == baskt_id && p.is_open())
            .collect();
        open.sort_by_key(|p| p.id);
        open
    }

    /// (long size, short size) across open positions on a basket
    pub fn open_interest(&self, baskt_id: BasktId) -> (u64, u64) {
        self.positions
            .values()
            .filter(|p| p.baskt_id == baskt_id && p.is_open())
            .fold((0u64, 0u64), |(long, short), p| match p.side {
                Side::Long => (long.saturating_add(p.size), short),
                Side::Short => (long, short.saturating_add(p.size)),
            })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn price(v: Decimal) -> Price {
        Price::new(v).unwrap()
    }

    fn test_position(side: Side) -> Position {
        Position::new(
            PositionId(1),
            AccountId(1),
            BasktId(1),
            side,
            100,
            10_000,
            price(dec!(50)),
            0,
            OrderId(1),
            Timestamp::from_secs(0),
        )
    }

    #[test]
    fn long_profit() {
        let pos = test_position(Side::Long);
        assert_eq!(pos.price_pnl(price(dec!(55))), Some(500));
        assert_eq!(pos.price_pnl(price(dec!(45))), Some(-500));
    }

    #[test]
    fn short_profit() {
        let pos = test_position(Side::Short);
        // short profits when price drops
        assert_eq!(pos.price_pnl(price(dec!(45))), Some(500));
        assert_eq!(pos.price_pnl(price(dec!(55))), Some(-500));
    }

    #[test]
    fn fractional_pnl_truncates() {
        let pos = test_position(Side::Long);
        // 0.015 * 100 = 1.5 -> 1
        assert_eq!(pos.price_pnl(price(dec!(50.015))), Some(1));
    }

    #[test]
    fn funding_settlement_checkpoints() {
        let config = FundingConfig { index_scale: 1, payment_divisor: 10 };
        let mut pos = test_position(Side::Long);

        assert_eq!(pos.settle_funding(30, &config), Some(300));
        assert_eq!(pos.funding_accumulated, 300);
        assert_eq!(pos.last_funding_index, 30);
        assert_eq!(pos.entry_funding_index, 0);

        // settling again at the same index is a no-op
        assert_eq!(pos.settle_funding(30, &config), Some(0));
        assert_eq!(pos.funding_accumulated, 300);

        assert_eq!(pos.realized_pnl_at(price(dec!(55))), Some(200));
    }

    #[test]
    fn equity_includes_unsettled_funding() {
        let config = FundingConfig { index_scale: 1, payment_divisor: 10 };
        let pos = test_position(Side::Long);

        // 10_000 + 500 - 0 - 100 * 20 / 10
        assert_eq!(pos.equity(price(dec!(55)), 20, &config), Some(10_300));
    }

    #[test]
    fn payout_floors_at_zero() {
        assert_eq!(collateral_payout(10_000, 500, 5), 10_495);
        assert_eq!(collateral_payout(1_000, -5_000, 5), 0);
    }

    #[test]
    fn book_queries() {
        let mut book = PositionBook::new();
        book.insert(test_position(Side::Long));

        let mut short = test_position(Side::Short);
        short.id = PositionId(2);
        short.size = 40;
        book.insert(short);

        assert_eq!(book.open_interest(BasktId(1)), (100, 40));
        assert_eq!(book.positions_for(AccountId(1)).len(), 2);

        book.get_mut(PositionId(1))
            .unwrap()
            .mark_closed(PositionStatus::Closed, price(dec!(55)), 500, Timestamp::from_secs(9));
        assert_eq!(book.open_for_baskt(BasktId(1)).len(), 1);
        assert_eq!(book.open_interest(BasktId(1)), (0, 40));
    }
}
