//! Margin health for open positions.
//!
//! Initial margin gates order submission (see `order::required_collateral`).
//! Maintenance margin decides liquidation: once equity, with funding owed,
//! drops below `notional * maintenance_bps`, the position may be liquidated.

use crate::config::{FundingConfig, MarginConfig};
use crate::math::mul_bps;
use crate::position::Position;
use crate::types::Price;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginHealth {
    Healthy { equity: i64, maintenance: u64 },
    Insufficient { equity: i64, maintenance: u64, shortfall: u64 },
}

impl MarginHealth {
    pub fn is_insufficient(&self) -> bool {
        matches!(self, MarginHealth::Insufficient { .. })
    }

    pub fn equity(&self) -> i64 {
        match self {
            MarginHealth::Healthy { equity, .. } | MarginHealth::Insufficient { equity, .. } => *equity,
        }
    }
}

pub fn maintenance_requirement(position: &Position, mark_price: Price, params: &MarginConfig) -> Option<u64> {
    mul_bps(position.notional(mark_price)?, params.maintenance_margin_bps)
}

/// Evaluate a position at `mark_price` with the basket index at `current_index`.
pub fn evaluate_health(
    position: &Position,
    mark_price: Price,
    current_index: i128,
    margin: &MarginConfig,
    funding: &FundingConfig,
) -> Option<MarginHealth> {
    let equity = position.equity(mark_price, current_index, funding)?;
    let maintenance = maintenance_requirement(position, mark_price, margin)?;

    // i128 so a maintenance above i64::MAX can't wrap
    let health = if (equity as i128) < maintenance as i128 {
        let shortfall = (maintenance as i128 - equity as i128).clamp(0, u64::MAX as i128) as u64;
        MarginHealth::Insufficient { equity, maintenance, shortfall }
    } else {
        MarginHealth::Healthy { equity, maintenance }
    };
    Some(health)
}

/// Mark price at which a position with no further funding hits maintenance.
pub fn liquidation_price(position: &Position, margin: &MarginConfig) -> Option<Price> {
    use rust_decimal::Decimal;

    let size = Decimal::from(position.size);
    if size.is_zero() {
        return None;
    }
    let mm = margin.maintenance_margin_bps.as_fraction();
    let entry = position.entry_price.value();
    let cushion = Decimal::from(position.collateral) - Decimal::from(position.funding_accumulated);

    // long:  c + (p - e) * s = p * s * mm  ->  p = (e * s - c) / (s * (1 - mm))
    // short: c + (e - p) * s = p * s * mm  ->  p = (e * s + c) / (s * (1 + mm))
    let notional = entry.checked_mul(size)?;
    let price = if position.is_long() {
        let denominator = size.checked_mul(Decimal::ONE - mm)?;
        if denominator <= Decimal::ZERO {
            return None;
        }
        notional.checked_sub(cushion)?.checked_div(denominator)?
    } else {
        let denominator = size.checked_mul(Decimal::ONE + mm)?;
        notional.checked_add(cushion)?.checked_div(denominator)?
    };

    Price::new(price)
}
