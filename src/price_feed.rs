// Price Feed Integration
//
// The ledger never ingests prices itself. An external feed hands over raw
// (price, exponent, confidence, publish_time) tuples, Pyth style, and this module
// decides whether a tuple is usable: positive, fresh, and tight enough.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::types::{BasktId, Bps, Price, Timestamp};

/// A single quote as published by the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: i64,
    pub exponent: i32,
    /// Confidence interval, same exponent as `price`
    pub confidence: u64,
    pub publish_time: Timestamp,
}

impl PriceQuote {
    pub fn new(price: i64, exponent: i32, confidence: u64, publish_time: Timestamp) -> Self {
        Self {
            price,
            exponent,
            confidence,
            publish_time,
        }
    }

    pub fn age_secs(&self, now: Timestamp) -> i64 {
        self.publish_time.seconds_until(now)
    }

    pub fn is_stale(&self, now: Timestamp, max_age_secs: i64) -> bool {
        self.age_secs(now) > max_age_secs
    }

    /// price * 10^exponent as an exact decimal
    pub fn to_price(&self) -> Result<Price, PriceFeedError> {
        if self.price <= 0 {
            return Err(PriceFeedError::NonPositivePrice { price: self.price });
        }

        let value = if self.exponent <= 0 {
            let scale = self.exponent.unsigned_abs();
            if scale > 28 {
                return Err(PriceFeedError::InvalidExponent { exponent: self.exponent });
            }
            Decimal::new(self.price, scale)
        } else {
            let factor = 10i64
                .checked_pow(self.exponent.unsigned_abs())
                .ok_or(PriceFeedError::InvalidExponent { exponent: self.exponent })?;
            Decimal::from(self.price)
                .checked_mul(Decimal::from(factor))
                .ok_or(PriceFeedError::InvalidExponent { exponent: self.exponent })?
        };

        Price::new(value).ok_or(PriceFeedError::NonPositivePrice { price: self.price })
    }

    /// confidence / price in bps, rounded down
    pub fn confidence_bps(&self) -> Option<u64> {
        let price = u64::try_from(self.price).ok().filter(|p| *p > 0)?;
        crate::math::mul_div(self.confidence, Bps::DENOMINATOR, price)
    }

    /// Full acceptance check: positive, fresh, confidence within bounds.
    pub fn validate(
        &self,
        now: Timestamp,
        max_age_secs: i64,
        max_confidence: Bps,
    ) -> Result<Price, PriceFeedError> {
        let price = self.to_price()?;

        if self.is_stale(now, max_age_secs) {
            return Err(PriceFeedError::Stale {
                age_secs: self.age_secs(now),
                max_age_secs,
            });
        }

        let ratio = self.confidence_bps().unwrap_or(u64::MAX);
        let max = u64::try_from(max_confidence.value()).unwrap_or(0);
        if ratio > max {
            return Err(PriceFeedError::Uncertain {
                confidence_bps: ratio,
                max_bps: max,
            });
        }

        Ok(price)
    }
}

/// Errors raised while accepting an oracle quote
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceFeedError {
    #[error("no price available for {0}")]
    Unavailable(BasktId),
    #[error("oracle price {price} is not positive")]
    NonPositivePrice { price: i64 },
    #[error("oracle exponent {exponent} out of range")]
    InvalidExponent { exponent: i32 },
    #[error("oracle price is {age_secs}s old, max {max_age_secs}s")]
    Stale { age_secs: i64, max_age_secs: i64 },
    #[error("confidence {confidence_bps}bps exceeds {max_bps}bps")]
    Uncertain { confidence_bps: u64, max_bps: u64 },
}

/// Anything that can hand the ledger a current quote for a basket.
pub trait PriceOracleFeed {
    fn name(&self) -> &str;

    fn get_price(&self, baskt_id: BasktId) -> Option<PriceQuote>;
}

// trait objects don't auto derive Debug
impl std::fmt::Debug for dyn PriceOracleFeed + Send + Sync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PriceOracleFeed({})", self.name())
    }
}

/// In-memory feed for tests and simulation. Clones share the same quote table,
/// so a test can keep a handle and move prices while the ledger owns another.
#[derive(Debug, Clone, Default)]
pub struct MockPriceFeed {
    quotes: Arc<RwLock<HashMap<BasktId, PriceQuote>>>,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quote(&self, baskt_id: BasktId, quote: PriceQuote) {
        if let Ok(mut quotes) = self.quotes.write() {
            quotes.insert(baskt_id, quote);
        }
    }

    /// Whole-unit price, zero exponent, zero confidence.
    pub fn set_price(&self, baskt_id: BasktId, price: i64, publish_time: Timestamp) {
        self.set_quote(baskt_id, PriceQuote::new(price, 0, 0, publish_time));
    }

    pub fn remove(&self, baskt_id: BasktId) {
        if let Ok(mut quotes) = self.quotes.write() {
            quotes.remove(&baskt_id);
        }
    }
}

impl PriceOracleFeed for MockPriceFeed {
    fn name(&self) -> &str {
        "mock"
    }

    fn get_price(&self, baskt_id: BasktId) -> Option<PriceQuote> {
        self.quotes.read().ok()?.get(&baskt_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exponent_conversion() {
        let quote = PriceQuote::new(5_012_345, -5, 0, Timestamp::from_secs(0));
        assert_eq!(quote.to_price().unwrap().value(), dec!(50.12345));

        let quote = PriceQuote::new(5, 2, 0, Timestamp::from_secs(0));
        assert_eq!(quote.to_price().unwrap().value(), dec!(500));
    }

    #[test]
    fn test_rejects_negative_price() {
        let quote = PriceQuote::new(-1, 0, 0, Timestamp::from_secs(0));
        assert!(matches!(quote.to_price(), Err(PriceFeedError::NonPositivePrice { .. })));
    }

    #[test]
    fn test_staleness_boundary() {
        let quote = PriceQuote::new(50, 0, 0, Timestamp::from_secs(1_000));
        let max_conf = Bps::new(500);

        assert!(quote.validate(Timestamp::from_secs(1_300), 300, max_conf).is_ok());
        let result = quote.validate(Timestamp::from_secs(1_301), 300, max_conf);
        assert!(matches!(result, Err(PriceFeedError::Stale { age_secs: 301, .. })));
    }

    #[test]
    fn test_confidence_too_wide() {
        // 6 / 100 = 600 bps
        let quote = PriceQuote::new(100, 0, 6, Timestamp::from_secs(0));
        assert_eq!(quote.confidence_bps(), Some(600));

        let result = quote.validate(Timestamp::from_secs(0), 300, Bps::new(500));
        assert!(matches!(result, Err(PriceFeedError::Uncertain { .. })));
    }

    #[test]
    fn test_mock_feed_shared_handle() {
        let feed = MockPriceFeed::new();
        let handle = feed.clone();

        assert!(feed.get_price(BasktId(1)).is_none());
        handle.set_price(BasktId(1), 50, Timestamp::from_secs(10));
        assert_eq!(feed.get_price(BasktId(1)).unwrap().price, 50);

        handle.remove(BasktId(1));
        assert!(feed.get_price(BasktId(1)).is_none());
    }
}
