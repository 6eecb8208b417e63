// 7.0 config.rs: all ledger settings in one place. fees, oracle, funding, margin, pool.
// 7.1 every section has a Default; Environment picks a preset; JSON overrides any field.

use serde::{Deserialize, Serialize};

use crate::types::{Bps, PoolId};

/** 7.2: trading fees in bps of notional, and how they split between treasury and BLP */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    // charged on fill of an open order, taken out of the order's collateral
    pub opening_fee_bps: Bps,
    // charged on close, deducted from the payout
    pub closing_fee_bps: Bps,
    // charged on liquidation, capped at what is left of the collateral
    pub liquidation_fee_bps: Bps,
    // portion of every fee routed to the treasury. the rest goes to the BLP
    pub treasury_share_bps: Bps,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            opening_fee_bps: Bps::new(10),      // 0.1%
            closing_fee_bps: Bps::new(10),      // 0.1%
            liquidation_fee_bps: Bps::new(100), // 1%
            treasury_share_bps: Bps::new(3_000), // 30%
        }
    }
}

// Oracle acceptance rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    // quotes older than this (by publish time) are rejected at fill
    pub max_price_age_secs: i64,
    // confidence / price above this ratio is rejected
    pub max_confidence_bps: Bps,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_price_age_secs: 300,
            max_confidence_bps: Bps::new(500), // 5%
        }
    }
}

// Funding index units: index += rate_bps * elapsed_secs / index_scale.
// a position owes size * (index delta) / payment_divisor micro-USDC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FundingConfig {
    pub index_scale: i64,
    pub payment_divisor: i64,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            index_scale: 1,
            // bps * one hour: a 100 bps rate costs 1% of size per hour
            payment_divisor: 10_000 * 3_600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginConfig {
    // collateral / notional required to open
    pub initial_margin_bps: Bps,
    // equity / notional below which a position can be liquidated
    pub maintenance_margin_bps: Bps,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            initial_margin_bps: Bps::new(1_000),    // 10x
            maintenance_margin_bps: Bps::new(500), // 5%
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolDefaults {
    pub pool_id: PoolId,
    // share of total liquidity that non-forced queue processing must leave in the pool
    pub min_liquidity_buffer_bps: Bps,
}

impl Default for PoolDefaults {
    fn default() -> Self {
        Self {
            pool_id: PoolId(1),
            min_liquidity_buffer_bps: Bps::new(0),
        }
    }
}

// The complete ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    // Maximum number of audit events kept in memory
    pub max_events: usize,
    pub fees: FeeConfig,
    pub oracle: OracleConfig,
    pub funding: FundingConfig,
    pub margin: MarginConfig,
    pub pool: PoolDefaults,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            fees: FeeConfig::default(),
            oracle: OracleConfig::default(),
            funding: FundingConfig::default(),
            margin: MarginConfig::default(),
            pool: PoolDefaults::default(),
        }
    }
}

impl LedgerConfig {
    // free trading, loose oracle window
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.fees.opening_fee_bps = Bps::new(0);
        config.fees.closing_fee_bps = Bps::new(0);
        config.oracle.max_price_age_secs = 900;
        config
    }

    // tight oracle rules and a 10% liquidity buffer on the pool
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.oracle.max_price_age_secs = 60;
        config.oracle.max_confidence_bps = Bps::new(200);
        config.margin.initial_margin_bps = Bps::new(2_000);
        config.margin.maintenance_margin_bps = Bps::new(1_000);
        config.pool.min_liquidity_buffer_bps = Bps::new(1_000);
        config
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fees = [
            self.fees.opening_fee_bps,
            self.fees.closing_fee_bps,
            self.fees.liquidation_fee_bps,
        ];
        if fees.iter().any(|b| b.value() < 0 || b.value() > 1_000) {
            return Err(ConfigError::InvalidFees {
                reason: "trading fees must be within 0..=1000 bps".to_string(),
            });
        }
        if !(0..=10_000).contains(&self.fees.treasury_share_bps.value()) {
            return Err(ConfigError::InvalidFees {
                reason: "treasury share must be within 0..=10000 bps".to_string(),
            });
        }

        if self.oracle.max_price_age_secs <= 0 {
            return Err(ConfigError::InvalidOracle {
                reason: "max price age must be positive".to_string(),
            });
        }
        if self.oracle.max_confidence_bps.value() <= 0 {
            return Err(ConfigError::InvalidOracle {
                reason: "confidence limit must be positive".to_string(),
            });
        }

        if self.funding.index_scale <= 0 || self.funding.payment_divisor <= 0 {
            return Err(ConfigError::InvalidFunding {
                reason: "index scale and payment divisor must be positive".to_string(),
            });
        }

        // MM must sit strictly below IM or a fresh position is already liquidatable
        let im = self.margin.initial_margin_bps.value();
        let mm = self.margin.maintenance_margin_bps.value();
        if mm <= 0 || im > 10_000 || mm >= im {
            return Err(ConfigError::InvalidMargin {
                reason: "need 0 < maintenance < initial <= 10000 bps".to_string(),
            });
        }

        if !(0..10_000).contains(&self.pool.min_liquidity_buffer_bps.value()) {
            return Err(ConfigError::InvalidPool {
                reason: "liquidity buffer must be within 0..10000 bps".to_string(),
            });
        }

        if self.max_events == 0 {
            return Err(ConfigError::InvalidPool {
                reason: "event retention must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid fees: {reason}")]
    InvalidFees { reason: String },
    #[error("invalid oracle settings: {reason}")]
    InvalidOracle { reason: String },
    #[error("invalid funding settings: {reason}")]
    InvalidFunding { reason: String },
    #[error("invalid margin settings: {reason}")]
    InvalidMargin { reason: String },
    #[error("invalid pool settings: {reason}")]
    InvalidPool { reason: String },
    #[error("config parse error: {0}")]
    Parse(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> LedgerConfig {
        match self {
            Environment::Development => LedgerConfig::default(),
            Environment::Testnet => LedgerConfig::testnet(),
            Environment::Mainnet => LedgerConfig::mainnet_conservative(),
        }
    }
}
