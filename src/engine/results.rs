// 8.0.2: result types and errors for ledger operations.

use crate::config::ConfigError;
use crate::order::OrderStatus;
use crate::price_feed::PriceFeedError;
use crate::types::{AccountId, BasktId, OrderId, PositionId, WithdrawalId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResult {
    pub position_id: PositionId,
    /// price pnl minus all funding the position paid
    pub pnl: i64,
    pub fee_paid: u64,
    /// funding settled at close, on top of earlier checkpoints
    pub funding_settled: i64,
    pub collateral_returned: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationResult {
    pub position_id: PositionId,
    pub pnl: i64,
    pub fee_paid: u64,
    pub collateral_returned: u64,
    pub equity: i64,
    pub maintenance: u64,
}

/// A queue item left pending by a processing pass, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredWithdrawal {
    pub withdrawal_id: WithdrawalId,
    pub reason: LedgerError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingResult {
    pub items_processed: usize,
    /// net amounts paid out
    pub total_amount_processed: u64,
    pub total_fees_collected: u64,
    pub deferred: Vec<DeferredWithdrawal>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    // validation
    #[error("Invalid size {size}")]
    InvalidSize { size: u64 },

    #[error("Invalid collateral: provided {provided}, required {required}")]
    InvalidCollateral { provided: u64, required: u64 },

    #[error("Fee {fee_bps}bps outside 0..=1000")]
    InvalidFeeRange { fee_bps: i64 },

    #[error("Minimum deposit {min_deposit} below the 100000 floor")]
    InvalidMinDeposit { min_deposit: u64 },

    #[error("Fee event total {total_fee} != treasury {fee_to_treasury} + blp {fee_to_blp}")]
    InvalidEvent { total_fee: u64, fee_to_treasury: u64, fee_to_blp: u64 },

    #[error("Close order does not match position {0:?}")]
    CloseMismatch(PositionId),

    #[error("Invalid config: {0}")]
    Config(#[from] ConfigError),

    // state conflicts
    #[error("Order {0:?} not found")]
    OrderNotFound(OrderId),

    #[error("Order {0:?} has the wrong action for this operation")]
    WrongOrderAction(OrderId),

    #[error("Order {order_id:?} is {status:?}")]
    OrderNotPending { order_id: OrderId, status: OrderStatus },

    #[error("Position {0:?} not found")]
    PositionNotFound(PositionId),

    #[error("Position {0:?} is not open")]
    PositionNotOpen(PositionId),

    #[error("Position {0:?} already has a pending close order")]
    ClosePending(PositionId),

    #[error("Position {0:?} is above maintenance margin")]
    PositionHealthy(PositionId),

    #[error("Baskt {0} not found")]
    BasktNotFound(BasktId),

    #[error("Baskt {0} already initialized")]
    BasktAlreadyInitialized(BasktId),

    #[error("Pool already initialized")]
    AlreadyInitialized,

    #[error("Pool not initialized")]
    PoolNotInitialized,

    #[error("Withdrawal {0:?} not found")]
    WithdrawalNotFound(WithdrawalId),

    #[error("Withdrawal {0:?} is not pending")]
    NotPending(WithdrawalId),

    // resources
    #[error("Deposit {amount} below minimum {min_deposit}")]
    BelowMinimum { amount: u64, min_deposit: u64 },

    #[error("Insufficient shares: requested {requested}, available {available}")]
    InsufficientShares { requested: u64, available: u64 },

    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: u64, available: u64 },

    // auth
    #[error("{requester} is not allowed to do this")]
    Unauthorized { requester: AccountId },

    // oracle
    #[error("Stale price: {age_secs}s old, max {max_age_secs}s")]
    StalePrice { age_secs: i64, max_age_secs: i64 },

    #[error("Oracle error: {0}")]
    Oracle(PriceFeedError),

    #[error("Arithmetic overflow")]
    MathOverflow,

    #[error("Ledger lock poisoned")]
    LockPoisoned,
}

impl From<PriceFeedError> for LedgerError {
    fn from(err: PriceFeedError) -> Self {
        match err {
            PriceFeedError::Stale { age_secs, max_age_secs } => LedgerError::StalePrice { age_secs, max_age_secs },
            other => LedgerError::Oracle(other),
        }
    }
}

impl LedgerError {
    /// State conflicts mean the caller's view is stale; re-read and retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::OrderNotPending { .. }
                | LedgerError::PositionNotOpen(_)
                | LedgerError::NotPending(_)
                | LedgerError::AlreadyInitialized
                | LedgerError::StalePrice { .. }
        )
    }
}
