// 6.0 pool.rs: the shared BLP liquidity pool. LPs deposit collateral for shares,
// traders trade against the pooled liquidity. one pool per ledger.
//
// 6.1 share math (all floor division, u128 intermediates):
//   deposit:  shares = total_shares == 0 ? net : net * total_shares / total_liquidity
//   withdraw: gross  = lp * total_liquidity / total_shares
// flooring both ways keeps rounding dust inside the pool, never paid out.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::LedgerError;
use crate::math::{mul_bps, mul_div};
use crate::types::{AccountId, Bps, PoolId, Timestamp};

pub const MAX_FEE_BPS: i64 = 1_000;
pub const MIN_DEPOSIT_FLOOR: u64 = 100_000;

// fee and minimum settings, set on initialize and changed via configure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    pub deposit_fee_bps: Bps,
    pub withdrawal_fee_bps: Bps,
    pub min_deposit: u64,
}

impl PoolParams {
    pub fn new(deposit_fee_bps: i64, withdrawal_fee_bps: i64, min_deposit: u64) -> Self {
        Self {
            deposit_fee_bps: Bps::new(deposit_fee_bps),
            withdrawal_fee_bps: Bps::new(withdrawal_fee_bps),
            min_deposit,
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        for fee in [self.deposit_fee_bps, self.withdrawal_fee_bps] {
            if !(0..=MAX_FEE_BPS).contains(&fee.value()) {
                return Err(LedgerError::InvalidFeeRange { fee_bps: fee.value() });
            }
        }
        if self.min_deposit < MIN_DEPOSIT_FLOOR {
            return Err(LedgerError::InvalidMinDeposit { min_deposit: self.min_deposit });
        }
        Ok(())
    }
}

// one provider's shares. locked shares back a queued withdrawal and can't be re-requested
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderShares {
    pub free: u64,
    pub locked: u64,
}

impl ProviderShares {
    pub fn total(&self) -> u64 {
        self.free + self.locked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositQuote {
    pub amount: u64,
    pub fee: u64,
    pub net_amount: u64,
    pub shares: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalQuote {
    pub lp_amount: u64,
    pub gross_amount: u64,
    pub fee: u64,
    pub net_amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub pool_id: PoolId,
    pub total_liquidity: u64,
    pub total_shares: u64,
    params: Option<PoolParams>,
    // fraction of liquidity that normal queue processing leaves untouched
    pub min_liquidity_buffer_bps: Bps,
    pub last_update: Timestamp,
    providers: HashMap<AccountId, ProviderShares>,
}

impl LiquidityPool {
    pub fn new(pool_id: PoolId, min_liquidity_buffer_bps: Bps) -> Self {
        Self {
            pool_id,
            total_liquidity: 0,
            total_shares: 0,
            params: None,
            min_liquidity_buffer_bps,
            last_update: Timestamp::from_secs(0),
            providers: HashMap::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.params.is_some()
    }

    pub fn params(&self) -> Result<PoolParams, LedgerError> {
        self.params.ok_or(LedgerError::PoolNotInitialized)
    }

    pub fn initialize(&mut self, params: PoolParams, now: Timestamp) -> Result<(), LedgerError> {
        params.validate()?;
        if self.is_initialized() {
            return Err(LedgerError::AlreadyInitialized);
        }
        self.params = Some(params);
        self.last_update = now;
        Ok(())
    }

    // admin update of fees and minimum. balances are untouched
    pub fn configure(&mut self, params: PoolParams, now: Timestamp) -> Result<PoolParams, LedgerError> {
        let previous = self.params()?;
        params.validate()?;
        self.params = Some(params);
        self.last_update = now;
        Ok(previous)
    }

    // 6.2: the deposit formula without touching state
    pub fn quote_deposit(&self, amount: u64) -> Result<DepositQuote, LedgerError> {
        let params = self.params()?;
        if amount < params.min_deposit {
            return Err(LedgerError::BelowMinimum { amount, min_deposit: params.min_deposit });
        }

        let fee = mul_bps(amount, params.deposit_fee_bps).ok_or(LedgerError::MathOverflow)?;
        let net_amount = amount - fee;
        let shares = if self.total_shares == 0 {
            net_amount
        } else {
            mul_div(net_amount, self.total_shares, self.total_liquidity).ok_or(LedgerError::MathOverflow)?
        };

        // share price so high the deposit rounds to nothing
        if shares == 0 {
            return Err(LedgerError::BelowMinimum { amount, min_deposit: params.min_deposit });
        }

        Ok(DepositQuote { amount, fee, net_amount, shares })
    }

    pub fn apply_deposit(&mut self, provider: AccountId, quote: &DepositQuote, now: Timestamp) -> Result<(), LedgerError> {
        let liquidity = self.total_liquidity.checked_add(quote.net_amount).ok_or(LedgerError::MathOverflow)?;
        let shares = self.total_shares.checked_add(quote.shares).ok_or(LedgerError::MathOverflow)?;

        self.total_liquidity = liquidity;
        self.total_shares = shares;
        self.providers.entry(provider).or_default().free += quote.shares;
        self.last_update = now;
        Ok(())
    }

    // 6.3: value of `lp_amount` shares at the live share price
    pub fn quote_withdrawal(&self, lp_amount: u64) -> Result<WithdrawalQuote, LedgerError> {
        let params = self.params()?;
        if lp_amount > self.total_shares {
            return Err(LedgerError::InsufficientShares { requested: lp_amount, available: self.total_shares });
        }

        let gross_amount =
            mul_div(lp_amount, self.total_liquidity, self.total_shares).ok_or(LedgerError::MathOverflow)?;
        let fee = mul_bps(gross_amount, params.withdrawal_fee_bps).ok_or(LedgerError::MathOverflow)?;

        Ok(WithdrawalQuote {
            lp_amount,
            gross_amount,
            fee,
            net_amount: gross_amount - fee,
        })
    }

    // liquidity a withdrawal may draw on. force ignores the buffer
    pub fn available_liquidity(&self, force: bool) -> u64 {
        if force {
            return self.total_liquidity;
        }
        let buffer = mul_bps(self.total_liquidity, self.min_liquidity_buffer_bps).unwrap_or(self.total_liquidity);
        self.total_liquidity - buffer
    }

    pub fn lock_shares(&mut self, provider: AccountId, amount: u64) -> Result<(), LedgerError> {
        let balance = self.providers.get(&provider).copied().unwrap_or_default();
        if balance.free < amount {
            return Err(LedgerError::InsufficientShares { requested: amount, available: balance.free });
        }
        let entry = self.providers.entry(provider).or_default();
        entry.free -= amount;
        entry.locked += amount;
        Ok(())
    }

    pub fn unlock_shares(&mut self, provider: AccountId, amount: u64) -> Result<(), LedgerError> {
        let entry = self
            .providers
            .get_mut(&provider)
            .filter(|b| b.locked >= amount)
            .ok_or(LedgerError::InsufficientShares { requested: amount, available: 0 })?;
        entry.locked -= amount;
        entry.free += amount;
        Ok(())
    }

    // 6.4: settle a processed withdrawal. the whole gross leaves the pool; the fee part
    // goes to the fee vault, the rest to the provider
    pub fn burn_locked(&mut self, provider: AccountId, quote: &WithdrawalQuote, now: Timestamp) -> Result<(), LedgerError> {
        if quote.gross_amount > self.total_liquidity || quote.lp_amount > self.total_shares {
            return Err(LedgerError::InsufficientLiquidity {
                requested: quote.gross_amount,
                available: self.total_liquidity,
            });
        }
        let entry = self
            .providers
            .get_mut(&provider)
            .filter(|b| b.locked >= quote.lp_amount)
            .ok_or(LedgerError::InsufficientShares { requested: quote.lp_amount, available: 0 })?;

        entry.locked -= quote.lp_amount;
        if entry.total() == 0 {
            self.providers.remove(&provider);
        }
        self.total_liquidity -= quote.gross_amount;
        self.total_shares -= quote.lp_amount;
        self.last_update = now;
        Ok(())
    }

    pub fn shares_of(&self, provider: AccountId) -> ProviderShares {
        self.providers.get(&provider).copied().unwrap_or_default()
    }

    pub fn providers(&self) -> impl Iterator<Item = (&AccountId, &ProviderShares)> {
        self.providers.iter()
    }

    pub fn outstanding_shares(&self) -> u64 {
        self.providers.values().map(|b| b.total()).sum()
    }

    // liquidity per share, 1 for an empty pool
    pub fn share_price(&self) -> Decimal {
        if self.total_shares == 0 {
            return Decimal::ONE;
        }
        Decimal::from(self.total_liquidity) / Decimal::from(self.total_shares)
    }

    pub fn value_of(&self, provider: AccountId) -> u64 {
        let shares = self.shares_of(provider).total();
        mul_div(shares, self.total_liquidity, self.total_shares).unwrap_or(0)
    }

    pub fn is_consistent(&self) -> bool {
        (self.total_shares == 0) == (self.total_liquidity == 0) && self.outstanding_shares() == self.total_shares
    }
}
