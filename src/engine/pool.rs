//! Liquidity pool deposits and the withdrawal queue.

use super::core::Ledger;
use super::results::{DeferredWithdrawal, LedgerError, ProcessingResult};
use crate::events::{
    EventPayload, LiquidityDepositedEvent, PoolConfiguredEvent, PoolInitializedEvent, WithdrawalCancelledEvent,
    WithdrawalDeferredEvent, WithdrawalProcessedEvent, WithdrawalQueuedEvent,
};
use crate::journal::{FeeEventType, FeeSubject};
use crate::pool::{LiquidityPool, PoolParams, ProviderShares};
use crate::types::{AccountId, WithdrawalId};
use crate::withdrawal::{WithdrawQueueItem, WithdrawStatus};
use rust_decimal::Decimal;

impl Ledger {
    pub fn initialize_pool(
        &mut self,
        deposit_fee_bps: i64,
        withdrawal_fee_bps: i64,
        min_deposit: u64,
    ) -> Result<(), LedgerError> {
        let params = PoolParams::new(deposit_fee_bps, withdrawal_fee_bps, min_deposit);
        self.pool.initialize(params, self.current_time)?;

        tracing::info!(pool = self.pool.pool_id.0, deposit_fee_bps, withdrawal_fee_bps, min_deposit, "pool initialized");
        self.emit_event(EventPayload::PoolInitialized(PoolInitializedEvent {
            pool_id: self.pool.pool_id,
            deposit_fee_bps: params.deposit_fee_bps,
            withdrawal_fee_bps: params.withdrawal_fee_bps,
            min_deposit,
        }));
        Ok(())
    }

    /// Change fees and minimum deposit on a live pool. Returns the old settings.
    pub fn configure_pool(
        &mut self,
        deposit_fee_bps: i64,
        withdrawal_fee_bps: i64,
        min_deposit: u64,
    ) -> Result<PoolParams, LedgerError> {
        let params = PoolParams::new(deposit_fee_bps, withdrawal_fee_bps, min_deposit);
        let previous = self.pool.configure(params, self.current_time)?;

        tracing::info!(pool = self.pool.pool_id.0, deposit_fee_bps, withdrawal_fee_bps, min_deposit, "pool configured");
        self.emit_event(EventPayload::PoolConfigured(PoolConfiguredEvent {
            pool_id: self.pool.pool_id,
            deposit_fee_bps: params.deposit_fee_bps,
            withdrawal_fee_bps: params.withdrawal_fee_bps,
            min_deposit,
        }));
        Ok(previous)
    }

    /// Deposit `amount` for `provider`. Returns the shares issued.
    pub fn deposit(&mut self, provider: AccountId, amount: u64) -> Result<u64, LedgerError> {
        let quote = self.pool.quote_deposit(amount)?;
        self.pool.apply_deposit(provider, &quote, self.current_time)?;
        self.record_fee(FeeEventType::LiquidityAdded, provider, quote.fee, FeeSubject::Pool(self.pool.pool_id))?;

        tracing::info!(
            provider = %provider,
            amount,
            fee = quote.fee,
            shares = quote.shares,
            total_liquidity = self.pool.total_liquidity,
            "liquidity deposited"
        );
        self.emit_event(EventPayload::LiquidityDeposited(LiquidityDepositedEvent {
            provider,
            amount,
            fee: quote.fee,
            shares_issued: quote.shares,
            total_liquidity: self.pool.total_liquidity,
            total_shares: self.pool.total_shares,
        }));
        Ok(quote.shares)
    }

    /// Queue a withdrawal of `lp_amount` shares. The shares are locked until the
    /// request is processed or cancelled; no funds move yet.
    pub fn request_withdrawal(&mut self, provider: AccountId, lp_amount: u64) -> Result<WithdrawQueueItem, LedgerError> {
        self.pool.params()?;
        if lp_amount == 0 {
            return Err(LedgerError::InvalidSize { size: 0 });
        }
        self.pool.lock_shares(provider, lp_amount)?;

        let id = self.next_withdrawal_id();
        let item = self
            .queue
            .enqueue(id, self.pool.pool_id, provider, lp_amount, self.current_time)
            .clone();

        tracing::info!(withdrawal_id = id.0, provider = %provider, lp_amount, position = item.queue_position, "withdrawal queued");
        self.emit_event(EventPayload::WithdrawalQueued(WithdrawalQueuedEvent {
            withdrawal_id: id,
            provider,
            lp_amount,
            queue_position: item.queue_position,
        }));
        Ok(item)
    }

    /// Serve pending withdrawals oldest first, pricing each at the live share price.
    /// An item that doesn't fit the available liquidity stays pending and the pass
    /// moves on; the pass ends after `max_items` attempts or once nothing is available.
    pub fn process_queue(&mut self, max_items: usize, force: bool) -> Result<ProcessingResult, LedgerError> {
        self.pool.params()?;
        let mut result = ProcessingResult::default();
        let mut attempted = 0;

        for id in self.queue.pending_in_order() {
            if attempted >= max_items {
                break;
            }
            let available = self.pool.available_liquidity(force);
            if available == 0 {
                break;
            }
            attempted += 1;

            let Some(item) = self.queue.get(id) else { continue };
            if !item.status.can_transition_to(WithdrawStatus::Processing) {
                self.defer(&mut result, id, LedgerError::NotPending(id));
                continue;
            }
            let provider = item.provider;
            let lp_amount = item.remaining_lp;

            // 1. price off the pool as it stands after earlier items in this pass
            let quote = match self.pool.quote_withdrawal(lp_amount) {
                Ok(quote) if quote.net_amount <= available => quote,
                Ok(quote) => {
                    self.defer(&mut result, id, LedgerError::InsufficientLiquidity {
                        requested: quote.net_amount,
                        available,
                    });
                    continue;
                }
                Err(e) => {
                    self.defer(&mut result, id, e);
                    continue;
                }
            };

            // 2. move the money, then walk the item through processing to completed
            if let Err(e) = self.pool.burn_locked(provider, &quote, self.current_time) {
                self.defer(&mut result, id, e);
                continue;
            }
            let now = self.current_time;
            let completed = self
                .queue
                .get_mut(id)
                .is_some_and(|item| item.begin_processing() && item.complete(quote.net_amount, quote.fee, now));
            if !completed {
                tracing::error!(withdrawal_id = id.0, "pool debited but queue item refused completion");
            }
            debug_assert!(completed, "withdrawal {:?} burned without completing", id);
            self.record_fee(FeeEventType::LiquidityRemoved, provider, quote.fee, FeeSubject::Withdrawal(id))?;

            result.items_processed += 1;
            result.total_amount_processed += quote.net_amount;
            result.total_fees_collected += quote.fee;

            tracing::info!(
                withdrawal_id = id.0,
                provider = %provider,
                gross = quote.gross_amount,
                net = quote.net_amount,
                fee = quote.fee,
                "withdrawal processed"
            );
            self.emit_event(EventPayload::WithdrawalProcessed(WithdrawalProcessedEvent {
                withdrawal_id: id,
                provider,
                lp_amount,
                net_amount: quote.net_amount,
                fee: quote.fee,
                total_liquidity: self.pool.total_liquidity,
                total_shares: self.pool.total_shares,
            }));
        }

        Ok(result)
    }

    fn defer(&mut self, result: &mut ProcessingResult, withdrawal_id: WithdrawalId, reason: LedgerError) {
        tracing::warn!(withdrawal_id = withdrawal_id.0, error = %reason, "withdrawal deferred");
        if let LedgerError::InsufficientLiquidity { requested, available } = reason {
            self.emit_event(EventPayload::WithdrawalDeferred(WithdrawalDeferredEvent {
                withdrawal_id,
                requested,
                available,
            }));
        }
        result.deferred.push(DeferredWithdrawal { withdrawal_id, reason });
    }

    /// Cancel a pending withdrawal and unlock its shares. Provider only.
    pub fn cancel_withdrawal(&mut self, withdrawal_id: WithdrawalId, requester: AccountId) -> Result<(), LedgerError> {
        let item = self
            .queue
            .get(withdrawal_id)
            .ok_or(LedgerError::WithdrawalNotFound(withdrawal_id))?;
        if item.provider != requester {
            return Err(LedgerError::Unauthorized { requester });
        }
        if !item.status.can_transition_to(WithdrawStatus::Cancelled) {
            return Err(LedgerError::NotPending(withdrawal_id));
        }
        let lp_amount = item.remaining_lp;

        self.pool.unlock_shares(requester, lp_amount)?;
        let cancelled = self.queue.get_mut(withdrawal_id).is_some_and(|item| item.cancel());
        debug_assert!(cancelled, "withdrawal {:?} unlocked without cancelling", withdrawal_id);

        tracing::info!(withdrawal_id = withdrawal_id.0, provider = %requester, lp_amount, "withdrawal cancelled");
        self.emit_event(EventPayload::WithdrawalCancelled(WithdrawalCancelledEvent {
            withdrawal_id,
            provider: requester,
            lp_amount,
        }));
        Ok(())
    }

    pub fn pool(&self) -> &LiquidityPool {
        &self.pool
    }

    pub fn share_price(&self) -> Decimal {
        self.pool.share_price()
    }

    pub fn shares_of(&self, provider: AccountId) -> ProviderShares {
        self.pool.shares_of(provider)
    }

    pub fn get_withdrawal(&self, withdrawal_id: WithdrawalId) -> Option<&WithdrawQueueItem> {
        self.queue.get(withdrawal_id)
    }

    pub fn withdrawal_queue(&self) -> Vec<&WithdrawQueueItem> {
        self.queue.items()
    }

    pub fn withdrawals_for(&self, provider: AccountId) -> Vec<&WithdrawQueueItem> {
        self.queue.items_for(provider)
    }

    pub fn pending_withdrawals(&self) -> usize {
        self.queue.pending_len()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LedgerConfig;
    use crate::engine::{Ledger, LedgerError};
    use crate::journal::FeeEventType;
    use crate::price_feed::MockPriceFeed;
    use crate::types::{AccountId, Bps, WithdrawalId};
    use crate::withdrawal::WithdrawStatus;

    fn ledger() -> Ledger {
        let mut ledger = Ledger::new(LedgerConfig::default(), Box::new(MockPriceFeed::new()));
        ledger.initialize_pool(10, 30, 1_000_000).unwrap();
        ledger
    }

    #[test]
    fn test_initialize_validation() {
        let mut ledger = Ledger::new(LedgerConfig::default(), Box::new(MockPriceFeed::new()));
        assert!(matches!(ledger.initialize_pool(1_001, 0, 1_000_000), Err(LedgerError::InvalidFeeRange { .. })));
        assert!(matches!(ledger.initialize_pool(0, 0, 50_000), Err(LedgerError::InvalidMinDeposit { .. })));
        assert!(matches!(ledger.deposit(AccountId(1), 1_000_000), Err(LedgerError::PoolNotInitialized)));

        ledger.initialize_pool(0, 0, 100_000).unwrap();
        assert!(matches!(ledger.initialize_pool(0, 0, 100_000), Err(LedgerError::AlreadyInitialized)));
    }

    #[test]
    fn test_deposit_records_fee() {
        let mut ledger = ledger();
        assert_eq!(ledger.deposit(AccountId(1), 10_000_000).unwrap(), 9_990_000);

        let stats = ledger.fee_stats(None);
        let added = stats[&FeeEventType::LiquidityAdded];
        assert_eq!(added.total_fees, 10_000);
        // 30% treasury share by default
        assert_eq!(added.total_fees_to_treasury, 3_000);
        assert_eq!(added.total_fees_to_blp, 7_000);
    }

    #[test]
    fn test_request_and_process() {
        let mut ledger = ledger();
        ledger.deposit(AccountId(1), 10_000_000).unwrap();

        let item = ledger.request_withdrawal(AccountId(1), 1_000_000).unwrap();
        assert_eq!(item.status, WithdrawStatus::Pending);
        // nothing moved yet
        assert_eq!(ledger.pool().total_liquidity, 9_990_000);

        let result = ledger.process_queue(10, false).unwrap();
        assert_eq!(result.items_processed, 1);
        assert_eq!(result.total_amount_processed, 997_000);
        assert_eq!(result.total_fees_collected, 3_000);
        assert!(result.deferred.is_empty());

        assert_eq!(ledger.pool().total_liquidity, 8_990_000);
        assert_eq!(ledger.pool().total_shares, 8_990_000);

        let item = ledger.get_withdrawal(item.id).unwrap();
        assert_eq!(item.status, WithdrawStatus::Completed);
        assert_eq!(item.amount_processed, Some(997_000));
        assert_eq!(item.fee_collected, Some(3_000));
    }

    #[test]
    fn test_request_more_than_free_shares() {
        let mut ledger = ledger();
        ledger.deposit(AccountId(1), 1_000_000).unwrap();
        ledger.request_withdrawal(AccountId(1), 600_000).unwrap();

        assert!(matches!(
            ledger.request_withdrawal(AccountId(1), 600_000),
            Err(LedgerError::InsufficientShares { available: 399_000, .. })
        ));
        assert!(matches!(
            ledger.request_withdrawal(AccountId(2), 1),
            Err(LedgerError::InsufficientShares { available: 0, .. })
        ));
    }

    #[test]
    fn test_buffer_defers_and_continues() {
        let mut config = LedgerConfig::default();
        config.pool.min_liquidity_buffer_bps = Bps::new(5_000);
        let mut ledger = Ledger::new(config, Box::new(MockPriceFeed::new()));
        ledger.initialize_pool(0, 0, 100_000).unwrap();
        ledger.deposit(AccountId(1), 800_000).unwrap();
        ledger.deposit(AccountId(2), 200_000).unwrap();

        // half the pool is reserved: 500_000 available
        let big = ledger.request_withdrawal(AccountId(1), 800_000).unwrap();
        let small = ledger.request_withdrawal(AccountId(2), 200_000).unwrap();

        let result = ledger.process_queue(10, false).unwrap();
        assert_eq!(result.items_processed, 1);
        assert_eq!(result.deferred.len(), 1);
        assert_eq!(result.deferred[0].withdrawal_id, big.id);
        assert!(matches!(result.deferred[0].reason, LedgerError::InsufficientLiquidity { .. }));

        assert!(ledger.get_withdrawal(big.id).unwrap().is_pending());
        assert_eq!(ledger.get_withdrawal(small.id).unwrap().status, WithdrawStatus::Completed);

        // force drains past the buffer
        let result = ledger.process_queue(10, true).unwrap();
        assert_eq!(result.items_processed, 1);
        assert_eq!(ledger.pool().total_liquidity, 0);
        assert_eq!(ledger.pool().total_shares, 0);
    }

    #[test]
    fn test_max_items_bounds_pass() {
        let mut ledger = ledger();
        ledger.deposit(AccountId(1), 10_000_000).unwrap();
        for _ in 0..3 {
            ledger.request_withdrawal(AccountId(1), 100_000).unwrap();
        }

        assert_eq!(ledger.process_queue(2, false).unwrap().items_processed, 2);
        assert_eq!(ledger.pending_withdrawals(), 1);
        assert_eq!(ledger.get_withdrawal(WithdrawalId(3)).unwrap().status, WithdrawStatus::Pending);
    }

    #[test]
    fn test_cancel_rules() {
        let mut ledger = ledger();
        ledger.deposit(AccountId(1), 2_000_000).unwrap();
        let item = ledger.request_withdrawal(AccountId(1), 500_000).unwrap();

        assert!(matches!(
            ledger.cancel_withdrawal(item.id, AccountId(2)),
            Err(LedgerError::Unauthorized { .. })
        ));
        ledger.cancel_withdrawal(item.id, AccountId(1)).unwrap();
        assert_eq!(ledger.shares_of(AccountId(1)).locked, 0);
        assert!(matches!(ledger.cancel_withdrawal(item.id, AccountId(1)), Err(LedgerError::NotPending(_))));

        // cancelled items are skipped
        assert_eq!(ledger.process_queue(10, false).unwrap().items_processed, 0);
        assert_eq!(ledger.get_withdrawal(item.id).unwrap().status, WithdrawStatus::Cancelled);
    }

    #[test]
    fn test_completed_item_cannot_cancel() {
        let mut ledger = ledger();
        ledger.deposit(AccountId(1), 2_000_000).unwrap();
        let item = ledger.request_withdrawal(AccountId(1), 500_000).unwrap();
        ledger.process_queue(1, false).unwrap();

        assert!(matches!(ledger.cancel_withdrawal(item.id, AccountId(1)), Err(LedgerError::NotPending(_))));
    }

    #[test]
    fn test_in_flight_item_leaves_pool_alone() {
        let mut ledger = ledger();
        ledger.deposit(AccountId(1), 2_000_000).unwrap();
        let item = ledger.request_withdrawal(AccountId(1), 500_000).unwrap();
        assert!(ledger.queue.get_mut(item.id).unwrap().begin_processing());

        // neither path may touch shares for an item that is no longer pending
        assert!(matches!(ledger.cancel_withdrawal(item.id, AccountId(1)), Err(LedgerError::NotPending(_))));
        assert_eq!(ledger.shares_of(AccountId(1)).locked, 500_000);

        assert_eq!(ledger.process_queue(10, false).unwrap().items_processed, 0);
        assert_eq!(ledger.pool().total_shares, 1_998_000);
        assert_eq!(ledger.get_withdrawal(item.id).unwrap().status, WithdrawStatus::Processing);
    }
}
