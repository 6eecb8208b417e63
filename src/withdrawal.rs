//! LP withdrawal queue.
//!
//! Requests are appended with a strictly increasing queue position and served
//! oldest first. Each item moves `Pending -> Processing -> Completed`, or
//! `Pending -> Cancelled`; the two terminal states never change again.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{AccountId, PoolId, Timestamp, WithdrawalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WithdrawStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl WithdrawStatus {
    pub fn can_transition_to(&self, next: WithdrawStatus) -> bool {
        use WithdrawStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Cancelled) | (Processing, Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawStatus::Completed | WithdrawStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawQueueItem {
    pub id: WithdrawalId,
    pub pool_id: PoolId,
    pub provider: AccountId,
    pub lp_amount: u64,
    /// Shares still waiting to be paid out
    pub remaining_lp: u64,
    pub queue_position: u64,
    pub status: WithdrawStatus,
    pub requested_at: Timestamp,
    pub processed_at: Option<Timestamp>,
    pub amount_processed: Option<u64>,
    pub fee_collected: Option<u64>,
}

impl WithdrawQueueItem {
    pub fn is_pending(&self) -> bool {
        self.status == WithdrawStatus::Pending
    }

    /// Returns false, leaving the item untouched, if the move is not allowed.
    fn transition(&mut self, next: WithdrawStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    pub fn begin_processing(&mut self) -> bool {
        self.transition(WithdrawStatus::Processing)
    }

    pub fn complete(&mut self, net_amount: u64, fee: u64, now: Timestamp) -> bool {
        if !self.transition(WithdrawStatus::Completed) {
            return false;
        }
        self.remaining_lp = 0;
        self.amount_processed = Some(net_amount);
        self.fee_collected = Some(fee);
        self.processed_at = Some(now);
        true
    }

    pub fn cancel(&mut self) -> bool {
        self.transition(WithdrawStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WithdrawalQueue {
    items: HashMap<WithdrawalId, WithdrawQueueItem>,
    next_queue_position: u64,
}

impl WithdrawalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail. Positions are never handed out twice, even after cancels.
    pub fn enqueue(
        &mut self,
        id: WithdrawalId,
        pool_id: PoolId,
        provider: AccountId,
        lp_amount: u64,
        now: Timestamp,
    ) -> &WithdrawQueueItem {
        let queue_position = self.next_queue_position;
        self.next_queue_position += 1;

        let item = WithdrawQueueItem {
            id,
            pool_id,
            provider,
            lp_amount,
            remaining_lp: lp_amount,
            queue_position,
            status: WithdrawStatus::Pending,
            requested_at: now,
            processed_at: None,
            amount_processed: None,
            fee_collected: None,
        };
        self.items.entry(id).or_insert(item)
    }

    pub fn get(&self, id: WithdrawalId) -> Option<&WithdrawQueueItem> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: WithdrawalId) -> Option<&mut WithdrawQueueItem> {
        self.items.get_mut(&id)
    }

    /// Pending item ids, lowest queue position first.
    pub fn pending_in_order(&self) -> Vec<WithdrawalId> {
        let mut pending: Vec<&WithdrawQueueItem> = self.items.values().filter(|i| i.is_pending()).collect();
        pending.sort_by_key(|i| i.queue_position);
        pending.into_iter().map(|i| i.id).collect()
    }

    /// Every item in queue order, terminal ones included.
    pub fn items(&self) -> Vec<&WithdrawQueueItem> {
        let mut all: Vec<&WithdrawQueueItem> = self.items.values().collect();
        all.sort_by_key(|i| i.queue_position);
        all
    }

    pub fn items_for(&self, provider: AccountId) -> Vec<&WithdrawQueueItem> {
        self.items().into_iter().filter(|i| i.provider == provider).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.items.values().filter(|i| i.is_pending()).count()
    }

    pub fn pending_shares(&self) -> u64 {
        self.items.values().filter(|i| i.is_pending()).map(|i| i.remaining_lp).sum()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
