//! Thread-safe handle around a ledger.
//!
//! Reads take the read lock and see a consistent snapshot; every mutation,
//! including a whole `process_queue` pass, runs under the write lock.

use super::core::Ledger;
use super::results::LedgerError;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
pub struct SharedLedger {
    inner: Arc<RwLock<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&Ledger) -> R) -> Result<R, LedgerError> {
        let ledger = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(f(&ledger))
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Ledger) -> Result<R, LedgerError>) -> Result<R, LedgerError> {
        let mut ledger = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;
        f(&mut ledger)
    }
}
