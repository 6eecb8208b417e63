// 8.0: the ledger core. coordinates orders, positions, funding indexes, the
// liquidity pool and its withdrawal queue, and the fee journal.
// deterministic: time only moves through set_time / advance_time.

mod core;
mod funding;
mod journal;
mod orders;
mod pool;
mod positions;
mod results;
mod shared;

pub use core::{Ledger, LedgerSnapshot};
pub use results::{CloseResult, DeferredWithdrawal, LedgerError, LiquidationResult, ProcessingResult};
pub use shared::SharedLedger;
