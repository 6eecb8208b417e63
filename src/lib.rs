// baskt-ledger: ledger core for index-basket perpetuals traded against a shared
// liquidity pool. orders become positions, positions pay funding against a
// per-basket index, LPs deposit and leave through a FIFO withdrawal queue.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: ids, Side, Price, Bps, Timestamp
//   2.x  math.rs: checked u128 mul-div, bps, fee split
//   3.x  order.rs: order intents and the order book
//   3.1x margin.rs: maintenance check, liquidation price
//   4.x  position.rs: position struct, PnL, funding checkpoints
//   5.x  funding.rs: per-basket cumulative funding index
//   6.x  pool.rs: BLP pool share accounting
//   6.5  withdrawal.rs: FIFO withdrawal queue
//   7.x  config.rs: fees, oracle, funding, margin, pool, env presets
//   8.x  engine/: the Ledger: orders, positions, funding, pool, journal
//   9.x  price_feed.rs: oracle quote validation + mock feed
//   10.x journal.rs: append-only fee journal and stats
//   11.x events.rs: state transition events for audit

// core ledger modules
pub mod engine;
pub mod events;
pub mod funding;
pub mod margin;
pub mod math;
pub mod order;
pub mod position;
pub mod types;

// pool modules
pub mod journal;
pub mod pool;
pub mod withdrawal;

// integration modules
pub mod config;
pub mod price_feed;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use funding::*;
pub use journal::*;
pub use margin::*;
pub use order::*;
pub use pool::*;
pub use position::*;
pub use types::*;
pub use withdrawal::*;
pub use config::{Environment, FeeConfig, FundingConfig, LedgerConfig, MarginConfig, OracleConfig, PoolDefaults};
pub use price_feed::{MockPriceFeed, PriceFeedError, PriceOracleFeed, PriceQuote};
