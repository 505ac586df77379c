//! Domain layer: ledger entries, money value objects and the ports the
//! application layer talks to.

pub mod filter;
pub mod money;
pub mod ports;
pub mod transaction;
