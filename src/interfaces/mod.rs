//! Outer surface: CSV operation replay and the session that drives it.

pub mod csv;
pub mod session;
