//! LP Backends
//!
//! - Clarabel: pure-Rust interior-point solver through `good_lp` (feature `optimization`)

#[cfg(feature = "optimization")]
pub mod clarabel;

#[cfg(feature = "optimization")]
pub use self::clarabel::ClarabelSolver;
