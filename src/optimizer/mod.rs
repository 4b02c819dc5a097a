//! Dispatch optimization
//!
//! - [`lp`]: solver-independent linear program representation
//! - [`constraints`]: constraint families and shadow-price lookup
//! - [`model`]: the parametrized dispatch model builder
//! - [`result`]: normalized result records
//! - [`solver`]: the solver contract and a wall-clock limit wrapper
//! - [`strategies`]: concrete LP backends

pub mod constraints;
pub mod lp;
pub mod model;
pub mod result;
pub mod solver;
pub mod strategies;

pub use constraints::*;
pub use lp::*;
pub use model::*;
pub use result::*;
pub use solver::*;
pub use strategies::*;
