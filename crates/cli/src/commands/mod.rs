//! Command implementations.

mod run;
mod validate;

pub use run::run_service;
pub use validate::run_validate;
