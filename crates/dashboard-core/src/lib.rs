//! # Dashboard Core
//!
//! The domain layer of the backtest dashboard.
//! This crate contains the admission-control vocabulary, the backtest
//! request/result model, and the ports that infrastructure implements.
//! It performs no I/O of its own.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::{DomainError, StoreError};
