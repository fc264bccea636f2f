//! # Dashboard Shared
//!
//! Wire types shared by the dashboard server and its front-end.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse};
