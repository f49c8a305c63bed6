//! Executor boundary - client for the remote action-execution service
//!
//! This module provides:
//! - ExecutorClient trait for the service boundary
//! - HttpExecutorClient implementation over reqwest
//! - Error detail formatting for executor responses

pub mod client;
pub mod http;

pub use client::{ActionErrorInfo, ExecutorClient, ExecutorError, ValidateResponse, format_error_detail};
pub use http::{HttpExecutorClient, HttpExecutorConfig};
