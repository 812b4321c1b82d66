//! # tb_app
//!
//! Shared utilities for applications throttled by `tb_bucket`

pub mod cli;
pub mod config_loader;
pub mod dispatcher;
pub mod shutdown_handler;
pub mod tracing_setup;
