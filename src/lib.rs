//! Core library for the `surge` CLI.
//!
//! The binary drives HTTP load at a fixed concurrency or a fixed request
//! rate. This crate exposes its building blocks: argument and config types,
//! request sources, the connection manager and dispatcher, and the stats
//! aggregator with its interval reporter.
pub mod args;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod shutdown;
pub mod source;
