//! Signal Bridge
//!
//! Inter-process bridge between a trading-signal producer and a remote
//! execution agent:
//! - Signal model with validation and deterministic ids
//! - Bounded signal store with history and deduplication
//! - Line-delimited JSON request/response server with heartbeat tracking
//! - Producer-side pipeline from strategy decisions to signals

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;

pub use error::AppError;
