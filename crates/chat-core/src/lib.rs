//! # chat-core
//!
//! Core types and utilities for the chat client.
//!
//! This crate provides the building blocks shared by the other crates:
//! - Attachment intake configuration (compression settings, size ceilings)
//! - A live settings handle the host can update at runtime
//! - Byte-size helpers

pub mod config;
pub mod units;

pub use config::*;
pub use units::*;
