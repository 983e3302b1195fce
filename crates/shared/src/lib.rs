//! Shared utilities and common types for the jobsync backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Webhook signature computation and verification (HMAC-SHA256)

pub mod signature;
