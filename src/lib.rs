//! Pricing controller: keeps spot and on-demand compute prices fresh.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod pricing;
pub mod controller;
