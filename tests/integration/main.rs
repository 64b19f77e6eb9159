//! Integration tests for the pricing reconciler and its singleton host.

mod file_source;
mod singleton;
