//! Integration test crate for medchain.
//!
//! This crate has no library code. It only contains integration tests
//! that exercise end-to-end marketplace flows across the workspace crates,
//! using in-memory or on-disk stores and the mock collaborators from
//! `medchain_market::testing`.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p medchain-integration-tests
//! ```
