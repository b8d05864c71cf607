//! Shared test utilities for the contract testing workspace.
//!
//! This crate provides:
//! - Proptest generators for matchers, interactions and contracts
//! - Mock broker and provider state implementations
//! - Fixtures for the hello interactions used across the suites

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
