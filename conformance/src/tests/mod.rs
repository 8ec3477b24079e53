//! Shared test material.
//!
//! Fixture documents are public so the integration tests under `tests/` can
//! use the same payloads as the unit tests.

pub mod fixtures;
