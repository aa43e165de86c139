//! Testing utilities and helpers
//!
//! Mock implementations of the auth seams, shared by unit tests in this
//! crate and by the API crate's integration tests.

pub mod mocks;

pub use mocks::{CountingOAuthClient, MockCredentialStore};
