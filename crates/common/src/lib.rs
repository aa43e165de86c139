//! Shared OAuth session core for the Monzo feed service.
//!
//! This crate owns the upstream authentication lifecycle: building the
//! authorization redirect, exchanging authorization codes, refreshing and
//! persisting tokens, and the file-backed credential store. HTTP calls to
//! the Monzo REST surface itself live in `ledgerlink-infra` and consume this
//! crate through the [`auth::TokenManager`].

pub mod auth;
pub mod testing;
