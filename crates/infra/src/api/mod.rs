//! Monzo API client
//!
//! This module provides the authenticated HTTP surface over the Monzo REST
//! API. All bearer-token handling funnels through [`ApiClient`]; no other
//! component attaches tokens directly.
//!
//! # Architecture
//!
//! - OAuth session state lives in `ledgerlink-common` and is consumed here
//!   through the [`AccessTokenProvider`] seam
//! - Exactly one automatic retry exists per request, and only for an
//!   authorization refresh; nothing else is retried
//! - Transaction history traversal is isolated behind
//!   [`TransactionPageSource`] so the window algorithm is testable without
//!   HTTP

pub mod auth;
pub mod client;
pub mod errors;
pub mod transactions;

pub use auth::AccessTokenProvider;
pub use client::{Account, ApiClient, ApiClientConfig, WhoAmI};
pub use errors::ApiError;
pub use transactions::{
    default_since, Counterparty, Merchant, Transaction, TransactionFilter,
    TransactionPageSource, TransactionPager, PAGE_LIMIT,
};
