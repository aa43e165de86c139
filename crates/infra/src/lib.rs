//! # Ledgerlink Infrastructure
//!
//! Monzo REST surface built on the OAuth session core:
//!
//! - Authenticated request executor with a bounded refresh-and-retry cycle
//! - Account listing and identity probe endpoints
//! - Windowed transaction pagination across page-size and time-span caps

pub mod api;

pub use api::{
    AccessTokenProvider, Account, ApiClient, ApiClientConfig, ApiError, Transaction,
    TransactionFilter, TransactionPageSource, TransactionPager, WhoAmI,
};
