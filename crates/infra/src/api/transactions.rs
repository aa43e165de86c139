//! Transaction history retrieval
//!
//! The transactions endpoint caps pages at 100 items and rejects queries
//! spanning more than one year. [`TransactionPager`] walks a sliding
//! one-year window over the account history, switching to a cursor (the id
//! of the last transaction seen) whenever a page comes back full, so the
//! complete history is retrieved without gaps regardless of how dense or
//! sparse it is.
//!
//! Page fetching sits behind [`TransactionPageSource`] so the traversal
//! logic is exercised against synthetic histories in tests.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Days, Months, NaiveTime, SecondsFormat, Utc};
use futures::future::try_join_all;
use serde::Deserialize;
use tracing::debug;

use super::errors::ApiError;

/// Maximum page size accepted by the transactions endpoint
pub const PAGE_LIMIT: u32 = 100;

/// Merchant details, present when the merchant expansion is requested
#[derive(Debug, Clone, Deserialize)]
pub struct Merchant {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Counterparty of a bank transfer, when present
#[derive(Debug, Clone, Deserialize)]
pub struct Counterparty {
    pub name: Option<String>,
    pub account_number: Option<String>,
    pub sort_code: Option<String>,
}

/// A single ledger entry
///
/// Amounts are in minor units (pence for GBP); spending is negative.
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    pub merchant: Option<Merchant>,
    pub counterparty: Option<Counterparty>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub amount_is_pending: bool,
    pub decline_reason: Option<String>,
}

impl Transaction {
    /// A transaction the upstream declined; it never settled
    #[must_use]
    pub fn is_declined(&self) -> bool {
        self.decline_reason.as_deref().is_some_and(|reason| !reason.is_empty())
    }
}

/// Caller-chosen filters applied after the full history is assembled
///
/// The default keeps pending transactions and drops declined ones.
#[derive(Debug, Clone, Copy)]
pub struct TransactionFilter {
    pub include_pending: bool,
    pub include_declined: bool,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self { include_pending: true, include_declined: false }
    }
}

impl TransactionFilter {
    fn retains(&self, tx: &Transaction) -> bool {
        if !self.include_pending && tx.amount_is_pending {
            return false;
        }
        if !self.include_declined && tx.is_declined() {
            return false;
        }
        true
    }
}

/// Source of raw transaction pages
///
/// `since` is either an RFC 3339 timestamp (window start) or a transaction
/// id (cursor, exclusive). `before` is always a timestamp.
#[async_trait]
pub trait TransactionPageSource: Send + Sync {
    /// Fetch one page of transactions for an account
    ///
    /// # Errors
    /// Implementations surface transport and upstream failures as
    /// [`ApiError`]
    async fn fetch_page(
        &self,
        account_id: &str,
        since: &str,
        before: &str,
        limit: u32,
    ) -> Result<Vec<Transaction>, ApiError>;
}

/// One query window within the year-span cap
///
/// The window covers `[start, end]` where `end` is one year after `start`
/// minus a day, keeping the span strictly inside the cap. When `cursor` is
/// set it replaces `start` as the `since` parameter and pagination resumes
/// just after that transaction.
#[derive(Debug, Clone)]
pub struct TransactionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub cursor: Option<String>,
}

impl TransactionWindow {
    fn span_end(start: DateTime<Utc>) -> DateTime<Utc> {
        start + Months::new(12) - Days::new(1)
    }

    /// Window beginning at `start` with no cursor
    #[must_use]
    pub fn anchored(start: DateTime<Utc>) -> Self {
        Self { start, end: Self::span_end(start), cursor: None }
    }

    /// Slide the whole window forward one year; used when a window turned
    /// out to be empty
    pub fn advance_year(&mut self) {
        self.start = self.start + Months::new(12);
        self.end = Self::span_end(self.start);
        self.cursor = None;
    }

    /// Re-anchor on the last transaction seen so the next page resumes
    /// right after it
    pub fn reanchor(&mut self, id: String, created: DateTime<Utc>) {
        self.start = created;
        self.end = Self::span_end(created);
        self.cursor = Some(id);
    }

    fn since_param(&self) -> String {
        match &self.cursor {
            Some(id) => id.clone(),
            None => format_ts(self.start),
        }
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Default history start: midnight UTC one month before now
#[must_use]
pub fn default_since() -> DateTime<Utc> {
    Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc() - Months::new(1)
}

/// Walks complete transaction histories through a [`TransactionPageSource`]
pub struct TransactionPager<S: TransactionPageSource> {
    source: Arc<S>,
}

impl<S: TransactionPageSource> TransactionPager<S> {
    #[must_use]
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Retrieve the full history of one account from `since` to now
    ///
    /// Each iteration fetches one page for the current window, then either
    /// terminates (short page in a window reaching now), slides the window
    /// a year forward (empty page) or re-anchors on the last transaction
    /// seen. Transactions arrive in upstream order, oldest first.
    ///
    /// # Errors
    /// Propagates the first page-fetch failure; no partial retry happens
    pub async fn account_history(
        &self,
        account_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, ApiError> {
        let mut window = TransactionWindow::anchored(since);
        let mut history = Vec::new();
        let mut pages = 0usize;

        loop {
            let page = self
                .source
                .fetch_page(account_id, &window.since_param(), &format_ts(window.end), PAGE_LIMIT)
                .await?;
            pages += 1;

            let full_page = page.len() >= PAGE_LIMIT as usize;
            let last = page.last().map(|tx| (tx.id.clone(), tx.created));
            debug!(
                account_id,
                page_len = page.len(),
                window_start = %window.start,
                window_end = %window.end,
                "Fetched transaction page"
            );
            history.extend(page);

            // A short page in a window already reaching now means the
            // history is complete
            if !full_page && window.end >= Utc::now() {
                break;
            }

            match last {
                None => window.advance_year(),
                Some((id, created)) => window.reanchor(id, created),
            }
        }

        debug!(account_id, total = history.len(), pages, "Account history complete");

        Ok(history)
    }

    /// Retrieve, merge and filter the histories of several accounts
    ///
    /// Accounts are fetched concurrently. The merged result is
    /// deduplicated by transaction id and ordered by creation time, with
    /// the id as a tiebreaker so the order is stable.
    ///
    /// # Errors
    /// Fails if any account's history fails; no partial result is returned
    pub async fn history(
        &self,
        account_ids: &[String],
        since: Option<DateTime<Utc>>,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, ApiError> {
        let since = since.unwrap_or_else(default_since);

        let fetches = account_ids.iter().map(|id| self.account_history(id, since));
        let histories = try_join_all(fetches).await?;

        let mut seen = HashSet::new();
        let mut merged: Vec<Transaction> = histories
            .into_iter()
            .flatten()
            .filter(|tx| seen.insert(tx.id.clone()))
            .collect();

        merged.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        merged.retain(|tx| filter.retains(tx));

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for api::transactions.
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{Duration, TimeZone};

    use super::*;

    /// In-memory page source over a pre-sorted synthetic ledger
    ///
    /// Mirrors the upstream contract: `since` parses as a timestamp
    /// (inclusive) or falls back to a transaction id (exclusive cursor),
    /// `before` bounds `created`, pages truncate at `limit`.
    struct FakeSource {
        ledger: Vec<Transaction>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(mut ledger: Vec<Transaction>) -> Self {
            ledger.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
            Self { ledger, calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TransactionPageSource for FakeSource {
        async fn fetch_page(
            &self,
            account_id: &str,
            since: &str,
            before: &str,
            limit: u32,
        ) -> Result<Vec<Transaction>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let before = DateTime::parse_from_rfc3339(before)
                .map_err(|e| ApiError::Parse(e.to_string()))?
                .with_timezone(&Utc);

            let start = match DateTime::parse_from_rfc3339(since) {
                Ok(ts) => {
                    let ts = ts.with_timezone(&Utc);
                    self.ledger.partition_point(|tx| tx.created < ts)
                }
                Err(_) => self
                    .ledger
                    .iter()
                    .position(|tx| tx.id == since)
                    .map_or(self.ledger.len(), |i| i + 1),
            };

            Ok(self.ledger[start..]
                .iter()
                .filter(|tx| tx.account_id == account_id && tx.created <= before)
                .take(limit as usize)
                .cloned()
                .collect())
        }
    }

    fn tx(n: usize, created: DateTime<Utc>) -> Transaction {
        Transaction {
            id: format!("tx_{n:05}"),
            created,
            description: format!("purchase {n}"),
            amount: -150,
            currency: "GBP".to_string(),
            merchant: None,
            counterparty: None,
            notes: String::new(),
            category: "general".to_string(),
            account_id: "acc_1".to_string(),
            amount_is_pending: false,
            decline_reason: None,
        }
    }

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn pager_over(ledger: Vec<Transaction>) -> (TransactionPager<FakeSource>, Arc<FakeSource>) {
        let source = Arc::new(FakeSource::new(ledger));
        (TransactionPager::new(source.clone()), source)
    }

    #[test]
    fn test_window_span_stays_inside_the_year_cap() {
        let window = TransactionWindow::anchored(at(2021, 3, 15));
        assert_eq!(window.end, at(2022, 3, 14));
        assert!(window.cursor.is_none());
    }

    #[test]
    fn test_reanchor_sets_cursor_and_extends_the_window() {
        let mut window = TransactionWindow::anchored(at(2021, 1, 1));
        window.reanchor("tx_00099".to_string(), at(2021, 11, 20));

        assert_eq!(window.cursor.as_deref(), Some("tx_00099"));
        assert_eq!(window.start, at(2021, 11, 20));
        assert_eq!(window.end, at(2022, 11, 19));
        assert_eq!(window.since_param(), "tx_00099");
    }

    #[test]
    fn test_advance_clears_cursor() {
        let mut window = TransactionWindow::anchored(at(2021, 1, 1));
        window.reanchor("tx_00001".to_string(), at(2021, 6, 1));
        window.advance_year();

        assert!(window.cursor.is_none());
        assert_eq!(window.start, at(2022, 6, 1));
    }

    #[tokio::test]
    async fn test_dense_history_is_retrieved_without_gaps() {
        // 30 months of activity, 9 transactions each: several windows hit
        // the page cap and force cursor pagination
        let base = at(2021, 1, 3);
        let ledger: Vec<Transaction> = (0..270)
            .map(|n| tx(n, base + Months::new((n / 9) as u32) + Days::new((n % 9) as u64 * 2)))
            .collect();
        let (pager, _source) = pager_over(ledger);

        let history = pager.account_history("acc_1", at(2021, 1, 1)).await.unwrap();

        assert_eq!(history.len(), 270);
        let ids: HashSet<&str> = history.iter().map(|tx| tx.id.as_str()).collect();
        assert_eq!(ids.len(), 270);
        assert!(history.windows(2).all(|pair| pair[0].created <= pair[1].created));
    }

    #[tokio::test]
    async fn test_sparse_history_bridges_a_year_long_gap() {
        let mut ledger: Vec<Transaction> = (0..5).map(|n| tx(n, at(2021, 2, 3 + n as u32))).collect();
        ledger.extend((5..10).map(|n| tx(n, at(2022, 9, n as u32))));
        let (pager, _source) = pager_over(ledger);

        let history = pager.account_history("acc_1", at(2021, 1, 1)).await.unwrap();

        assert_eq!(history.len(), 10);
        assert_eq!(history[4].created, at(2021, 2, 7));
        assert_eq!(history[5].created, at(2022, 9, 5));
    }

    #[tokio::test]
    async fn test_full_page_resumes_after_the_cursor() {
        // 103 recent transactions: one full page, then a short page in a
        // window that already reaches now
        let base = Utc::now() - Days::new(20);
        let ledger: Vec<Transaction> =
            (0..103).map(|n| tx(n, base + Duration::minutes(n as i64))).collect();
        let (pager, source) = pager_over(ledger);

        let history =
            pager.account_history("acc_1", Utc::now() - Days::new(25)).await.unwrap();

        assert_eq!(history.len(), 103);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_recent_history_takes_a_single_page() {
        let (pager, source) = pager_over(Vec::new());

        let history =
            pager.account_history("acc_1", Utc::now() - Days::new(10)).await.unwrap();

        assert!(history.is_empty());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_merged_history_is_deduplicated_and_ordered() {
        let base = Utc::now() - Days::new(10);
        let mut shared = tx(0, base + Duration::hours(5));
        shared.account_id = "acc_2".to_string();

        let mut ledger = vec![
            tx(0, base + Duration::hours(5)),
            tx(1, base + Duration::hours(1)),
            tx(3, base + Duration::hours(9)),
            shared,
        ];
        let mut other = tx(2, base + Duration::hours(3));
        other.account_id = "acc_2".to_string();
        ledger.push(other);
        let (pager, _source) = pager_over(ledger);

        let accounts = vec!["acc_1".to_string(), "acc_2".to_string()];
        let history = pager
            .history(&accounts, Some(base - Duration::hours(1)), TransactionFilter::default())
            .await
            .unwrap();

        // tx_00000 appears under both accounts but survives only once
        let ids: Vec<&str> = history.iter().map(|tx| tx.id.as_str()).collect();
        assert_eq!(ids, vec!["tx_00001", "tx_00002", "tx_00000", "tx_00003"]);
    }

    #[tokio::test]
    async fn test_filters_drop_pending_and_declined_entries() {
        let base = Utc::now() - Days::new(5);
        let mut pending = tx(1, base + Duration::hours(1));
        pending.amount_is_pending = true;
        let mut declined = tx(2, base + Duration::hours(2));
        declined.decline_reason = Some("INSUFFICIENT_FUNDS".to_string());
        let ledger = vec![tx(0, base), pending, declined];
        let (pager, _source) = pager_over(ledger);

        let accounts = vec!["acc_1".to_string()];

        // Default: pending kept, declined dropped
        let history = pager
            .history(&accounts, Some(base - Duration::hours(1)), TransactionFilter::default())
            .await
            .unwrap();
        let ids: Vec<&str> = history.iter().map(|tx| tx.id.as_str()).collect();
        assert_eq!(ids, vec!["tx_00000", "tx_00001"]);

        // Settled entries only
        let settled = pager
            .history(
                &accounts,
                Some(base - Duration::hours(1)),
                TransactionFilter { include_pending: false, include_declined: false },
            )
            .await
            .unwrap();
        assert_eq!(settled.len(), 1);

        // Everything, declines included
        let all = pager
            .history(
                &accounts,
                Some(base - Duration::hours(1)),
                TransactionFilter { include_pending: true, include_declined: true },
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_declined_requires_a_non_empty_reason() {
        let mut entry = tx(0, at(2024, 1, 1));
        assert!(!entry.is_declined());
        entry.decline_reason = Some(String::new());
        assert!(!entry.is_declined());
        entry.decline_reason = Some("CARD_BLOCKED".to_string());
        assert!(entry.is_declined());
    }

    #[test]
    fn test_default_since_is_midnight_a_month_back() {
        let since = default_since();
        assert_eq!(since.time(), NaiveTime::MIN);

        let age = Utc::now() - since;
        assert!(age >= Duration::days(28) && age <= Duration::days(32));
    }

    #[test]
    fn test_transaction_wire_format() {
        let entry: Transaction = serde_json::from_str(
            r#"{
                "id": "tx_0000A",
                "created": "2024-05-01T08:30:00.000Z",
                "amount": -350,
                "currency": "GBP",
                "description": "COFFEE SHOP",
                "merchant": {"id": "merch_1", "name": "Coffee Shop", "category": "eating_out"},
                "account_id": "acc_1",
                "decline_reason": null,
                "settled": "2024-05-02T00:00:00.000Z"
            }"#,
        )
        .unwrap();

        assert_eq!(entry.id, "tx_0000A");
        assert_eq!(entry.amount, -350);
        assert!(!entry.amount_is_pending);
        assert_eq!(entry.merchant.unwrap().name.as_deref(), Some("Coffee Shop"));
    }
}
