//! Recurring overdue scan.

use std::sync::Arc;
use std::time::Duration;

use kassa_shared::config::SchedulerConfig;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::ledger::StoreError;
use crate::loan::ScheduleStore;

/// Outcome of one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Rows the overdue query returned.
    pub found: usize,
    /// Rows moved to `overdue`.
    pub marked: usize,
    /// Rows whose update failed.
    pub failed: usize,
}

/// Marks lapsed payments overdue on a fixed interval.
pub struct OverdueScheduler<S: ScheduleStore, C: Clock> {
    store: Arc<S>,
    clock: Arc<C>,
    interval: Duration,
}

impl<S: ScheduleStore, C: Clock> OverdueScheduler<S, C> {
    /// Create a scheduler that scans every `interval`.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval,
        }
    }

    /// Create a scheduler from configuration.
    #[must_use]
    pub fn from_config(store: Arc<S>, clock: Arc<C>, config: &SchedulerConfig) -> Self {
        Self::new(store, clock, Duration::from_secs(config.overdue_interval_secs))
    }

    /// Run one scan.
    ///
    /// A failed row update is logged and counted; the remaining rows are
    /// still processed. Only a failure of the query itself is returned.
    pub async fn scan(&self) -> Result<ScanReport, StoreError> {
        self.scan_until(&CancellationToken::new()).await
    }

    /// Scan immediately, then once per interval until `token` is cancelled.
    pub async fn run(&self, token: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Starting overdue payment checker");
        self.scan_logged(&token).await;

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => self.scan_logged(&token).await,
            }
        }
        info!("Overdue payment checker stopped");
    }

    /// Run on a background task. Await the handle after cancelling `token`.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()>
    where
        S: 'static,
        C: 'static,
    {
        tokio::spawn(async move { self.run(token).await })
    }

    async fn scan_logged(&self, token: &CancellationToken) {
        match self.scan_until(token).await {
            Ok(report) => info!(
                found = report.found,
                marked = report.marked,
                failed = report.failed,
                "Overdue scan finished"
            ),
            Err(e) => error!(error = %e, "Error checking overdue payments"),
        }
    }

    async fn scan_until(&self, token: &CancellationToken) -> Result<ScanReport, StoreError> {
        let now = self.clock.now();
        debug!(%now, "Checking for overdue payments");

        let candidates = self.store.get_overdue(now).await?;
        let mut report = ScanReport {
            found: candidates.len(),
            ..ScanReport::default()
        };

        for payment in candidates {
            if token.is_cancelled() {
                debug!("Overdue scan cancelled");
                break;
            }
            if !payment.can_become_overdue(now) {
                continue;
            }
            match self.store.mark_overdue(payment.id).await {
                Ok(true) => {
                    report.marked += 1;
                    debug!(payment_id = %payment.id, loan_id = %payment.loan_id, "Payment marked overdue");
                }
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    error!(payment_id = %payment.id, error = %e, "Failed to mark payment overdue");
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::loan::{Loan, LoanStore, PaymentStatus, ScheduleStore, ScheduledPayment};
    use crate::memory::InMemoryLoanStore;
    use chrono::{DateTime, TimeZone, Utc};
    use kassa_shared::types::{AccountId, LoanId, Money, PaymentId, UserId};
    use rust_decimal::Decimal;

    const TWELVE_HOURS: Duration = Duration::from_secs(43_200);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    fn payment(loan_id: LoanId, due_date: DateTime<Utc>) -> ScheduledPayment {
        ScheduledPayment {
            id: PaymentId::new(),
            loan_id,
            amount: Money::from_minor(1_000),
            paid_date: None,
            due_date,
            principal_part: Money::from_minor(900),
            interest_part: Money::from_minor(100),
            status: PaymentStatus::New,
            is_paid: false,
        }
    }

    /// A loan with one payment due each of the given days relative to `now()`.
    async fn seed(store: &InMemoryLoanStore, day_offsets: &[i64]) -> Vec<PaymentId> {
        let loan_id = LoanId::new();
        let payments: Vec<_> = day_offsets
            .iter()
            .map(|d| payment(loan_id, now() + chrono::Duration::days(*d)))
            .collect();
        let ids = payments.iter().map(|p| p.id).collect();
        let loan = Loan {
            id: loan_id,
            user_id: UserId::new(),
            account_id: AccountId::new(),
            amount: Money::from_minor(10_000),
            interest_rate: Decimal::ZERO,
            term: u32::try_from(day_offsets.len()).unwrap(),
            start_date: now(),
            debt: Money::from_minor(10_000),
            payments,
        };
        store.create_with_schedule(&loan).await.unwrap();
        ids
    }

    fn overdue_count(store: &InMemoryLoanStore) -> usize {
        store
            .payments()
            .iter()
            .filter(|p| p.status == PaymentStatus::Overdue)
            .count()
    }

    fn scheduler(
        store: &Arc<InMemoryLoanStore>,
        clock: &Arc<FixedClock>,
    ) -> OverdueScheduler<InMemoryLoanStore, FixedClock> {
        OverdueScheduler::new(Arc::clone(store), Arc::clone(clock), TWELVE_HOURS)
    }

    #[tokio::test]
    async fn test_scan_marks_only_lapsed_rows() {
        let store = Arc::new(InMemoryLoanStore::new());
        let clock = Arc::new(FixedClock::new(now()));
        seed(&store, &[-30, -1, 0, 1, 30]).await;

        let report = scheduler(&store, &clock).scan().await.unwrap();

        assert_eq!(
            report,
            ScanReport {
                found: 2,
                marked: 2,
                failed: 0
            }
        );
        assert_eq!(overdue_count(&store), 2);
    }

    #[tokio::test]
    async fn test_second_scan_is_noop() {
        let store = Arc::new(InMemoryLoanStore::new());
        let clock = Arc::new(FixedClock::new(now()));
        seed(&store, &[-3, -2, 5]).await;
        let scheduler = scheduler(&store, &clock);

        assert_eq!(scheduler.scan().await.unwrap().marked, 2);
        let again = scheduler.scan().await.unwrap();
        assert_eq!(again, ScanReport::default());
        assert_eq!(overdue_count(&store), 2);
    }

    #[tokio::test]
    async fn test_paid_rows_are_never_touched() {
        let store = Arc::new(InMemoryLoanStore::new());
        let clock = Arc::new(FixedClock::new(now()));
        let ids = seed(&store, &[-10, -5]).await;
        store.settle(ids[0], now()).unwrap();

        let report = scheduler(&store, &clock).scan().await.unwrap();
        assert_eq!(report.marked, 1);

        let paid = store.payments().into_iter().find(|p| p.id == ids[0]).unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert!(paid.is_paid);
    }

    #[tokio::test]
    async fn test_row_failure_does_not_abort_scan() {
        let store = Arc::new(InMemoryLoanStore::new());
        let clock = Arc::new(FixedClock::new(now()));
        let ids = seed(&store, &[-3, -2, -1]).await;
        store.fail_update_of(ids[1]);
        let scheduler = scheduler(&store, &clock);

        let report = scheduler.scan().await.unwrap();
        assert_eq!(
            report,
            ScanReport {
                found: 3,
                marked: 2,
                failed: 1
            }
        );

        store.clear_faults();
        let retry = scheduler.scan().await.unwrap();
        assert_eq!(retry.marked, 1);
        assert_eq!(overdue_count(&store), 3);
    }

    #[tokio::test]
    async fn test_query_failure_is_reported() {
        let store = Arc::new(InMemoryLoanStore::new());
        let clock = Arc::new(FixedClock::new(now()));
        store.fail_overdue_query();

        assert!(scheduler(&store, &clock).scan().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_scans_at_start_and_every_interval() {
        let store = Arc::new(InMemoryLoanStore::new());
        let clock = Arc::new(FixedClock::new(now()));
        seed(&store, &[-1, 3, 10]).await;

        let token = CancellationToken::new();
        let handle = scheduler(&store, &clock).spawn(token.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(overdue_count(&store), 1);

        clock.advance(chrono::Duration::days(5));
        tokio::time::sleep(TWELVE_HOURS).await;
        assert_eq!(overdue_count(&store), 2);

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_query_failure() {
        let store = Arc::new(InMemoryLoanStore::new());
        let clock = Arc::new(FixedClock::new(now()));
        seed(&store, &[-1]).await;
        store.fail_overdue_query();

        let token = CancellationToken::new();
        let handle = scheduler(&store, &clock).spawn(token.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(overdue_count(&store), 0);

        store.clear_faults();
        tokio::time::sleep(TWELVE_HOURS).await;
        assert_eq!(overdue_count(&store), 1);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_before_start_marks_nothing() {
        let store = Arc::new(InMemoryLoanStore::new());
        let clock = Arc::new(FixedClock::new(now()));
        seed(&store, &[-2, -1]).await;

        let token = CancellationToken::new();
        token.cancel();
        scheduler(&store, &clock).run(token).await;

        assert_eq!(overdue_count(&store), 0);
    }

    /// Cancels the run as soon as the first row is marked.
    struct CancelOnMark {
        inner: Arc<InMemoryLoanStore>,
        token: CancellationToken,
    }

    impl ScheduleStore for CancelOnMark {
        async fn get_by_loan(&self, loan_id: LoanId) -> Result<Vec<ScheduledPayment>, StoreError> {
            self.inner.get_by_loan(loan_id).await
        }

        async fn get_overdue(
            &self,
            now: DateTime<Utc>,
        ) -> Result<Vec<ScheduledPayment>, StoreError> {
            self.inner.get_overdue(now).await
        }

        async fn mark_overdue(&self, id: PaymentId) -> Result<bool, StoreError> {
            let marked = self.inner.mark_overdue(id).await;
            self.token.cancel();
            marked
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_scan_stops_after_row_in_flight() {
        let inner = Arc::new(InMemoryLoanStore::new());
        let clock = Arc::new(FixedClock::new(now()));
        seed(&inner, &[-3, -2, -1]).await;

        let token = CancellationToken::new();
        let store = Arc::new(CancelOnMark {
            inner: Arc::clone(&inner),
            token: token.clone(),
        });
        let scheduler = OverdueScheduler::new(store, clock, TWELVE_HOURS);

        let report = scheduler.scan_until(&token).await.unwrap();
        assert_eq!(
            report,
            ScanReport {
                found: 3,
                marked: 1,
                failed: 0
            }
        );
        assert_eq!(overdue_count(&inner), 1);

        tokio::time::timeout(Duration::from_secs(1), scheduler.run(token))
            .await
            .unwrap();
        assert_eq!(overdue_count(&inner), 1);
    }
}
