//! Property-based tests for the amortization engine.
//!
//! - Exactness: principal portions sum to the loan principal
//! - Every row's amount is its principal plus its interest
//! - Zero rate: flat principal, no interest
//! - Shape: at most `term` rows, strictly increasing due dates

use chrono::{TimeZone, Utc};
use kassa_shared::types::{LoanId, Money};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::engine::{LoanTerms, generate_schedule};

/// Principal from one cent to 100,000.00.
fn principal_strategy() -> impl Strategy<Value = i64> {
    1i64..=10_000_000i64
}

/// Annual rate from 0.00% to 30.00%.
fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=3_000i64).prop_map(|bp| Decimal::new(bp, 2))
}

/// Term from one month to thirty years.
fn term_strategy() -> impl Strategy<Value = u32> {
    1u32..=360u32
}

fn terms(principal: i64, rate: Decimal, term: u32) -> LoanTerms {
    LoanTerms {
        loan_id: LoanId::new(),
        principal: Money::from_minor(principal),
        annual_rate_percent: rate,
        term_months: term,
        start_date: Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_principal_fully_amortized(
        principal in principal_strategy(),
        rate in rate_strategy(),
        term in term_strategy(),
    ) {
        let schedule = generate_schedule(&terms(principal, rate, term)).unwrap();
        let repaid: i64 = schedule.iter().map(|p| p.principal_part.minor()).sum();
        prop_assert_eq!(repaid, principal);
    }

    #[test]
    fn prop_amount_is_principal_plus_interest(
        principal in principal_strategy(),
        rate in rate_strategy(),
        term in term_strategy(),
    ) {
        let schedule = generate_schedule(&terms(principal, rate, term)).unwrap();
        for row in &schedule {
            prop_assert_eq!(
                row.amount.minor(),
                row.principal_part.minor() + row.interest_part.minor()
            );
            prop_assert!(!row.principal_part.is_negative());
            prop_assert!(!row.interest_part.is_negative());
        }
    }

    #[test]
    fn prop_schedule_shape(
        principal in principal_strategy(),
        rate in rate_strategy(),
        term in term_strategy(),
    ) {
        let schedule = generate_schedule(&terms(principal, rate, term)).unwrap();
        prop_assert!(!schedule.is_empty());
        prop_assert!(schedule.len() <= term as usize);
        for pair in schedule.windows(2) {
            prop_assert!(pair[0].due_date < pair[1].due_date);
        }
    }

    #[test]
    fn prop_zero_rate_is_flat(
        principal in principal_strategy(),
        term in term_strategy(),
    ) {
        let schedule = generate_schedule(&terms(principal, Decimal::ZERO, term)).unwrap();
        let flat = Money::from_major(Money::from_minor(principal).to_major() / Decimal::from(term))
            .unwrap()
            .minor();

        prop_assert!(schedule.iter().all(|p| p.interest_part.is_zero()));
        if let Some((_, head)) = schedule.split_last() {
            for row in head {
                prop_assert_eq!(row.principal_part.minor(), flat);
            }
        }
    }
}
