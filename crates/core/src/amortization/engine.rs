//! Reducing-balance annuity schedule generation.
//!
//! Arithmetic runs in `Decimal` major units. Interest is rounded to cents
//! first and the principal portion is derived from it by subtraction; the
//! closing month absorbs all accumulated rounding so the schedule repays
//! the principal exactly.

use chrono::{DateTime, Months, Utc};
use kassa_shared::types::{LoanId, Money, PaymentId};
use rust_decimal::{Decimal, RoundingStrategy};

use super::error::AmortizationError;
use crate::loan::types::{PaymentStatus, ScheduledPayment};

const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

/// Remaining principal at or below this closes the loan early.
const CLOSING_TOLERANCE: Decimal = Decimal::from_parts(9, 0, 0, false, 3); // 0.009

/// Inputs to the schedule generator.
#[derive(Debug, Clone)]
pub struct LoanTerms {
    /// Loan the generated payments belong to.
    pub loan_id: LoanId,
    /// Principal in minor units.
    pub principal: Money,
    /// Annual interest rate in percent.
    pub annual_rate_percent: Decimal,
    /// Number of monthly payments.
    pub term_months: u32,
    /// Due dates are counted in calendar months from here.
    pub start_date: DateTime<Utc>,
}

/// Monthly rate as a fraction: `annual / 12 / 100`.
pub fn monthly_rate(annual_rate_percent: Decimal) -> Result<Decimal, AmortizationError> {
    annual_rate_percent
        .checked_div(MONTHS_PER_YEAR)
        .and_then(|r| r.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(AmortizationError::Overflow("monthly rate"))
}

/// Level monthly payment in major units.
///
/// With a zero rate this is `principal / term`, unrounded. Otherwise it is
/// the annuity payment rounded to cents.
pub fn monthly_payment(
    principal: Money,
    annual_rate_percent: Decimal,
    term_months: u32,
) -> Result<Decimal, AmortizationError> {
    validate(principal, annual_rate_percent, term_months)?;

    let principal = principal.to_major();
    let rate = monthly_rate(annual_rate_percent)?;
    if rate.is_zero() {
        return principal
            .checked_div(Decimal::from(term_months))
            .ok_or(AmortizationError::Overflow("flat payment"));
    }

    let growth = compound(Decimal::ONE + rate, term_months)?;
    let denominator = growth - Decimal::ONE;
    if denominator.is_zero() {
        return Err(AmortizationError::Overflow("annuity factor"));
    }

    principal
        .checked_mul(rate)
        .and_then(|v| v.checked_mul(growth))
        .and_then(|v| v.checked_div(denominator))
        .map(round2)
        .ok_or(AmortizationError::Overflow("annuity payment"))
}

/// Builds the full repayment schedule for `terms`.
///
/// Emits at most `term_months` rows, one per month, all `new` and unpaid.
/// Row `i` falls due `i` calendar months after the start date, clamped to
/// the end of shorter months.
pub fn generate_schedule(terms: &LoanTerms) -> Result<Vec<ScheduledPayment>, AmortizationError> {
    let payment = monthly_payment(terms.principal, terms.annual_rate_percent, terms.term_months)?;
    let rate = monthly_rate(terms.annual_rate_percent)?;

    let mut remaining = terms.principal.to_major();
    let mut schedule = Vec::with_capacity(terms.term_months as usize);

    for month in 1..=terms.term_months {
        if remaining <= Decimal::ZERO {
            break;
        }

        let interest = remaining
            .checked_mul(rate)
            .map(round2)
            .ok_or(AmortizationError::Overflow("interest"))?;
        let mut principal = round2(payment - interest);
        let mut amount = payment;

        if month == terms.term_months || remaining - principal <= CLOSING_TOLERANCE {
            principal = round2(remaining);
            amount = principal + interest;
        }
        remaining -= principal;

        let due_date = terms
            .start_date
            .checked_add_months(Months::new(month))
            .ok_or(AmortizationError::Overflow("due date"))?;

        schedule.push(ScheduledPayment {
            id: PaymentId::new(),
            loan_id: terms.loan_id,
            amount: to_minor(amount)?,
            paid_date: None,
            due_date,
            principal_part: to_minor(principal)?,
            interest_part: to_minor(interest)?,
            status: PaymentStatus::New,
            is_paid: false,
        });
    }

    Ok(schedule)
}

fn validate(
    principal: Money,
    annual_rate_percent: Decimal,
    term_months: u32,
) -> Result<(), AmortizationError> {
    if !principal.is_positive() {
        return Err(AmortizationError::InvalidInput(
            "principal must be positive".to_string(),
        ));
    }
    if term_months == 0 {
        return Err(AmortizationError::InvalidInput(
            "term must be at least one month".to_string(),
        ));
    }
    if annual_rate_percent.is_sign_negative() && !annual_rate_percent.is_zero() {
        return Err(AmortizationError::InvalidInput(
            "interest rate cannot be negative".to_string(),
        ));
    }
    Ok(())
}

fn compound(base: Decimal, periods: u32) -> Result<Decimal, AmortizationError> {
    (0..periods).try_fold(Decimal::ONE, |acc, _| {
        acc.checked_mul(base)
            .ok_or(AmortizationError::Overflow("compound growth"))
    })
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn to_minor(major: Decimal) -> Result<Money, AmortizationError> {
    Money::from_major(major).ok_or(AmortizationError::Overflow("minor units"))
}
