//! Payment schedule repository.

use chrono::{DateTime, Utc};
use kassa_core::ledger::StoreError;
use kassa_core::loan::{PaymentStatus, ScheduleStore, ScheduledPayment};
use kassa_shared::types::{LoanId, Money, PaymentId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use super::backend;
use crate::entities::{payments, sea_orm_active_enums::PaymentStatus as DbPaymentStatus};

/// Payment repository implementation.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    db: DatabaseConnection,
}

impl PaymentRepository {
    /// Create a new payment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl ScheduleStore for PaymentRepository {
    async fn get_by_loan(&self, loan_id: LoanId) -> Result<Vec<ScheduledPayment>, StoreError> {
        let models = payments::Entity::find()
            .filter(payments::Column::LoanId.eq(loan_id.into_inner()))
            .order_by_asc(payments::Column::DueDate)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(models.into_iter().map(to_domain).collect())
    }

    async fn get_overdue(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPayment>, StoreError> {
        let models = payments::Entity::find()
            .filter(payments::Column::DueDate.lt(now))
            .filter(payments::Column::IsPaid.eq(false))
            .filter(payments::Column::Status.eq(DbPaymentStatus::New))
            .order_by_asc(payments::Column::DueDate)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(models.into_iter().map(to_domain).collect())
    }

    async fn mark_overdue(&self, id: PaymentId) -> Result<bool, StoreError> {
        let result = payments::Entity::update_many()
            .col_expr(
                payments::Column::Status,
                Expr::value(DbPaymentStatus::Overdue),
            )
            .filter(payments::Column::Id.eq(id.into_inner()))
            .filter(payments::Column::Status.eq(DbPaymentStatus::New))
            .filter(payments::Column::IsPaid.eq(false))
            .exec(&self.db)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected > 0)
    }
}

/// Inserts a whole schedule on the given connection or transaction.
pub(crate) async fn insert_many<C: ConnectionTrait>(
    conn: &C,
    schedule: &[ScheduledPayment],
) -> Result<(), DbErr> {
    if schedule.is_empty() {
        return Ok(());
    }
    let models = schedule.iter().map(|p| payments::ActiveModel {
        id: Set(p.id.into_inner()),
        loan_id: Set(p.loan_id.into_inner()),
        amount: Set(p.amount.minor()),
        paid_date: Set(p.paid_date.map(Into::into)),
        due_date: Set(p.due_date.into()),
        principal_part: Set(p.principal_part.minor()),
        interest_part: Set(p.interest_part.minor()),
        status: Set(to_db_status(p.status)),
        is_paid: Set(p.is_paid),
    });
    payments::Entity::insert_many(models).exec(conn).await?;
    Ok(())
}

fn to_domain(model: payments::Model) -> ScheduledPayment {
    ScheduledPayment {
        id: PaymentId::from_uuid(model.id),
        loan_id: LoanId::from_uuid(model.loan_id),
        amount: Money::from_minor(model.amount),
        paid_date: model.paid_date.map(|d| d.with_timezone(&Utc)),
        due_date: model.due_date.with_timezone(&Utc),
        principal_part: Money::from_minor(model.principal_part),
        interest_part: Money::from_minor(model.interest_part),
        status: from_db_status(model.status),
        is_paid: model.is_paid,
    }
}

const fn to_db_status(status: PaymentStatus) -> DbPaymentStatus {
    match status {
        PaymentStatus::New => DbPaymentStatus::New,
        PaymentStatus::Paid => DbPaymentStatus::Paid,
        PaymentStatus::Overdue => DbPaymentStatus::Overdue,
    }
}

const fn from_db_status(status: DbPaymentStatus) -> PaymentStatus {
    match status {
        DbPaymentStatus::New => PaymentStatus::New,
        DbPaymentStatus::Paid => PaymentStatus::Paid,
        DbPaymentStatus::Overdue => PaymentStatus::Overdue,
    }
}
