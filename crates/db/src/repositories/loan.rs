//! Loan repository.

use chrono::Utc;
use kassa_core::ledger::StoreError;
use kassa_core::loan::{Loan, LoanStore};
use kassa_shared::types::{AccountId, LoanId, Money, UserId};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};

use super::backend;
use super::payment::insert_many;
use crate::entities::loans;

/// Loan repository implementation.
#[derive(Debug, Clone)]
pub struct LoanRepository {
    db: DatabaseConnection,
}

impl LoanRepository {
    /// Create a new loan repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl LoanStore for LoanRepository {
    async fn create_with_schedule(&self, loan: &Loan) -> Result<(), StoreError> {
        let term = i32::try_from(loan.term)
            .map_err(|_| StoreError::Backend(format!("term out of range: {}", loan.term)))?;

        let txn = self.db.begin().await.map_err(backend)?;

        loans::ActiveModel {
            id: Set(loan.id.into_inner()),
            user_id: Set(loan.user_id.into_inner()),
            account_id: Set(loan.account_id.into_inner()),
            amount: Set(loan.amount.minor()),
            interest_rate: Set(loan.interest_rate),
            term: Set(term),
            start_date: Set(loan.start_date.into()),
            debt: Set(loan.debt.minor()),
        }
        .insert(&txn)
        .await
        .map_err(backend)?;

        insert_many(&txn, &loan.payments).await.map_err(backend)?;

        txn.commit().await.map_err(backend)
    }

    async fn get(&self, id: LoanId) -> Result<Loan, StoreError> {
        let model = loans::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?;
        to_domain(model)
    }

    async fn discard(&self, id: LoanId) -> Result<(), StoreError> {
        // Payments go with the loan through ON DELETE CASCADE.
        let result = loans::Entity::delete_by_id(id.into_inner())
            .exec(&self.db)
            .await
            .map_err(backend)?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn to_domain(model: loans::Model) -> Result<Loan, StoreError> {
    let term = u32::try_from(model.term)
        .map_err(|_| StoreError::Backend(format!("invalid term in loan {}", model.id)))?;
    Ok(Loan {
        id: LoanId::from_uuid(model.id),
        user_id: UserId::from_uuid(model.user_id),
        account_id: AccountId::from_uuid(model.account_id),
        amount: Money::from_minor(model.amount),
        interest_rate: model.interest_rate,
        term,
        start_date: model.start_date.with_timezone(&Utc),
        debt: Money::from_minor(model.debt),
        payments: Vec::new(),
    })
}
