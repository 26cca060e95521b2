//! Transaction log repository.

use chrono::Utc;
use kassa_core::ledger::{LedgerEntry, StoreError, TransactionKind, TransactionLog};
use kassa_shared::types::{AccountId, Money, TransactionId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set,
};

use super::backend;
use crate::entities::{sea_orm_active_enums::TransactionType, transactions};

/// Read side of the transaction log.
///
/// Entries are written by [`super::AccountRepository`] inside the same
/// database transaction as the balance change they record.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    db: DatabaseConnection,
}

impl TransactionRepository {
    /// Create a new transaction repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl TransactionLog for TransactionRepository {
    async fn history(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, StoreError> {
        let id = account_id.into_inner();
        let models = transactions::Entity::find()
            .filter(
                Condition::any()
                    .add(transactions::Column::FromId.eq(id))
                    .add(transactions::Column::ToId.eq(id)),
            )
            .order_by_asc(transactions::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(backend)?;

        Ok(models.into_iter().map(to_domain).collect())
    }

    async fn find(&self, id: TransactionId) -> Result<Option<LedgerEntry>, StoreError> {
        let model = transactions::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(backend)?;
        Ok(model.map(to_domain))
    }
}

/// Appends one entry on the given connection or transaction.
pub(crate) async fn insert_entry<C: ConnectionTrait>(
    conn: &C,
    entry: &LedgerEntry,
) -> Result<(), DbErr> {
    transactions::ActiveModel {
        id: Set(entry.id.into_inner()),
        amount: Set(entry.amount.minor()),
        from_id: Set(entry.from_account.map(AccountId::into_inner)),
        to_id: Set(entry.to_account.map(AccountId::into_inner)),
        transaction_type: Set(to_db_kind(entry.kind)),
        description: Set(entry.description.clone()),
        created_at: Set(entry.created_at.into()),
    }
    .insert(conn)
    .await?;
    Ok(())
}

fn to_domain(model: transactions::Model) -> LedgerEntry {
    LedgerEntry {
        id: TransactionId::from_uuid(model.id),
        amount: Money::from_minor(model.amount),
        from_account: model.from_id.map(AccountId::from_uuid),
        to_account: model.to_id.map(AccountId::from_uuid),
        kind: from_db_kind(model.transaction_type),
        description: model.description,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

const fn to_db_kind(kind: TransactionKind) -> TransactionType {
    match kind {
        TransactionKind::Deposit => TransactionType::Deposit,
        TransactionKind::Withdrawal => TransactionType::Withdrawal,
        TransactionKind::Transfer => TransactionType::Transfer,
        TransactionKind::Payment => TransactionType::Payment,
        TransactionKind::Loan => TransactionType::Loan,
    }
}

const fn from_db_kind(kind: TransactionType) -> TransactionKind {
    match kind {
        TransactionType::Deposit => TransactionKind::Deposit,
        TransactionType::Withdrawal => TransactionKind::Withdrawal,
        TransactionType::Transfer => TransactionKind::Transfer,
        TransactionType::Payment => TransactionKind::Payment,
        TransactionType::Loan => TransactionKind::Loan,
    }
}
