//! Account repository: balances with compare-and-set and locked transfers.

use chrono::Utc;
use kassa_core::ledger::{
    Account, BalanceChange, BalanceStore, StoreError, TransferCommand,
};
use kassa_shared::types::{AccountId, Money, UserId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use super::backend;
use super::transaction::insert_entry;
use crate::entities::accounts;

/// Account repository implementation.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Create a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Tells a missed conditional write apart from a missing row.
    async fn miss(txn: &DatabaseTransaction, id: AccountId) -> Result<StoreError, StoreError> {
        let exists = accounts::Entity::find_by_id(id.into_inner())
            .one(txn)
            .await
            .map_err(backend)?
            .is_some();
        Ok(if exists {
            StoreError::Conflict
        } else {
            StoreError::NotFound
        })
    }

    async fn set_balance(
        txn: &DatabaseTransaction,
        id: AccountId,
        balance: Money,
    ) -> Result<(), StoreError> {
        accounts::Entity::update_many()
            .col_expr(accounts::Column::Balance, Expr::value(balance.minor()))
            .filter(accounts::Column::Id.eq(id.into_inner()))
            .exec(txn)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

impl BalanceStore for AccountRepository {
    async fn get(&self, id: AccountId) -> Result<Account, StoreError> {
        accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(backend)?
            .map(to_domain)
            .ok_or(StoreError::NotFound)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Account>, StoreError> {
        let models = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id.into_inner()))
            .order_by_asc(accounts::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(backend)?;
        Ok(models.into_iter().map(to_domain).collect())
    }

    async fn insert(&self, account: Account) -> Result<(), StoreError> {
        accounts::ActiveModel {
            id: Set(account.id.into_inner()),
            user_id: Set(account.user_id.into_inner()),
            balance: Set(account.balance.minor()),
            created_at: Set(account.created_at.into()),
        }
        .insert(&self.db)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn delete_empty(&self, id: AccountId) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(backend)?;
        let result = accounts::Entity::delete_many()
            .filter(accounts::Column::Id.eq(id.into_inner()))
            .filter(accounts::Column::Balance.eq(0_i64))
            .exec(&txn)
            .await
            .map_err(backend)?;

        if result.rows_affected == 0 {
            return Err(Self::miss(&txn, id).await?);
        }
        txn.commit().await.map_err(backend)
    }

    async fn apply_change(&self, change: BalanceChange) -> Result<Account, StoreError> {
        let txn = self.db.begin().await.map_err(backend)?;

        let result = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::Balance,
                Expr::value(change.new_balance.minor()),
            )
            .filter(accounts::Column::Id.eq(change.account_id.into_inner()))
            .filter(accounts::Column::Balance.eq(change.expected_balance.minor()))
            .exec(&txn)
            .await
            .map_err(backend)?;

        if result.rows_affected == 0 {
            return Err(Self::miss(&txn, change.account_id).await?);
        }

        insert_entry(&txn, &change.entry).await.map_err(backend)?;

        let model = accounts::Entity::find_by_id(change.account_id.into_inner())
            .one(&txn)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?;

        txn.commit().await.map_err(backend)?;
        Ok(to_domain(model))
    }

    async fn transfer_atomic(&self, command: TransferCommand) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(backend)?;

        // Rows are locked in id order so opposing transfers cannot deadlock.
        let locked = accounts::Entity::find()
            .filter(
                accounts::Column::Id.is_in([command.from.into_inner(), command.to.into_inner()]),
            )
            .order_by_asc(accounts::Column::Id)
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(backend)?;
        debug!(from = %command.from, to = %command.to, rows = locked.len(), "Transfer rows locked");

        let balance_of = |id: AccountId| {
            locked
                .iter()
                .find(|m| m.id == id.into_inner())
                .map(|m| Money::from_minor(m.balance))
                .ok_or(StoreError::NotFound)
        };
        let source = balance_of(command.from)?;
        let destination = balance_of(command.to)?;

        if source < command.amount {
            return Err(StoreError::InsufficientFunds {
                available: source,
                requested: command.amount,
            });
        }
        let debited = source
            .checked_sub(command.amount)
            .ok_or_else(|| StoreError::Backend("debit overflow".to_string()))?;
        let credited = destination
            .checked_add(command.amount)
            .ok_or_else(|| StoreError::Backend("credit overflow".to_string()))?;

        Self::set_balance(&txn, command.from, debited).await?;
        Self::set_balance(&txn, command.to, credited).await?;
        insert_entry(&txn, &command.entry).await.map_err(backend)?;

        txn.commit().await.map_err(backend)
    }
}

fn to_domain(model: accounts::Model) -> Account {
    Account {
        id: AccountId::from_uuid(model.id),
        user_id: UserId::from_uuid(model.user_id),
        balance: Money::from_minor(model.balance),
        created_at: model.created_at.with_timezone(&Utc),
    }
}
