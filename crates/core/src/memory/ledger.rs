use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use kassa_shared::types::{AccountId, Money, TransactionId, UserId};

use super::lock;
use crate::ledger::{
    Account, BalanceChange, BalanceStore, LedgerEntry, StoreError, TransactionLog,
    TransferCommand,
};

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    entries: Vec<LedgerEntry>,
}

#[derive(Debug, Default)]
struct Faults {
    failing_credits: HashSet<AccountId>,
    failing_changes: HashSet<AccountId>,
    pending_conflicts: u32,
}

/// Balance store and transaction log held in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<State>,
    faults: Mutex<Faults>,
}

impl InMemoryLedgerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the credit half of every transfer into `account_id` fail.
    pub fn fail_transfer_credit_to(&self, account_id: AccountId) {
        lock(&self.faults).failing_credits.insert(account_id);
    }

    /// Make every single-account change on `account_id` fail.
    pub fn fail_changes_on(&self, account_id: AccountId) {
        lock(&self.faults).failing_changes.insert(account_id);
    }

    /// Make the next `count` compare-and-set writes report a conflict.
    pub fn inject_conflicts(&self, count: u32) {
        lock(&self.faults).pending_conflicts = count;
    }

    /// Remove all injected failures.
    pub fn clear_faults(&self) {
        *lock(&self.faults) = Faults::default();
    }

    /// Sum of every balance.
    #[must_use]
    pub fn total_balance(&self) -> i64 {
        lock(&self.state)
            .accounts
            .values()
            .map(|a| a.balance.minor())
            .sum()
    }

    /// Every entry in append order.
    #[must_use]
    pub fn entries(&self) -> Vec<LedgerEntry> {
        lock(&self.state).entries.clone()
    }
}

impl BalanceStore for InMemoryLedgerStore {
    async fn get(&self, id: AccountId) -> Result<Account, StoreError> {
        lock(&self.state)
            .accounts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Account>, StoreError> {
        Ok(lock(&self.state)
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        if state.accounts.contains_key(&account.id) {
            return Err(StoreError::Backend(format!(
                "duplicate account id {}",
                account.id
            )));
        }
        state.accounts.insert(account.id, account);
        Ok(())
    }

    async fn delete_empty(&self, id: AccountId) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        let account = state.accounts.get(&id).ok_or(StoreError::NotFound)?;
        if !account.balance.is_zero() {
            return Err(StoreError::Conflict);
        }
        state.accounts.remove(&id);
        Ok(())
    }

    async fn apply_change(&self, change: BalanceChange) -> Result<Account, StoreError> {
        {
            let mut faults = lock(&self.faults);
            if faults.failing_changes.contains(&change.account_id) {
                return Err(StoreError::Backend("balance write rejected".to_string()));
            }
            if faults.pending_conflicts > 0 {
                faults.pending_conflicts -= 1;
                return Err(StoreError::Conflict);
            }
        }

        let mut state = lock(&self.state);
        let account = state
            .accounts
            .get_mut(&change.account_id)
            .ok_or(StoreError::NotFound)?;
        if account.balance != change.expected_balance {
            return Err(StoreError::Conflict);
        }
        account.balance = change.new_balance;
        let updated = account.clone();
        state.entries.push(change.entry);
        Ok(updated)
    }

    async fn transfer_atomic(&self, command: TransferCommand) -> Result<(), StoreError> {
        let fail_credit = lock(&self.faults).failing_credits.contains(&command.to);

        let mut state = lock(&self.state);
        if !state.accounts.contains_key(&command.to) {
            return Err(StoreError::NotFound);
        }
        let source = state
            .accounts
            .get_mut(&command.from)
            .ok_or(StoreError::NotFound)?;
        let before = source.balance;
        if before < command.amount {
            return Err(StoreError::InsufficientFunds {
                available: before,
                requested: command.amount,
            });
        }
        source.balance = before
            .checked_sub(command.amount)
            .ok_or_else(|| StoreError::Backend("debit overflow".to_string()))?;

        let credited = if fail_credit {
            None
        } else {
            credit(&mut state, command.to, command.amount)
        };
        if credited.is_none() {
            if let Some(source) = state.accounts.get_mut(&command.from) {
                source.balance = before;
            }
            return Err(StoreError::Backend("credit rejected".to_string()));
        }

        state.entries.push(command.entry);
        Ok(())
    }
}

fn credit(state: &mut State, account_id: AccountId, amount: Money) -> Option<()> {
    let target = state.accounts.get_mut(&account_id)?;
    target.balance = target.balance.checked_add(amount)?;
    Some(())
}

impl TransactionLog for InMemoryLedgerStore {
    async fn history(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(lock(&self.state)
            .entries
            .iter()
            .filter(|e| e.involves(account_id))
            .cloned()
            .collect())
    }

    async fn find(&self, id: TransactionId) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(lock(&self.state)
            .entries
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }
}
