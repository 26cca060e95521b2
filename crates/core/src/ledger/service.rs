//! Ledger service: the single enforcement point for balance changes.

use std::sync::Arc;
use std::time::Duration;

use kassa_shared::Caller;
use kassa_shared::config::LedgerConfig;
use kassa_shared::types::{AccountId, Money, TransactionId};
use tracing::{debug, error, info, warn};

use super::error::LedgerError;
use super::store::{BalanceStore, StoreError, TransactionLog, with_deadline};
use super::types::{
    Account, AdjustBalanceInput, AdjustmentResult, BalanceChange, Direction, LedgerEntry,
    TransactionKind, TransferCommand, TransferInput, TransferResult,
};

/// Ledger service.
///
/// Every operation re-checks that the caller owns the account it touches
/// before anything is written.
pub struct Ledger<B: BalanceStore, T: TransactionLog> {
    balances: Arc<B>,
    log: Arc<T>,
    max_retries: u32,
    timeout: Duration,
}

impl<B: BalanceStore, T: TransactionLog> Ledger<B, T> {
    /// Create a new ledger over the given stores.
    #[must_use]
    pub fn new(balances: Arc<B>, log: Arc<T>, config: &LedgerConfig) -> Self {
        Self {
            balances,
            log,
            max_retries: config.max_retries,
            timeout: Duration::from_millis(config.operation_timeout_ms),
        }
    }

    /// Open an empty account for the caller.
    pub async fn open_account(&self, caller: &Caller) -> Result<Account, LedgerError> {
        let account = Account::open(caller.user_id);
        with_deadline(self.timeout, "insert account", self.balances.insert(account.clone()))
            .await
            .map_err(|e| self.store_error(e, account.id))?;

        info!(account_id = %account.id, user_id = %caller.user_id, "Account opened");
        Ok(account)
    }

    /// List the caller's accounts.
    pub async fn list_accounts(&self, caller: &Caller) -> Result<Vec<Account>, LedgerError> {
        with_deadline(
            self.timeout,
            "list accounts",
            self.balances.list_by_user(caller.user_id),
        )
        .await
        .map_err(|e| {
            error!(user_id = %caller.user_id, error = %e, "Failed to list accounts");
            LedgerError::Storage(e.to_string())
        })
    }

    /// Fetch one of the caller's accounts.
    pub async fn get_account(
        &self,
        caller: &Caller,
        account_id: AccountId,
    ) -> Result<Account, LedgerError> {
        self.load_owned(caller, account_id).await
    }

    /// Close one of the caller's accounts. The balance must be zero.
    pub async fn close_account(
        &self,
        caller: &Caller,
        account_id: AccountId,
    ) -> Result<(), LedgerError> {
        let account = self.load_owned(caller, account_id).await?;
        if !account.balance.is_zero() {
            warn!(account_id = %account_id, balance = %account.balance, "Refusing to close non-empty account");
            return Err(LedgerError::AccountNotEmpty {
                account_id,
                balance: account.balance,
            });
        }

        with_deadline(self.timeout, "delete account", self.balances.delete_empty(account_id))
            .await
            .map_err(|e| self.store_error(e, account_id))?;

        info!(account_id = %account_id, "Account closed");
        Ok(())
    }

    /// Apply a deposit, withdrawal, payment or loan credit to one account.
    ///
    /// The balance write is a compare-and-set against the balance just read;
    /// on conflict the whole read-check-write cycle is repeated up to
    /// `max_retries` times.
    ///
    /// A `Timeout` means the outcome is unknown: the change may have been
    /// committed. Look it up with [`Self::find_transaction`] before
    /// repeating the call.
    pub async fn adjust_balance(
        &self,
        caller: &Caller,
        input: AdjustBalanceInput,
    ) -> Result<AdjustmentResult, LedgerError> {
        self.adjust_balance_with_id(caller, input, TransactionId::new())
            .await
    }

    /// [`Self::adjust_balance`] with a caller-chosen entry id.
    ///
    /// The same id is used on every compare-and-set attempt.
    pub async fn adjust_balance_with_id(
        &self,
        caller: &Caller,
        input: AdjustBalanceInput,
        transaction_id: TransactionId,
    ) -> Result<AdjustmentResult, LedgerError> {
        validate_amount(input.amount)?;
        let direction = input.kind.direction();
        if direction == Direction::Both {
            return Err(LedgerError::InvalidInput(
                "use transfer to move money between accounts".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            let account = self.load_owned(caller, input.account_id).await?;
            let new_balance = match direction {
                Direction::Debit => {
                    ensure_funds(&account, input.amount)?;
                    account.balance.checked_sub(input.amount)
                }
                _ => account.balance.checked_add(input.amount),
            }
            .ok_or(LedgerError::BalanceOverflow(account.id))?;

            let mut entry = LedgerEntry::single(
                input.kind,
                account.id,
                input.amount,
                input.description.clone(),
            )?;
            entry.id = transaction_id;
            let change = BalanceChange {
                account_id: account.id,
                expected_balance: account.balance,
                new_balance,
                entry,
            };

            match with_deadline(self.timeout, "apply balance change", self.balances.apply_change(change))
                .await
            {
                Ok(updated) => {
                    info!(
                        account_id = %updated.id,
                        kind = %input.kind,
                        amount = %input.amount,
                        balance = %updated.balance,
                        transaction_id = %transaction_id,
                        "Balance adjusted"
                    );
                    return Ok(AdjustmentResult {
                        transaction_id,
                        account: updated,
                    });
                }
                Err(StoreError::Conflict) if attempt < self.max_retries => {
                    attempt += 1;
                    debug!(account_id = %account.id, attempt, "Balance changed concurrently, retrying");
                }
                Err(e) => return Err(self.store_error(e, account.id)),
            }
        }
    }

    /// Debit a card payment from an account.
    ///
    /// Card credentials are validated by the caller; this is the mutation
    /// primitive only.
    pub async fn record_card_payment(
        &self,
        caller: &Caller,
        account_id: AccountId,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<AdjustmentResult, LedgerError> {
        self.adjust_balance(
            caller,
            AdjustBalanceInput {
                account_id,
                amount,
                kind: TransactionKind::Payment,
                description: description.into(),
            },
        )
        .await
    }

    /// Move money between two accounts as one atomic unit.
    ///
    /// As with [`Self::adjust_balance`], a `Timeout` leaves the outcome
    /// unknown.
    pub async fn transfer(
        &self,
        caller: &Caller,
        input: TransferInput,
    ) -> Result<TransferResult, LedgerError> {
        validate_amount(input.amount)?;
        if input.from == input.to {
            return Err(LedgerError::InvalidInput(
                "cannot transfer to the same account".to_string(),
            ));
        }

        let source = self.load_owned(caller, input.from).await?;
        with_deadline(self.timeout, "get account", self.balances.get(input.to))
            .await
            .map_err(|e| self.store_error(e, input.to))?;
        ensure_funds(&source, input.amount)?;

        let entry = LedgerEntry::new(
            TransactionKind::Transfer,
            input.amount,
            Some(input.from),
            Some(input.to),
            input.description,
        )?;
        let transaction_id = entry.id;
        let command = TransferCommand {
            from: input.from,
            to: input.to,
            amount: input.amount,
            entry,
        };

        with_deadline(self.timeout, "transfer", self.balances.transfer_atomic(command))
            .await
            .map_err(|e| match e {
                StoreError::NotFound => LedgerError::AccountNotFound(input.to),
                other => self.store_error(other, input.from),
            })?;

        info!(
            from = %input.from,
            to = %input.to,
            amount = %input.amount,
            transaction_id = %transaction_id,
            "Transfer completed"
        );
        Ok(TransferResult { transaction_id })
    }

    /// All entries touching one of the caller's accounts.
    pub async fn transaction_history(
        &self,
        caller: &Caller,
        account_id: AccountId,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.load_owned(caller, account_id).await?;
        with_deadline(self.timeout, "transaction history", self.log.history(account_id))
            .await
            .map_err(|e| self.store_error(e, account_id))
    }

    /// Look up one entry touching one of the caller's accounts.
    ///
    /// Returns `None` if no such entry was recorded for that account.
    pub async fn find_transaction(
        &self,
        caller: &Caller,
        account_id: AccountId,
        transaction_id: TransactionId,
    ) -> Result<Option<LedgerEntry>, LedgerError> {
        self.load_owned(caller, account_id).await?;
        let entry = with_deadline(self.timeout, "find transaction", self.log.find(transaction_id))
            .await
            .map_err(|e| self.store_error(e, account_id))?;
        Ok(entry.filter(|e| e.involves(account_id)))
    }

    async fn load_owned(
        &self,
        caller: &Caller,
        account_id: AccountId,
    ) -> Result<Account, LedgerError> {
        let account = with_deadline(self.timeout, "get account", self.balances.get(account_id))
            .await
            .map_err(|e| self.store_error(e, account_id))?;

        if !caller.owns(account.user_id) {
            warn!(account_id = %account_id, caller = %caller.user_id, "Caller does not own account");
            return Err(LedgerError::Unauthorized(account_id));
        }
        Ok(account)
    }

    fn store_error(&self, err: StoreError, account_id: AccountId) -> LedgerError {
        match err {
            StoreError::NotFound => {
                warn!(account_id = %account_id, "Account not found");
                LedgerError::AccountNotFound(account_id)
            }
            StoreError::Conflict => {
                warn!(account_id = %account_id, retries = self.max_retries, "Giving up after concurrent modifications");
                LedgerError::ConcurrentModification(account_id)
            }
            StoreError::InsufficientFunds {
                available,
                requested,
            } => {
                warn!(account_id = %account_id, %available, %requested, "Insufficient funds");
                LedgerError::InsufficientFunds {
                    available,
                    requested,
                }
            }
            StoreError::Timeout(operation) => {
                error!(account_id = %account_id, operation, "Storage call timed out");
                LedgerError::Timeout(operation)
            }
            StoreError::Backend(message) => {
                error!(account_id = %account_id, error = %message, "Storage failure");
                LedgerError::Storage(message)
            }
        }
    }
}

fn validate_amount(amount: Money) -> Result<(), LedgerError> {
    if amount.is_zero() {
        return Err(LedgerError::ZeroAmount);
    }
    if amount.is_negative() {
        return Err(LedgerError::NegativeAmount);
    }
    Ok(())
}

fn ensure_funds(account: &Account, amount: Money) -> Result<(), LedgerError> {
    if account.balance < amount {
        warn!(account_id = %account.id, available = %account.balance, requested = %amount, "Insufficient funds");
        return Err(LedgerError::InsufficientFunds {
            available: account.balance,
            requested: amount,
        });
    }
    Ok(())
}
