//! Domain types for the ledger.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use kassa_shared::types::{AccountId, Money, TransactionId, UserId};
use serde::{Deserialize, Serialize};

use super::error::LedgerError;

/// Kind of a balance-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money entering an account from outside the system.
    Deposit,
    /// Money leaving an account to outside the system.
    Withdrawal,
    /// Money moving between two accounts.
    Transfer,
    /// Card payment debited from an account.
    Payment,
    /// Loan principal credited to an account.
    Loan,
}

/// How a transaction kind moves money relative to a single account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Balance increases.
    Credit,
    /// Balance decreases.
    Debit,
    /// Source is debited and destination credited.
    Both,
}

impl TransactionKind {
    /// All kinds, in storage order.
    pub const ALL: [Self; 5] = [
        Self::Deposit,
        Self::Withdrawal,
        Self::Transfer,
        Self::Payment,
        Self::Loan,
    ];

    /// Returns the database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Transfer => "transfer",
            Self::Payment => "payment",
            Self::Loan => "loan",
        }
    }

    /// Returns the direction this kind moves money.
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::Deposit | Self::Loan => Direction::Credit,
            Self::Withdrawal | Self::Payment => Direction::Debit,
            Self::Transfer => Direction::Both,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LedgerError::InvalidInput(format!("unknown transaction kind: {s}")))
    }
}

/// A monetary account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID.
    pub id: AccountId,
    /// Owning user.
    pub user_id: UserId,
    /// Current balance in minor units.
    pub balance: Money,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Opens an empty account for `user_id`.
    #[must_use]
    pub fn open(user_id: UserId) -> Self {
        Self {
            id: AccountId::new(),
            user_id,
            balance: Money::ZERO,
            created_at: Utc::now(),
        }
    }
}

/// An immutable record of one balance-affecting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry ID.
    pub id: TransactionId,
    /// Amount moved, always positive.
    pub amount: Money,
    /// Debited account, if any.
    pub from_account: Option<AccountId>,
    /// Credited account, if any.
    pub to_account: Option<AccountId>,
    /// Kind of event.
    pub kind: TransactionKind,
    /// Free-text description.
    pub description: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Builds an entry, enforcing the shape rules for its kind.
    ///
    /// The amount must be positive, at least one side must be set, a
    /// transfer needs both sides and the two sides must differ.
    pub fn new(
        kind: TransactionKind,
        amount: Money,
        from_account: Option<AccountId>,
        to_account: Option<AccountId>,
        description: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        if amount.is_negative() {
            return Err(LedgerError::NegativeAmount);
        }
        match (kind.direction(), from_account, to_account) {
            (_, None, None) => {
                return Err(LedgerError::InvalidInput(
                    "entry needs a source or a destination account".to_string(),
                ));
            }
            (Direction::Both, Some(from), Some(to)) if from == to => {
                return Err(LedgerError::InvalidInput(
                    "cannot transfer to the same account".to_string(),
                ));
            }
            (Direction::Both, None, _) | (Direction::Both, _, None) => {
                return Err(LedgerError::InvalidInput(
                    "transfer needs both accounts".to_string(),
                ));
            }
            _ => {}
        }

        Ok(Self {
            id: TransactionId::new(),
            amount,
            from_account,
            to_account,
            kind,
            description: description.into(),
            created_at: Utc::now(),
        })
    }

    /// Builds a single-account entry, placing the account on the side its
    /// kind moves money.
    pub fn single(
        kind: TransactionKind,
        account_id: AccountId,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        match kind.direction() {
            Direction::Credit => Self::new(kind, amount, None, Some(account_id), description),
            Direction::Debit => Self::new(kind, amount, Some(account_id), None, description),
            Direction::Both => Err(LedgerError::InvalidInput(
                "transfer is not a single-account operation".to_string(),
            )),
        }
    }

    /// Returns true if the entry touches `account_id` on either side.
    #[must_use]
    pub fn involves(&self, account_id: AccountId) -> bool {
        self.from_account == Some(account_id) || self.to_account == Some(account_id)
    }
}

/// Input for a single-account balance adjustment.
#[derive(Debug, Clone)]
pub struct AdjustBalanceInput {
    /// Target account.
    pub account_id: AccountId,
    /// Positive amount in minor units.
    pub amount: Money,
    /// Deposit, withdrawal, payment or loan.
    pub kind: TransactionKind,
    /// Free-text description stored on the entry.
    pub description: String,
}

/// Input for a transfer between two accounts.
#[derive(Debug, Clone)]
pub struct TransferInput {
    /// Debited account, must be owned by the caller.
    pub from: AccountId,
    /// Credited account.
    pub to: AccountId,
    /// Positive amount in minor units.
    pub amount: Money,
    /// Free-text description stored on the entry.
    pub description: String,
}

/// Result of a successful balance adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentResult {
    /// ID of the appended ledger entry.
    pub transaction_id: TransactionId,
    /// Account state after the change.
    pub account: Account,
}

/// Result of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    /// ID of the appended ledger entry.
    pub transaction_id: TransactionId,
}

/// Compare-and-set instruction handed to the balance store.
///
/// The store writes `new_balance` only if the stored balance still equals
/// `expected_balance`, and appends `entry` in the same unit of work.
#[derive(Debug, Clone)]
pub struct BalanceChange {
    /// Account being changed.
    pub account_id: AccountId,
    /// Balance the change was computed from.
    pub expected_balance: Money,
    /// Balance to write.
    pub new_balance: Money,
    /// Entry recording the change.
    pub entry: LedgerEntry,
}

/// Paired debit and credit handed to the balance store.
#[derive(Debug, Clone)]
pub struct TransferCommand {
    /// Debited account.
    pub from: AccountId,
    /// Credited account.
    pub to: AccountId,
    /// Amount moved.
    pub amount: Money,
    /// Entry recording the transfer.
    pub entry: LedgerEntry,
}
