//! Entity re-exports.

pub use super::accounts::Entity as Accounts;
pub use super::loans::Entity as Loans;
pub use super::payments::Entity as Payments;
pub use super::transactions::Entity as Transactions;
pub use super::users::Entity as Users;
