//! Initial schema: users, accounts, transaction log, loans and payments.
//!
//! All monetary columns are BIGINT minor units.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(INITIAL_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS payments, loans, transactions, accounts, users CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const INITIAL_SQL: &str = r"
CREATE TABLE users (
    id UUID PRIMARY KEY,
    username VARCHAR(50) NOT NULL UNIQUE,
    email VARCHAR(255) NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    balance BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_accounts_user ON accounts(user_id);

-- Append-only log. No foreign keys on from_id/to_id so entries outlive closed accounts.
CREATE TABLE transactions (
    id UUID PRIMARY KEY,
    amount BIGINT NOT NULL CHECK (amount > 0),
    from_id UUID,
    to_id UUID,
    type VARCHAR(50) NOT NULL
        CHECK (type IN ('deposit', 'payment', 'transfer', 'withdrawal', 'loan')),
    description TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_transaction_side CHECK (from_id IS NOT NULL OR to_id IS NOT NULL),
    CONSTRAINT chk_transfer_sides CHECK (
        type <> 'transfer'
        OR (from_id IS NOT NULL AND to_id IS NOT NULL AND from_id <> to_id)
    )
);

CREATE INDEX idx_transactions_from ON transactions(from_id) WHERE from_id IS NOT NULL;
CREATE INDEX idx_transactions_to ON transactions(to_id) WHERE to_id IS NOT NULL;

CREATE TABLE loans (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    amount BIGINT NOT NULL CHECK (amount > 0),
    interest_rate NUMERIC NOT NULL CHECK (interest_rate >= 0),
    term INT NOT NULL CHECK (term >= 1),
    start_date TIMESTAMPTZ NOT NULL,
    debt BIGINT NOT NULL CHECK (debt >= 0)
);

CREATE INDEX idx_loans_user ON loans(user_id);

CREATE TABLE payments (
    id UUID PRIMARY KEY,
    loan_id UUID NOT NULL REFERENCES loans(id) ON DELETE CASCADE,
    amount BIGINT NOT NULL,
    paid_date TIMESTAMPTZ,
    due_date TIMESTAMPTZ NOT NULL,
    principal_part BIGINT NOT NULL,
    interest_part BIGINT NOT NULL,
    status VARCHAR(50) NOT NULL CHECK (status IN ('new', 'paid', 'overdue')),
    is_paid BOOLEAN NOT NULL DEFAULT false
);

CREATE INDEX idx_payments_loan ON payments(loan_id, due_date);

-- Overdue scan: status = 'new' AND is_paid = false AND due_date < now
CREATE INDEX idx_payments_open_due ON payments(status, due_date) WHERE is_paid = false;
";
