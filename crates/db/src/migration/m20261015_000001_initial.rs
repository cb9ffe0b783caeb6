//! Initial database migration.
//!
//! Creates the ledger, payment return queue, capital transfer contract, and
//! job lock tables, plus the triggers that keep the ledger append-only and
//! balanced per asset type.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: LEDGER
        // ============================================================
        db.execute_unprepared(LEDGER_ACCOUNTS_SQL).await?;
        db.execute_unprepared(LEDGER_TRANSACTIONS_SQL).await?;
        db.execute_unprepared(LEDGER_ENTRIES_SQL).await?;

        // ============================================================
        // PART 2: PAYMENTS & RETURN QUEUE
        // ============================================================
        db.execute_unprepared(PAYMENTS_SQL).await?;
        db.execute_unprepared(PAYMENT_RETURNS_SQL).await?;

        // ============================================================
        // PART 3: CAPITAL TRANSFERS
        // ============================================================
        db.execute_unprepared(CAPITAL_TRANSFER_CONTRACTS_SQL).await?;

        // ============================================================
        // PART 4: SCHEDULER LOCKS
        // ============================================================
        db.execute_unprepared(JOB_LOCKS_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const LEDGER_ACCOUNTS_SQL: &str = r"
CREATE TABLE ledger_accounts (
    id UUID PRIMARY KEY,
    account_key TEXT NOT NULL UNIQUE,
    owner_type VARCHAR(16) NOT NULL CHECK (owner_type IN ('SYSTEM', 'USER')),
    owner_id UUID,
    purpose VARCHAR(64) NOT NULL,
    qualifier VARCHAR(64),
    asset_type VARCHAR(16) NOT NULL CHECK (asset_type IN ('CURRENCY', 'FUND_UNIT')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_user_accounts_have_owner
        CHECK ((owner_type = 'USER') = (owner_id IS NOT NULL))
);

CREATE INDEX idx_ledger_accounts_owner ON ledger_accounts(owner_id) WHERE owner_id IS NOT NULL;
";

const LEDGER_TRANSACTIONS_SQL: &str = r"
CREATE TABLE ledger_transactions (
    id UUID PRIMARY KEY,
    transaction_type VARCHAR(32) NOT NULL,
    external_reference UUID NOT NULL,
    metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Idempotency key; the only cross-process concurrency guard for posting
CREATE UNIQUE INDEX uq_ledger_transactions_reference_type
    ON ledger_transactions(external_reference, transaction_type);
";

const LEDGER_ENTRIES_SQL: &str = r"
CREATE TABLE ledger_entries (
    id UUID PRIMARY KEY,
    sequence BIGSERIAL NOT NULL UNIQUE,
    transaction_id UUID NOT NULL REFERENCES ledger_transactions(id),
    account_id UUID NOT NULL REFERENCES ledger_accounts(id),
    position INTEGER NOT NULL,
    amount NUMERIC NOT NULL,
    asset_type VARCHAR(16) NOT NULL CHECK (asset_type IN ('CURRENCY', 'FUND_UNIT')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    UNIQUE (transaction_id, position)
);

CREATE INDEX idx_ledger_entries_account ON ledger_entries(account_id, sequence);
";

const PAYMENTS_SQL: &str = r"
CREATE TABLE payments (
    id UUID PRIMARY KEY,
    user_id UUID,
    amount NUMERIC NOT NULL CHECK (amount > 0),
    beneficiary_iban VARCHAR(34) NOT NULL,
    end_to_end_id VARCHAR(35),
    status VARCHAR(32) NOT NULL CHECK (status IN (
        'RECEIVED', 'VERIFIED', 'TO_BE_RETURNED', 'RETURNED', 'PROCESSED'
    )),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_payments_end_to_end ON payments(end_to_end_id) WHERE end_to_end_id IS NOT NULL;
CREATE INDEX idx_payments_iban_amount ON payments(beneficiary_iban, amount);
";

const PAYMENT_RETURNS_SQL: &str = r"
CREATE TABLE payment_returns (
    id UUID PRIMARY KEY,
    external_reference UUID NOT NULL UNIQUE,
    bank_account VARCHAR(32) NOT NULL,
    end_to_end_id VARCHAR(35),
    beneficiary_iban VARCHAR(34),
    amount NUMERIC NOT NULL,
    remittance_information TEXT NOT NULL,
    booked_on DATE NOT NULL,
    matched_payment_id UUID REFERENCES payments(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_payment_returns_unmatched
    ON payment_returns(booked_on, created_at)
    WHERE matched_payment_id IS NULL;
";

const CAPITAL_TRANSFER_CONTRACTS_SQL: &str = r"
-- Earlier contract states are owned by the contract workflow; the core
-- only reads APPROVED rows and writes EXECUTED.
CREATE TABLE capital_transfer_contracts (
    id UUID PRIMARY KEY,
    seller_id UUID NOT NULL,
    buyer_id UUID NOT NULL,
    transfer_amounts JSONB NOT NULL,
    state VARCHAR(32) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_distinct_parties CHECK (seller_id <> buyer_id)
);

CREATE INDEX idx_capital_transfer_contracts_state
    ON capital_transfer_contracts(state, updated_at);

CREATE TABLE capital_transfer_contract_transactions (
    contract_id UUID NOT NULL REFERENCES capital_transfer_contracts(id),
    transaction_id UUID NOT NULL REFERENCES ledger_transactions(id),
    PRIMARY KEY (contract_id, transaction_id)
);
";

const JOB_LOCKS_SQL: &str = r"
CREATE TABLE job_locks (
    name VARCHAR(64) PRIMARY KEY,
    lock_until TIMESTAMPTZ NOT NULL,
    locked_at TIMESTAMPTZ NOT NULL,
    locked_by VARCHAR(255) NOT NULL
);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: reject_ledger_mutation
-- Ledger rows are append-only; corrections are new transactions
-- ============================================================
CREATE OR REPLACE FUNCTION reject_ledger_mutation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Ledger is append-only: % on % is not allowed', TG_OP, TG_TABLE_NAME;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_ledger_transactions_append_only
BEFORE UPDATE OR DELETE ON ledger_transactions
FOR EACH ROW
EXECUTE FUNCTION reject_ledger_mutation();

CREATE TRIGGER trg_ledger_entries_append_only
BEFORE UPDATE OR DELETE ON ledger_entries
FOR EACH ROW
EXECUTE FUNCTION reject_ledger_mutation();

-- ============================================================
-- FUNCTION: check_transaction_balance
-- Postings of each asset type must net to zero at commit
-- ============================================================
CREATE OR REPLACE FUNCTION check_transaction_balance()
RETURNS TRIGGER AS $$
DECLARE
    offending RECORD;
BEGIN
    SELECT asset_type, SUM(amount) AS total
    INTO offending
    FROM ledger_entries
    WHERE transaction_id = NEW.transaction_id
    GROUP BY asset_type
    HAVING SUM(amount) <> 0
    LIMIT 1;

    IF FOUND THEN
        RAISE EXCEPTION 'Transaction % is not balanced for %: postings sum to %',
            NEW.transaction_id, offending.asset_type, offending.total;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_balance
AFTER INSERT ON ledger_entries
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_transaction_balance();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

DROP TRIGGER IF EXISTS trg_check_balance ON ledger_entries;
DROP TRIGGER IF EXISTS trg_ledger_entries_append_only ON ledger_entries;
DROP TRIGGER IF EXISTS trg_ledger_transactions_append_only ON ledger_transactions;

DROP FUNCTION IF EXISTS check_transaction_balance();
DROP FUNCTION IF EXISTS reject_ledger_mutation();

DROP TABLE IF EXISTS job_locks;
DROP TABLE IF EXISTS capital_transfer_contract_transactions;
DROP TABLE IF EXISTS capital_transfer_contracts;
DROP TABLE IF EXISTS payment_returns;
DROP TABLE IF EXISTS payments;
DROP TABLE IF EXISTS ledger_entries;
DROP TABLE IF EXISTS ledger_transactions;
DROP TABLE IF EXISTS ledger_accounts;
";
