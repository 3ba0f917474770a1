//! Stock ledger: on-hand lines and the append-only movement log.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(MOVEMENT_TYPE_SQL).await?;
        db.execute_unprepared(PHARMACY_STOCK_SQL).await?;
        db.execute_unprepared(STOCK_MOVEMENTS_SQL).await?;
        db.execute_unprepared(APPEND_ONLY_TRIGGER_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const MOVEMENT_TYPE_SQL: &str = r"
CREATE TYPE stock_movement_type AS ENUM (
    'PURCHASE',
    'SALE',
    'ADJUSTMENT',
    'RETURN_INWARD',
    'RETURN_OUTWARD',
    'EXPIRY',
    'DAMAGE',
    'RECALL',
    'TRANSFER_IN',
    'TRANSFER_OUT',
    'ALLOCATION',
    'RELEASE',
    'STOCK_TAKE'
);
";

const PHARMACY_STOCK_SQL: &str = r"
CREATE TABLE pharmacy_stock (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id     UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    pharmacy_id         UUID NOT NULL,
    drug_id             UUID NOT NULL REFERENCES drugs(id) ON DELETE NO ACTION,
    batch_number        VARCHAR(100) NOT NULL,
    quantity            NUMERIC(19, 4) NOT NULL DEFAULT 0,
    allocated_quantity  NUMERIC(19, 4) NOT NULL DEFAULT 0,
    cost_price          NUMERIC(19, 4) NOT NULL DEFAULT 0,
    selling_price       NUMERIC(19, 4) NOT NULL DEFAULT 0,
    expiry_date         DATE,
    is_quarantined      BOOLEAN NOT NULL DEFAULT false,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT fk_pharmacy_stock_pharmacy
        FOREIGN KEY (pharmacy_id, organization_id)
        REFERENCES pharmacies(id, organization_id) ON DELETE CASCADE,
    CONSTRAINT uq_pharmacy_stock_batch UNIQUE (pharmacy_id, drug_id, batch_number),
    CONSTRAINT chk_stock_quantity_non_negative CHECK (quantity >= 0),
    CONSTRAINT chk_stock_allocated_non_negative CHECK (allocated_quantity >= 0),
    CONSTRAINT chk_stock_allocated_within_quantity CHECK (allocated_quantity <= quantity),
    CONSTRAINT chk_stock_cost_price_non_negative CHECK (cost_price >= 0),
    CONSTRAINT chk_stock_selling_price_non_negative CHECK (selling_price >= 0)
);

-- FEFO lookup: earliest expiry first among sellable lines.
CREATE INDEX idx_pharmacy_stock_fefo
    ON pharmacy_stock(pharmacy_id, drug_id, expiry_date)
    WHERE is_quarantined = false AND quantity > 0;

CREATE INDEX idx_pharmacy_stock_drug ON pharmacy_stock(organization_id, drug_id);
";

const STOCK_MOVEMENTS_SQL: &str = r"
CREATE TABLE stock_movements (
    id                      UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id         UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    stock_id                UUID NOT NULL REFERENCES pharmacy_stock(id) ON DELETE CASCADE,
    pharmacy_id             UUID NOT NULL,
    drug_id                 UUID NOT NULL REFERENCES drugs(id) ON DELETE NO ACTION,
    batch_number            VARCHAR(100) NOT NULL,
    movement_type           stock_movement_type NOT NULL,
    quantity                NUMERIC(19, 4) NOT NULL,
    balance_after           NUMERIC(19, 4) NOT NULL,
    allocated_after         NUMERIC(19, 4) NOT NULL,
    valuation_rate          NUMERIC(19, 4) NOT NULL,
    stock_value             NUMERIC(19, 4) NOT NULL,
    stock_value_difference  NUMERIC(19, 4) NOT NULL,
    posting_datetime        TIMESTAMPTZ NOT NULL,
    fiscal_year             INTEGER NOT NULL,
    fiscal_period           SMALLINT NOT NULL,
    reference_type          VARCHAR(50),
    reference_id            UUID,
    remarks                 TEXT,
    created_by              UUID,
    created_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT fk_stock_movements_pharmacy
        FOREIGN KEY (pharmacy_id, organization_id)
        REFERENCES pharmacies(id, organization_id) ON DELETE CASCADE,
    CONSTRAINT chk_stock_movements_balance CHECK (balance_after >= 0),
    CONSTRAINT chk_stock_movements_allocated
        CHECK (allocated_after >= 0 AND allocated_after <= balance_after),
    CONSTRAINT chk_stock_movements_period CHECK (fiscal_period BETWEEN 1 AND 12)
);

CREATE INDEX idx_stock_movements_stock ON stock_movements(stock_id, posting_datetime);
CREATE INDEX idx_stock_movements_pharmacy
    ON stock_movements(pharmacy_id, posting_datetime DESC);
CREATE INDEX idx_stock_movements_reference
    ON stock_movements(reference_type, reference_id)
    WHERE reference_id IS NOT NULL;
";

// Cascades run at trigger depth > 1; direct UPDATE / DELETE run at depth 1.
const APPEND_ONLY_TRIGGER_SQL: &str = r"
CREATE OR REPLACE FUNCTION prevent_stock_movement_mutation()
RETURNS TRIGGER AS $$
BEGIN
    IF pg_trigger_depth() > 1 THEN
        IF TG_OP = 'DELETE' THEN
            RETURN OLD;
        END IF;
        RETURN NEW;
    END IF;

    RAISE EXCEPTION 'stock_movements is append-only: % is not allowed', TG_OP
        USING ERRCODE = 'check_violation';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_stock_movements_append_only
BEFORE UPDATE OR DELETE ON stock_movements
FOR EACH ROW
EXECUTE FUNCTION prevent_stock_movement_mutation();
";

const DROP_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_stock_movements_append_only ON stock_movements;
DROP FUNCTION IF EXISTS prevent_stock_movement_mutation();
DROP TABLE IF EXISTS stock_movements;
DROP TABLE IF EXISTS pharmacy_stock;
DROP TYPE IF EXISTS stock_movement_type;
";
