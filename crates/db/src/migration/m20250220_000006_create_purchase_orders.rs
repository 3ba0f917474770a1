//! Purchase orders and their items.
//!
//! Only draft orders (`doc_status = 0`) may change. Submitted and cancelled
//! orders keep their header and items; receipts and invoices only move
//! `received_quantity` / `invoiced_quantity` forward.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(STATUS_TYPE_SQL).await?;
        db.execute_unprepared(PURCHASE_ORDERS_SQL).await?;
        db.execute_unprepared(PURCHASE_ORDER_ITEMS_SQL).await?;
        db.execute_unprepared(HEADER_TRIGGER_SQL).await?;
        db.execute_unprepared(ITEM_TRIGGER_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const STATUS_TYPE_SQL: &str = r"
CREATE TYPE purchase_order_status AS ENUM (
    'DRAFT',
    'SUBMITTED',
    'PARTIALLY_RECEIVED',
    'RECEIVED',
    'COMPLETED',
    'CANCELLED',
    'CLOSED'
);
";

const PURCHASE_ORDERS_SQL: &str = r"
CREATE TABLE purchase_orders (
    id                      UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id         UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    supplier_id             UUID NOT NULL REFERENCES suppliers(id) ON DELETE NO ACTION,
    pharmacy_id             UUID NOT NULL,
    code                    VARCHAR(50) NOT NULL,
    status                  purchase_order_status NOT NULL DEFAULT 'DRAFT',
    doc_status              SMALLINT NOT NULL DEFAULT 0,
    order_date              DATE NOT NULL DEFAULT CURRENT_DATE,
    expected_date           DATE,
    amended_from_id         UUID REFERENCES purchase_orders(id) ON DELETE CASCADE,
    remarks                 TEXT,
    total_amount            NUMERIC(19, 4) NOT NULL DEFAULT 0,
    received_percentage     NUMERIC(5, 2) NOT NULL DEFAULT 0,
    invoiced_percentage     NUMERIC(5, 2) NOT NULL DEFAULT 0,
    submitted_by            UUID,
    submitted_at            TIMESTAMPTZ,
    cancelled_by            UUID,
    cancelled_at            TIMESTAMPTZ,
    closed_by               UUID,
    closed_at               TIMESTAMPTZ,
    created_by              UUID,
    created_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT fk_purchase_orders_pharmacy
        FOREIGN KEY (pharmacy_id, organization_id)
        REFERENCES pharmacies(id, organization_id) ON DELETE CASCADE,
    CONSTRAINT uq_purchase_orders_org_code UNIQUE (organization_id, code),
    CONSTRAINT chk_purchase_orders_doc_status CHECK (doc_status IN (0, 1, 2)),
    CONSTRAINT chk_purchase_orders_draft CHECK ((status = 'DRAFT') = (doc_status = 0)),
    CONSTRAINT chk_purchase_orders_cancelled CHECK ((status = 'CANCELLED') = (doc_status = 2)),
    CONSTRAINT chk_purchase_orders_total CHECK (total_amount >= 0),
    CONSTRAINT chk_purchase_orders_received_pct
        CHECK (received_percentage BETWEEN 0 AND 100),
    CONSTRAINT chk_purchase_orders_invoiced_pct
        CHECK (invoiced_percentage BETWEEN 0 AND 100),
    CONSTRAINT chk_purchase_orders_not_self_amended CHECK (amended_from_id <> id)
);

CREATE INDEX idx_purchase_orders_supplier ON purchase_orders(supplier_id);
CREATE INDEX idx_purchase_orders_status ON purchase_orders(organization_id, status);
CREATE INDEX idx_purchase_orders_amended_from
    ON purchase_orders(amended_from_id) WHERE amended_from_id IS NOT NULL;
";

const PURCHASE_ORDER_ITEMS_SQL: &str = r"
CREATE TABLE purchase_order_items (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id     UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    purchase_order_id   UUID NOT NULL REFERENCES purchase_orders(id) ON DELETE CASCADE,
    drug_id             UUID NOT NULL REFERENCES drugs(id) ON DELETE NO ACTION,
    quantity            NUMERIC(19, 4) NOT NULL,
    unit_price          NUMERIC(19, 4) NOT NULL,
    uom                 VARCHAR(20) NOT NULL,
    conversion_factor   NUMERIC(19, 6) NOT NULL DEFAULT 1,
    received_quantity   NUMERIC(19, 4) NOT NULL DEFAULT 0,
    invoiced_quantity   NUMERIC(19, 4) NOT NULL DEFAULT 0,
    amount              NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_po_items_quantity CHECK (quantity > 0),
    CONSTRAINT chk_po_items_unit_price CHECK (unit_price >= 0),
    CONSTRAINT chk_po_items_conversion_factor CHECK (conversion_factor > 0),
    CONSTRAINT chk_po_items_received
        CHECK (received_quantity >= 0 AND received_quantity <= quantity),
    CONSTRAINT chk_po_items_invoiced
        CHECK (invoiced_quantity >= 0 AND invoiced_quantity <= quantity)
);

CREATE INDEX idx_purchase_order_items_order ON purchase_order_items(purchase_order_id);
CREATE INDEX idx_purchase_order_items_drug ON purchase_order_items(drug_id);
";

const HEADER_TRIGGER_SQL: &str = r"
CREATE OR REPLACE FUNCTION enforce_purchase_order_immutability()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.doc_status = 0 THEN
        RETURN NEW;
    END IF;

    IF NEW.doc_status = 0 THEN
        RAISE EXCEPTION 'Purchase order % cannot return to draft', OLD.code
            USING ERRCODE = 'check_violation';
    END IF;

    IF OLD.doc_status = 2 THEN
        RAISE EXCEPTION 'Purchase order % is cancelled', OLD.code
            USING ERRCODE = 'check_violation';
    END IF;

    IF NEW.organization_id IS DISTINCT FROM OLD.organization_id
        OR NEW.supplier_id IS DISTINCT FROM OLD.supplier_id
        OR NEW.pharmacy_id IS DISTINCT FROM OLD.pharmacy_id
        OR NEW.code IS DISTINCT FROM OLD.code
        OR NEW.order_date IS DISTINCT FROM OLD.order_date
        OR NEW.expected_date IS DISTINCT FROM OLD.expected_date
        OR NEW.total_amount IS DISTINCT FROM OLD.total_amount
        OR NEW.amended_from_id IS DISTINCT FROM OLD.amended_from_id
        OR NEW.remarks IS DISTINCT FROM OLD.remarks
    THEN
        RAISE EXCEPTION 'Purchase order % is submitted; create an amendment instead', OLD.code
            USING ERRCODE = 'check_violation';
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_purchase_orders_immutable
BEFORE UPDATE ON purchase_orders
FOR EACH ROW
EXECUTE FUNCTION enforce_purchase_order_immutability();
";

// Cascaded deletes (organization or draft order removal) run at depth > 1.
const ITEM_TRIGGER_SQL: &str = r"
CREATE OR REPLACE FUNCTION enforce_purchase_order_item_immutability()
RETURNS TRIGGER AS $$
DECLARE
    parent_doc_status SMALLINT;
    parent_id UUID;
BEGIN
    IF TG_OP = 'DELETE' AND pg_trigger_depth() > 1 THEN
        RETURN OLD;
    END IF;

    IF TG_OP = 'UPDATE' THEN
        IF NEW.received_quantity < OLD.received_quantity THEN
            RAISE EXCEPTION 'received_quantity cannot decrease (% -> %)',
                OLD.received_quantity, NEW.received_quantity
                USING ERRCODE = 'check_violation';
        END IF;
        IF NEW.invoiced_quantity < OLD.invoiced_quantity THEN
            RAISE EXCEPTION 'invoiced_quantity cannot decrease (% -> %)',
                OLD.invoiced_quantity, NEW.invoiced_quantity
                USING ERRCODE = 'check_violation';
        END IF;
    END IF;

    IF TG_OP = 'DELETE' THEN
        parent_id := OLD.purchase_order_id;
    ELSE
        parent_id := NEW.purchase_order_id;
    END IF;

    SELECT doc_status INTO parent_doc_status
    FROM purchase_orders
    WHERE id = parent_id;

    IF parent_doc_status IS NULL OR parent_doc_status = 0 THEN
        IF TG_OP = 'DELETE' THEN
            RETURN OLD;
        END IF;
        RETURN NEW;
    END IF;

    IF TG_OP = 'UPDATE'
        AND NEW.purchase_order_id IS NOT DISTINCT FROM OLD.purchase_order_id
        AND NEW.organization_id IS NOT DISTINCT FROM OLD.organization_id
        AND NEW.drug_id IS NOT DISTINCT FROM OLD.drug_id
        AND NEW.quantity IS NOT DISTINCT FROM OLD.quantity
        AND NEW.unit_price IS NOT DISTINCT FROM OLD.unit_price
        AND NEW.uom IS NOT DISTINCT FROM OLD.uom
        AND NEW.conversion_factor IS NOT DISTINCT FROM OLD.conversion_factor
        AND NEW.amount IS NOT DISTINCT FROM OLD.amount
    THEN
        RETURN NEW;
    END IF;

    RAISE EXCEPTION 'Items of a submitted purchase order cannot be changed (%)', TG_OP
        USING ERRCODE = 'check_violation';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_purchase_order_items_immutable
BEFORE INSERT OR UPDATE OR DELETE ON purchase_order_items
FOR EACH ROW
EXECUTE FUNCTION enforce_purchase_order_item_immutability();
";

const DROP_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_purchase_order_items_immutable ON purchase_order_items;
DROP FUNCTION IF EXISTS enforce_purchase_order_item_immutability();
DROP TRIGGER IF EXISTS trg_purchase_orders_immutable ON purchase_orders;
DROP FUNCTION IF EXISTS enforce_purchase_order_immutability();
DROP TABLE IF EXISTS purchase_order_items;
DROP TABLE IF EXISTS purchase_orders;
DROP TYPE IF EXISTS purchase_order_status;
";
