//! Integration tests for the purchase order lifecycle.
//!
//! Requires a running `PostgreSQL` database with migrations applied.

mod common;

use apotik_core::procurement::{LineQuantity, ProcurementError};
use apotik_db::entities::{
    purchase_order_items, purchase_orders, sea_orm_active_enums::PurchaseOrderStatus, suppliers,
};
use apotik_db::repositories::{
    CreatePurchaseOrderInput, PURCHASE_ORDER_REFERENCE, PurchaseOrderError, PurchaseOrderItemInput,
    PurchaseOrderRepository, PurchaseOrderWithItems, ReceiptLineInput, ReceiveInput,
    UpdatePurchaseOrderInput,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

use common::{Fixture, admin_db, cleanup, setup};

fn order_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
}

async fn draft(
    repo: &PurchaseOrderRepository,
    fx: &Fixture,
    code: &str,
) -> PurchaseOrderWithItems {
    repo.create_draft(
        fx.org_id,
        CreatePurchaseOrderInput {
            supplier_id: fx.supplier_id,
            pharmacy_id: fx.pharmacy_id,
            code: code.to_string(),
            order_date: order_date(),
            expected_date: None,
            remarks: None,
            items: vec![PurchaseOrderItemInput {
                drug_id: fx.drug_id,
                quantity: dec!(10),
                unit_price: dec!(50),
                uom: Some("box".to_string()),
                conversion_factor: Some(dec!(10)),
            }],
            created_by: Some(fx.user_id),
        },
    )
    .await
    .expect("Failed to create draft")
}

fn receipt(item_id: uuid::Uuid, quantity: Decimal) -> ReceiveInput {
    ReceiveInput {
        lines: vec![ReceiptLineInput {
            item_id,
            quantity,
            batch_number: "PO-BATCH".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2030, 12, 31),
            selling_price: Some(dec!(7.5)),
        }],
        posting_datetime: None,
        remarks: None,
        received_by: None,
    }
}

#[tokio::test]
async fn test_draft_totals_and_edit() {
    let db = admin_db().await;
    let fx = setup(&db).await;
    let repo = PurchaseOrderRepository::new(db.clone());

    let po = draft(&repo, &fx, "po-001").await;
    assert_eq!(po.order.code, "PO-001");
    assert_eq!(po.order.status, PurchaseOrderStatus::Draft);
    assert_eq!(po.order.doc_status, 0);
    assert_eq!(po.order.total_amount, dec!(500));
    assert_eq!(po.items[0].uom, "BOX");

    let edited = repo
        .update_draft(
            fx.org_id,
            po.order.id,
            UpdatePurchaseOrderInput {
                supplier_id: fx.supplier_id,
                pharmacy_id: fx.branch_id,
                order_date: order_date(),
                expected_date: NaiveDate::from_ymd_opt(2026, 2, 10),
                remarks: Some("urgent".to_string()),
                items: vec![PurchaseOrderItemInput {
                    drug_id: fx.drug_id,
                    quantity: dec!(3),
                    unit_price: dec!(20),
                    uom: None,
                    conversion_factor: None,
                }],
            },
        )
        .await
        .expect("Draft edit failed");
    assert_eq!(edited.order.total_amount, dec!(60));
    assert_eq!(edited.order.pharmacy_id, fx.branch_id);
    assert_eq!(edited.items.len(), 1);
    assert_eq!(edited.items[0].uom, "TAB");

    let duplicate = repo
        .create_draft(
            fx.org_id,
            CreatePurchaseOrderInput {
                supplier_id: fx.supplier_id,
                pharmacy_id: fx.pharmacy_id,
                code: "PO-001".to_string(),
                order_date: order_date(),
                expected_date: None,
                remarks: None,
                items: vec![],
                created_by: None,
            },
        )
        .await;
    assert!(matches!(duplicate, Err(PurchaseOrderError::DuplicateCode(_))));

    repo.delete_draft(fx.org_id, po.order.id)
        .await
        .expect("Draft delete failed");
    assert!(matches!(
        repo.find(fx.org_id, po.order.id).await,
        Err(PurchaseOrderError::NotFound(_))
    ));

    cleanup(&db, fx.org_id).await;
}

#[tokio::test]
async fn test_submitted_order_is_immutable() {
    let db = admin_db().await;
    let fx = setup(&db).await;
    let repo = PurchaseOrderRepository::new(db.clone());

    let po = draft(&repo, &fx, "PO-002").await;
    let submitted = repo
        .submit(fx.org_id, po.order.id, fx.user_id)
        .await
        .expect("Submit failed");
    assert_eq!(submitted.order.status, PurchaseOrderStatus::Submitted);
    assert_eq!(submitted.order.doc_status, 1);
    assert_eq!(submitted.order.submitted_by, Some(fx.user_id));

    let delete = repo.delete_draft(fx.org_id, po.order.id).await;
    assert!(matches!(
        delete,
        Err(PurchaseOrderError::Procurement(ProcurementError::CannotModify(_)))
    ));

    // The trigger refuses the same change when the repository is bypassed.
    let mut header: purchase_orders::ActiveModel = submitted.order.clone().into();
    header.total_amount = Set(dec!(1));
    assert!(header.update(&db).await.is_err());

    let mut header: purchase_orders::ActiveModel = submitted.order.clone().into();
    header.remarks = Set(Some("changed after submit".to_string()));
    assert!(header.update(&db).await.is_err());

    let mut item: purchase_order_items::ActiveModel = submitted.items[0].clone().into();
    item.unit_price = Set(dec!(1));
    assert!(item.update(&db).await.is_err());

    cleanup(&db, fx.org_id).await;
}

#[tokio::test]
async fn test_receive_posts_stock_and_supplier_balance() {
    let db = admin_db().await;
    let fx = setup(&db).await;
    let repo = PurchaseOrderRepository::new(db.clone());

    let po = draft(&repo, &fx, "PO-003").await;
    repo.submit(fx.org_id, po.order.id, fx.user_id)
        .await
        .expect("Submit failed");
    let item_id = po.items[0].id;

    let partial = repo
        .receive(fx.org_id, po.order.id, receipt(item_id, dec!(4)))
        .await
        .expect("Partial receipt failed");
    assert_eq!(
        partial.order.order.status,
        PurchaseOrderStatus::PartiallyReceived
    );
    assert_eq!(partial.order.order.received_percentage, dec!(40));
    let movement = &partial.movements[0];
    assert_eq!(movement.movement.quantity, dec!(40));
    assert_eq!(movement.stock.cost_price, dec!(5));
    assert_eq!(movement.stock.selling_price, dec!(7.5));
    assert_eq!(
        movement.movement.reference_type.as_deref(),
        Some(PURCHASE_ORDER_REFERENCE)
    );
    assert_eq!(movement.movement.reference_id, Some(po.order.id));

    let over = repo
        .receive(fx.org_id, po.order.id, receipt(item_id, dec!(7)))
        .await;
    assert!(matches!(
        over,
        Err(PurchaseOrderError::Procurement(ProcurementError::OverReceipt { .. }))
    ));

    let full = repo
        .receive(fx.org_id, po.order.id, receipt(item_id, dec!(6)))
        .await
        .expect("Final receipt failed");
    assert_eq!(full.order.order.status, PurchaseOrderStatus::Received);
    assert_eq!(full.order.items[0].received_quantity, dec!(10));
    assert_eq!(full.movements[0].stock.quantity, dec!(100));

    let supplier = suppliers::Entity::find_by_id(fx.supplier_id)
        .one(&db)
        .await
        .expect("Query failed")
        .expect("Supplier missing");
    assert_eq!(supplier.current_balance, dec!(500));

    let invoiced = repo
        .invoice(
            fx.org_id,
            po.order.id,
            &[LineQuantity {
                item_id,
                quantity: dec!(10),
            }],
        )
        .await
        .expect("Invoice failed");
    assert_eq!(invoiced.order.status, PurchaseOrderStatus::Completed);
    assert_eq!(invoiced.order.invoiced_percentage, dec!(100));

    // received_quantity never decreases.
    let mut item: purchase_order_items::ActiveModel = invoiced.items[0].clone().into();
    item.received_quantity = Set(dec!(9));
    assert!(item.update(&db).await.is_err());

    cleanup(&db, fx.org_id).await;
}

#[tokio::test]
async fn test_cancel_close_and_amend() {
    let db = admin_db().await;
    let fx = setup(&db).await;
    let repo = PurchaseOrderRepository::new(db.clone());

    let po = draft(&repo, &fx, "PO-004").await;
    let cancel_draft = repo.cancel(fx.org_id, po.order.id, fx.user_id).await;
    assert!(matches!(
        cancel_draft,
        Err(PurchaseOrderError::Procurement(ProcurementError::InvalidTransition { .. }))
    ));

    repo.submit(fx.org_id, po.order.id, fx.user_id)
        .await
        .expect("Submit failed");
    let amendment = repo
        .amend(fx.org_id, po.order.id, fx.user_id)
        .await
        .expect("Amend failed");
    assert_eq!(amendment.order.code, "PO-004-1");
    assert_eq!(amendment.order.status, PurchaseOrderStatus::Draft);
    assert_eq!(amendment.order.amended_from_id, Some(po.order.id));
    assert_eq!(amendment.items.len(), 1);
    assert_eq!(amendment.items[0].received_quantity, dec!(0));

    let original = repo
        .find(fx.org_id, po.order.id)
        .await
        .expect("Original missing");
    assert_eq!(original.order.status, PurchaseOrderStatus::Cancelled);
    assert_eq!(original.order.doc_status, 2);

    // Amending the amendment after cancelling it continues the sequence.
    repo.submit(fx.org_id, amendment.order.id, fx.user_id)
        .await
        .expect("Submit failed");
    repo.cancel(fx.org_id, amendment.order.id, fx.user_id)
        .await
        .expect("Cancel failed");
    let second = repo
        .amend(fx.org_id, amendment.order.id, fx.user_id)
        .await
        .expect("Second amend failed");
    assert_eq!(second.order.code, "PO-004-2");

    repo.submit(fx.org_id, second.order.id, fx.user_id)
        .await
        .expect("Submit failed");
    repo.receive(fx.org_id, second.order.id, receipt(second.items[0].id, dec!(1)))
        .await
        .expect("Receipt failed");
    let amend_received = repo.amend(fx.org_id, second.order.id, fx.user_id).await;
    assert!(matches!(
        amend_received,
        Err(PurchaseOrderError::Procurement(ProcurementError::CannotModify(_)))
    ));

    let closed = repo
        .close(fx.org_id, second.order.id, fx.user_id)
        .await
        .expect("Close failed");
    assert_eq!(closed.order.status, PurchaseOrderStatus::Closed);
    assert_eq!(closed.order.closed_by, Some(fx.user_id));
    let after_close = repo
        .receive(fx.org_id, second.order.id, receipt(second.items[0].id, dec!(1)))
        .await;
    assert!(matches!(
        after_close,
        Err(PurchaseOrderError::Procurement(ProcurementError::InvalidTransition { .. }))
    ));

    cleanup(&db, fx.org_id).await;
}

#[tokio::test]
async fn test_nearly_complete_receipt_keeps_order_open() {
    let db = admin_db().await;
    let fx = setup(&db).await;
    let repo = PurchaseOrderRepository::new(db.clone());

    let po = repo
        .create_draft(
            fx.org_id,
            CreatePurchaseOrderInput {
                supplier_id: fx.supplier_id,
                pharmacy_id: fx.pharmacy_id,
                code: "PO-BULK".to_string(),
                order_date: order_date(),
                expected_date: None,
                remarks: None,
                items: vec![PurchaseOrderItemInput {
                    drug_id: fx.drug_id,
                    quantity: dec!(100000),
                    unit_price: dec!(1),
                    uom: None,
                    conversion_factor: None,
                }],
                created_by: Some(fx.user_id),
            },
        )
        .await
        .expect("Failed to create draft");
    repo.submit(fx.org_id, po.order.id, fx.user_id)
        .await
        .expect("Submit failed");
    let item_id = po.items[0].id;

    let almost = repo
        .receive(fx.org_id, po.order.id, receipt(item_id, dec!(99999)))
        .await
        .expect("Receipt failed");
    assert_eq!(
        almost.order.order.status,
        PurchaseOrderStatus::PartiallyReceived
    );
    assert_eq!(almost.order.order.received_percentage, dec!(99.99));

    let last = repo
        .receive(fx.org_id, po.order.id, receipt(item_id, dec!(1)))
        .await
        .expect("Last unit could not be received");
    assert_eq!(last.order.order.status, PurchaseOrderStatus::Received);
    assert_eq!(last.order.order.received_percentage, dec!(100));

    cleanup(&db, fx.org_id).await;
}

#[tokio::test]
async fn test_out_of_range_line_is_rejected() {
    let db = admin_db().await;
    let fx = setup(&db).await;
    let repo = PurchaseOrderRepository::new(db.clone());

    let result = repo
        .create_draft(
            fx.org_id,
            CreatePurchaseOrderInput {
                supplier_id: fx.supplier_id,
                pharmacy_id: fx.pharmacy_id,
                code: "PO-HUGE".to_string(),
                order_date: order_date(),
                expected_date: None,
                remarks: None,
                items: vec![PurchaseOrderItemInput {
                    drug_id: fx.drug_id,
                    quantity: dec!(100000000000),
                    unit_price: dec!(100000),
                    uom: None,
                    conversion_factor: None,
                }],
                created_by: Some(fx.user_id),
            },
        )
        .await;
    assert!(matches!(
        result,
        Err(PurchaseOrderError::Procurement(ProcurementError::OutOfRange))
    ));

    cleanup(&db, fx.org_id).await;
}
