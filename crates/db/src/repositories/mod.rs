//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.
//! Every method on tenant data takes the `organization_id` it acts on and
//! runs inside an RLS-scoped transaction.

pub(crate) mod constraint;
pub mod customer;
pub mod drug;
pub mod organization;
pub mod password_reset;
pub mod pharmacy;
pub mod purchase_order;
pub mod role;
pub mod stock;
pub mod supplier;
pub mod user;

pub use customer::{CreateCustomerInput, CustomerError, CustomerRepository};
pub use drug::{CreateDrugInput, DEFAULT_UNIT, DrugError, DrugRepository};
pub use organization::{CreateOrganizationInput, OrganizationError, OrganizationRepository};
pub use password_reset::{PasswordResetError, PasswordResetRepository};
pub use pharmacy::{CreatePharmacyInput, PharmacyError, PharmacyRepository};
pub use purchase_order::{
    CreatePurchaseOrderInput, PURCHASE_ORDER_REFERENCE, PurchaseOrderError, PurchaseOrderFilter,
    PurchaseOrderItemInput, PurchaseOrderRepository, PurchaseOrderWithItems, ReceiptLineInput,
    ReceiptResult, ReceiveInput, UpdatePurchaseOrderInput,
};
pub use role::{CreateRoleInput, RoleError, RoleRepository, RoleWithScope};
pub use stock::{
    DispenseInput, MovementFilter, PostMovementInput, PostedMovement, StockLedgerError,
    StockRepository, TRANSFER_REFERENCE, TransferInput, TransferResult,
};
pub use supplier::{CreateSupplierInput, SupplierError, SupplierRepository};
pub use user::{CreateUserInput, UserError, UserRepository, normalize_email};
