pub mod supplier_repo;
pub use supplier_repo::SupplierRepository;
pub mod purchase_order_repo;
pub use purchase_order_repo::PurchaseOrderRepository;
pub mod invoice_repo;
pub use invoice_repo::InvoiceRepository;
pub mod payment_repo;
pub use payment_repo::PaymentRepository;
pub mod advance_repo;
pub use advance_repo::AdvanceRepository;
pub mod shipment_repo;
pub use shipment_repo::ShipmentRepository;
pub mod report_repo;
pub use report_repo::ReportRepository;

pub mod ledger_repo;
pub use ledger_repo::PgLedger;
