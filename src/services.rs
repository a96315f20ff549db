pub mod reconciliation;

pub mod supplier_service;
pub mod purchase_order_service;
pub mod invoice_service;
pub mod payment_service;
pub mod advance_service;
pub mod shipment_service;
pub mod report_service;
