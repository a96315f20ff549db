pub mod system;
pub mod suppliers;
pub mod purchase_orders;
pub mod invoices;
pub mod payments;
pub mod advances;
pub mod shipments;
pub mod reports;
