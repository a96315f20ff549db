pub mod money;
pub mod supplier;
pub mod purchase_order;
pub mod invoice;
pub mod payment;
pub mod advance;
pub mod shipment;
pub mod report;
pub mod system;
