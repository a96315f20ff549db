// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SGF - Sistema de Gestión Financiera",
        description = "Gestão financeira de importações: fornecedores, ordens, faturas, anticipos e embarques"
    ),
    paths(
        // --- System ---
        handlers::system::root,
        handlers::system::health,
        handlers::system::get_dashboard_stats,

        // --- Suppliers ---
        handlers::suppliers::list_suppliers,
        handlers::suppliers::get_supplier,
        handlers::suppliers::create_supplier,
        handlers::suppliers::update_supplier,
        handlers::suppliers::delete_supplier,
        handlers::suppliers::get_supplier_dashboard,

        // --- Purchase Orders ---
        handlers::purchase_orders::list_purchase_orders,
        handlers::purchase_orders::get_purchase_order,
        handlers::purchase_orders::create_purchase_order,
        handlers::purchase_orders::update_purchase_order,
        handlers::purchase_orders::delete_purchase_order,
        handlers::purchase_orders::get_advances_dashboard,
        handlers::purchase_orders::get_purchase_order_stats,

        // --- Invoices ---
        handlers::invoices::list_invoices,
        handlers::invoices::get_invoice,
        handlers::invoices::create_invoice,
        handlers::invoices::update_invoice,
        handlers::invoices::delete_invoice,
        handlers::invoices::link_purchase_order,
        handlers::invoices::apply_advance,
        handlers::invoices::get_invoice_dues,
        handlers::invoices::get_invoice_stats,

        // --- Payments ---
        handlers::payments::list_payments,
        handlers::payments::get_payment,
        handlers::payments::create_payment,
        handlers::payments::update_payment,
        handlers::payments::delete_payment,
        handlers::payments::get_payments_by_invoice,
        handlers::payments::get_payment_stats,

        // --- Advances ---
        handlers::advances::list_advances,
        handlers::advances::get_advance,
        handlers::advances::create_advance,
        handlers::advances::update_advance,
        handlers::advances::delete_advance,
        handlers::advances::return_advance,
        handlers::advances::release_allocation,
        handlers::advances::get_advances_by_order,
        handlers::advances::get_available_advances,
        handlers::advances::get_advance_stats,

        // --- Shipments ---
        handlers::shipments::list_shipments,
        handlers::shipments::get_shipment,
        handlers::shipments::create_shipment,
        handlers::shipments::update_shipment,
        handlers::shipments::delete_shipment,
        handlers::shipments::link_suppliers,
        handlers::shipments::link_invoice,
        handlers::shipments::update_assignment,
        handlers::shipments::unlink_invoice,
        handlers::shipments::get_shipment_balance,
        handlers::shipments::get_shipments_by_supplier,
        handlers::shipments::get_in_transit,
        handlers::shipments::get_upcoming_arrivals,
        handlers::shipments::mark_arrived,
        handlers::shipments::mark_dispatched,
        handlers::shipments::get_shipment_stats,

        // --- Reports ---
        handlers::reports::get_executive_dashboard,
        handlers::reports::get_order_reconciliation,
        handlers::reports::get_cash_flow,
        handlers::reports::get_upcoming_dues,
        handlers::reports::get_supplier_detail,
    ),
    components(
        schemas(
            // --- Comum ---
            models::money::Currency,
            models::money::CurrencyTotals,
            models::report::CountAmount,
            models::system::ApiInfo,
            models::system::HealthStatus,

            // --- Suppliers ---
            models::supplier::Supplier,
            models::supplier::SupplierSummary,
            models::supplier::CreateSupplierPayload,
            models::supplier::UpdateSupplierPayload,
            models::supplier::SupplierDashboard,

            // --- Purchase Orders ---
            models::purchase_order::PurchaseOrderStatus,
            models::purchase_order::PurchaseOrder,
            models::purchase_order::PurchaseOrderWithSupplier,
            models::purchase_order::CreatePurchaseOrderPayload,
            models::purchase_order::UpdatePurchaseOrderPayload,
            models::purchase_order::OrderAdvancesDashboard,
            models::purchase_order::OrderBalance,
            models::purchase_order::PurchaseOrderStats,

            // --- Invoices ---
            models::invoice::InvoiceStatus,
            models::invoice::InvoiceKind,
            models::invoice::Invoice,
            models::invoice::InvoiceWithSupplier,
            models::invoice::InvoiceDue,
            models::invoice::InvoiceDueDetail,
            models::invoice::DueApplication,
            models::invoice::DueInput,
            models::invoice::CreateInvoicePayload,
            models::invoice::UpdateInvoicePayload,
            models::invoice::LinkPurchaseOrderPayload,
            models::invoice::ApplyAdvancePayload,
            models::invoice::AllocationOutcome,
            models::invoice::InvoiceStats,

            // --- Payments ---
            models::payment::InvoicePayment,
            models::payment::PaymentWithInvoice,
            models::payment::PaymentDetail,
            models::payment::CreatePaymentPayload,
            models::payment::UpdatePaymentPayload,
            models::payment::PaymentOutcome,
            models::payment::PaymentsByInvoice,
            models::payment::PaymentStats,

            // --- Advances ---
            models::advance::AdvanceStatus,
            models::advance::AdvancePayment,
            models::advance::AdvanceWithOrder,
            models::advance::AdvanceDetail,
            models::advance::AdvancesByOrder,
            models::advance::AvailableAdvances,
            models::advance::CreateAdvancePayload,
            models::advance::UpdateAdvancePayload,
            models::advance::ReleaseOutcome,
            models::advance::AdvanceStats,

            // --- Shipments ---
            models::shipment::ShipmentStatus,
            models::shipment::Shipment,
            models::shipment::ShipmentListItem,
            models::shipment::ShipmentDetail,
            models::shipment::ShipmentInvoiceLine,
            models::shipment::ShipmentBalance,
            models::shipment::TrackedShipment,
            models::shipment::InTransitReport,
            models::shipment::UpcomingArrivals,
            models::shipment::ShipmentsBySupplier,
            models::shipment::ShipmentStats,
            models::shipment::CreateShipmentPayload,
            models::shipment::UpdateShipmentPayload,
            models::shipment::LinkSuppliersPayload,
            models::shipment::LinkInvoicePayload,
            models::shipment::UpdateAssignmentPayload,

            // --- Reports ---
            models::report::ExecutiveDashboard,
            models::report::ReconciliationReport,
            models::report::ReconciliationState,
            models::report::CashFlowProjection,
            models::report::UpcomingDuesReport,
            models::report::DueUrgency,
            models::report::SupplierDetailReport,
            models::report::SystemStats,
        )
    ),
    tags(
        (name = "System", description = "Estado da API e números gerais"),
        (name = "Suppliers", description = "Cadastro de Fornecedores"),
        (name = "Purchase Orders", description = "Ordens de Compra"),
        (name = "Invoices", description = "Faturas, Cuotas e Aplicação de Anticipos"),
        (name = "Payments", description = "Pagamentos de Faturas"),
        (name = "Advances", description = "Anticipos por Ordem de Compra"),
        (name = "Shipments", description = "Embarques, Fornecedores e Faturas Vinculadas"),
        (name = "Reports", description = "Dashboards e Conciliação")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_resource() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/suppliers",
            "/api/purchase-orders/{id}/anticipos-dashboard",
            "/api/invoices/{id}/aplicar-anticipo",
            "/api/payments/por-factura/{invoice_id}",
            "/api/advances/{id}/aplicaciones/{allocation_id}",
            "/api/shipments/{id}/cuadre",
            "/api/reports/flujo-caja-proyectado",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "faltando {}", path);
        }
    }
}
