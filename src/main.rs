//src/main.rs

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod models;
mod services;

use crate::config::{AppState, Settings};
use crate::docs::ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with_target(false)
        .compact()
        .init();

    // Sem estado não há aplicação: o erro sobe e o processo termina.
    let app_state = AppState::new().await?;

    common::error::expose_internal_errors(app_state.settings.debug);

    if app_state.settings.db_run_migrations {
        sqlx::migrate!().run(&app_state.db_pool).await?;
        tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");
    }

    let addr = app_state.settings.listen_addr();
    let app = build_router(app_state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Servidor encerrado");
    Ok(())
}

fn build_router(app_state: AppState) -> Router {
    let supplier_routes = Router::new()
        .route("/"
               ,get(handlers::suppliers::list_suppliers)
               .post(handlers::suppliers::create_supplier)
        )
        .route("/{id}"
               ,get(handlers::suppliers::get_supplier)
               .put(handlers::suppliers::update_supplier)
               .delete(handlers::suppliers::delete_supplier)
        )
        .route("/{id}/dashboard", get(handlers::suppliers::get_supplier_dashboard));

    let purchase_order_routes = Router::new()
        .route("/"
               ,get(handlers::purchase_orders::list_purchase_orders)
               .post(handlers::purchase_orders::create_purchase_order)
        )
        .route("/stats/resumen", get(handlers::purchase_orders::get_purchase_order_stats))
        .route("/{id}"
               ,get(handlers::purchase_orders::get_purchase_order)
               .put(handlers::purchase_orders::update_purchase_order)
               .delete(handlers::purchase_orders::delete_purchase_order)
        )
        .route("/{id}/anticipos-dashboard", get(handlers::purchase_orders::get_advances_dashboard));

    let invoice_routes = Router::new()
        .route("/"
               ,get(handlers::invoices::list_invoices)
               .post(handlers::invoices::create_invoice)
        )
        .route("/stats/resumen", get(handlers::invoices::get_invoice_stats))
        .route("/{id}"
               ,get(handlers::invoices::get_invoice)
               .put(handlers::invoices::update_invoice)
               .delete(handlers::invoices::delete_invoice)
        )
        .route("/{id}/link-oc", post(handlers::invoices::link_purchase_order))
        .route("/{id}/aplicar-anticipo", post(handlers::invoices::apply_advance))
        .route("/{id}/vencimientos", get(handlers::invoices::get_invoice_dues));

    let payment_routes = Router::new()
        .route("/"
               ,get(handlers::payments::list_payments)
               .post(handlers::payments::create_payment)
        )
        .route("/stats/resumen", get(handlers::payments::get_payment_stats))
        .route("/por-factura/{invoice_id}", get(handlers::payments::get_payments_by_invoice))
        .route("/{id}"
               ,get(handlers::payments::get_payment)
               .put(handlers::payments::update_payment)
               .delete(handlers::payments::delete_payment)
        );

    let advance_routes = Router::new()
        .route("/"
               ,get(handlers::advances::list_advances)
               .post(handlers::advances::create_advance)
        )
        .route("/stats/resumen", get(handlers::advances::get_advance_stats))
        .route("/por-orden/{po_id}", get(handlers::advances::get_advances_by_order))
        .route("/disponibles/{po_id}", get(handlers::advances::get_available_advances))
        .route("/{id}"
               ,get(handlers::advances::get_advance)
               .put(handlers::advances::update_advance)
               .delete(handlers::advances::delete_advance)
        )
        .route("/{id}/devolver", post(handlers::advances::return_advance))
        .route("/{id}/aplicaciones/{allocation_id}", delete(handlers::advances::release_allocation));

    let shipment_routes = Router::new()
        .route("/"
               ,get(handlers::shipments::list_shipments)
               .post(handlers::shipments::create_shipment)
        )
        .route("/stats/resumen", get(handlers::shipments::get_shipment_stats))
        .route("/en-transito", get(handlers::shipments::get_in_transit))
        .route("/proximos-arribar", get(handlers::shipments::get_upcoming_arrivals))
        .route("/por-proveedor/{supplier_id}", get(handlers::shipments::get_shipments_by_supplier))
        .route("/{id}"
               ,get(handlers::shipments::get_shipment)
               .put(handlers::shipments::update_shipment)
               .delete(handlers::shipments::delete_shipment)
        )
        .route("/{id}/proveedores", post(handlers::shipments::link_suppliers))
        .route("/{id}/facturas", post(handlers::shipments::link_invoice))
        .route("/{id}/facturas/{invoice_id}"
               ,put(handlers::shipments::update_assignment)
               .delete(handlers::shipments::unlink_invoice)
        )
        .route("/{id}/cuadre", get(handlers::shipments::get_shipment_balance))
        .route("/{id}/marcar-arribado", post(handlers::shipments::mark_arrived))
        .route("/{id}/marcar-despachado", post(handlers::shipments::mark_dispatched));

    let report_routes = Router::new()
        .route("/dashboard-ejecutivo", get(handlers::reports::get_executive_dashboard))
        .route("/conciliacion-ordenes", get(handlers::reports::get_order_reconciliation))
        .route("/flujo-caja-proyectado", get(handlers::reports::get_cash_flow))
        .route("/vencimientos-proximos", get(handlers::reports::get_upcoming_dues))
        .route("/proveedor/{supplier_id}/detalle", get(handlers::reports::get_supplier_detail));

    let cors = cors_layer(&app_state.settings);

    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        .route("/api/stats/dashboard", get(handlers::system::get_dashboard_stats))
        .nest("/api/suppliers", supplier_routes)
        .nest("/api/purchase-orders", purchase_order_routes)
        .nest("/api/invoices", invoice_routes)
        .nest("/api/payments", payment_routes)
        .nest("/api/advances", advance_routes)
        .nest("/api/shipments", shipment_routes)
        .nest("/api/reports", report_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let allowed = settings.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin.to_str().is_ok_and(|o| allowed.allows_origin(o))
        }))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Falha ao escutar o sinal de encerramento: {}", err);
        std::future::pending::<()>().await;
    }
}
