// src/services/purchase_order_service.rs

use chrono::Utc;
use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::Pagination, error::AppError, response::Paginated},
    db::{AdvanceRepository, PurchaseOrderRepository, SupplierRepository},
    models::{
        purchase_order::{
            check_total_covers_advances, CreatePurchaseOrderPayload, OrderAdvancesDashboard, PurchaseOrder,
            PurchaseOrderFilter, PurchaseOrderStats, PurchaseOrderWithSupplier, UpdatePurchaseOrderPayload,
        },
        report::{amount_by_currency, count_by_status},
    },
};

#[derive(Clone)]
pub struct PurchaseOrderService {
    repo: PurchaseOrderRepository,
    supplier_repo: SupplierRepository,
    advance_repo: AdvanceRepository,
}

impl PurchaseOrderService {
    pub fn new(
        repo: PurchaseOrderRepository,
        supplier_repo: SupplierRepository,
        advance_repo: AdvanceRepository,
    ) -> Self {
        Self { repo, supplier_repo, advance_repo }
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        filter: &PurchaseOrderFilter,
    ) -> Result<Paginated<PurchaseOrderWithSupplier>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let page = Pagination::new(filter.page, filter.per_page)?;
        let mut conn = executor.acquire().await?;

        let total = self.repo.count(&mut *conn, filter).await?;
        let orders = self.repo.list(&mut *conn, filter, page).await?;

        Ok(Paginated::new(orders, total, page))
    }

    pub async fn get<'e, E>(&self, executor: E, id: Uuid) -> Result<PurchaseOrderWithSupplier, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_with_supplier(executor, id)
            .await?
            .ok_or_else(|| AppError::not_found("Orden de compra no encontrada"))
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        payload: &CreatePurchaseOrderPayload,
    ) -> Result<(PurchaseOrder, String), AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let supplier = self
            .supplier_repo
            .find_by_id(&mut *conn, payload.supplier_id)
            .await?
            .ok_or_else(|| AppError::not_found("Proveedor no encontrado"))?;
        if !supplier.activo {
            return Err(AppError::rule(
                "No se pueden crear órdenes para proveedores inactivos",
            ));
        }

        if self.repo.numero_taken(&mut *conn, payload.numero_orden.trim(), None).await? {
            return Err(AppError::UniqueConstraintViolation(
                "Ya existe una orden con ese número".to_string(),
            ));
        }

        let fecha = payload.fecha.unwrap_or_else(|| Utc::now().date_naive());
        let order = self.repo.create(&mut *conn, payload, fecha).await?;

        tracing::info!(
            "Orden {} creada para {} ({} {})",
            order.numero_orden,
            supplier.nombre,
            order.total_oc,
            order.moneda.as_str()
        );
        let message = format!("Orden de compra creada exitosamente para {}", supplier.nombre);
        Ok((order, message))
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdatePurchaseOrderPayload,
    ) -> Result<PurchaseOrder, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        if payload.is_empty() {
            return Err(AppError::rule("No hay datos para actualizar"));
        }

        let mut tx = executor.begin().await?;

        self.repo
            .lock_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Orden de compra no encontrada"))?;

        if let Some(numero) = payload.numero_orden.as_deref() {
            if self.repo.numero_taken(&mut *tx, numero.trim(), Some(id)).await? {
                return Err(AppError::UniqueConstraintViolation(
                    "Ya existe una orden con ese número".to_string(),
                ));
            }
        }

        if let Some(total_oc) = payload.total_oc {
            let anticipos = self.repo.advances_total(&mut *tx, id).await?;
            check_total_covers_advances(total_oc, anticipos)?;
        }

        let order = self.repo.update(&mut *tx, id, payload).await?;
        tx.commit().await?;
        Ok(order)
    }

    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<String, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let order = self
            .repo
            .lock_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Orden de compra no encontrada"))?;

        let (anticipos, facturas) = self.repo.dependents(&mut *tx, id).await?;
        if anticipos > 0 || facturas > 0 {
            return Err(AppError::rule(format!(
                "No se puede eliminar: tiene {} anticipos y {} facturas vinculadas",
                anticipos, facturas
            )));
        }

        self.repo.delete(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!("Orden {} eliminada", order.numero_orden);
        Ok(format!("Orden {} eliminada exitosamente", order.numero_orden))
    }

    pub async fn advances_dashboard<'e, E>(&self, executor: E, id: Uuid) -> Result<OrderAdvancesDashboard, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let orden = self
            .repo
            .find_by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Orden de compra no encontrada"))?;
        let anticipos = self.advance_repo.balances_for_order(&mut *conn, id).await?;
        let facturas = self.repo.linked_invoices(&mut *conn, id).await?;

        Ok(OrderAdvancesDashboard::build(orden, anticipos, facturas))
    }

    pub async fn stats<'e, E>(&self, executor: E) -> Result<PurchaseOrderStats, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let by_status = self.repo.status_buckets(&mut *conn).await?;
        let by_currency = self.repo.currency_buckets(&mut *conn).await?;

        Ok(PurchaseOrderStats {
            total_ordenes: by_status.iter().map(|b| b.cantidad).sum(),
            por_estado: count_by_status(&by_status),
            totales_por_moneda: amount_by_currency(&by_currency),
        })
    }
}
