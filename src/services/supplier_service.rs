// src/services/supplier_service.rs

use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::Pagination, error::AppError, response::Paginated},
    db::SupplierRepository,
    models::{
        report::count_by_status,
        supplier::{
            CreateSupplierPayload, Supplier, SupplierAdvanceStats, SupplierDashboard, SupplierFilter,
            SupplierInvoiceStats, SupplierOrderStats, SupplierRemoval, UpdateSupplierPayload,
        },
    },
};

#[derive(Clone)]
pub struct SupplierService {
    repo: SupplierRepository,
}

impl SupplierService {
    pub fn new(repo: SupplierRepository) -> Self {
        Self { repo }
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        filter: &SupplierFilter,
    ) -> Result<Paginated<Supplier>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let page = Pagination::new(filter.page, filter.per_page)?;
        let mut conn = executor.acquire().await?;

        let total = self.repo.count(&mut *conn, filter).await?;
        let suppliers = self.repo.list(&mut *conn, filter, page).await?;

        Ok(Paginated::new(suppliers, total, page))
    }

    pub async fn get<'e, E>(&self, executor: E, id: Uuid) -> Result<Supplier, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_by_id(executor, id)
            .await?
            .ok_or_else(|| AppError::not_found("Proveedor no encontrado"))
    }

    pub async fn create<'e, E>(&self, executor: E, payload: &CreateSupplierPayload) -> Result<Supplier, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        if self.repo.name_taken(&mut *conn, payload.nombre.trim(), None).await? {
            return Err(AppError::UniqueConstraintViolation(
                "Ya existe un proveedor con ese nombre".to_string(),
            ));
        }

        let supplier = self.repo.create(&mut *conn, payload).await?;
        tracing::info!("Proveedor {} creado ({})", supplier.nombre, supplier.id);
        Ok(supplier)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdateSupplierPayload,
    ) -> Result<Supplier, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        if payload.is_empty() {
            return Err(AppError::rule("No hay datos para actualizar"));
        }

        let mut conn = executor.acquire().await?;
        if self.repo.find_by_id(&mut *conn, id).await?.is_none() {
            return Err(AppError::not_found("Proveedor no encontrado"));
        }

        if let Some(nombre) = payload.nombre.as_deref() {
            if self.repo.name_taken(&mut *conn, nombre.trim(), Some(id)).await? {
                return Err(AppError::UniqueConstraintViolation(
                    "Ya existe otro proveedor con ese nombre".to_string(),
                ));
            }
        }

        self.repo.update(&mut *conn, id, payload).await
    }

    /// Remove de vez, ou só desativa quando há ordens/faturas.
    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<String, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let supplier = self
            .repo
            .find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Proveedor no encontrado"))?;

        let (ordenes, facturas) = self.repo.reference_counts(&mut *tx, id).await?;
        let removal = SupplierRemoval::decide(ordenes, facturas);

        match removal {
            SupplierRemoval::Hard => self.repo.delete(&mut *tx, id).await?,
            SupplierRemoval::Soft { .. } => {
                self.repo.deactivate(&mut *tx, id).await?;
                tracing::info!(
                    "Proveedor {} desactivado ({} órdenes, {} facturas)",
                    supplier.nombre,
                    ordenes,
                    facturas
                );
            }
        }

        tx.commit().await?;
        Ok(removal.message())
    }

    pub async fn dashboard<'e, E>(&self, executor: E, id: Uuid) -> Result<SupplierDashboard, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let supplier = self
            .repo
            .find_by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Proveedor no encontrado"))?;

        let orders = self.repo.order_buckets(&mut *conn, id).await?;
        let invoices = self.repo.invoice_buckets(&mut *conn, id).await?;
        let anticipos = self.repo.advances_total(&mut *conn, id).await?;

        Ok(SupplierDashboard {
            supplier,
            purchase_orders: SupplierOrderStats {
                total: orders.iter().map(|b| b.cantidad).sum(),
                monto_total: orders.iter().map(|b| b.monto).sum(),
                por_estado: count_by_status(&orders),
            },
            invoices: SupplierInvoiceStats {
                total: invoices.iter().map(|b| b.cantidad).sum(),
                monto_total: invoices.iter().map(|b| b.monto).sum(),
                saldo_pendiente: invoices.iter().map(|b| b.saldo).sum(),
                por_estado: count_by_status(&invoices),
            },
            anticipos: SupplierAdvanceStats { monto_total: anticipos },
        })
    }
}
