// src/services/invoice_service.rs

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::Pagination, error::AppError, response::Paginated},
    db::{InvoiceRepository, PgLedger, PurchaseOrderRepository, SupplierRepository},
    models::{
        invoice::{
            default_installment, ensure_same_supplier, validate_installments, AllocationOutcome,
            ApplyAdvancePayload, CreateInvoicePayload, DueApplication, Invoice, InvoiceDueDetail, InvoiceFilter,
            InvoiceStats, InvoiceWithSupplier, UpdateInvoicePayload,
        },
        report::{amount_by_currency, balance_by_currency, count_by_status},
    },
    services::reconciliation,
};

#[derive(Clone)]
pub struct InvoiceService {
    repo: InvoiceRepository,
    supplier_repo: SupplierRepository,
    order_repo: PurchaseOrderRepository,
}

impl InvoiceService {
    pub fn new(
        repo: InvoiceRepository,
        supplier_repo: SupplierRepository,
        order_repo: PurchaseOrderRepository,
    ) -> Self {
        Self { repo, supplier_repo, order_repo }
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        filter: &InvoiceFilter,
    ) -> Result<Paginated<InvoiceWithSupplier>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let page = Pagination::new(filter.page, filter.per_page)?;
        let mut conn = executor.acquire().await?;

        let total = self.repo.count(&mut *conn, filter).await?;
        let invoices = self.repo.list(&mut *conn, filter, page).await?;

        Ok(Paginated::new(invoices, total, page))
    }

    pub async fn get<'e, E>(&self, executor: E, id: Uuid) -> Result<InvoiceWithSupplier, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        self.repo
            .find_with_supplier(executor, id)
            .await?
            .ok_or_else(|| AppError::not_found("Factura no encontrada"))
    }

    /// Cria a fatura (saldo = total) e as cuotas na mesma transação.
    /// Devolve a fatura e a mensagem de sucesso.
    pub async fn create<'e, E>(
        &self,
        executor: E,
        payload: &CreateInvoicePayload,
    ) -> Result<(Invoice, String), AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let fecha_emision = payload.fecha_emision.unwrap_or_else(|| Utc::now().date_naive());
        let dues = match &payload.vencimientos {
            Some(dues) => {
                validate_installments(payload.monto_total, dues)?;
                dues.clone()
            }
            None => vec![default_installment(payload.monto_total, fecha_emision)],
        };

        let mut tx = executor.begin().await?;

        let supplier = self
            .supplier_repo
            .find_by_id(&mut *tx, payload.supplier_id)
            .await?
            .ok_or_else(|| AppError::not_found("Proveedor no encontrado"))?;
        if !supplier.activo {
            return Err(AppError::rule(
                "No se pueden crear facturas para proveedores inactivos",
            ));
        }

        let numero = payload.numero_factura.trim();
        if self.repo.numero_taken(&mut *tx, supplier.id, numero, None).await? {
            return Err(AppError::UniqueConstraintViolation(
                "Ya existe una factura con ese número para este proveedor".to_string(),
            ));
        }

        let invoice = self.repo.create(&mut *tx, payload, fecha_emision).await?;
        for due in &dues {
            self.repo.insert_due(&mut *tx, invoice.id, due).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Factura {} creada para {} ({} {}, {} cuotas)",
            invoice.numero_factura,
            supplier.nombre,
            invoice.monto_total,
            invoice.moneda.as_str(),
            dues.len()
        );
        let message = format!("Factura creada exitosamente para {}", supplier.nombre);
        Ok((invoice, message))
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdateInvoicePayload,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        if payload.is_empty() {
            return Err(AppError::rule("No hay datos para actualizar"));
        }

        let mut tx = executor.begin().await?;

        let mut invoice = self
            .repo
            .lock_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Factura no encontrada"))?;

        if let Some(numero) = payload.numero_factura.as_deref() {
            if self
                .repo
                .numero_taken(&mut *tx, invoice.supplier_id, numero.trim(), Some(id))
                .await?
            {
                return Err(AppError::UniqueConstraintViolation(
                    "Ya existe otra factura con ese número para este proveedor".to_string(),
                ));
            }
        }

        if let Some(monto_total) = payload.monto_total {
            invoice.retotal(monto_total);
        }
        if let Some(estado) = payload.estado {
            invoice.override_status(estado)?;
        }

        let updated = self.repo.update(&mut *tx, &invoice, payload).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Só remove faturas sem pagamentos nem anticipos aplicados.
    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<String, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let invoice = self
            .repo
            .lock_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Factura no encontrada"))?;

        let (pagos, anticipos) = self.repo.settlement_counts(&mut *tx, id).await?;
        if pagos > 0 || anticipos > 0 {
            return Err(AppError::rule(format!(
                "No se puede eliminar: tiene {} pagos y {} anticipos aplicados",
                pagos, anticipos
            )));
        }

        self.repo.delete(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!("Factura {} eliminada", invoice.numero_factura);
        Ok(format!("Factura {} eliminada exitosamente", invoice.numero_factura))
    }

    pub async fn link_purchase_order<'e, E>(&self, executor: E, id: Uuid, po_id: Uuid) -> Result<String, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let invoice = self
            .repo
            .find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Factura no encontrada"))?;
        let order = self
            .order_repo
            .find_by_id(&mut *tx, po_id)
            .await?
            .ok_or_else(|| AppError::not_found("Orden de compra no encontrada"))?;

        ensure_same_supplier(invoice.supplier_id, order.supplier_id)?;

        if self.repo.po_link_exists(&mut *tx, id, po_id).await? {
            return Err(AppError::rule("La factura ya está vinculada a esta orden"));
        }

        self.repo.link_po(&mut *tx, id, po_id).await?;
        tx.commit().await?;

        Ok(format!(
            "Factura {} vinculada exitosamente a orden {}",
            invoice.numero_factura, order.numero_orden
        ))
    }

    pub async fn apply_advance<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &ApplyAdvancePayload,
    ) -> Result<AllocationOutcome, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let mut ledger = PgLedger::new(&mut *tx);
        let outcome = reconciliation::allocate(&mut ledger, id, payload).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    /// Cuotas da fatura com o que já foi aplicado em cada uma.
    pub async fn dues<'e, E>(&self, executor: E, id: Uuid) -> Result<Vec<InvoiceDueDetail>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        if self.repo.find_by_id(&mut *conn, id).await?.is_none() {
            return Err(AppError::not_found("Factura no encontrada"));
        }

        let dues = self.repo.dues_of(&mut *conn, id).await?;
        let mut by_due: HashMap<Uuid, Vec<DueApplication>> = HashMap::new();
        for app in self.repo.due_applications(&mut *conn, id).await? {
            by_due.entry(app.due_id).or_default().push(app);
        }

        Ok(dues
            .into_iter()
            .map(|due| {
                let apps = by_due.remove(&due.id).unwrap_or_default();
                InvoiceDueDetail::new(due, apps)
            })
            .collect())
    }

    pub async fn stats<'e, E>(&self, executor: E) -> Result<InvoiceStats, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let by_status = self.repo.status_buckets(&mut *conn).await?;
        let by_currency = self.repo.currency_buckets(&mut *conn).await?;

        Ok(InvoiceStats {
            total_facturas: by_status.iter().map(|b| b.cantidad).sum(),
            por_estado: count_by_status(&by_status),
            totales_por_moneda: amount_by_currency(&by_currency),
            saldos_pendientes_por_moneda: balance_by_currency(&by_currency),
        })
    }
}
