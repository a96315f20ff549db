// src/services/report_service.rs

use chrono::Utc;
use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::check_range, error::AppError},
    db::{
        AdvanceRepository, InvoiceRepository, PurchaseOrderRepository, ReportRepository, ShipmentRepository,
        SupplierRepository,
    },
    models::report::{
        count_by_status, CashFlowProjection, EntityCounts, ExecutiveDashboard, ReconciliationReport,
        SupplierDetailReport, SystemStats, UpcomingDuesReport,
    },
};

pub const DEFAULT_CASH_FLOW_WEEKS: u32 = 4;
pub const DEFAULT_DUE_HORIZON_DAYS: u32 = 30;

/// Relatórios só de leitura; cada um lê tudo numa única transação.
#[derive(Clone)]
pub struct ReportService {
    repo: ReportRepository,
    supplier_repo: SupplierRepository,
    order_repo: PurchaseOrderRepository,
    invoice_repo: InvoiceRepository,
    advance_repo: AdvanceRepository,
    shipment_repo: ShipmentRepository,
}

impl ReportService {
    pub fn new(
        repo: ReportRepository,
        supplier_repo: SupplierRepository,
        order_repo: PurchaseOrderRepository,
        invoice_repo: InvoiceRepository,
        advance_repo: AdvanceRepository,
        shipment_repo: ShipmentRepository,
    ) -> Self {
        Self { repo, supplier_repo, order_repo, invoice_repo, advance_repo, shipment_repo }
    }

    pub async fn executive_dashboard<'e, E>(&self, executor: E) -> Result<ExecutiveDashboard, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let conteos = self.repo.entity_counts(&mut *tx).await?;
        let orders = self.repo.order_facts(&mut *tx).await?;
        let invoices = self.invoice_repo.list_all(&mut *tx).await?;
        let advances = self.advance_repo.facts(&mut *tx).await?;
        let embarques = self.shipment_repo.status_buckets(&mut *tx).await?;
        let dues = self.repo.due_facts(&mut *tx, None).await?;

        tx.commit().await?;

        Ok(ExecutiveDashboard::build(
            conteos,
            &orders,
            &invoices,
            &advances,
            count_by_status(&embarques),
            &dues,
            Utc::now(),
        ))
    }

    pub async fn order_reconciliation<'e, E>(&self, executor: E) -> Result<ReconciliationReport, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let orders = self.repo.order_facts(&mut *tx).await?;
        let invoices = self.repo.order_invoice_facts(&mut *tx).await?;
        let advances = self.advance_repo.facts(&mut *tx).await?;

        tx.commit().await?;

        Ok(ReconciliationReport::build(&orders, &invoices, &advances))
    }

    pub async fn cash_flow<'e, E>(&self, executor: E, semanas: Option<u32>) -> Result<CashFlowProjection, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let semanas = semanas.unwrap_or(DEFAULT_CASH_FLOW_WEEKS);
        check_range("semanas", semanas, 52)?;

        let mut tx = executor.begin().await?;

        let dues = self.repo.due_facts(&mut *tx, None).await?;
        let advances = self.advance_repo.facts(&mut *tx).await?;

        tx.commit().await?;

        Ok(CashFlowProjection::project(&dues, &advances, Utc::now().date_naive(), semanas))
    }

    pub async fn upcoming_dues<'e, E>(&self, executor: E, dias: Option<u32>) -> Result<UpcomingDuesReport, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let dias = dias.unwrap_or(DEFAULT_DUE_HORIZON_DAYS);
        check_range("dias", dias, 365)?;

        let dues = self.repo.due_facts(executor, None).await?;
        Ok(UpcomingDuesReport::build(&dues, Utc::now().date_naive(), dias))
    }

    pub async fn supplier_detail<'e, E>(&self, executor: E, supplier_id: Uuid) -> Result<SupplierDetailReport, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let proveedor = self
            .supplier_repo
            .find_by_id(&mut *tx, supplier_id)
            .await?
            .ok_or_else(|| AppError::not_found("Proveedor no encontrado"))?;
        let ordenes = self.order_repo.list_by_supplier(&mut *tx, supplier_id).await?;
        let facturas = self.invoice_repo.list_by_supplier(&mut *tx, supplier_id).await?;
        let anticipos = self.advance_repo.list_by_supplier(&mut *tx, supplier_id).await?;
        let embarques = self.shipment_repo.list_by_supplier(&mut *tx, supplier_id).await?;
        let dues = self.repo.due_facts(&mut *tx, Some(supplier_id)).await?;

        tx.commit().await?;

        Ok(SupplierDetailReport::build(
            proveedor,
            ordenes,
            facturas,
            anticipos,
            embarques,
            &dues,
            Utc::now().date_naive(),
        ))
    }

    /// Números gerais de `/api/stats/dashboard`.
    pub async fn system_stats<'e, E>(&self, executor: E) -> Result<SystemStats, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let conteos = self.repo.entity_counts(&mut *tx).await?;
        let orders = self.repo.order_facts(&mut *tx).await?;
        let invoices = self.invoice_repo.list_all(&mut *tx).await?;

        tx.commit().await?;

        Ok(SystemStats::build(conteos, &orders, &invoices))
    }

    /// Confere a conexão e devolve as contagens básicas.
    pub async fn health<'e, E>(&self, executor: E) -> Result<EntityCounts, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        self.repo.ping(&mut *conn).await?;
        self.repo.entity_counts(&mut *conn).await
    }
}
