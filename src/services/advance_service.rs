// src/services/advance_service.rs

use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::Pagination, error::AppError, response::Paginated},
    db::{AdvanceRepository, PgLedger, PurchaseOrderRepository},
    models::advance::{
        AdvanceDetail, AdvanceFilter, AdvancePayment, AdvanceStats, AdvanceWithOrder, AdvancesByOrder,
        AvailableAdvances, CreateAdvancePayload, ReleaseOutcome, UpdateAdvancePayload,
    },
    services::reconciliation::{self, NewAdvance},
};

#[derive(Clone)]
pub struct AdvanceService {
    repo: AdvanceRepository,
    order_repo: PurchaseOrderRepository,
}

impl AdvanceService {
    pub fn new(repo: AdvanceRepository, order_repo: PurchaseOrderRepository) -> Self {
        Self { repo, order_repo }
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        filter: &AdvanceFilter,
    ) -> Result<Paginated<AdvanceWithOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let page = Pagination::new(filter.page, filter.per_page)?;
        let mut conn = executor.acquire().await?;

        let total = self.repo.count(&mut *conn, filter).await?;
        let advances = self.repo.list(&mut *conn, filter, page).await?;

        Ok(Paginated::new(advances, total, page))
    }

    /// Anticipo com as aplicações e o saldo ainda não aplicado.
    pub async fn get<'e, E>(&self, executor: E, id: Uuid) -> Result<AdvanceDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let advance = self
            .repo
            .find_with_order(&mut *conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Anticipo no encontrado"))?;
        let aplicaciones = self.repo.allocations_of(&mut *conn, id).await?;

        Ok(AdvanceDetail::new(advance, aplicaciones))
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        payload: &CreateAdvancePayload,
    ) -> Result<(AdvancePayment, String), AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let order = self
            .order_repo
            .find_with_supplier(&mut *tx, payload.po_id)
            .await?
            .ok_or_else(|| AppError::not_found("Orden de compra no encontrada"))?;

        let advance = NewAdvance {
            po_id: order.order.id,
            monto: payload.monto,
            moneda: payload.moneda.unwrap_or(order.order.moneda),
            fecha_pago: payload.fecha_pago,
            metodo_pago: payload.metodo_pago.clone(),
            usuario_pago: payload.usuario_pago.clone(),
            notas: payload.notas.clone(),
        };

        let mut ledger = PgLedger::new(&mut *tx);
        let created = reconciliation::create_advance(&mut ledger, advance).await?;

        tx.commit().await?;
        let message = format!(
            "Anticipo creado exitosamente para orden {} ({})",
            order.order.numero_orden, order.proveedor_nombre
        );
        Ok((created, message))
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdateAdvancePayload,
    ) -> Result<AdvancePayment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        if payload.is_empty() {
            return Err(AppError::rule("No hay datos para actualizar"));
        }

        let mut tx = executor.begin().await?;

        let mut ledger = PgLedger::new(&mut *tx);
        let advance = reconciliation::update_advance(&mut ledger, id, payload).await?;

        tx.commit().await?;
        Ok(advance)
    }

    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let mut ledger = PgLedger::new(&mut *tx);
        reconciliation::delete_advance(&mut ledger, id).await?;

        tx.commit().await?;
        tracing::info!("Anticipo {} eliminado", id);
        Ok(())
    }

    pub async fn return_advance<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        motivo: Option<&str>,
    ) -> Result<AdvancePayment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let mut ledger = PgLedger::new(&mut *tx);
        let advance = reconciliation::return_advance(&mut ledger, id, motivo).await?;

        tx.commit().await?;
        Ok(advance)
    }

    pub async fn release_allocation<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        allocation_id: Uuid,
    ) -> Result<ReleaseOutcome, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let mut ledger = PgLedger::new(&mut *tx);
        let outcome = reconciliation::release_allocation(&mut ledger, id, allocation_id).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn by_order<'e, E>(&self, executor: E, po_id: Uuid) -> Result<AdvancesByOrder, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let orden = self
            .order_repo
            .find_by_id(&mut *conn, po_id)
            .await?
            .ok_or_else(|| AppError::not_found("Orden de compra no encontrada"))?;
        let anticipos = self.repo.balances_for_order(&mut *conn, po_id).await?;

        Ok(AdvancesByOrder::new(orden, anticipos))
    }

    pub async fn available<'e, E>(&self, executor: E, po_id: Uuid) -> Result<AvailableAdvances, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        if self.order_repo.find_by_id(&mut *conn, po_id).await?.is_none() {
            return Err(AppError::not_found("Orden de compra no encontrada"));
        }
        let balances = self.repo.balances_for_order(&mut *conn, po_id).await?;

        Ok(AvailableAdvances::from_balances(balances))
    }

    pub async fn stats<'e, E>(&self, executor: E) -> Result<AdvanceStats, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let facts = self.repo.facts(executor).await?;
        Ok(AdvanceStats::from_facts(&facts))
    }
}
