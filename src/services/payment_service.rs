// src/services/payment_service.rs

use std::collections::HashMap;

use sqlx::{Acquire, Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::Pagination, error::AppError, response::Paginated},
    db::{InvoiceRepository, PaymentRepository, PgLedger},
    models::{
        invoice::DueApplication,
        money::round2,
        payment::{
            CreatePaymentPayload, InvoicePaymentsSummary, PaymentDetail, PaymentFilter, PaymentOutcome,
            PaymentStats, PaymentWithDues, PaymentWithInvoice, PaymentsByInvoice, UpdatePaymentPayload,
        },
    },
    services::reconciliation,
};

#[derive(Clone)]
pub struct PaymentService {
    repo: PaymentRepository,
    invoice_repo: InvoiceRepository,
}

impl PaymentService {
    pub fn new(repo: PaymentRepository, invoice_repo: InvoiceRepository) -> Self {
        Self { repo, invoice_repo }
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        filter: &PaymentFilter,
    ) -> Result<Paginated<PaymentWithInvoice>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let page = Pagination::new(filter.page, filter.per_page)?;
        let mut conn = executor.acquire().await?;

        let total = self.repo.count(&mut *conn, filter).await?;
        let payments = self.repo.list(&mut *conn, filter, page).await?;

        Ok(Paginated::new(payments, total, page))
    }

    pub async fn get<'e, E>(&self, executor: E, id: Uuid) -> Result<PaymentDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let payment = self
            .repo
            .find_with_invoice(&mut *conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Pago no encontrado"))?;
        let aplicaciones_vencimientos = self.repo.due_applications(&mut *conn, &[id]).await?;

        Ok(PaymentDetail { payment, aplicaciones_vencimientos })
    }

    pub async fn create<'e, E>(&self, executor: E, payload: &CreatePaymentPayload) -> Result<PaymentOutcome, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let mut ledger = PgLedger::new(&mut *tx);
        let outcome = reconciliation::register_payment(&mut ledger, payload).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdatePaymentPayload,
    ) -> Result<PaymentOutcome, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        if payload.is_empty() {
            return Err(AppError::rule("No hay datos para actualizar"));
        }

        let mut tx = executor.begin().await?;

        let mut ledger = PgLedger::new(&mut *tx);
        let outcome = reconciliation::amend_payment(&mut ledger, id, payload).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    /// Devolve a mensagem com o novo saldo da fatura.
    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<String, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let mut ledger = PgLedger::new(&mut *tx);
        let invoice = reconciliation::remove_payment(&mut ledger, id).await?;

        tx.commit().await?;
        Ok(format!(
            "Pago eliminado. Saldo de factura actualizado a ${:.2}",
            invoice.saldo_pendiente
        ))
    }

    pub async fn by_invoice<'e, E>(&self, executor: E, invoice_id: Uuid) -> Result<PaymentsByInvoice, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let factura = self
            .invoice_repo
            .find_by_id(&mut *conn, invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found("Factura no encontrada"))?;
        let payments = self.repo.list_by_invoice(&mut *conn, invoice_id).await?;

        let ids: Vec<Uuid> = payments.iter().map(|p| p.id).collect();
        let mut by_payment: HashMap<Uuid, Vec<DueApplication>> = HashMap::new();
        for app in self.repo.due_applications(&mut *conn, &ids).await? {
            by_payment.entry(app.source_id).or_default().push(app);
        }

        let resumen = InvoicePaymentsSummary {
            total_pagos: round2(payments.iter().map(|p| p.monto_pagado).sum()),
            cantidad_pagos: payments.len() as i64,
            saldo_pendiente: round2(factura.saldo_pendiente),
        };
        let pagos = payments
            .into_iter()
            .map(|payment| PaymentWithDues {
                aplicaciones_vencimientos: by_payment.remove(&payment.id).unwrap_or_default(),
                payment,
            })
            .collect();

        Ok(PaymentsByInvoice { factura, pagos, resumen })
    }

    pub async fn stats<'e, E>(&self, executor: E) -> Result<PaymentStats, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let pagos = self.repo.list_all(executor).await?;
        Ok(PaymentStats::from_payments(&pagos))
    }
}
