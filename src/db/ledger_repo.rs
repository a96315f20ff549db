// src/db/ledger_repo.rs

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        advance::{AdvanceAllocation, AdvancePayment},
        invoice::{DueApplication, DueSource, Invoice, InvoiceDue},
        payment::{CreatePaymentPayload, InvoicePayment},
        purchase_order::PurchaseOrder,
    },
    services::reconciliation::{LedgerStore, NewAdvance},
};

/// `LedgerStore` sobre uma conexão (normalmente `&mut *tx`).
/// As leituras `lock_*` usam FOR UPDATE e seguram a linha até o commit.
pub struct PgLedger<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgLedger<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl LedgerStore for PgLedger<'_> {
    // =========================================================================
    //  FATURAS E CUOTAS
    // =========================================================================

    async fn lock_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(invoice)
    }

    async fn save_invoice_balance(&mut self, invoice: &Invoice) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE invoices
            SET saldo_pendiente = $2, estado = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
            .bind(invoice.id)
            .bind(invoice.saldo_pendiente)
            .bind(invoice.estado)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn find_due(&mut self, id: Uuid) -> Result<Option<InvoiceDue>, AppError> {
        let due = sqlx::query_as::<_, InvoiceDue>("SELECT * FROM invoice_due WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(due)
    }

    async fn due_applied_total(&mut self, due_id: Uuid) -> Result<Decimal, AppError> {
        let total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(monto_aplicado), 0) FROM invoice_due_payment WHERE due_id = $1",
        )
            .bind(due_id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(total)
    }

    async fn set_due_status(&mut self, due: &InvoiceDue) -> Result<(), AppError> {
        sqlx::query("UPDATE invoice_due SET estado = $2 WHERE id = $1")
            .bind(due.id)
            .bind(due.estado)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn insert_due_application(
        &mut self,
        due_id: Uuid,
        source: DueSource,
        source_id: Uuid,
        monto: Decimal,
    ) -> Result<DueApplication, AppError> {
        let app = sqlx::query_as::<_, DueApplication>(
            r#"
            INSERT INTO invoice_due_payment (due_id, source, source_id, monto_aplicado)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
            .bind(due_id)
            .bind(source)
            .bind(source_id)
            .bind(monto)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(app)
    }

    async fn due_applications_of(
        &mut self,
        source: DueSource,
        source_id: Uuid,
    ) -> Result<Vec<DueApplication>, AppError> {
        let apps = sqlx::query_as::<_, DueApplication>(
            "SELECT * FROM invoice_due_payment WHERE source = $1 AND source_id = $2",
        )
            .bind(source)
            .bind(source_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(apps)
    }

    async fn set_due_application_amount(&mut self, id: Uuid, monto: Decimal) -> Result<(), AppError> {
        sqlx::query("UPDATE invoice_due_payment SET monto_aplicado = $2 WHERE id = $1")
            .bind(id)
            .bind(monto)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn delete_due_applications(&mut self, source: DueSource, source_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM invoice_due_payment WHERE source = $1 AND source_id = $2")
            .bind(source)
            .bind(source_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    // =========================================================================
    //  PAGAMENTOS
    // =========================================================================

    async fn insert_payment(&mut self, payload: &CreatePaymentPayload) -> Result<InvoicePayment, AppError> {
        let payment = sqlx::query_as::<_, InvoicePayment>(
            r#"
            INSERT INTO invoice_payment (invoice_id, monto_pagado, fecha, metodo_pago, referencia, notas)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
            .bind(payload.invoice_id)
            .bind(payload.monto_pagado)
            .bind(payload.fecha)
            .bind(payload.metodo_pago.as_deref())
            .bind(payload.referencia.as_deref())
            .bind(payload.notas.as_deref())
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(payment)
    }

    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<InvoicePayment>, AppError> {
        let payment = sqlx::query_as::<_, InvoicePayment>(
            "SELECT * FROM invoice_payment WHERE id = $1 FOR UPDATE",
        )
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(payment)
    }

    async fn save_payment(&mut self, payment: &InvoicePayment) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE invoice_payment
            SET monto_pagado = $2, fecha = $3, metodo_pago = $4, referencia = $5, notas = $6
            WHERE id = $1
            "#,
        )
            .bind(payment.id)
            .bind(payment.monto_pagado)
            .bind(payment.fecha)
            .bind(payment.metodo_pago.as_deref())
            .bind(payment.referencia.as_deref())
            .bind(payment.notas.as_deref())
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn delete_payment(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM invoice_payment WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    // =========================================================================
    //  ORDENS E ANTICIPOS
    // =========================================================================

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<PurchaseOrder>, AppError> {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE id = $1 FOR UPDATE",
        )
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(order)
    }

    async fn supplier_active(&mut self, supplier_id: Uuid) -> Result<bool, AppError> {
        let activo: Option<bool> = sqlx::query_scalar("SELECT activo FROM suppliers WHERE id = $1")
            .bind(supplier_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(activo.unwrap_or(false))
    }

    async fn advances_total(&mut self, po_id: Uuid, exclude: Option<Uuid>) -> Result<Decimal, AppError> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(monto), 0)
            FROM advance_payments
            WHERE po_id = $1
              AND estado <> 'devuelto'
              AND ($2::uuid IS NULL OR id <> $2)
            "#,
        )
            .bind(po_id)
            .bind(exclude)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(total)
    }

    async fn insert_advance(&mut self, advance: &NewAdvance) -> Result<AdvancePayment, AppError> {
        let created = sqlx::query_as::<_, AdvancePayment>(
            r#"
            INSERT INTO advance_payments (po_id, monto, moneda, fecha_pago, metodo_pago, usuario_pago, notas)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
            .bind(advance.po_id)
            .bind(advance.monto)
            .bind(advance.moneda)
            .bind(advance.fecha_pago)
            .bind(advance.metodo_pago.as_deref())
            .bind(advance.usuario_pago.as_deref())
            .bind(advance.notas.as_deref())
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(created)
    }

    async fn lock_advance(&mut self, id: Uuid) -> Result<Option<AdvancePayment>, AppError> {
        let advance = sqlx::query_as::<_, AdvancePayment>(
            "SELECT * FROM advance_payments WHERE id = $1 FOR UPDATE",
        )
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(advance)
    }

    async fn save_advance(&mut self, advance: &AdvancePayment) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE advance_payments
            SET monto = $2, fecha_pago = $3, metodo_pago = $4, usuario_pago = $5, estado = $6, notas = $7
            WHERE id = $1
            "#,
        )
            .bind(advance.id)
            .bind(advance.monto)
            .bind(advance.fecha_pago)
            .bind(advance.metodo_pago.as_deref())
            .bind(advance.usuario_pago.as_deref())
            .bind(advance.estado)
            .bind(advance.notas.as_deref())
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn delete_advance(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM advance_payments WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    // =========================================================================
    //  APLICAÇÕES
    // =========================================================================

    async fn allocated_total(&mut self, anticipo_id: Uuid) -> Result<Decimal, AppError> {
        let total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(monto_aplicado), 0) FROM advance_allocation WHERE anticipo_id = $1",
        )
            .bind(anticipo_id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(total)
    }

    async fn allocation_count(&mut self, anticipo_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM advance_allocation WHERE anticipo_id = $1")
            .bind(anticipo_id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }

    async fn insert_allocation(
        &mut self,
        anticipo_id: Uuid,
        invoice_id: Uuid,
        due_id: Option<Uuid>,
        monto: Decimal,
    ) -> Result<AdvanceAllocation, AppError> {
        let allocation = sqlx::query_as::<_, AdvanceAllocation>(
            r#"
            INSERT INTO advance_allocation (anticipo_id, invoice_id, due_id, monto_aplicado)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
            .bind(anticipo_id)
            .bind(invoice_id)
            .bind(due_id)
            .bind(monto)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(allocation)
    }

    async fn find_allocation(&mut self, id: Uuid) -> Result<Option<AdvanceAllocation>, AppError> {
        let allocation = sqlx::query_as::<_, AdvanceAllocation>(
            "SELECT * FROM advance_allocation WHERE id = $1 FOR UPDATE",
        )
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(allocation)
    }

    async fn delete_allocation(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM advance_allocation WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}
