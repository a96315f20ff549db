// src/db/payment_repo.rs
//
// Leituras de pagamentos. Registro, edição e remoção passam pelo `PgLedger`.

use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{db_utils::Pagination, error::AppError},
    models::{
        invoice::DueApplication,
        payment::{InvoicePayment, PaymentFilter, PaymentWithInvoice},
    },
};

const SELECT_WITH_INVOICE: &str = r#"
    SELECT p.*, i.numero_factura, i.monto_total AS factura_monto_total, s.nombre AS proveedor_nombre
    FROM invoice_payment p
    JOIN invoices i ON i.id = p.invoice_id
    JOIN suppliers s ON s.id = i.supplier_id
    WHERE 1=1
"#;

#[derive(Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_with_invoice<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<PaymentWithInvoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_WITH_INVOICE);
        qb.push(" AND p.id = ").push_bind(id);
        let payment = qb
            .build_query_as::<PaymentWithInvoice>()
            .fetch_optional(executor)
            .await?;
        Ok(payment)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &PaymentFilter) {
        if let Some(invoice_id) = filter.invoice_id {
            qb.push(" AND p.invoice_id = ").push_bind(invoice_id);
        }
        if let Some(supplier_id) = filter.supplier_id {
            qb.push(" AND i.supplier_id = ").push_bind(supplier_id);
        }
        if let Some(metodo) = filter.metodo_pago.as_deref().filter(|m| !m.trim().is_empty()) {
            qb.push(" AND p.metodo_pago = ").push_bind(metodo.trim().to_string());
        }
        if let Some(desde) = filter.fecha_desde {
            qb.push(" AND p.fecha >= ").push_bind(desde);
        }
        if let Some(hasta) = filter.fecha_hasta {
            qb.push(" AND p.fecha <= ").push_bind(hasta);
        }
    }

    pub async fn count<'e, E>(&self, executor: E, filter: &PaymentFilter) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM invoice_payment p JOIN invoices i ON i.id = p.invoice_id WHERE 1=1",
        );
        Self::push_filters(&mut qb, filter);
        let total: i64 = qb.build_query_scalar().fetch_one(executor).await?;
        Ok(total)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        filter: &PaymentFilter,
        page: Pagination,
    ) -> Result<Vec<PaymentWithInvoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_WITH_INVOICE);
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY p.fecha DESC, p.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let payments = qb.build_query_as::<PaymentWithInvoice>().fetch_all(executor).await?;
        Ok(payments)
    }

    pub async fn list_by_invoice<'e, E>(&self, executor: E, invoice_id: Uuid) -> Result<Vec<InvoicePayment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payments = sqlx::query_as::<_, InvoicePayment>(
            "SELECT * FROM invoice_payment WHERE invoice_id = $1 ORDER BY fecha DESC, created_at DESC",
        )
            .bind(invoice_id)
            .fetch_all(executor)
            .await?;
        Ok(payments)
    }

    pub async fn list_all<'e, E>(&self, executor: E) -> Result<Vec<InvoicePayment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let payments = sqlx::query_as::<_, InvoicePayment>("SELECT * FROM invoice_payment")
            .fetch_all(executor)
            .await?;
        Ok(payments)
    }

    /// Aplicações em cuotas feitas pelos pagamentos informados.
    pub async fn due_applications<'e, E>(
        &self,
        executor: E,
        payment_ids: &[Uuid],
    ) -> Result<Vec<DueApplication>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let apps = sqlx::query_as::<_, DueApplication>(
            r#"
            SELECT * FROM invoice_due_payment
            WHERE source = 'pago' AND source_id = ANY($1)
            ORDER BY fecha ASC
            "#,
        )
            .bind(payment_ids)
            .fetch_all(executor)
            .await?;
        Ok(apps)
    }
}
