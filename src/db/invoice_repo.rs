// src/db/invoice_repo.rs
//
// CRUD de faturas, cuotas e vínculos com ordens. Saldo e aplicações de
// pagamentos/anticipos ficam no `PgLedger`.

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{like_pattern, Pagination},
        error::{map_unique_violation, AppError},
    },
    models::{
        invoice::{
            CreateInvoicePayload, DueApplication, DueInput, Invoice, InvoiceDue, InvoiceFilter, InvoicePo,
            InvoiceWithSupplier, UpdateInvoicePayload,
        },
        report::{CurrencyBucket, StatusBucket},
    },
};

const SELECT_WITH_SUPPLIER: &str = r#"
    SELECT i.*, s.nombre AS proveedor_nombre, s.contacto AS proveedor_contacto
    FROM invoices i
    JOIN suppliers s ON s.id = i.supplier_id
    WHERE 1=1
"#;

#[derive(Clone)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(invoice)
    }

    pub async fn lock_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(invoice)
    }

    pub async fn find_with_supplier<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<InvoiceWithSupplier>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_WITH_SUPPLIER);
        qb.push(" AND i.id = ").push_bind(id);
        let invoice = qb
            .build_query_as::<InvoiceWithSupplier>()
            .fetch_optional(executor)
            .await?;
        Ok(invoice)
    }

    pub async fn list_by_supplier<'e, E>(&self, executor: E, supplier_id: Uuid) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoices = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE supplier_id = $1 ORDER BY fecha_emision DESC, created_at DESC",
        )
            .bind(supplier_id)
            .fetch_all(executor)
            .await?;
        Ok(invoices)
    }

    /// Todas as faturas (relatórios).
    pub async fn list_all<'e, E>(&self, executor: E) -> Result<Vec<Invoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoices = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices ORDER BY fecha_emision DESC")
            .fetch_all(executor)
            .await?;
        Ok(invoices)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &InvoiceFilter) {
        if let Some(supplier_id) = filter.supplier_id {
            qb.push(" AND i.supplier_id = ").push_bind(supplier_id);
        }
        if let Some(estado) = filter.estado {
            qb.push(" AND i.estado = ").push_bind(estado);
        }
        if let Some(moneda) = filter.moneda {
            qb.push(" AND i.moneda = ").push_bind(moneda);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            qb.push(" AND i.numero_factura ILIKE ")
                .push_bind(like_pattern(search))
                .push(r" ESCAPE '\'");
        }
    }

    pub async fn count<'e, E>(&self, executor: E, filter: &InvoiceFilter) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM invoices i WHERE 1=1");
        Self::push_filters(&mut qb, filter);
        let total: i64 = qb.build_query_scalar().fetch_one(executor).await?;
        Ok(total)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        filter: &InvoiceFilter,
        page: Pagination,
    ) -> Result<Vec<InvoiceWithSupplier>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_WITH_SUPPLIER);
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY i.fecha_emision DESC, i.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let invoices = qb
            .build_query_as::<InvoiceWithSupplier>()
            .fetch_all(executor)
            .await?;
        Ok(invoices)
    }

    /// O número da fatura é único por fornecedor.
    pub async fn numero_taken<'e, E>(
        &self,
        executor: E,
        supplier_id: Uuid,
        numero_factura: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM invoices
                WHERE supplier_id = $1 AND numero_factura = $2 AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
            .bind(supplier_id)
            .bind(numero_factura)
            .bind(exclude)
            .fetch_one(executor)
            .await?;
        Ok(taken)
    }

    /// (pagamentos, aplicações de anticipo) registrados na fatura.
    pub async fn settlement_counts<'e, E>(&self, executor: E, id: Uuid) -> Result<(i64, i64), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM invoice_payment WHERE invoice_id = $1),
                (SELECT COUNT(*) FROM advance_allocation WHERE invoice_id = $1)
            "#,
        )
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(counts)
    }

    // =========================================================================
    //  CUOTAS
    // =========================================================================

    pub async fn dues_of<'e, E>(&self, executor: E, invoice_id: Uuid) -> Result<Vec<InvoiceDue>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let dues = sqlx::query_as::<_, InvoiceDue>(
            "SELECT * FROM invoice_due WHERE invoice_id = $1 ORDER BY fecha_vencimiento ASC, numero_cuota ASC",
        )
            .bind(invoice_id)
            .fetch_all(executor)
            .await?;
        Ok(dues)
    }

    /// Aplicações (pagamentos e anticipos) em todas as cuotas da fatura.
    pub async fn due_applications<'e, E>(&self, executor: E, invoice_id: Uuid) -> Result<Vec<DueApplication>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let apps = sqlx::query_as::<_, DueApplication>(
            r#"
            SELECT dp.*
            FROM invoice_due_payment dp
            JOIN invoice_due d ON d.id = dp.due_id
            WHERE d.invoice_id = $1
            ORDER BY dp.fecha ASC
            "#,
        )
            .bind(invoice_id)
            .fetch_all(executor)
            .await?;
        Ok(apps)
    }

    pub async fn insert_due<'e, E>(&self, executor: E, invoice_id: Uuid, due: &DueInput) -> Result<InvoiceDue, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let due = sqlx::query_as::<_, InvoiceDue>(
            r#"
            INSERT INTO invoice_due (invoice_id, numero_cuota, fecha_vencimiento, monto_vencimiento, estado)
            VALUES ($1, $2, $3, $4, 'pendiente')
            RETURNING *
            "#,
        )
            .bind(invoice_id)
            .bind(due.numero_cuota)
            .bind(due.fecha_vencimiento)
            .bind(due.monto_vencimiento)
            .fetch_one(executor)
            .await?;
        Ok(due)
    }

    // =========================================================================
    //  VÍNCULOS COM ORDENS
    // =========================================================================

    pub async fn po_link_exists<'e, E>(&self, executor: E, invoice_id: Uuid, po_id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM invoice_po WHERE invoice_id = $1 AND po_id = $2)",
        )
            .bind(invoice_id)
            .bind(po_id)
            .fetch_one(executor)
            .await?;
        Ok(exists)
    }

    pub async fn link_po<'e, E>(&self, executor: E, invoice_id: Uuid, po_id: Uuid) -> Result<InvoicePo, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, InvoicePo>(
            "INSERT INTO invoice_po (invoice_id, po_id) VALUES ($1, $2) RETURNING *",
        )
            .bind(invoice_id)
            .bind(po_id)
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, "La factura ya está vinculada a esta orden"))
    }

    // =========================================================================
    //  ESCRITA
    // =========================================================================

    pub async fn create<'e, E>(
        &self,
        executor: E,
        payload: &CreateInvoicePayload,
        fecha_emision: NaiveDate,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                supplier_id, numero_factura, fecha_emision, moneda, monto_total,
                saldo_pendiente, estado, tipo_factura, concepto, notas
            )
            VALUES ($1, $2, $3, $4, $5, $5, 'pendiente', $6, $7, $8)
            RETURNING *
            "#,
        )
            .bind(payload.supplier_id)
            .bind(payload.numero_factura.trim())
            .bind(fecha_emision)
            .bind(payload.moneda)
            .bind(payload.monto_total)
            .bind(payload.tipo_factura)
            .bind(payload.concepto.as_deref())
            .bind(payload.notas.as_deref())
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, "Ya existe una factura con ese número para este proveedor"))
    }

    /// `invoice` já traz total, saldo e estado recalculados.
    pub async fn update<'e, E>(
        &self,
        executor: E,
        invoice: &Invoice,
        payload: &UpdateInvoicePayload,
    ) -> Result<Invoice, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET
                numero_factura = COALESCE($2, numero_factura),
                fecha_emision = COALESCE($3, fecha_emision),
                moneda = COALESCE($4, moneda),
                monto_total = $5,
                saldo_pendiente = $6,
                estado = $7,
                tipo_factura = COALESCE($8, tipo_factura),
                concepto = COALESCE($9, concepto),
                notas = COALESCE($10, notas),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(invoice.id)
            .bind(payload.numero_factura.as_deref().map(str::trim))
            .bind(payload.fecha_emision)
            .bind(payload.moneda)
            .bind(invoice.monto_total)
            .bind(invoice.saldo_pendiente)
            .bind(invoice.estado)
            .bind(payload.tipo_factura)
            .bind(payload.concepto.as_deref())
            .bind(payload.notas.as_deref())
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, "Ya existe otra factura con ese número para este proveedor"))
    }

    /// Cuotas e vínculos (ordens, embarques) caem junto via ON DELETE CASCADE.
    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    // =========================================================================
    //  ESTATÍSTICAS
    // =========================================================================

    pub async fn status_buckets<'e, E>(&self, executor: E) -> Result<Vec<StatusBucket>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let buckets = sqlx::query_as::<_, StatusBucket>(
            r#"
            SELECT estado::text AS estado, COUNT(*) AS cantidad,
                   COALESCE(SUM(monto_total), 0) AS monto,
                   COALESCE(SUM(saldo_pendiente), 0) AS saldo
            FROM invoices
            GROUP BY estado
            "#,
        )
            .fetch_all(executor)
            .await?;
        Ok(buckets)
    }

    pub async fn currency_buckets<'e, E>(&self, executor: E) -> Result<Vec<CurrencyBucket>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let buckets = sqlx::query_as::<_, CurrencyBucket>(
            r#"
            SELECT moneda,
                   COALESCE(SUM(monto_total), 0) AS monto,
                   COALESCE(SUM(saldo_pendiente), 0) AS saldo
            FROM invoices
            GROUP BY moneda
            "#,
        )
            .fetch_all(executor)
            .await?;
        Ok(buckets)
    }
}
