// src/db/purchase_order_repo.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{like_pattern, Pagination},
        error::{map_unique_violation, AppError},
    },
    models::{
        purchase_order::{
            CreatePurchaseOrderPayload, LinkedInvoice, PurchaseOrder, PurchaseOrderFilter,
            PurchaseOrderWithSupplier, UpdatePurchaseOrderPayload,
        },
        report::{CurrencyBucket, StatusBucket},
    },
};

const SELECT_WITH_SUPPLIER: &str = r#"
    SELECT po.*, s.nombre AS proveedor_nombre, s.contacto AS proveedor_contacto
    FROM purchase_orders po
    JOIN suppliers s ON s.id = po.supplier_id
    WHERE 1=1
"#;

#[derive(Clone)]
pub struct PurchaseOrderRepository {
    pool: PgPool,
}

impl PurchaseOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, PurchaseOrder>("SELECT * FROM purchase_orders WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(order)
    }

    /// Mesma leitura, travando a linha (usar dentro de transação).
    pub async fn lock_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE id = $1 FOR UPDATE",
        )
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(order)
    }

    pub async fn find_with_supplier<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<PurchaseOrderWithSupplier>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_WITH_SUPPLIER);
        qb.push(" AND po.id = ").push_bind(id);
        let order = qb
            .build_query_as::<PurchaseOrderWithSupplier>()
            .fetch_optional(executor)
            .await?;
        Ok(order)
    }

    pub async fn list_by_supplier<'e, E>(&self, executor: E, supplier_id: Uuid) -> Result<Vec<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let orders = sqlx::query_as::<_, PurchaseOrder>(
            "SELECT * FROM purchase_orders WHERE supplier_id = $1 ORDER BY fecha DESC, created_at DESC",
        )
            .bind(supplier_id)
            .fetch_all(executor)
            .await?;
        Ok(orders)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &PurchaseOrderFilter) {
        if let Some(supplier_id) = filter.supplier_id {
            qb.push(" AND po.supplier_id = ").push_bind(supplier_id);
        }
        if let Some(estado) = filter.estado {
            qb.push(" AND po.estado = ").push_bind(estado);
        }
        if let Some(moneda) = filter.moneda {
            qb.push(" AND po.moneda = ").push_bind(moneda);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            qb.push(" AND po.numero_orden ILIKE ")
                .push_bind(like_pattern(search))
                .push(r" ESCAPE '\'");
        }
    }

    pub async fn count<'e, E>(&self, executor: E, filter: &PurchaseOrderFilter) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM purchase_orders po WHERE 1=1");
        Self::push_filters(&mut qb, filter);
        let total: i64 = qb.build_query_scalar().fetch_one(executor).await?;
        Ok(total)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        filter: &PurchaseOrderFilter,
        page: Pagination,
    ) -> Result<Vec<PurchaseOrderWithSupplier>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_WITH_SUPPLIER);
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY po.fecha DESC, po.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let orders = qb
            .build_query_as::<PurchaseOrderWithSupplier>()
            .fetch_all(executor)
            .await?;
        Ok(orders)
    }

    pub async fn numero_taken<'e, E>(
        &self,
        executor: E,
        numero_orden: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM purchase_orders WHERE numero_orden = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
            .bind(numero_orden)
            .bind(exclude)
            .fetch_one(executor)
            .await?;
        Ok(taken)
    }

    /// (anticipos, faturas vinculadas) da ordem.
    pub async fn dependents<'e, E>(&self, executor: E, id: Uuid) -> Result<(i64, i64), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM advance_payments WHERE po_id = $1),
                (SELECT COUNT(*) FROM invoice_po WHERE po_id = $1)
            "#,
        )
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(counts)
    }

    /// Σ anticipos não devolvidos da ordem.
    pub async fn advances_total<'e, E>(&self, executor: E, id: Uuid) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(monto), 0) FROM advance_payments WHERE po_id = $1 AND estado <> 'devuelto'",
        )
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(total)
    }

    pub async fn linked_invoices<'e, E>(&self, executor: E, id: Uuid) -> Result<Vec<LinkedInvoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let invoices = sqlx::query_as::<_, LinkedInvoice>(
            r#"
            SELECT i.id AS invoice_id, i.numero_factura, i.monto_total, i.saldo_pendiente, i.estado
            FROM invoice_po ip
            JOIN invoices i ON i.id = ip.invoice_id
            WHERE ip.po_id = $1
            ORDER BY i.fecha_emision ASC
            "#,
        )
            .bind(id)
            .fetch_all(executor)
            .await?;
        Ok(invoices)
    }

    // =========================================================================
    //  ESCRITA
    // =========================================================================

    pub async fn create<'e, E>(
        &self,
        executor: E,
        payload: &CreatePurchaseOrderPayload,
        fecha: NaiveDate,
    ) -> Result<PurchaseOrder, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, PurchaseOrder>(
            r#"
            INSERT INTO purchase_orders (supplier_id, numero_orden, moneda, total_oc, fecha, estado, notas)
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'pendiente'::purchase_order_status), $7)
            RETURNING *
            "#,
        )
            .bind(payload.supplier_id)
            .bind(payload.numero_orden.trim())
            .bind(payload.moneda)
            .bind(payload.total_oc)
            .bind(fecha)
            .bind(payload.estado)
            .bind(payload.notas.as_deref())
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, "Ya existe una orden con ese número"))
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdatePurchaseOrderPayload,
    ) -> Result<PurchaseOrder, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, PurchaseOrder>(
            r#"
            UPDATE purchase_orders SET
                numero_orden = COALESCE($2, numero_orden),
                moneda = COALESCE($3, moneda),
                total_oc = COALESCE($4, total_oc),
                fecha = COALESCE($5, fecha),
                estado = COALESCE($6, estado),
                notas = COALESCE($7, notas),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(id)
            .bind(payload.numero_orden.as_deref().map(str::trim))
            .bind(payload.moneda)
            .bind(payload.total_oc)
            .bind(payload.fecha)
            .bind(payload.estado)
            .bind(payload.notas.as_deref())
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, "Ya existe una orden con ese número"))
    }

    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM purchase_orders WHERE id = $1")
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
                   COALESCE(SUM(total_oc), 0) AS monto, 0::numeric AS saldo
            FROM purchase_orders
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
            SELECT moneda, COALESCE(SUM(total_oc), 0) AS monto, 0::numeric AS saldo
            FROM purchase_orders
            GROUP BY moneda
            "#,
        )
            .fetch_all(executor)
            .await?;
        Ok(buckets)
    }
}
