// src/db/supplier_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{like_pattern, Pagination},
        error::{map_unique_violation, AppError},
    },
    models::{
        report::StatusBucket,
        supplier::{CreateSupplierPayload, Supplier, SupplierFilter, SupplierSummary, UpdateSupplierPayload},
    },
};

#[derive(Clone)]
pub struct SupplierRepository {
    pool: PgPool,
}

impl SupplierRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Supplier>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(supplier)
    }

    pub async fn find_summary<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<SupplierSummary>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let summary = sqlx::query_as::<_, SupplierSummary>(
            "SELECT id, nombre, contacto FROM suppliers WHERE id = $1",
        )
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(summary)
    }

    /// Existe outro fornecedor com este nome (ignorando `exclude`)?
    pub async fn name_taken<'e, E>(
        &self,
        executor: E,
        nombre: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM suppliers WHERE nombre = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
            .bind(nombre)
            .bind(exclude)
            .fetch_one(executor)
            .await?;
        Ok(taken)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &SupplierFilter) {
        if let Some(activo) = filter.activo {
            qb.push(" AND activo = ").push_bind(activo);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            qb.push(" AND nombre ILIKE ")
                .push_bind(like_pattern(search))
                .push(r" ESCAPE '\'");
        }
    }

    pub async fn count<'e, E>(&self, executor: E, filter: &SupplierFilter) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM suppliers WHERE 1=1");
        Self::push_filters(&mut qb, filter);
        let total: i64 = qb.build_query_scalar().fetch_one(executor).await?;
        Ok(total)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        filter: &SupplierFilter,
        page: Pagination,
    ) -> Result<Vec<Supplier>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM suppliers WHERE 1=1");
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY nombre ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let suppliers = qb.build_query_as::<Supplier>().fetch_all(executor).await?;
        Ok(suppliers)
    }

    /// (ordens, faturas) que referenciam o fornecedor.
    pub async fn reference_counts<'e, E>(&self, executor: E, id: Uuid) -> Result<(i64, i64), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM purchase_orders WHERE supplier_id = $1),
                (SELECT COUNT(*) FROM invoices WHERE supplier_id = $1)
            "#,
        )
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(counts)
    }

    // =========================================================================
    //  ESCRITA
    // =========================================================================

    pub async fn create<'e, E>(&self, executor: E, payload: &CreateSupplierPayload) -> Result<Supplier, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Supplier>(
            r#"
            INSERT INTO suppliers (nombre, activo, puerto_salida_default, contacto, notas)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
            .bind(payload.nombre.trim())
            .bind(payload.activo)
            .bind(payload.puerto_salida_default.as_deref())
            .bind(payload.contacto.as_deref())
            .bind(payload.notas.as_deref())
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, "Ya existe un proveedor con ese nombre"))
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdateSupplierPayload,
    ) -> Result<Supplier, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Supplier>(
            r#"
            UPDATE suppliers SET
                nombre = COALESCE($2, nombre),
                activo = COALESCE($3, activo),
                puerto_salida_default = COALESCE($4, puerto_salida_default),
                contacto = COALESCE($5, contacto),
                notas = COALESCE($6, notas),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(id)
            .bind(payload.nombre.as_deref().map(str::trim))
            .bind(payload.activo)
            .bind(payload.puerto_salida_default.as_deref())
            .bind(payload.contacto.as_deref())
            .bind(payload.notas.as_deref())
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, "Ya existe otro proveedor con ese nombre"))
    }

    pub async fn deactivate<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE suppliers SET activo = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    // =========================================================================
    //  DASHBOARD
    // =========================================================================

    pub async fn order_buckets<'e, E>(&self, executor: E, id: Uuid) -> Result<Vec<StatusBucket>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let buckets = sqlx::query_as::<_, StatusBucket>(
            r#"
            SELECT estado::text AS estado, COUNT(*) AS cantidad,
                   COALESCE(SUM(total_oc), 0) AS monto, 0::numeric AS saldo
            FROM purchase_orders
            WHERE supplier_id = $1
            GROUP BY estado
            "#,
        )
            .bind(id)
            .fetch_all(executor)
            .await?;
        Ok(buckets)
    }

    pub async fn invoice_buckets<'e, E>(&self, executor: E, id: Uuid) -> Result<Vec<StatusBucket>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let buckets = sqlx::query_as::<_, StatusBucket>(
            r#"
            SELECT estado::text AS estado, COUNT(*) AS cantidad,
                   COALESCE(SUM(monto_total), 0) AS monto,
                   COALESCE(SUM(saldo_pendiente), 0) AS saldo
            FROM invoices
            WHERE supplier_id = $1
            GROUP BY estado
            "#,
        )
            .bind(id)
            .fetch_all(executor)
            .await?;
        Ok(buckets)
    }

    pub async fn advances_total<'e, E>(&self, executor: E, id: Uuid) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(a.monto), 0)
            FROM advance_payments a
            JOIN purchase_orders po ON po.id = a.po_id
            WHERE po.supplier_id = $1 AND a.estado <> 'devuelto'
            "#,
        )
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(total)
    }
}
