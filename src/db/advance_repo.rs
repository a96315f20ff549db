// src/db/advance_repo.rs
//
// Leituras de anticipos. As escritas passam pelo `PgLedger` (conciliação).

use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{db_utils::Pagination, error::AppError},
    models::{
        advance::{AdvanceBalance, AdvanceFilter, AdvanceWithOrder, AllocationWithInvoice},
        report::AdvanceFact,
    },
};

const SELECT_WITH_ORDER: &str = r#"
    SELECT a.*, po.numero_orden, po.total_oc, s.nombre AS proveedor_nombre
    FROM advance_payments a
    JOIN purchase_orders po ON po.id = a.po_id
    JOIN suppliers s ON s.id = po.supplier_id
    WHERE 1=1
"#;

#[derive(Clone)]
pub struct AdvanceRepository {
    pool: PgPool,
}

impl AdvanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_with_order<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<AdvanceWithOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_WITH_ORDER);
        qb.push(" AND a.id = ").push_bind(id);
        let advance = qb
            .build_query_as::<AdvanceWithOrder>()
            .fetch_optional(executor)
            .await?;
        Ok(advance)
    }

    pub async fn allocations_of<'e, E>(&self, executor: E, id: Uuid) -> Result<Vec<AllocationWithInvoice>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let allocations = sqlx::query_as::<_, AllocationWithInvoice>(
            r#"
            SELECT aa.*, i.numero_factura, i.monto_total AS factura_monto_total
            FROM advance_allocation aa
            JOIN invoices i ON i.id = aa.invoice_id
            WHERE aa.anticipo_id = $1
            ORDER BY aa.fecha ASC
            "#,
        )
            .bind(id)
            .fetch_all(executor)
            .await?;
        Ok(allocations)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &AdvanceFilter) {
        if let Some(po_id) = filter.po_id {
            qb.push(" AND a.po_id = ").push_bind(po_id);
        }
        if let Some(estado) = filter.estado {
            qb.push(" AND a.estado = ").push_bind(estado);
        }
        if let Some(moneda) = filter.moneda {
            qb.push(" AND a.moneda = ").push_bind(moneda);
        }
    }

    pub async fn count<'e, E>(&self, executor: E, filter: &AdvanceFilter) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM advance_payments a WHERE 1=1");
        Self::push_filters(&mut qb, filter);
        let total: i64 = qb.build_query_scalar().fetch_one(executor).await?;
        Ok(total)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        filter: &AdvanceFilter,
        page: Pagination,
    ) -> Result<Vec<AdvanceWithOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_WITH_ORDER);
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY a.fecha_pago DESC, a.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let advances = qb.build_query_as::<AdvanceWithOrder>().fetch_all(executor).await?;
        Ok(advances)
    }

    pub async fn list_by_supplier<'e, E>(&self, executor: E, supplier_id: Uuid) -> Result<Vec<AdvanceWithOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_WITH_ORDER);
        qb.push(" AND po.supplier_id = ")
            .push_bind(supplier_id)
            .push(" ORDER BY a.fecha_pago DESC");
        let advances = qb.build_query_as::<AdvanceWithOrder>().fetch_all(executor).await?;
        Ok(advances)
    }

    /// Anticipos da ordem com o total aplicado e o saldo de cada um.
    pub async fn balances_for_order<'e, E>(&self, executor: E, po_id: Uuid) -> Result<Vec<AdvanceBalance>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let balances = sqlx::query_as::<_, AdvanceBalance>(
            r#"
            SELECT a.*,
                   COALESCE(SUM(aa.monto_aplicado), 0) AS monto_aplicado,
                   a.monto - COALESCE(SUM(aa.monto_aplicado), 0) AS saldo_disponible
            FROM advance_payments a
            LEFT JOIN advance_allocation aa ON aa.anticipo_id = a.id
            WHERE a.po_id = $1
            GROUP BY a.id
            ORDER BY a.fecha_pago ASC, a.created_at ASC
            "#,
        )
            .bind(po_id)
            .fetch_all(executor)
            .await?;
        Ok(balances)
    }

    /// Todos os anticipos com o total aplicado (estatísticas e relatórios).
    pub async fn facts<'e, E>(&self, executor: E) -> Result<Vec<AdvanceFact>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let facts = sqlx::query_as::<_, AdvanceFact>(
            r#"
            SELECT a.po_id, a.monto, a.moneda, a.estado,
                   COALESCE(SUM(aa.monto_aplicado), 0) AS monto_aplicado
            FROM advance_payments a
            LEFT JOIN advance_allocation aa ON aa.anticipo_id = a.id
            GROUP BY a.id
            "#,
        )
            .fetch_all(executor)
            .await?;
        Ok(facts)
    }
}
