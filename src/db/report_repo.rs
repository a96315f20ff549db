// src/db/report_repo.rs
//
// Linhas "fato" para os relatórios. A agregação fica nos models.

use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::report::{DueFact, EntityCounts, OrderFact, OrderInvoiceFact},
};

const SELECT_DUE_FACTS: &str = r#"
    SELECT d.id, d.invoice_id, d.numero_cuota, d.fecha_vencimiento, d.monto_vencimiento, d.estado,
           COALESCE(app.total, 0) AS monto_pagado,
           i.numero_factura, i.moneda, i.estado AS factura_estado,
           s.id AS supplier_id, s.nombre AS proveedor_nombre, s.contacto AS proveedor_contacto
    FROM invoice_due d
    JOIN invoices i ON i.id = d.invoice_id
    JOIN suppliers s ON s.id = i.supplier_id
    LEFT JOIN (
        SELECT due_id, SUM(monto_aplicado) AS total
        FROM invoice_due_payment
        GROUP BY due_id
    ) app ON app.due_id = d.id
    WHERE 1=1
"#;

#[derive(Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn order_facts<'e, E>(&self, executor: E) -> Result<Vec<OrderFact>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let facts = sqlx::query_as::<_, OrderFact>(
            r#"
            SELECT po.id, po.numero_orden,
                   s.nombre AS proveedor_nombre, s.activo AS proveedor_activo,
                   po.moneda, po.total_oc, po.estado
            FROM purchase_orders po
            JOIN suppliers s ON s.id = po.supplier_id
            ORDER BY po.created_at DESC
            "#,
        )
            .fetch_all(executor)
            .await?;
        Ok(facts)
    }

    /// Uma linha por vínculo fatura ↔ ordem.
    pub async fn order_invoice_facts<'e, E>(&self, executor: E) -> Result<Vec<OrderInvoiceFact>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let facts = sqlx::query_as::<_, OrderInvoiceFact>(
            r#"
            SELECT ip.po_id, i.monto_total, i.saldo_pendiente
            FROM invoice_po ip
            JOIN invoices i ON i.id = ip.invoice_id
            "#,
        )
            .fetch_all(executor)
            .await?;
        Ok(facts)
    }

    /// Cuotas com o total aplicado; `supplier_id` restringe ao fornecedor.
    pub async fn due_facts<'e, E>(&self, executor: E, supplier_id: Option<Uuid>) -> Result<Vec<DueFact>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_DUE_FACTS);
        if let Some(supplier_id) = supplier_id {
            qb.push(" AND i.supplier_id = ").push_bind(supplier_id);
        }
        qb.push(" ORDER BY d.fecha_vencimiento ASC, d.numero_cuota ASC");

        let facts = qb.build_query_as::<DueFact>().fetch_all(executor).await?;
        Ok(facts)
    }

    pub async fn entity_counts<'e, E>(&self, executor: E) -> Result<EntityCounts, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let counts = sqlx::query_as::<_, EntityCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM suppliers) AS suppliers,
                (SELECT COUNT(*) FROM suppliers WHERE activo) AS suppliers_activos,
                (SELECT COUNT(*) FROM purchase_orders) AS purchase_orders,
                (SELECT COUNT(*) FROM invoices) AS invoices,
                (SELECT COUNT(*) FROM shipments) AS shipments
            "#,
        )
            .fetch_one(executor)
            .await?;
        Ok(counts)
    }

    pub async fn ping<'e, E>(&self, executor: E) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("SELECT 1").execute(executor).await?;
        Ok(())
    }
}
