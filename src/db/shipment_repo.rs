// src/db/shipment_repo.rs

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
        report::StatusBucket,
        shipment::{
            CreateShipmentPayload, Shipment, ShipmentFilter, ShipmentInvoiceLine, ShipmentStatus,
            ShipmentSupplierRow, UpdateShipmentPayload,
        },
    },
};

const SELECT_INVOICE_LINES: &str = r#"
    SELECT si.shipment_id, si.invoice_id, si.monto_asignado,
           i.numero_factura, i.monto_total, i.saldo_pendiente, i.estado,
           i.supplier_id, s.nombre AS proveedor_nombre
    FROM shipment_invoice si
    JOIN invoices i ON i.id = si.invoice_id
    JOIN suppliers s ON s.id = i.supplier_id
"#;

#[derive(Clone)]
pub struct ShipmentRepository {
    pool: PgPool,
}

impl ShipmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Shipment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let shipment = sqlx::query_as::<_, Shipment>("SELECT * FROM shipments WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(shipment)
    }

    pub async fn lock_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Shipment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let shipment = sqlx::query_as::<_, Shipment>("SELECT * FROM shipments WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(shipment)
    }

    pub async fn codigo_taken<'e, E>(&self, executor: E, codigo: &str, exclude: Option<Uuid>) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM shipments WHERE codigo = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
            .bind(codigo)
            .bind(exclude)
            .fetch_one(executor)
            .await?;
        Ok(taken)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ShipmentFilter) {
        if let Some(estado) = filter.estado {
            qb.push(" AND estado = ").push_bind(estado);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            qb.push(" AND (codigo ILIKE ")
                .push_bind(pattern.clone())
                .push(r" ESCAPE '\' OR numero_contenedor ILIKE ")
                .push_bind(pattern)
                .push(r" ESCAPE '\')");
        }
    }

    pub async fn count<'e, E>(&self, executor: E, filter: &ShipmentFilter) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM shipments WHERE 1=1");
        Self::push_filters(&mut qb, filter);
        let total: i64 = qb.build_query_scalar().fetch_one(executor).await?;
        Ok(total)
    }

    pub async fn list<'e, E>(
        &self,
        executor: E,
        filter: &ShipmentFilter,
        page: Pagination,
    ) -> Result<Vec<Shipment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM shipments WHERE 1=1");
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let shipments = qb.build_query_as::<Shipment>().fetch_all(executor).await?;
        Ok(shipments)
    }

    /// Embarques em trânsito, do mais antigo para o mais novo.
    pub async fn list_in_transit<'e, E>(&self, executor: E) -> Result<Vec<Shipment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let shipments = sqlx::query_as::<_, Shipment>(
            "SELECT * FROM shipments WHERE estado = 'en_transito' ORDER BY fecha_embarque ASC NULLS LAST",
        )
            .fetch_all(executor)
            .await?;
        Ok(shipments)
    }

    /// Em trânsito com chegada estimada até `until` (inclusive).
    pub async fn list_arriving_until<'e, E>(&self, executor: E, until: NaiveDate) -> Result<Vec<Shipment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let shipments = sqlx::query_as::<_, Shipment>(
            r#"
            SELECT * FROM shipments
            WHERE estado = 'en_transito' AND fecha_llegada_estimada <= $1
            ORDER BY fecha_llegada_estimada ASC
            "#,
        )
            .bind(until)
            .fetch_all(executor)
            .await?;
        Ok(shipments)
    }

    pub async fn list_by_supplier<'e, E>(&self, executor: E, supplier_id: Uuid) -> Result<Vec<Shipment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let shipments = sqlx::query_as::<_, Shipment>(
            r#"
            SELECT sh.*
            FROM shipment_supplier ss
            JOIN shipments sh ON sh.id = ss.shipment_id
            WHERE ss.supplier_id = $1
            ORDER BY sh.created_at DESC
            "#,
        )
            .bind(supplier_id)
            .fetch_all(executor)
            .await?;
        Ok(shipments)
    }

    /// Fornecedores vinculados a cada um dos embarques informados.
    pub async fn suppliers_of<'e, E>(&self, executor: E, shipment_ids: &[Uuid]) -> Result<Vec<ShipmentSupplierRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, ShipmentSupplierRow>(
            r#"
            SELECT ss.shipment_id, s.id, s.nombre, s.contacto
            FROM shipment_supplier ss
            JOIN suppliers s ON s.id = ss.supplier_id
            WHERE ss.shipment_id = ANY($1)
            ORDER BY s.nombre ASC
            "#,
        )
            .bind(shipment_ids)
            .fetch_all(executor)
            .await?;
        Ok(rows)
    }

    /// Faturas vinculadas a cada um dos embarques informados.
    pub async fn invoice_lines<'e, E>(&self, executor: E, shipment_ids: &[Uuid]) -> Result<Vec<ShipmentInvoiceLine>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_INVOICE_LINES);
        qb.push(" WHERE si.shipment_id = ANY(")
            .push_bind(shipment_ids.to_vec())
            .push(") ORDER BY i.fecha_emision ASC");
        let lines = qb.build_query_as::<ShipmentInvoiceLine>().fetch_all(executor).await?;
        Ok(lines)
    }

    pub async fn invoice_count<'e, E>(&self, executor: E, id: Uuid) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shipment_invoice WHERE shipment_id = $1")
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    /// Saldo não aplicado dos anticipos `disponible` das ordens ligadas às faturas do embarque.
    pub async fn available_advances<'e, E>(&self, executor: E, id: Uuid) -> Result<Decimal, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(a.monto - COALESCE(aa.aplicado, 0)), 0)
            FROM advance_payments a
            LEFT JOIN (
                SELECT anticipo_id, SUM(monto_aplicado) AS aplicado
                FROM advance_allocation
                GROUP BY anticipo_id
            ) aa ON aa.anticipo_id = a.id
            WHERE a.estado = 'disponible'
              AND a.po_id IN (
                  SELECT ip.po_id
                  FROM shipment_invoice si
                  JOIN invoice_po ip ON ip.invoice_id = si.invoice_id
                  WHERE si.shipment_id = $1
              )
            "#,
        )
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(total)
    }

    // =========================================================================
    //  VÍNCULOS
    // =========================================================================

    pub async fn clear_suppliers<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM shipment_supplier WHERE shipment_id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn add_supplier<'e, E>(&self, executor: E, id: Uuid, supplier_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "INSERT INTO shipment_supplier (shipment_id, supplier_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
            .bind(id)
            .bind(supplier_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn supplier_linked<'e, E>(&self, executor: E, id: Uuid, supplier_id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let linked: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM shipment_supplier WHERE shipment_id = $1 AND supplier_id = $2)",
        )
            .bind(id)
            .bind(supplier_id)
            .fetch_one(executor)
            .await?;
        Ok(linked)
    }

    pub async fn invoice_linked<'e, E>(&self, executor: E, id: Uuid, invoice_id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let linked: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM shipment_invoice WHERE shipment_id = $1 AND invoice_id = $2)",
        )
            .bind(id)
            .bind(invoice_id)
            .fetch_one(executor)
            .await?;
        Ok(linked)
    }

    pub async fn link_invoice<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        invoice_id: Uuid,
        monto_asignado: Option<Decimal>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "INSERT INTO shipment_invoice (shipment_id, invoice_id, monto_asignado) VALUES ($1, $2, $3)",
        )
            .bind(id)
            .bind(invoice_id)
            .bind(monto_asignado)
            .execute(executor)
            .await
            .map_err(|e| map_unique_violation(e, "La factura ya está vinculada a este embarque"))?;
        Ok(())
    }

    /// Devolve `false` quando o vínculo não existe.
    pub async fn set_assignment<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        invoice_id: Uuid,
        monto_asignado: Decimal,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE shipment_invoice SET monto_asignado = $3 WHERE shipment_id = $1 AND invoice_id = $2",
        )
            .bind(id)
            .bind(invoice_id)
            .bind(monto_asignado)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Devolve `false` quando o vínculo não existe.
    pub async fn unlink_invoice<'e, E>(&self, executor: E, id: Uuid, invoice_id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM shipment_invoice WHERE shipment_id = $1 AND invoice_id = $2")
            .bind(id)
            .bind(invoice_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    //  ESCRITA
    // =========================================================================

    pub async fn create<'e, E>(&self, executor: E, payload: &CreateShipmentPayload) -> Result<Shipment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Shipment>(
            r#"
            INSERT INTO shipments (
                codigo, puerto_origen, puerto_destino, fecha_embarque, fecha_llegada_estimada,
                fecha_llegada_real, estado, naviera, numero_contenedor, notas
            )
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'en_transito'::shipment_status), $8, $9, $10)
            RETURNING *
            "#,
        )
            .bind(payload.codigo.trim())
            .bind(payload.puerto_origen.as_deref())
            .bind(payload.puerto_destino.as_deref())
            .bind(payload.fecha_embarque)
            .bind(payload.fecha_llegada_estimada)
            .bind(payload.fecha_llegada_real)
            .bind(payload.estado)
            .bind(payload.naviera.as_deref())
            .bind(payload.numero_contenedor.as_deref())
            .bind(payload.notas.as_deref())
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, "Ya existe un embarque con ese código"))
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        payload: &UpdateShipmentPayload,
    ) -> Result<Shipment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Shipment>(
            r#"
            UPDATE shipments SET
                codigo = COALESCE($2, codigo),
                puerto_origen = COALESCE($3, puerto_origen),
                puerto_destino = COALESCE($4, puerto_destino),
                fecha_embarque = COALESCE($5, fecha_embarque),
                fecha_llegada_estimada = COALESCE($6, fecha_llegada_estimada),
                fecha_llegada_real = COALESCE($7, fecha_llegada_real),
                naviera = COALESCE($8, naviera),
                numero_contenedor = COALESCE($9, numero_contenedor),
                notas = COALESCE($10, notas),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(id)
            .bind(payload.codigo.as_deref().map(str::trim))
            .bind(payload.puerto_origen.as_deref())
            .bind(payload.puerto_destino.as_deref())
            .bind(payload.fecha_embarque)
            .bind(payload.fecha_llegada_estimada)
            .bind(payload.fecha_llegada_real)
            .bind(payload.naviera.as_deref())
            .bind(payload.numero_contenedor.as_deref())
            .bind(payload.notas.as_deref())
            .fetch_one(executor)
            .await
            .map_err(|e| map_unique_violation(e, "Ya existe otro embarque con ese código"))
    }

    /// Troca o estado; `fecha_llegada_real` só é gravada quando informada.
    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        estado: ShipmentStatus,
        fecha_llegada_real: Option<NaiveDate>,
    ) -> Result<Shipment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let shipment = sqlx::query_as::<_, Shipment>(
            r#"
            UPDATE shipments SET
                estado = $2,
                fecha_llegada_real = COALESCE($3, fecha_llegada_real),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(id)
            .bind(estado)
            .bind(fecha_llegada_real)
            .fetch_one(executor)
            .await?;
        Ok(shipment)
    }

    /// Os vínculos com fornecedores caem via ON DELETE CASCADE.
    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("DELETE FROM shipments WHERE id = $1")
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
                   0::numeric AS monto, 0::numeric AS saldo
            FROM shipments
            GROUP BY estado
            "#,
        )
            .fetch_all(executor)
            .await?;
        Ok(buckets)
    }

    /// (Σ total, Σ saldo) das faturas vinculadas a embarques, contando cada vínculo.
    pub async fn linked_invoice_totals<'e, E>(&self, executor: E) -> Result<(Decimal, Decimal), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let totals = sqlx::query_as::<_, (Decimal, Decimal)>(
            r#"
            SELECT COALESCE(SUM(i.monto_total), 0), COALESCE(SUM(i.saldo_pendiente), 0)
            FROM shipment_invoice si
            JOIN invoices i ON i.id = si.invoice_id
            "#,
        )
            .fetch_one(executor)
            .await?;
        Ok(totals)
    }
}
