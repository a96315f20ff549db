// src/services/shipment_service.rs

use std::collections::HashMap;

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Acquire, Executor, PgConnection, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::{check_range, Pagination}, error::AppError, response::Paginated},
    db::{InvoiceRepository, ShipmentRepository, SupplierRepository},
    models::{
        money::round2,
        report::count_by_status,
        shipment::{
            check_assigned_amount, check_supplier_replacement, CreateShipmentPayload, InTransitReport, LinkInvoicePayload, Shipment,
            ShipmentBalance, ShipmentDetail, ShipmentFilter, ShipmentInvoiceLine, ShipmentListItem,
            ShipmentStats, ShipmentWithInvoices, ShipmentsBySupplier, TrackedShipment, UpcomingArrivals,
            UpdateShipmentPayload,
        },
        supplier::SupplierSummary,
    },
};

pub const DEFAULT_ARRIVAL_DAYS: u32 = 30;

fn group_lines(lines: Vec<ShipmentInvoiceLine>) -> HashMap<Uuid, Vec<ShipmentInvoiceLine>> {
    let mut grouped: HashMap<Uuid, Vec<ShipmentInvoiceLine>> = HashMap::new();
    for line in lines {
        grouped.entry(line.shipment_id).or_default().push(line);
    }
    grouped
}

#[derive(Clone)]
pub struct ShipmentService {
    repo: ShipmentRepository,
    supplier_repo: SupplierRepository,
    invoice_repo: InvoiceRepository,
}

impl ShipmentService {
    pub fn new(
        repo: ShipmentRepository,
        supplier_repo: SupplierRepository,
        invoice_repo: InvoiceRepository,
    ) -> Self {
        Self { repo, supplier_repo, invoice_repo }
    }

    async fn suppliers_by_shipment(
        &self,
        conn: &mut PgConnection,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<SupplierSummary>>, AppError> {
        let mut grouped: HashMap<Uuid, Vec<SupplierSummary>> = HashMap::new();
        for row in self.repo.suppliers_of(&mut *conn, ids).await? {
            grouped.entry(row.shipment_id).or_default().push(row.supplier);
        }
        Ok(grouped)
    }

    /// Monta fornecedores e faturas de cada embarque para o acompanhamento.
    async fn track(&self, conn: &mut PgConnection, shipments: Vec<Shipment>) -> Result<Vec<TrackedShipment>, AppError> {
        let ids: Vec<Uuid> = shipments.iter().map(|s| s.id).collect();
        let mut suppliers = self.suppliers_by_shipment(&mut *conn, &ids).await?;
        let mut lines = group_lines(self.repo.invoice_lines(&mut *conn, &ids).await?);
        let today = Utc::now().date_naive();

        Ok(shipments
            .into_iter()
            .map(|shipment| {
                let proveedores = suppliers
                    .remove(&shipment.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|s| s.nombre)
                    .collect();
                let facturas = lines.remove(&shipment.id).unwrap_or_default();
                TrackedShipment::new(shipment, proveedores, facturas, today)
            })
            .collect())
    }

    pub async fn list<'e, E>(&self, executor: E, filter: &ShipmentFilter) -> Result<Paginated<ShipmentListItem>, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let page = Pagination::new(filter.page, filter.per_page)?;
        let mut conn = executor.acquire().await?;

        let total = self.repo.count(&mut *conn, filter).await?;
        let shipments = self.repo.list(&mut *conn, filter, page).await?;

        let ids: Vec<Uuid> = shipments.iter().map(|s| s.id).collect();
        let mut suppliers = self.suppliers_by_shipment(&mut conn, &ids).await?;

        let items = shipments
            .into_iter()
            .map(|shipment| ShipmentListItem {
                suppliers: suppliers.remove(&shipment.id).unwrap_or_default(),
                shipment,
            })
            .collect();

        Ok(Paginated::new(items, total, page))
    }

    pub async fn get<'e, E>(&self, executor: E, id: Uuid) -> Result<ShipmentDetail, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let shipment = self
            .repo
            .find_by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Embarque no encontrado"))?;
        let suppliers = self
            .repo
            .suppliers_of(&mut *conn, &[id])
            .await?
            .into_iter()
            .map(|row| row.supplier)
            .collect();
        let invoices = self.repo.invoice_lines(&mut *conn, &[id]).await?;

        Ok(ShipmentDetail { shipment, suppliers, invoices })
    }

    pub async fn create<'e, E>(&self, executor: E, payload: &CreateShipmentPayload) -> Result<Shipment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        if self.repo.codigo_taken(&mut *conn, payload.codigo.trim(), None).await? {
            return Err(AppError::UniqueConstraintViolation(
                "Ya existe un embarque con ese código".to_string(),
            ));
        }

        let shipment = self.repo.create(&mut *conn, payload).await?;
        tracing::info!("Embarque {} creado", shipment.codigo);
        Ok(shipment)
    }

    pub async fn update<'e, E>(&self, executor: E, id: Uuid, payload: &UpdateShipmentPayload) -> Result<Shipment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        if payload.is_empty() {
            return Err(AppError::rule("No hay datos para actualizar"));
        }

        let mut tx = executor.begin().await?;

        self.repo
            .lock_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Embarque no encontrado"))?;

        if let Some(codigo) = payload.codigo.as_deref() {
            if self.repo.codigo_taken(&mut *tx, codigo.trim(), Some(id)).await? {
                return Err(AppError::UniqueConstraintViolation(
                    "Ya existe otro embarque con ese código".to_string(),
                ));
            }
        }

        let shipment = self.repo.update(&mut *tx, id, payload).await?;
        tx.commit().await?;
        Ok(shipment)
    }

    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<String, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let shipment = self
            .repo
            .lock_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Embarque no encontrado"))?;

        let facturas = self.repo.invoice_count(&mut *tx, id).await?;
        if facturas > 0 {
            return Err(AppError::rule(format!(
                "No se puede eliminar: tiene {} facturas asociadas",
                facturas
            )));
        }

        self.repo.delete(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!("Embarque {} eliminado", shipment.codigo);
        Ok(format!("Embarque {} eliminado exitosamente", shipment.codigo))
    }

    /// Substitui o conjunto de fornecedores do embarque.
    pub async fn link_suppliers<'e, E>(&self, executor: E, id: Uuid, supplier_ids: &[Uuid]) -> Result<String, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let shipment = self
            .repo
            .lock_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Embarque no encontrado"))?;

        for supplier_id in supplier_ids {
            let supplier = self
                .supplier_repo
                .find_by_id(&mut *tx, *supplier_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Proveedor {} no encontrado", supplier_id)))?;
            if !supplier.activo {
                return Err(AppError::rule(format!("Proveedor {} está inactivo", supplier.nombre)));
            }
        }

        let lines = self.repo.invoice_lines(&mut *tx, &[id]).await?;
        check_supplier_replacement(&lines, supplier_ids)?;

        self.repo.clear_suppliers(&mut *tx, id).await?;
        for supplier_id in supplier_ids {
            self.repo.add_supplier(&mut *tx, id, *supplier_id).await?;
        }

        tx.commit().await?;
        Ok(format!(
            "Vinculados {} proveedores al embarque {}",
            supplier_ids.len(),
            shipment.codigo
        ))
    }

    pub async fn link_invoice<'e, E>(&self, executor: E, id: Uuid, payload: &LinkInvoicePayload) -> Result<String, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let shipment = self
            .repo
            .lock_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Embarque no encontrado"))?;
        let invoice = self
            .invoice_repo
            .find_by_id(&mut *tx, payload.invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found("Factura no encontrada"))?;

        if !self.repo.supplier_linked(&mut *tx, id, invoice.supplier_id).await? {
            return Err(AppError::rule(
                "El proveedor de la factura no está vinculado a este embarque",
            ));
        }
        if self.repo.invoice_linked(&mut *tx, id, invoice.id).await? {
            return Err(AppError::rule("La factura ya está vinculada a este embarque"));
        }
        if let Some(monto) = payload.monto_asignado {
            check_assigned_amount(monto, invoice.monto_total)?;
        }

        self.repo
            .link_invoice(&mut *tx, id, invoice.id, payload.monto_asignado)
            .await?;
        tx.commit().await?;

        Ok(format!(
            "Factura {} vinculada exitosamente al embarque {}",
            invoice.numero_factura, shipment.codigo
        ))
    }

    pub async fn update_assignment<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        invoice_id: Uuid,
        monto_asignado: Decimal,
    ) -> Result<String, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        if !self.repo.invoice_linked(&mut *tx, id, invoice_id).await? {
            return Err(AppError::not_found("La vinculación no existe"));
        }
        let invoice = self
            .invoice_repo
            .find_by_id(&mut *tx, invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found("Factura no encontrada"))?;
        check_assigned_amount(monto_asignado, invoice.monto_total)?;

        if !self.repo.set_assignment(&mut *tx, id, invoice_id, monto_asignado).await? {
            return Err(AppError::not_found("La vinculación no existe"));
        }
        tx.commit().await?;

        Ok(format!("Monto asignado actualizado a ${}", monto_asignado))
    }

    pub async fn unlink_invoice<'e, E>(&self, executor: E, id: Uuid, invoice_id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if !self.repo.unlink_invoice(executor, id, invoice_id).await? {
            return Err(AppError::not_found("La vinculación no existe"));
        }
        Ok(())
    }

    /// Cuadre financeiro do embarque.
    pub async fn balance<'e, E>(&self, executor: E, id: Uuid) -> Result<ShipmentBalance, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let shipment = self
            .repo
            .find_by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Embarque no encontrado"))?;
        let facturas = self.repo.invoice_lines(&mut *conn, &[id]).await?;
        let anticipos = self.repo.available_advances(&mut *conn, id).await?;

        Ok(ShipmentBalance::summarize(shipment, facturas, anticipos))
    }

    pub async fn by_supplier<'e, E>(&self, executor: E, supplier_id: Uuid) -> Result<ShipmentsBySupplier, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let proveedor = self
            .supplier_repo
            .find_summary(&mut *conn, supplier_id)
            .await?
            .ok_or_else(|| AppError::not_found("Proveedor no encontrado"))?;
        let shipments = self.repo.list_by_supplier(&mut *conn, supplier_id).await?;

        let ids: Vec<Uuid> = shipments.iter().map(|s| s.id).collect();
        let mut lines = group_lines(self.repo.invoice_lines(&mut *conn, &ids).await?);

        let embarques: Vec<ShipmentWithInvoices> = shipments
            .into_iter()
            .map(|shipment| ShipmentWithInvoices {
                facturas: lines.remove(&shipment.id).unwrap_or_default(),
                shipment,
            })
            .collect();

        Ok(ShipmentsBySupplier {
            proveedor,
            total_embarques: embarques.len() as i64,
            embarques,
        })
    }

    pub async fn in_transit<'e, E>(&self, executor: E) -> Result<InTransitReport, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let shipments = self.repo.list_in_transit(&mut *conn).await?;
        let tracked = self.track(&mut conn, shipments).await?;

        Ok(InTransitReport::new(tracked))
    }

    pub async fn upcoming_arrivals<'e, E>(&self, executor: E, dias: Option<u32>) -> Result<UpcomingArrivals, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let dias = dias.unwrap_or(DEFAULT_ARRIVAL_DAYS);
        check_range("dias", dias, 365)?;

        let today = Utc::now().date_naive();
        let until = today.checked_add_days(Days::new(u64::from(dias))).unwrap_or(today);

        let mut conn = executor.acquire().await?;
        let shipments = self.repo.list_arriving_until(&mut *conn, until).await?;
        let tracked = self.track(&mut conn, shipments).await?;

        Ok(UpcomingArrivals::group(tracked))
    }

    pub async fn mark_arrived<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        fecha_llegada_real: Option<NaiveDate>,
    ) -> Result<Shipment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let shipment = self
            .repo
            .lock_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Embarque no encontrado"))?;
        let estado = shipment.estado.mark_arrived()?;
        let fecha = fecha_llegada_real.unwrap_or_else(|| Utc::now().date_naive());

        let updated = self.repo.set_status(&mut *tx, id, estado, Some(fecha)).await?;
        tx.commit().await?;

        tracing::info!("Embarque {} arribado el {}", updated.codigo, fecha);
        Ok(updated)
    }

    pub async fn mark_dispatched<'e, E>(&self, executor: E, id: Uuid) -> Result<Shipment, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut tx = executor.begin().await?;

        let shipment = self
            .repo
            .lock_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Embarque no encontrado"))?;
        let estado = shipment.estado.mark_dispatched()?;

        let updated = self.repo.set_status(&mut *tx, id, estado, None).await?;
        tx.commit().await?;

        tracing::info!("Embarque {} despachado", updated.codigo);
        Ok(updated)
    }

    pub async fn stats<'e, E>(&self, executor: E) -> Result<ShipmentStats, AppError>
    where
        E: Executor<'e, Database = Postgres> + Acquire<'e, Database = Postgres>,
    {
        let mut conn = executor.acquire().await?;

        let by_status = self.repo.status_buckets(&mut *conn).await?;
        let (valor, saldo) = self.repo.linked_invoice_totals(&mut *conn).await?;

        Ok(ShipmentStats {
            total_embarques: by_status.iter().map(|b| b.cantidad).sum(),
            por_estado: count_by_status(&by_status),
            valor_total_embarques: round2(valor),
            saldo_pendiente_total: round2(saldo),
        })
    }
}
