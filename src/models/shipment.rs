// src/models/shipment.rs

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    models::{
        invoice::InvoiceStatus,
        money::{coverage_pct, fits_cents, round2},
        supplier::SupplierSummary,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "shipment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    EnTransito,
    Arribado,
    Despachado,
}

impl ShipmentStatus {
    pub fn mark_arrived(self) -> Result<Self, AppError> {
        match self {
            ShipmentStatus::EnTransito => Ok(ShipmentStatus::Arribado),
            ShipmentStatus::Arribado => Err(AppError::rule(
                "El embarque ya está marcado como arribado",
            )),
            ShipmentStatus::Despachado => Err(AppError::rule("El embarque ya fue despachado")),
        }
    }

    pub fn mark_dispatched(self) -> Result<Self, AppError> {
        match self {
            ShipmentStatus::Arribado => Ok(ShipmentStatus::Despachado),
            ShipmentStatus::Despachado => Err(AppError::rule(
                "El embarque ya está marcado como despachado",
            )),
            ShipmentStatus::EnTransito => Err(AppError::rule(
                "El embarque debe estar arribado antes de ser despachado",
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Shipment {
    pub id: Uuid,

    #[schema(example = "EMB-2025-014")]
    pub codigo: String,

    pub puerto_origen: Option<String>,
    pub puerto_destino: Option<String>,

    pub fecha_embarque: Option<NaiveDate>,
    pub fecha_llegada_estimada: Option<NaiveDate>,
    pub fecha_llegada_real: Option<NaiveDate>,

    pub estado: ShipmentStatus,
    pub naviera: Option<String>,
    pub numero_contenedor: Option<String>,
    pub notas: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `monto_asignado` precisa caber no total da fatura.
pub fn check_assigned_amount(monto_asignado: Decimal, monto_total: Decimal) -> Result<(), AppError> {
    if monto_asignado < Decimal::ZERO {
        return Err(AppError::rule("El monto asignado no puede ser negativo"));
    }
    if !fits_cents(&monto_asignado) {
        return Err(AppError::rule("El monto admite como máximo 2 decimales"));
    }
    if monto_asignado > monto_total {
        return Err(AppError::rule(
            "El monto asignado no puede exceder el total de la factura",
        ));
    }
    Ok(())
}

/// Ao trocar os fornecedores, quem ainda tem faturas no embarque precisa ficar.
pub fn check_supplier_replacement(lines: &[ShipmentInvoiceLine], supplier_ids: &[Uuid]) -> Result<(), AppError> {
    match lines.iter().find(|l| !supplier_ids.contains(&l.supplier_id)) {
        Some(line) => Err(AppError::rule(format!(
            "El proveedor {} aún tiene facturas vinculadas al embarque",
            line.proveedor_nombre
        ))),
        None => Ok(()),
    }
}

// Linha de fatura vinculada a um embarque (shipment_invoice + invoices + suppliers)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ShipmentInvoiceLine {
    pub shipment_id: Uuid,
    pub invoice_id: Uuid,
    pub monto_asignado: Option<Decimal>,
    pub numero_factura: String,
    pub monto_total: Decimal,
    pub saldo_pendiente: Decimal,
    pub estado: InvoiceStatus,
    pub supplier_id: Uuid,
    pub proveedor_nombre: String,
}

impl ShipmentInvoiceLine {
    /// Sem valor explícito, a fatura inteira conta para o embarque.
    pub fn effective_assigned(&self) -> Decimal {
        self.monto_asignado.unwrap_or(self.monto_total)
    }
}

// Fornecedor vinculado a um embarque
#[derive(Debug, Clone, FromRow)]
pub struct ShipmentSupplierRow {
    pub shipment_id: Uuid,
    #[sqlx(flatten)]
    pub supplier: SupplierSummary,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShipmentListItem {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub suppliers: Vec<SupplierSummary>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShipmentDetail {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub suppliers: Vec<SupplierSummary>,
    pub invoices: Vec<ShipmentInvoiceLine>,
}

// =============================================================================
//  CUADRE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct SupplierShipmentTotals {
    pub total_facturas: Decimal,
    pub total_asignado: Decimal,
    pub total_saldo_pendiente: Decimal,
    pub cantidad_facturas: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ShipmentFinancialSummary {
    pub total_facturas: Decimal,
    pub total_asignado: Decimal,
    pub total_saldo_pendiente: Decimal,
    pub anticipos_disponibles: Decimal,
    pub cobertura_anticipos: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShipmentBalance {
    pub embarque: Shipment,
    pub facturas: Vec<ShipmentInvoiceLine>,
    pub resumen_financiero: ShipmentFinancialSummary,
    pub por_proveedor: BTreeMap<String, SupplierShipmentTotals>,
}

impl ShipmentBalance {
    pub fn summarize(
        embarque: Shipment,
        facturas: Vec<ShipmentInvoiceLine>,
        anticipos_disponibles: Decimal,
    ) -> Self {
        let mut por_proveedor: BTreeMap<String, SupplierShipmentTotals> = BTreeMap::new();
        let mut total_facturas = Decimal::ZERO;
        let mut total_asignado = Decimal::ZERO;
        let mut total_saldo_pendiente = Decimal::ZERO;

        for line in &facturas {
            let asignado = line.effective_assigned();
            let entry = por_proveedor.entry(line.proveedor_nombre.clone()).or_default();
            entry.total_facturas += line.monto_total;
            entry.total_asignado += asignado;
            entry.total_saldo_pendiente += line.saldo_pendiente;
            entry.cantidad_facturas += 1;

            total_facturas += line.monto_total;
            total_asignado += asignado;
            total_saldo_pendiente += line.saldo_pendiente;
        }

        let resumen_financiero = ShipmentFinancialSummary {
            total_facturas: round2(total_facturas),
            total_asignado: round2(total_asignado),
            total_saldo_pendiente: round2(total_saldo_pendiente),
            anticipos_disponibles: round2(anticipos_disponibles),
            cobertura_anticipos: coverage_pct(anticipos_disponibles, total_saldo_pendiente, Decimal::ZERO),
        };

        Self { embarque, facturas, resumen_financiero, por_proveedor }
    }
}

// =============================================================================
//  ACOMPANHAMENTO (em trânsito / próximos a chegar)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalUrgency {
    Retrasado,
    Critico,
    Alto,
    Normal,
}

impl ArrivalUrgency {
    pub fn from_days(dias_hasta_llegada: Option<i64>) -> Self {
        match dias_hasta_llegada {
            Some(d) if d < 0 => ArrivalUrgency::Retrasado,
            Some(d) if d <= 3 => ArrivalUrgency::Critico,
            Some(d) if d <= 7 => ArrivalUrgency::Alto,
            _ => ArrivalUrgency::Normal,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrackedShipment {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub proveedores: Vec<String>,
    pub facturas: Vec<ShipmentInvoiceLine>,
    pub total_facturas: Decimal,
    pub saldo_pendiente: Decimal,
    pub dias_en_transito: Option<i64>,
    pub dias_hasta_llegada: Option<i64>,
    pub retrasado: bool,
    pub urgencia: ArrivalUrgency,
}

impl TrackedShipment {
    pub fn new(
        shipment: Shipment,
        proveedores: Vec<String>,
        facturas: Vec<ShipmentInvoiceLine>,
        today: NaiveDate,
    ) -> Self {
        let total_facturas = facturas.iter().map(|f| f.monto_total).sum();
        let saldo_pendiente = facturas.iter().map(|f| f.saldo_pendiente).sum();
        let dias_en_transito = shipment.fecha_embarque.map(|d| (today - d).num_days());
        let dias_hasta_llegada = shipment.fecha_llegada_estimada.map(|d| (d - today).num_days());
        let urgencia = ArrivalUrgency::from_days(dias_hasta_llegada);

        Self {
            shipment,
            proveedores,
            facturas,
            total_facturas,
            saldo_pendiente,
            dias_en_transito,
            dias_hasta_llegada,
            retrasado: urgencia == ArrivalUrgency::Retrasado,
            urgencia,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InTransitStats {
    pub total_embarques: i64,
    pub valor_total: Decimal,
    pub saldo_pendiente: Decimal,
    pub retrasados: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InTransitReport {
    pub embarques: Vec<TrackedShipment>,
    pub estadisticas: InTransitStats,
}

impl InTransitReport {
    pub fn new(embarques: Vec<TrackedShipment>) -> Self {
        let estadisticas = InTransitStats {
            total_embarques: embarques.len() as i64,
            valor_total: round2(embarques.iter().map(|e| e.total_facturas).sum()),
            saldo_pendiente: round2(embarques.iter().map(|e| e.saldo_pendiente).sum()),
            retrasados: embarques.iter().filter(|e| e.retrasado).count() as i64,
        };
        Self { embarques, estadisticas }
    }
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct UpcomingArrivalsSummary {
    pub total: i64,
    pub retrasados: i64,
    pub criticos: i64,
    pub altos: i64,
    pub normales: i64,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct UpcomingArrivalsGroups {
    pub retrasados: Vec<TrackedShipment>,
    pub criticos: Vec<TrackedShipment>,
    pub altos: Vec<TrackedShipment>,
    pub normales: Vec<TrackedShipment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpcomingArrivals {
    pub resumen: UpcomingArrivalsSummary,
    pub embarques: UpcomingArrivalsGroups,
}

impl UpcomingArrivals {
    pub fn group(embarques: Vec<TrackedShipment>) -> Self {
        let mut groups = UpcomingArrivalsGroups::default();
        let total = embarques.len() as i64;
        for e in embarques {
            match e.urgencia {
                ArrivalUrgency::Retrasado => groups.retrasados.push(e),
                ArrivalUrgency::Critico => groups.criticos.push(e),
                ArrivalUrgency::Alto => groups.altos.push(e),
                ArrivalUrgency::Normal => groups.normales.push(e),
            }
        }
        let resumen = UpcomingArrivalsSummary {
            total,
            retrasados: groups.retrasados.len() as i64,
            criticos: groups.criticos.len() as i64,
            altos: groups.altos.len() as i64,
            normales: groups.normales.len() as i64,
        };
        Self { resumen, embarques: groups }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShipmentWithInvoices {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub facturas: Vec<ShipmentInvoiceLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShipmentsBySupplier {
    pub proveedor: SupplierSummary,
    pub embarques: Vec<ShipmentWithInvoices>,
    pub total_embarques: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShipmentStats {
    pub total_embarques: i64,
    pub por_estado: BTreeMap<String, i64>,
    pub valor_total_embarques: Decimal,
    pub saldo_pendiente_total: Decimal,
}

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateShipmentPayload {
    #[validate(length(min = 1, max = 50, message = "El código es requerido (máximo 50 caracteres)"))]
    #[schema(example = "EMB-2025-014")]
    pub codigo: String,
    pub puerto_origen: Option<String>,
    pub puerto_destino: Option<String>,
    pub fecha_embarque: Option<NaiveDate>,
    pub fecha_llegada_estimada: Option<NaiveDate>,
    pub fecha_llegada_real: Option<NaiveDate>,
    pub estado: Option<ShipmentStatus>,
    pub naviera: Option<String>,
    #[validate(length(max = 50))]
    pub numero_contenedor: Option<String>,
    pub notas: Option<String>,
}

// `estado` só muda pelas rotas marcar-arribado / marcar-despachado.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateShipmentPayload {
    #[validate(length(min = 1, max = 50))]
    pub codigo: Option<String>,
    pub puerto_origen: Option<String>,
    pub puerto_destino: Option<String>,
    pub fecha_embarque: Option<NaiveDate>,
    pub fecha_llegada_estimada: Option<NaiveDate>,
    pub fecha_llegada_real: Option<NaiveDate>,
    pub naviera: Option<String>,
    #[validate(length(max = 50))]
    pub numero_contenedor: Option<String>,
    pub notas: Option<String>,
}

impl UpdateShipmentPayload {
    pub fn is_empty(&self) -> bool {
        self.codigo.is_none()
            && self.puerto_origen.is_none()
            && self.puerto_destino.is_none()
            && self.fecha_embarque.is_none()
            && self.fecha_llegada_estimada.is_none()
            && self.fecha_llegada_real.is_none()
            && self.naviera.is_none()
            && self.numero_contenedor.is_none()
            && self.notas.is_none()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LinkSuppliersPayload {
    pub supplier_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LinkInvoicePayload {
    pub invoice_id: Uuid,
    pub monto_asignado: Option<Decimal>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAssignmentPayload {
    pub monto_asignado: Decimal,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MarkArrivedParams {
    /// Se omitida, usa a data de hoje
    pub fecha_llegada_real: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShipmentFilter {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub estado: Option<ShipmentStatus>,
    /// Busca em código ou número do contêiner
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipment(estado: ShipmentStatus) -> Shipment {
        Shipment {
            id: Uuid::new_v4(),
            codigo: "EMB-1".into(),
            puerto_origen: Some("Ningbo".into()),
            puerto_destino: Some("San Antonio".into()),
            fecha_embarque: NaiveDate::from_ymd_opt(2025, 3, 1),
            fecha_llegada_estimada: NaiveDate::from_ymd_opt(2025, 4, 10),
            fecha_llegada_real: None,
            estado,
            naviera: None,
            numero_contenedor: None,
            notas: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(proveedor: &str, total: i64, saldo: i64, asignado: Option<i64>) -> ShipmentInvoiceLine {
        ShipmentInvoiceLine {
            shipment_id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            monto_asignado: asignado.map(Decimal::from),
            numero_factura: format!("F-{}", total),
            monto_total: Decimal::from(total),
            saldo_pendiente: Decimal::from(saldo),
            estado: InvoiceStatus::Pendiente,
            supplier_id: Uuid::new_v4(),
            proveedor_nombre: proveedor.into(),
        }
    }

    #[test]
    fn dispatch_requires_arrival() {
        let err = ShipmentStatus::EnTransito.mark_dispatched().unwrap_err();
        assert_eq!(err.to_string(), "El embarque debe estar arribado antes de ser despachado");

        let arrived = ShipmentStatus::EnTransito.mark_arrived().unwrap();
        assert_eq!(arrived.mark_dispatched().unwrap(), ShipmentStatus::Despachado);
    }

    #[test]
    fn arriving_twice_fails() {
        let err = ShipmentStatus::Arribado.mark_arrived().unwrap_err();
        assert_eq!(err.to_string(), "El embarque ya está marcado como arribado");
        assert!(ShipmentStatus::Despachado.mark_dispatched().is_err());
    }

    #[test]
    fn assigned_amount_must_fit_invoice_total() {
        assert!(check_assigned_amount(Decimal::from(500), Decimal::from(500)).is_ok());
        assert_eq!(
            check_assigned_amount(Decimal::from(501), Decimal::from(500)).unwrap_err().to_string(),
            "El monto asignado no puede exceder el total de la factura"
        );
        assert!(check_assigned_amount(Decimal::new(1005, 3), Decimal::from(500)).is_err());
    }

    #[test]
    fn replacing_suppliers_keeps_those_with_linked_invoices() {
        let acme = line("Acme", 1000, 1000, None);
        let globex = line("Globex", 500, 500, None);
        let lines = vec![acme.clone(), globex.clone()];

        assert!(check_supplier_replacement(&lines, &[acme.supplier_id, globex.supplier_id]).is_ok());
        assert_eq!(
            check_supplier_replacement(&lines, &[acme.supplier_id]).unwrap_err().to_string(),
            "El proveedor Globex aún tiene facturas vinculadas al embarque"
        );
        assert!(check_supplier_replacement(&[], &[]).is_ok());
    }

    #[test]
    fn balance_groups_by_supplier_and_defaults_assignment_to_total() {
        let balance = ShipmentBalance::summarize(
            shipment(ShipmentStatus::EnTransito),
            vec![
                line("Acme", 1000, 600, Some(400)),
                line("Acme", 500, 500, None),
                line("Globex", 200, 0, None),
            ],
            Decimal::from(550),
        );

        let acme = &balance.por_proveedor["Acme"];
        assert_eq!(acme.cantidad_facturas, 2);
        assert_eq!(acme.total_facturas, Decimal::from(1500));
        assert_eq!(acme.total_asignado, Decimal::from(900));

        let resumen = &balance.resumen_financiero;
        assert_eq!(resumen.total_facturas, Decimal::from(1700));
        assert_eq!(resumen.total_asignado, Decimal::from(1100));
        assert_eq!(resumen.total_saldo_pendiente, Decimal::from(1100));
        assert_eq!(resumen.cobertura_anticipos, Decimal::from(50));
    }

    #[test]
    fn urgency_buckets_by_days_to_arrival() {
        assert_eq!(ArrivalUrgency::from_days(Some(-1)), ArrivalUrgency::Retrasado);
        assert_eq!(ArrivalUrgency::from_days(Some(0)), ArrivalUrgency::Critico);
        assert_eq!(ArrivalUrgency::from_days(Some(3)), ArrivalUrgency::Critico);
        assert_eq!(ArrivalUrgency::from_days(Some(7)), ArrivalUrgency::Alto);
        assert_eq!(ArrivalUrgency::from_days(Some(8)), ArrivalUrgency::Normal);
        assert_eq!(ArrivalUrgency::from_days(None), ArrivalUrgency::Normal);
    }

    #[test]
    fn tracked_shipment_counts_days_both_ways() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 12).unwrap();
        let tracked = TrackedShipment::new(
            shipment(ShipmentStatus::EnTransito),
            vec!["Acme".into()],
            vec![line("Acme", 300, 100, None)],
            today,
        );
        assert_eq!(tracked.dias_en_transito, Some(42));
        assert_eq!(tracked.dias_hasta_llegada, Some(-2));
        assert!(tracked.retrasado);

        let report = InTransitReport::new(vec![tracked]);
        assert_eq!(report.estadisticas.retrasados, 1);
        assert_eq!(report.estadisticas.valor_total, Decimal::from(300));
    }

    #[test]
    fn upcoming_arrivals_are_grouped_by_urgency() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 5).unwrap();
        let mut soon = shipment(ShipmentStatus::EnTransito);
        soon.fecha_llegada_estimada = NaiveDate::from_ymd_opt(2025, 4, 7);
        let mut later = shipment(ShipmentStatus::EnTransito);
        later.fecha_llegada_estimada = NaiveDate::from_ymd_opt(2025, 4, 30);

        let grouped = UpcomingArrivals::group(vec![
            TrackedShipment::new(soon, vec![], vec![], today),
            TrackedShipment::new(later, vec![], vec![], today),
        ]);
        assert_eq!(grouped.resumen.total, 2);
        assert_eq!(grouped.resumen.criticos, 1);
        assert_eq!(grouped.resumen.normales, 1);
    }
}
