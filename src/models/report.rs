// src/models/report.rs
//
// Linhas "fato" lidas pelos relatórios e as estruturas agregadas que eles devolvem.
// Toda a agregação aqui é pura (sem banco) para poder ser testada isoladamente.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::{
    advance::{AdvanceStatus, AdvanceWithOrder},
    invoice::{Invoice, InvoiceStatus},
    money::{coverage_pct, round2, Currency, CurrencyTotals},
    purchase_order::{OrderBalance, PurchaseOrder, PurchaseOrderStatus},
    shipment::Shipment,
    supplier::Supplier,
};

pub const OVERDUE_ALERT_DAYS: u64 = 30;
pub const TOP_SUPPLIERS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct CountAmount {
    pub cantidad: i64,
    pub monto: Decimal,
}

impl CountAmount {
    pub fn add(&mut self, amount: Decimal) {
        self.cantidad += 1;
        self.monto += amount;
    }
}

// =============================================================================
//  BUCKETS (GROUP BY)
// =============================================================================

// `monto`/`saldo` valem 0 quando a tabela não tem o valor
#[derive(Debug, Clone, FromRow)]
pub struct StatusBucket {
    pub estado: String,
    pub cantidad: i64,
    pub monto: Decimal,
    pub saldo: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct CurrencyBucket {
    pub moneda: Currency,
    pub monto: Decimal,
    pub saldo: Decimal,
}

pub fn count_by_status(buckets: &[StatusBucket]) -> BTreeMap<String, i64> {
    buckets.iter().map(|b| (b.estado.clone(), b.cantidad)).collect()
}

pub fn amount_by_currency(buckets: &[CurrencyBucket]) -> BTreeMap<String, Decimal> {
    buckets
        .iter()
        .map(|b| (b.moneda.as_str().to_string(), round2(b.monto)))
        .collect()
}

pub fn balance_by_currency(buckets: &[CurrencyBucket]) -> BTreeMap<String, Decimal> {
    buckets
        .iter()
        .map(|b| (b.moneda.as_str().to_string(), round2(b.saldo)))
        .collect()
}

// =============================================================================
//  LINHAS FATO
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct OrderFact {
    pub id: Uuid,
    pub numero_orden: String,
    pub proveedor_nombre: String,
    pub proveedor_activo: bool,
    pub moneda: Currency,
    pub total_oc: Decimal,
    pub estado: PurchaseOrderStatus,
}

// Fatura vinculada a uma ordem (invoice_po)
#[derive(Debug, Clone, FromRow)]
pub struct OrderInvoiceFact {
    pub po_id: Uuid,
    pub monto_total: Decimal,
    pub saldo_pendiente: Decimal,
}

// Anticipo com o total já aplicado
#[derive(Debug, Clone, FromRow)]
pub struct AdvanceFact {
    pub po_id: Uuid,
    pub monto: Decimal,
    pub moneda: Currency,
    pub estado: AdvanceStatus,
    pub monto_aplicado: Decimal,
}

impl AdvanceFact {
    /// Saldo utilizável (zero se aplicado ou devolvido).
    pub fn available(&self) -> Decimal {
        if self.estado == AdvanceStatus::Disponible {
            (self.monto - self.monto_aplicado).max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        }
    }
}

// Cuota com fatura e fornecedor, e o total já aplicado nela
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DueFact {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub numero_cuota: i16,
    pub fecha_vencimiento: NaiveDate,
    pub monto_vencimiento: Decimal,
    pub estado: InvoiceStatus,
    pub monto_pagado: Decimal,
    pub numero_factura: String,
    pub moneda: Currency,
    pub factura_estado: InvoiceStatus,
    pub supplier_id: Uuid,
    pub proveedor_nombre: String,
    pub proveedor_contacto: Option<String>,
}

impl DueFact {
    pub fn saldo(&self) -> Decimal {
        (self.monto_vencimiento - self.monto_pagado).max(Decimal::ZERO)
    }

    /// Ainda há algo a pagar nesta cuota (e a fatura não está quitada).
    pub fn is_open(&self) -> bool {
        self.factura_estado != InvoiceStatus::PagadaCompleta
            && self.estado != InvoiceStatus::PagadaCompleta
            && self.saldo() > Decimal::ZERO
    }
}

#[derive(Debug, Clone, Default, Serialize, FromRow, ToSchema)]
pub struct EntityCounts {
    pub suppliers: i64,
    pub suppliers_activos: i64,
    pub purchase_orders: i64,
    pub invoices: i64,
    pub shipments: i64,
}

// =============================================================================
//  DASHBOARD EXECUTIVO
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct OrdersFinancials {
    pub total: CurrencyTotals,
    pub por_estado: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoicesFinancials {
    pub total: CurrencyTotals,
    pub saldo_pendiente: CurrencyTotals,
    pub por_estado: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdvancesFinancials {
    pub total: CurrencyTotals,
    pub disponibles: CurrencyTotals,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExecutiveFinancials {
    pub ordenes_compra: OrdersFinancials,
    pub facturas: InvoicesFinancials,
    pub anticipos: AdvancesFinancials,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShipmentsByStatus {
    pub por_estado: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SupplierVolume {
    pub nombre: String,
    pub total_ordenes: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Alert {
    pub tipo: String,
    pub cantidad: i64,
    pub mensaje: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExecutiveDashboard {
    pub conteos: EntityCounts,
    pub financiero: ExecutiveFinancials,
    pub embarques: ShipmentsByStatus,
    pub top_suppliers: Vec<SupplierVolume>,
    pub alertas: Vec<Alert>,
    pub ultima_actualizacion: DateTime<Utc>,
}

fn status_key<T: Serialize>(estado: &T) -> String {
    serde_json::to_value(estado)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

impl ExecutiveDashboard {
    pub fn build(
        conteos: EntityCounts,
        orders: &[OrderFact],
        invoices: &[Invoice],
        advances: &[AdvanceFact],
        embarques_por_estado: BTreeMap<String, i64>,
        dues: &[DueFact],
        now: DateTime<Utc>,
    ) -> Self {
        let today = now.date_naive();

        // Ordens
        let mut ordenes_total = CurrencyTotals::default();
        let mut ordenes_por_estado: BTreeMap<String, i64> = BTreeMap::new();
        for o in orders {
            ordenes_total.add(o.moneda, o.total_oc);
            *ordenes_por_estado.entry(status_key(&o.estado)).or_default() += 1;
        }

        // Faturas
        let mut facturas_total = CurrencyTotals::default();
        let mut facturas_saldo = CurrencyTotals::default();
        let mut facturas_por_estado: BTreeMap<String, i64> = BTreeMap::new();
        for inv in invoices {
            facturas_total.add(inv.moneda, inv.monto_total);
            facturas_saldo.add(inv.moneda, inv.saldo_pendiente);
            *facturas_por_estado.entry(status_key(&inv.estado)).or_default() += 1;
        }

        // Anticipos
        let mut anticipos_total = CurrencyTotals::default();
        let mut anticipos_disponibles = CurrencyTotals::default();
        for a in advances {
            anticipos_total.add(a.moneda, a.monto);
            anticipos_disponibles.add(a.moneda, a.available());
        }

        // Top fornecedores ativos por volume de ordens
        let mut volume: HashMap<&str, Decimal> = HashMap::new();
        for o in orders.iter().filter(|o| o.proveedor_activo) {
            *volume.entry(o.proveedor_nombre.as_str()).or_default() += o.total_oc;
        }
        let mut top_suppliers: Vec<SupplierVolume> = volume
            .into_iter()
            .filter(|(_, total)| *total > Decimal::ZERO)
            .map(|(nombre, total)| SupplierVolume {
                nombre: nombre.to_string(),
                total_ordenes: round2(total),
            })
            .collect();
        top_suppliers.sort_by(|a, b| {
            b.total_ordenes
                .cmp(&a.total_ordenes)
                .then_with(|| a.nombre.cmp(&b.nombre))
        });
        top_suppliers.truncate(TOP_SUPPLIERS);

        Self {
            conteos,
            financiero: ExecutiveFinancials {
                ordenes_compra: OrdersFinancials {
                    total: ordenes_total.rounded(),
                    por_estado: ordenes_por_estado,
                },
                facturas: InvoicesFinancials {
                    total: facturas_total.rounded(),
                    saldo_pendiente: facturas_saldo.rounded(),
                    por_estado: facturas_por_estado,
                },
                anticipos: AdvancesFinancials {
                    total: anticipos_total.rounded(),
                    disponibles: anticipos_disponibles.rounded(),
                },
            },
            embarques: ShipmentsByStatus { por_estado: embarques_por_estado },
            top_suppliers,
            alertas: build_alerts(orders, advances, dues, today),
            ultima_actualizacion: now,
        }
    }
}

fn build_alerts(
    orders: &[OrderFact],
    advances: &[AdvanceFact],
    dues: &[DueFact],
    today: NaiveDate,
) -> Vec<Alert> {
    let mut alertas = Vec::new();

    let limite = today
        .checked_sub_days(Days::new(OVERDUE_ALERT_DAYS))
        .unwrap_or(today);
    let vencidas = dues
        .iter()
        .filter(|d| d.is_open() && d.fecha_vencimiento < limite)
        .count() as i64;
    if vencidas > 0 {
        alertas.push(Alert {
            tipo: "facturas_vencidas".to_string(),
            cantidad: vencidas,
            mensaje: format!(
                "{} vencimientos pendientes hace más de {} días",
                vencidas, OVERDUE_ALERT_DAYS
            ),
        });
    }

    let sin_anticipos = orders
        .iter()
        .filter(|o| o.estado == PurchaseOrderStatus::Pendiente)
        .filter(|o| !advances.iter().any(|a| a.po_id == o.id))
        .count() as i64;
    if sin_anticipos > 0 {
        alertas.push(Alert {
            tipo: "ordenes_sin_anticipos".to_string(),
            cantidad: sin_anticipos,
            mensaje: format!("{} órdenes pendientes sin anticipos", sin_anticipos),
        });
    }

    alertas
}

// =============================================================================
//  CONCILIAÇÃO DE ORDENS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationState {
    Completa,
    PendienteFacturacion,
    PendientePago,
    Parcial,
}

impl ReconciliationState {
    pub fn classify(
        oc_vs_facturas: Decimal,
        saldo_pendiente: Decimal,
        anticipos_disponibles: Decimal,
    ) -> Self {
        if oc_vs_facturas.abs() > crate::models::money::CENT_TOLERANCE {
            ReconciliationState::PendienteFacturacion
        } else if saldo_pendiente > Decimal::ZERO && anticipos_disponibles.is_zero() {
            ReconciliationState::PendientePago
        } else if saldo_pendiente > Decimal::ZERO {
            ReconciliationState::Parcial
        } else {
            ReconciliationState::Completa
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconciledOrder {
    pub id: Uuid,
    pub numero: String,
    pub proveedor: String,
    pub total: Decimal,
    pub moneda: Currency,
    pub estado: PurchaseOrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconciledInvoices {
    pub total: Decimal,
    pub saldo_pendiente: Decimal,
    pub cantidad: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconciledAdvances {
    pub total_pagado: Decimal,
    pub aplicados: Decimal,
    pub disponibles: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderReconciliation {
    pub orden: ReconciledOrder,
    pub facturas: ReconciledInvoices,
    pub anticipos: ReconciledAdvances,
    pub balance: OrderBalance,
    pub estado_conciliacion: ReconciliationState,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconciliationSummary {
    pub total_ordenes: i64,
    pub completas: i64,
    pub pendientes: i64,
    pub porcentaje_completitud: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconciliationReport {
    pub resumen: ReconciliationSummary,
    pub ordenes: Vec<OrderReconciliation>,
}

impl ReconciliationReport {
    pub fn build(
        orders: &[OrderFact],
        invoices: &[OrderInvoiceFact],
        advances: &[AdvanceFact],
    ) -> Self {
        let ordenes: Vec<OrderReconciliation> = orders
            .iter()
            .map(|o| {
                let linked: Vec<&OrderInvoiceFact> =
                    invoices.iter().filter(|i| i.po_id == o.id).collect();
                let own: Vec<&AdvanceFact> = advances.iter().filter(|a| a.po_id == o.id).collect();

                let total_facturas: Decimal = linked.iter().map(|i| i.monto_total).sum();
                let saldo_pendiente: Decimal = linked.iter().map(|i| i.saldo_pendiente).sum();
                let total_pagado: Decimal = own.iter().map(|a| a.monto).sum();
                let aplicados: Decimal = own.iter().map(|a| a.monto_aplicado).sum();
                let disponibles: Decimal = own.iter().map(|a| a.available()).sum();

                let oc_vs_facturas = o.total_oc - total_facturas;

                OrderReconciliation {
                    orden: ReconciledOrder {
                        id: o.id,
                        numero: o.numero_orden.clone(),
                        proveedor: o.proveedor_nombre.clone(),
                        total: o.total_oc,
                        moneda: o.moneda,
                        estado: o.estado,
                    },
                    facturas: ReconciledInvoices {
                        total: round2(total_facturas),
                        saldo_pendiente: round2(saldo_pendiente),
                        cantidad: linked.len() as i64,
                    },
                    anticipos: ReconciledAdvances {
                        total_pagado: round2(total_pagado),
                        aplicados: round2(aplicados),
                        disponibles: round2(disponibles),
                    },
                    balance: OrderBalance {
                        oc_vs_facturas: round2(oc_vs_facturas),
                        cobertura_anticipos: coverage_pct(disponibles, saldo_pendiente, Decimal::ZERO),
                    },
                    estado_conciliacion: ReconciliationState::classify(
                        oc_vs_facturas,
                        saldo_pendiente,
                        disponibles,
                    ),
                }
            })
            .collect();

        let total_ordenes = ordenes.len() as i64;
        let completas = ordenes
            .iter()
            .filter(|o| o.estado_conciliacion == ReconciliationState::Completa)
            .count() as i64;
        let porcentaje_completitud = if total_ordenes > 0 {
            round2(Decimal::from(completas) / Decimal::from(total_ordenes) * Decimal::ONE_HUNDRED)
        } else {
            Decimal::ZERO
        };

        Self {
            resumen: ReconciliationSummary {
                total_ordenes,
                completas,
                pendientes: total_ordenes - completas,
                porcentaje_completitud,
            },
            ordenes,
        }
    }
}

// =============================================================================
//  FLUXO DE CAIXA PROJETADO
// =============================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CashFlowParams {
    /// 1..=52, padrão 4
    pub semanas: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HorizonParams {
    /// 1..=365, padrão 30
    pub dias: Option<u32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectedDue {
    pub fecha: NaiveDate,
    pub monto: Decimal,
    pub moneda: Currency,
    pub factura: String,
    pub proveedor: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WeekProjection {
    pub semana: u32,
    pub fecha_inicio: NaiveDate,
    pub fecha_fin: NaiveDate,
    pub salidas: CurrencyTotals,
    pub vencimientos: Vec<ProjectedDue>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectionPeriod {
    pub inicio: NaiveDate,
    pub fin: NaiveDate,
    pub semanas: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CashFlowSummary {
    pub total_salidas: CurrencyTotals,
    pub anticipos_disponibles: CurrencyTotals,
    pub cobertura_usd: Decimal,
    pub cobertura_clp: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CashFlowProjection {
    pub periodo: ProjectionPeriod,
    pub resumen: CashFlowSummary,
    pub proyeccion_semanal: Vec<WeekProjection>,
}

impl CashFlowProjection {
    /// Distribui o saldo das cuotas abertas em semanas a partir de `today`.
    pub fn project(dues: &[DueFact], advances: &[AdvanceFact], today: NaiveDate, semanas: u32) -> Self {
        let dias = u64::from(semanas) * 7;
        let fin_exclusivo = today.checked_add_days(Days::new(dias)).unwrap_or(today);

        let mut proyeccion_semanal: Vec<WeekProjection> = (1..=semanas)
            .map(|semana| {
                let offset = u64::from(semana - 1) * 7;
                let fecha_inicio = today.checked_add_days(Days::new(offset)).unwrap_or(today);
                let fecha_fin = fecha_inicio.checked_add_days(Days::new(6)).unwrap_or(fecha_inicio);
                WeekProjection {
                    semana,
                    fecha_inicio,
                    fecha_fin,
                    salidas: CurrencyTotals::default(),
                    vencimientos: Vec::new(),
                }
            })
            .collect();

        let mut total_salidas = CurrencyTotals::default();
        for due in dues
            .iter()
            .filter(|d| d.is_open() && d.fecha_vencimiento >= today && d.fecha_vencimiento < fin_exclusivo)
        {
            let idx = ((due.fecha_vencimiento - today).num_days() / 7) as usize;
            let Some(week) = proyeccion_semanal.get_mut(idx) else {
                continue;
            };
            let monto = due.saldo();
            week.salidas.add(due.moneda, monto);
            week.vencimientos.push(ProjectedDue {
                fecha: due.fecha_vencimiento,
                monto,
                moneda: due.moneda,
                factura: due.numero_factura.clone(),
                proveedor: due.proveedor_nombre.clone(),
            });
            total_salidas.add(due.moneda, monto);
        }
        for week in &mut proyeccion_semanal {
            week.salidas = week.salidas.rounded();
        }

        let mut anticipos_disponibles = CurrencyTotals::default();
        for a in advances {
            anticipos_disponibles.add(a.moneda, a.available());
        }

        Self {
            periodo: ProjectionPeriod {
                inicio: today,
                fin: fin_exclusivo.pred_opt().unwrap_or(fin_exclusivo),
                semanas,
            },
            resumen: CashFlowSummary {
                total_salidas: total_salidas.rounded(),
                anticipos_disponibles: anticipos_disponibles.rounded(),
                cobertura_usd: coverage_pct(anticipos_disponibles.usd, total_salidas.usd, Decimal::ONE_HUNDRED),
                cobertura_clp: coverage_pct(anticipos_disponibles.clp, total_salidas.clp, Decimal::ONE_HUNDRED),
            },
            proyeccion_semanal,
        }
    }
}

// =============================================================================
//  VENCIMENTOS PRÓXIMOS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DueUrgency {
    Vencido,
    Critico,
    Alto,
    Normal,
}

impl DueUrgency {
    pub fn from_days(dias_hasta_vencimiento: i64) -> Self {
        match dias_hasta_vencimiento {
            d if d < 0 => DueUrgency::Vencido,
            d if d <= 7 => DueUrgency::Critico,
            d if d <= 30 => DueUrgency::Alto,
            _ => DueUrgency::Normal,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UpcomingDue {
    #[serde(flatten)]
    pub due: DueFact,
    pub saldo: Decimal,
    pub dias_hasta_vencimiento: i64,
    pub urgencia: DueUrgency,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct UrgencyBucket {
    pub cantidad: i64,
    pub totales: CurrencyTotals,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct UpcomingDuesSummary {
    pub total_vencimientos: i64,
    pub vencidos: UrgencyBucket,
    pub proximos_7_dias: UrgencyBucket,
    pub proximos_30_dias: UrgencyBucket,
    pub posteriores: UrgencyBucket,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct UpcomingDuesGroups {
    pub vencidos: Vec<UpcomingDue>,
    pub proximos_7_dias: Vec<UpcomingDue>,
    pub proximos_30_dias: Vec<UpcomingDue>,
    pub posteriores: Vec<UpcomingDue>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpcomingDuesReport {
    pub resumen: UpcomingDuesSummary,
    pub vencimientos: UpcomingDuesGroups,
}

impl UpcomingDuesReport {
    /// Cuotas abertas que vencem até `today + dias` (inclui as já vencidas).
    pub fn build(dues: &[DueFact], today: NaiveDate, dias: u32) -> Self {
        let limite = today
            .checked_add_days(Days::new(u64::from(dias)))
            .unwrap_or(today);

        let mut resumen = UpcomingDuesSummary::default();
        let mut grupos = UpcomingDuesGroups::default();

        let mut open: Vec<&DueFact> = dues
            .iter()
            .filter(|d| d.is_open() && d.fecha_vencimiento <= limite)
            .collect();
        open.sort_by_key(|d| d.fecha_vencimiento);

        for due in open {
            let dias_hasta_vencimiento = (due.fecha_vencimiento - today).num_days();
            let urgencia = DueUrgency::from_days(dias_hasta_vencimiento);
            let saldo = due.saldo();
            let item = UpcomingDue { due: due.clone(), saldo, dias_hasta_vencimiento, urgencia };

            let (bucket, list) = match urgencia {
                DueUrgency::Vencido => (&mut resumen.vencidos, &mut grupos.vencidos),
                DueUrgency::Critico => (&mut resumen.proximos_7_dias, &mut grupos.proximos_7_dias),
                DueUrgency::Alto => (&mut resumen.proximos_30_dias, &mut grupos.proximos_30_dias),
                DueUrgency::Normal => (&mut resumen.posteriores, &mut grupos.posteriores),
            };
            bucket.cantidad += 1;
            bucket.totales.add(due.moneda, saldo);
            list.push(item);
            resumen.total_vencimientos += 1;
        }

        for bucket in [
            &mut resumen.vencidos,
            &mut resumen.proximos_7_dias,
            &mut resumen.proximos_30_dias,
            &mut resumen.posteriores,
        ] {
            bucket.totales = bucket.totales.rounded();
        }

        Self { resumen, vencimientos: grupos }
    }
}

// =============================================================================
//  DETALHE DO FORNECEDOR
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierDetailStats {
    pub total_ordenes: CurrencyTotals,
    pub total_facturas: CurrencyTotals,
    pub saldo_pendiente: CurrencyTotals,
    pub total_anticipos: CurrencyTotals,
    pub cantidad_ordenes: i64,
    pub cantidad_facturas: i64,
    pub cantidad_embarques: i64,
    pub vencimientos_proximos: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierDetailReport {
    pub proveedor: Supplier,
    pub estadisticas: SupplierDetailStats,
    pub ordenes_compra: Vec<PurchaseOrder>,
    pub facturas: Vec<Invoice>,
    pub anticipos: Vec<AdvanceWithOrder>,
    pub embarques: Vec<Shipment>,
    pub vencimientos_proximos: Vec<DueFact>,
}

impl SupplierDetailReport {
    pub fn build(
        proveedor: Supplier,
        ordenes_compra: Vec<PurchaseOrder>,
        facturas: Vec<Invoice>,
        anticipos: Vec<AdvanceWithOrder>,
        embarques: Vec<Shipment>,
        dues: &[DueFact],
        today: NaiveDate,
    ) -> Self {
        let limite = today
            .checked_add_days(Days::new(OVERDUE_ALERT_DAYS))
            .unwrap_or(today);
        let vencimientos_proximos: Vec<DueFact> = dues
            .iter()
            .filter(|d| d.is_open() && d.fecha_vencimiento <= limite)
            .cloned()
            .collect();

        let mut total_ordenes = CurrencyTotals::default();
        for o in &ordenes_compra {
            total_ordenes.add(o.moneda, o.total_oc);
        }
        let mut total_facturas = CurrencyTotals::default();
        let mut saldo_pendiente = CurrencyTotals::default();
        for f in &facturas {
            total_facturas.add(f.moneda, f.monto_total);
            saldo_pendiente.add(f.moneda, f.saldo_pendiente);
        }
        let mut total_anticipos = CurrencyTotals::default();
        for a in &anticipos {
            total_anticipos.add(a.advance.moneda, a.advance.monto);
        }

        let estadisticas = SupplierDetailStats {
            total_ordenes: total_ordenes.rounded(),
            total_facturas: total_facturas.rounded(),
            saldo_pendiente: saldo_pendiente.rounded(),
            total_anticipos: total_anticipos.rounded(),
            cantidad_ordenes: ordenes_compra.len() as i64,
            cantidad_facturas: facturas.len() as i64,
            cantidad_embarques: embarques.len() as i64,
            vencimientos_proximos: vencimientos_proximos.len() as i64,
        };

        Self {
            proveedor,
            estadisticas,
            ordenes_compra,
            facturas,
            anticipos,
            embarques,
            vencimientos_proximos,
        }
    }
}

// =============================================================================
//  ESTATÍSTICAS GERAIS (/api/stats/dashboard)
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemFinancials {
    pub invoices_pendientes: i64,
    pub invoices_pagadas: i64,
    pub total_ordenes: CurrencyTotals,
    pub total_facturas: CurrencyTotals,
    pub saldo_pendiente: CurrencyTotals,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStats {
    pub conteos: EntityCounts,
    pub financial: SystemFinancials,
}

impl SystemStats {
    pub fn build(conteos: EntityCounts, orders: &[OrderFact], invoices: &[Invoice]) -> Self {
        let mut total_ordenes = CurrencyTotals::default();
        for o in orders {
            total_ordenes.add(o.moneda, o.total_oc);
        }
        let mut total_facturas = CurrencyTotals::default();
        let mut saldo_pendiente = CurrencyTotals::default();
        for inv in invoices {
            total_facturas.add(inv.moneda, inv.monto_total);
            saldo_pendiente.add(inv.moneda, inv.saldo_pendiente);
        }

        Self {
            conteos,
            financial: SystemFinancials {
                invoices_pendientes: invoices
                    .iter()
                    .filter(|i| i.estado == InvoiceStatus::Pendiente)
                    .count() as i64,
                invoices_pagadas: invoices
                    .iter()
                    .filter(|i| i.estado == InvoiceStatus::PagadaCompleta)
                    .count() as i64,
                total_ordenes: total_ordenes.rounded(),
                total_facturas: total_facturas.rounded(),
                saldo_pendiente: saldo_pendiente.rounded(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn due(offset: i64, monto: i64, pagado: i64, moneda: Currency) -> DueFact {
        DueFact {
            id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            numero_cuota: 1,
            fecha_vencimiento: today() + chrono::Duration::days(offset),
            monto_vencimiento: Decimal::from(monto),
            estado: InvoiceStatus::Pendiente,
            monto_pagado: Decimal::from(pagado),
            numero_factura: format!("F-{}", offset),
            moneda,
            factura_estado: InvoiceStatus::Pendiente,
            supplier_id: Uuid::new_v4(),
            proveedor_nombre: "Acme".into(),
            proveedor_contacto: None,
        }
    }

    fn order(nombre: &str, total: i64, estado: PurchaseOrderStatus) -> OrderFact {
        OrderFact {
            id: Uuid::new_v4(),
            numero_orden: format!("PO-{}", nombre),
            proveedor_nombre: nombre.into(),
            proveedor_activo: true,
            moneda: Currency::Usd,
            total_oc: Decimal::from(total),
            estado,
        }
    }

    fn advance(po_id: Uuid, monto: i64, aplicado: i64, estado: AdvanceStatus) -> AdvanceFact {
        AdvanceFact {
            po_id,
            monto: Decimal::from(monto),
            moneda: Currency::Usd,
            estado,
            monto_aplicado: Decimal::from(aplicado),
        }
    }

    #[test]
    fn classification_follows_balance_then_payment() {
        let d = |v: i64| Decimal::from(v);
        assert_eq!(
            ReconciliationState::classify(d(200), d(0), d(0)),
            ReconciliationState::PendienteFacturacion
        );
        assert_eq!(
            ReconciliationState::classify(Decimal::new(1, 2), d(600), d(0)),
            ReconciliationState::PendientePago
        );
        assert_eq!(
            ReconciliationState::classify(d(0), d(600), d(100)),
            ReconciliationState::Parcial
        );
        assert_eq!(
            ReconciliationState::classify(d(0), d(0), d(0)),
            ReconciliationState::Completa
        );
    }

    #[test]
    fn reconciliation_report_counts_complete_orders() {
        let po1 = order("Acme", 1000, PurchaseOrderStatus::Pendiente);
        let po2 = order("Beta", 500, PurchaseOrderStatus::Pendiente);
        let invoices = vec![
            OrderInvoiceFact { po_id: po1.id, monto_total: Decimal::from(1000), saldo_pendiente: Decimal::from(600) },
            OrderInvoiceFact { po_id: po2.id, monto_total: Decimal::from(500), saldo_pendiente: Decimal::ZERO },
        ];
        let advances = vec![advance(po1.id, 400, 400, AdvanceStatus::Aplicado)];

        let report = ReconciliationReport::build(&[po1, po2], &invoices, &advances);

        assert_eq!(report.resumen.total_ordenes, 2);
        assert_eq!(report.resumen.completas, 1);
        assert_eq!(report.resumen.pendientes, 1);
        assert_eq!(report.resumen.porcentaje_completitud, Decimal::from(50));

        let acme = &report.ordenes[0];
        assert_eq!(acme.estado_conciliacion, ReconciliationState::PendientePago);
        assert_eq!(acme.anticipos.aplicados, Decimal::from(400));
        assert_eq!(acme.anticipos.disponibles, Decimal::ZERO);
        assert_eq!(acme.balance.cobertura_anticipos, Decimal::ZERO);
    }

    #[test]
    fn cash_flow_buckets_open_dues_by_week() {
        let dues = vec![
            due(2, 100, 0, Currency::Usd),
            due(9, 5000, 1000, Currency::Clp),
            due(40, 999, 0, Currency::Usd), // fora do horizonte
            due(-1, 300, 0, Currency::Usd), // já vencida
        ];
        let advances = vec![advance(Uuid::new_v4(), 80, 30, AdvanceStatus::Disponible)];

        let flow = CashFlowProjection::project(&dues, &advances, today(), 4);

        assert_eq!(flow.proyeccion_semanal.len(), 4);
        assert_eq!(flow.periodo.fin, today() + chrono::Duration::days(27));
        assert_eq!(flow.proyeccion_semanal[0].salidas.usd, Decimal::from(100));
        assert_eq!(flow.proyeccion_semanal[1].salidas.clp, Decimal::from(4000));
        assert!(flow.proyeccion_semanal[2].vencimientos.is_empty());
        assert_eq!(flow.resumen.total_salidas.usd, Decimal::from(100));
        assert_eq!(flow.resumen.anticipos_disponibles.usd, Decimal::from(50));
        assert_eq!(flow.resumen.cobertura_usd, Decimal::from(50));
        assert_eq!(flow.resumen.cobertura_clp, Decimal::ZERO);
    }

    #[test]
    fn cash_flow_coverage_is_full_without_outflows() {
        let flow = CashFlowProjection::project(&[], &[], today(), 2);
        assert_eq!(flow.resumen.cobertura_usd, Decimal::ONE_HUNDRED);
        assert_eq!(flow.resumen.cobertura_clp, Decimal::ONE_HUNDRED);
    }

    #[test]
    fn upcoming_dues_are_grouped_by_urgency() {
        let mut paid = due(3, 100, 0, Currency::Usd);
        paid.factura_estado = InvoiceStatus::PagadaCompleta;
        let dues = vec![
            due(-3, 100, 0, Currency::Usd),
            due(5, 200, 50, Currency::Usd),
            due(20, 7000, 0, Currency::Clp),
            due(45, 10, 0, Currency::Usd),
            paid,
        ];

        let report = UpcomingDuesReport::build(&dues, today(), 60);
        assert_eq!(report.resumen.total_vencimientos, 4);
        assert_eq!(report.resumen.vencidos.cantidad, 1);
        assert_eq!(report.resumen.proximos_7_dias.totales.usd, Decimal::from(150));
        assert_eq!(report.resumen.proximos_30_dias.totales.clp, Decimal::from(7000));
        assert_eq!(report.resumen.posteriores.cantidad, 1);
        assert_eq!(report.vencimientos.proximos_7_dias[0].urgencia, DueUrgency::Critico);

        let narrow = UpcomingDuesReport::build(&dues, today(), 30);
        assert_eq!(narrow.resumen.total_vencimientos, 3);
        assert!(narrow.vencimientos.posteriores.is_empty());
    }

    #[test]
    fn executive_dashboard_ranks_suppliers_and_raises_alerts() {
        let acme = order("Acme", 1000, PurchaseOrderStatus::Pendiente);
        let beta = order("Beta", 3000, PurchaseOrderStatus::Completada);
        let mut inactive = order("Gamma", 9000, PurchaseOrderStatus::Pendiente);
        inactive.proveedor_activo = false;
        let advances = vec![advance(beta.id, 500, 0, AdvanceStatus::Disponible)];
        let dues = vec![due(-45, 100, 0, Currency::Usd), due(-10, 100, 0, Currency::Usd)];

        let dashboard = ExecutiveDashboard::build(
            EntityCounts::default(),
            &[acme, beta, inactive],
            &[],
            &advances,
            BTreeMap::new(),
            &dues,
            today().and_hms_opt(12, 0, 0).unwrap().and_utc(),
        );

        let names: Vec<&str> = dashboard.top_suppliers.iter().map(|s| s.nombre.as_str()).collect();
        assert_eq!(names, vec!["Beta", "Acme"]);
        assert_eq!(dashboard.financiero.ordenes_compra.total.usd, Decimal::from(13000));
        assert_eq!(dashboard.financiero.anticipos.disponibles.usd, Decimal::from(500));
        assert_eq!(
            dashboard.financiero.ordenes_compra.por_estado.get("pendiente"),
            Some(&2)
        );

        assert_eq!(dashboard.alertas.len(), 2);
        assert_eq!(dashboard.alertas[0].tipo, "facturas_vencidas");
        assert_eq!(dashboard.alertas[0].cantidad, 1);
        assert_eq!(dashboard.alertas[1].mensaje, "2 órdenes pendientes sin anticipos");
    }

    #[test]
    fn returned_advances_have_nothing_available() {
        let returned = advance(Uuid::new_v4(), 500, 0, AdvanceStatus::Devuelto);
        assert_eq!(returned.available(), Decimal::ZERO);
        let partial = advance(Uuid::new_v4(), 500, 120, AdvanceStatus::Disponible);
        assert_eq!(partial.available(), Decimal::from(380));
    }
}
