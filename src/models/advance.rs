// src/models/advance.rs

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
        money::{positive_amount, Currency},
        purchase_order::PurchaseOrder,
        report::AdvanceFact,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "advance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdvanceStatus {
    Disponible,
    Aplicado,
    Devuelto,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AdvancePayment {
    pub id: Uuid,
    pub po_id: Uuid,

    #[schema(example = 400.0)]
    pub monto: Decimal,
    pub moneda: Currency,

    pub fecha_pago: NaiveDate,
    pub metodo_pago: Option<String>,
    pub usuario_pago: Option<String>,

    pub estado: AdvanceStatus,
    pub notas: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AdvanceAllocation {
    pub id: Uuid,
    pub anticipo_id: Uuid,
    pub invoice_id: Uuid,
    pub due_id: Option<Uuid>,
    pub monto_aplicado: Decimal,
    pub fecha: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
//  REGRAS DO ALOCADOR
// =============================================================================

impl AdvancePayment {
    /// Parte do anticipo ainda não aplicada.
    pub fn remaining(&self, allocated: Decimal) -> Decimal {
        self.monto - allocated
    }

    pub fn check_allocation(&self, allocated: Decimal, amount: Decimal) -> Result<(), AppError> {
        if self.estado != AdvanceStatus::Disponible {
            return Err(AppError::rule("El anticipo no está disponible"));
        }
        if amount <= Decimal::ZERO {
            return Err(AppError::rule("El monto a aplicar debe ser mayor a cero"));
        }
        let disponible = self.remaining(allocated);
        if amount > disponible {
            return Err(AppError::rule(format!(
                "Monto a aplicar ({}) excede el disponible ({})",
                amount, disponible
            )));
        }
        Ok(())
    }

    /// Esgotado vira `aplicado`; com sobra (ex.: após liberar uma aplicação) volta a `disponible`.
    pub fn status_for(&self, allocated: Decimal) -> AdvanceStatus {
        if allocated >= self.monto {
            AdvanceStatus::Aplicado
        } else {
            AdvanceStatus::Disponible
        }
    }

    pub fn check_editable(&self) -> Result<(), AppError> {
        match self.estado {
            AdvanceStatus::Aplicado => Err(AppError::rule(
                "No se puede modificar un anticipo que ya fue aplicado",
            )),
            AdvanceStatus::Devuelto => Err(AppError::rule(
                "No se puede modificar un anticipo devuelto",
            )),
            AdvanceStatus::Disponible => Ok(()),
        }
    }

    pub fn check_returnable(&self, allocation_count: i64) -> Result<(), AppError> {
        if self.estado != AdvanceStatus::Disponible {
            return Err(AppError::rule("Solo se pueden devolver anticipos disponibles"));
        }
        if allocation_count > 0 {
            return Err(AppError::rule(
                "No se puede devolver un anticipo que tiene aplicaciones",
            ));
        }
        Ok(())
    }

    /// Notas com a marca `[DEVUELTO] motivo` anexada.
    pub fn returned_notes(&self, motivo: Option<&str>) -> Option<String> {
        match motivo.map(str::trim).filter(|m| !m.is_empty()) {
            Some(motivo) => {
                let current = self.notas.as_deref().unwrap_or("");
                Some(format!("{}\n[DEVUELTO] {}", current, motivo).trim().to_string())
            }
            None => self.notas.clone(),
        }
    }
}

pub fn check_deletable(allocation_count: i64) -> Result<(), AppError> {
    if allocation_count > 0 {
        return Err(AppError::rule(format!(
            "No se puede eliminar: el anticipo tiene {} aplicaciones a facturas",
            allocation_count
        )));
    }
    Ok(())
}

/// Σ anticipos da ordem (já existentes + novo) não pode passar de `total_oc`.
pub fn check_order_capacity(
    total_oc: Decimal,
    existing: Decimal,
    amount: Decimal,
) -> Result<(), AppError> {
    let nuevo_total = existing + amount;
    if nuevo_total > total_oc {
        return Err(AppError::rule(format!(
            "Total de anticipos ({}) excedería el total de la orden ({})",
            nuevo_total, total_oc
        )));
    }
    Ok(())
}

// =============================================================================
//  LEITURA
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AdvanceWithOrder {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub advance: AdvancePayment,
    pub numero_orden: String,
    pub total_oc: Decimal,
    pub proveedor_nombre: String,
}

// Anticipo com o total aplicado calculado (LEFT JOIN advance_allocation)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AdvanceBalance {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub advance: AdvancePayment,
    pub monto_aplicado: Decimal,
    pub saldo_disponible: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct AllocationWithInvoice {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub allocation: AdvanceAllocation,
    pub numero_factura: String,
    pub factura_monto_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdvanceDetail {
    #[serde(flatten)]
    pub advance: AdvanceWithOrder,
    pub aplicaciones: Vec<AllocationWithInvoice>,
    pub monto_aplicado: Decimal,
    pub saldo_disponible: Decimal,
}

impl AdvanceDetail {
    pub fn new(advance: AdvanceWithOrder, aplicaciones: Vec<AllocationWithInvoice>) -> Self {
        let monto_aplicado: Decimal = aplicaciones.iter().map(|a| a.allocation.monto_aplicado).sum();
        let saldo_disponible = advance.advance.remaining(monto_aplicado);
        Self { advance, aplicaciones, monto_aplicado, saldo_disponible }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderAdvancesSummary {
    pub total_anticipos: Decimal,
    pub total_aplicado: Decimal,
    pub total_disponible: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdvancesByOrder {
    pub orden: PurchaseOrder,
    pub anticipos: Vec<AdvanceBalance>,
    pub resumen: OrderAdvancesSummary,
}

impl AdvancesByOrder {
    pub fn new(orden: PurchaseOrder, anticipos: Vec<AdvanceBalance>) -> Self {
        let resumen = OrderAdvancesSummary {
            total_anticipos: anticipos.iter().map(|a| a.advance.monto).sum(),
            total_aplicado: anticipos.iter().map(|a| a.monto_aplicado).sum(),
            total_disponible: anticipos.iter().map(|a| a.saldo_disponible).sum(),
        };
        Self { orden, anticipos, resumen }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailableAdvances {
    pub anticipos: Vec<AdvanceBalance>,
    pub total_disponible: Decimal,
}

impl AvailableAdvances {
    /// Só anticipos `disponible` com saldo positivo.
    pub fn from_balances(balances: Vec<AdvanceBalance>) -> Self {
        let anticipos: Vec<AdvanceBalance> = balances
            .into_iter()
            .filter(|a| a.advance.estado == AdvanceStatus::Disponible && a.saldo_disponible > Decimal::ZERO)
            .collect();
        let total_disponible = anticipos.iter().map(|a| a.saldo_disponible).sum();
        Self { anticipos, total_disponible }
    }
}

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAdvancePayload {
    pub po_id: Uuid,

    #[validate(custom(function = "positive_amount"))]
    pub monto: Decimal,

    /// Se omitida, usa a moeda da ordem
    pub moneda: Option<Currency>,

    pub fecha_pago: NaiveDate,

    #[validate(length(max = 50))]
    pub metodo_pago: Option<String>,
    #[validate(length(max = 100))]
    pub usuario_pago: Option<String>,
    pub notas: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAdvancePayload {
    #[validate(custom(function = "positive_amount"))]
    pub monto: Option<Decimal>,
    pub fecha_pago: Option<NaiveDate>,
    #[validate(length(max = 50))]
    pub metodo_pago: Option<String>,
    #[validate(length(max = 100))]
    pub usuario_pago: Option<String>,
    pub notas: Option<String>,
}

impl UpdateAdvancePayload {
    pub fn is_empty(&self) -> bool {
        self.monto.is_none()
            && self.fecha_pago.is_none()
            && self.metodo_pago.is_none()
            && self.usuario_pago.is_none()
            && self.notas.is_none()
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReturnAdvanceParams {
    pub motivo: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReleaseOutcome {
    pub allocation_id: Uuid,
    pub monto_liberado: Decimal,
    pub nuevo_saldo_factura: Decimal,
    pub nuevo_estado_factura: InvoiceStatus,
    pub estado_anticipo: AdvanceStatus,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdvanceFilter {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub po_id: Option<Uuid>,
    pub estado: Option<AdvanceStatus>,
    pub moneda: Option<Currency>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdvanceFinancialSummary {
    pub total_pagado: Decimal,
    pub total_aplicado: Decimal,
    pub total_disponible: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdvanceStats {
    pub total_anticipos: i64,
    pub por_estado: BTreeMap<String, i64>,
    pub totales_por_moneda: BTreeMap<String, Decimal>,
    pub resumen_financiero: AdvanceFinancialSummary,
}

impl AdvanceStats {
    pub fn from_facts(facts: &[AdvanceFact]) -> Self {
        let mut por_estado: BTreeMap<String, i64> = BTreeMap::new();
        let mut totales_por_moneda: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut total_pagado = Decimal::ZERO;

        for fact in facts {
            let estado = match fact.estado {
                AdvanceStatus::Disponible => "disponible",
                AdvanceStatus::Aplicado => "aplicado",
                AdvanceStatus::Devuelto => "devuelto",
            };
            *por_estado.entry(estado.to_string()).or_default() += 1;
            *totales_por_moneda
                .entry(fact.moneda.as_str().to_string())
                .or_default() += fact.monto;
            if fact.estado != AdvanceStatus::Devuelto {
                total_pagado += fact.monto;
            }
        }

        Self {
            total_anticipos: facts.len() as i64,
            por_estado,
            totales_por_moneda,
            resumen_financiero: AdvanceFinancialSummary {
                total_pagado,
                total_aplicado: facts.iter().map(|f| f.monto_aplicado).sum(),
                total_disponible: facts.iter().map(|f| f.available()).sum(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance(monto: i64, estado: AdvanceStatus) -> AdvancePayment {
        AdvancePayment {
            id: Uuid::new_v4(),
            po_id: Uuid::new_v4(),
            monto: Decimal::from(monto),
            moneda: Currency::Usd,
            fecha_pago: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            metodo_pago: None,
            usuario_pago: None,
            estado,
            notas: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn allocation_beyond_remainder_names_both_amounts() {
        let adv = advance(400, AdvanceStatus::Disponible);
        let err = adv.check_allocation(Decimal::ZERO, Decimal::from(500)).unwrap_err();
        assert_eq!(err.to_string(), "Monto a aplicar (500) excede el disponible (400)");

        let err = adv.check_allocation(Decimal::from(300), Decimal::from(150)).unwrap_err();
        assert_eq!(err.to_string(), "Monto a aplicar (150) excede el disponible (100)");

        assert!(adv.check_allocation(Decimal::from(300), Decimal::from(100)).is_ok());
    }

    #[test]
    fn only_available_advances_can_be_allocated() {
        let adv = advance(400, AdvanceStatus::Aplicado);
        let err = adv.check_allocation(Decimal::ZERO, Decimal::from(10)).unwrap_err();
        assert_eq!(err.to_string(), "El anticipo no está disponible");
    }

    #[test]
    fn exhausted_advance_is_marked_applied() {
        let adv = advance(400, AdvanceStatus::Disponible);
        assert_eq!(adv.status_for(Decimal::from(399)), AdvanceStatus::Disponible);
        assert_eq!(adv.status_for(Decimal::from(400)), AdvanceStatus::Aplicado);
    }

    #[test]
    fn order_capacity_is_enforced() {
        assert!(check_order_capacity(Decimal::from(1000), Decimal::from(600), Decimal::from(400)).is_ok());
        let err = check_order_capacity(Decimal::from(1000), Decimal::from(600), Decimal::from(401)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Total de anticipos (1001) excedería el total de la orden (1000)"
        );
    }

    #[test]
    fn return_requires_available_and_unallocated() {
        let adv = advance(400, AdvanceStatus::Disponible);
        assert!(adv.check_returnable(0).is_ok());
        assert!(adv.check_returnable(1).is_err());
        assert!(advance(400, AdvanceStatus::Devuelto).check_returnable(0).is_err());
    }

    #[test]
    fn return_reason_is_appended_to_notes() {
        let mut adv = advance(400, AdvanceStatus::Disponible);
        assert_eq!(
            adv.returned_notes(Some("orden cancelada")).as_deref(),
            Some("[DEVUELTO] orden cancelada")
        );

        adv.notas = Some("pagado por banco".into());
        assert_eq!(
            adv.returned_notes(Some("duplicado")).as_deref(),
            Some("pagado por banco\n[DEVUELTO] duplicado")
        );
        assert_eq!(adv.returned_notes(None).as_deref(), Some("pagado por banco"));
    }

    #[test]
    fn stats_leave_returned_advances_out_of_the_money() {
        let fact = |monto: i64, aplicado: i64, estado: AdvanceStatus, moneda: Currency| AdvanceFact {
            po_id: Uuid::new_v4(),
            monto: Decimal::from(monto),
            moneda,
            estado,
            monto_aplicado: Decimal::from(aplicado),
        };
        let stats = AdvanceStats::from_facts(&[
            fact(400, 400, AdvanceStatus::Aplicado, Currency::Usd),
            fact(300, 100, AdvanceStatus::Disponible, Currency::Usd),
            fact(50_000, 0, AdvanceStatus::Devuelto, Currency::Clp),
        ]);

        assert_eq!(stats.total_anticipos, 3);
        assert_eq!(stats.por_estado.get("devuelto"), Some(&1));
        assert_eq!(stats.totales_por_moneda.get("USD"), Some(&Decimal::from(700)));
        assert_eq!(stats.resumen_financiero.total_pagado, Decimal::from(700));
        assert_eq!(stats.resumen_financiero.total_aplicado, Decimal::from(500));
        assert_eq!(stats.resumen_financiero.total_disponible, Decimal::from(200));
    }

    #[test]
    fn applied_advances_are_frozen() {
        assert!(advance(10, AdvanceStatus::Disponible).check_editable().is_ok());
        assert!(advance(10, AdvanceStatus::Aplicado).check_editable().is_err());
    }

    #[test]
    fn advances_with_allocations_cannot_be_deleted() {
        assert!(check_deletable(0).is_ok());
        assert_eq!(
            check_deletable(2).unwrap_err().to_string(),
            "No se puede eliminar: el anticipo tiene 2 aplicaciones a facturas"
        );
    }

    #[test]
    fn available_list_skips_exhausted_and_returned() {
        let balance = |monto: i64, aplicado: i64, estado| AdvanceBalance {
            advance: advance(monto, estado),
            monto_aplicado: Decimal::from(aplicado),
            saldo_disponible: Decimal::from(monto - aplicado),
        };
        let available = AvailableAdvances::from_balances(vec![
            balance(400, 100, AdvanceStatus::Disponible),
            balance(200, 200, AdvanceStatus::Aplicado),
            balance(300, 0, AdvanceStatus::Devuelto),
            balance(50, 0, AdvanceStatus::Disponible),
        ]);
        assert_eq!(available.anticipos.len(), 2);
        assert_eq!(available.total_disponible, Decimal::from(350));
    }
}
