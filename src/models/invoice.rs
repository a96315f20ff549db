// src/models/invoice.rs

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    models::{
        advance::AdvanceStatus,
        money::{fits_cents, positive_amount, Currency, CENT_TOLERANCE},
    },
};

pub const MAX_INSTALLMENTS: usize = 3;
pub const DEFAULT_DUE_DAYS: u64 = 30;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pendiente,
    PagadaParcial,
    PagadaCompleta,
    // Nunca atribuído automaticamente; só por edição manual.
    Vencida,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pendiente => "pendiente",
            InvoiceStatus::PagadaParcial => "pagada_parcial",
            InvoiceStatus::PagadaCompleta => "pagada_completa",
            InvoiceStatus::Vencida => "vencida",
        }
    }

    /// Estado derivado do saldo: 0 quita, saldo cheio volta a pendente.
    pub fn from_balance(total: Decimal, balance: Decimal) -> Self {
        if balance <= Decimal::ZERO {
            InvoiceStatus::PagadaCompleta
        } else if balance >= total {
            InvoiceStatus::Pendiente
        } else {
            InvoiceStatus::PagadaParcial
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "invoice_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Producto,
    Servicio,
    Mixta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "due_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DueSource {
    Pago,
    Anticipo,
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Invoice {
    pub id: Uuid,
    pub supplier_id: Uuid,

    #[schema(example = "F-1001")]
    pub numero_factura: String,

    pub fecha_emision: NaiveDate,
    pub moneda: Currency,

    #[schema(example = 1000.0)]
    pub monto_total: Decimal,
    #[schema(example = 600.0)]
    pub saldo_pendiente: Decimal, // Quanto falta pagar

    pub estado: InvoiceStatus,
    pub tipo_factura: Option<InvoiceKind>,
    pub concepto: Option<String>,
    pub notas: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
//  LEDGER DO SALDO
// =============================================================================

impl Invoice {
    /// Abate `amount` do saldo (pagamento ou anticipo).
    pub fn apply_amount(&mut self, amount: Decimal) -> Result<(), AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::rule("El monto a aplicar debe ser mayor a cero"));
        }
        if !fits_cents(&amount) {
            return Err(AppError::rule("El monto admite como máximo 2 decimales"));
        }
        if amount > self.saldo_pendiente {
            return Err(AppError::rule(format!(
                "Monto a aplicar ({}) excede el saldo pendiente ({})",
                amount, self.saldo_pendiente
            )));
        }

        self.saldo_pendiente = (self.saldo_pendiente - amount).max(Decimal::ZERO);
        self.estado = if self.saldo_pendiente.is_zero() {
            InvoiceStatus::PagadaCompleta
        } else {
            InvoiceStatus::PagadaParcial
        };
        Ok(())
    }

    /// Devolve `amount` ao saldo (pagamento removido, anticipo liberado).
    pub fn reverse_amount(&mut self, amount: Decimal) {
        self.saldo_pendiente = (self.saldo_pendiente + amount).min(self.monto_total);
        self.estado = if self.saldo_pendiente >= self.monto_total {
            InvoiceStatus::Pendiente
        } else {
            InvoiceStatus::PagadaParcial
        };
    }

    /// Ajusta o saldo quando um pagamento muda de valor.
    pub fn amend_amount(&mut self, old: Decimal, new: Decimal) -> Result<(), AppError> {
        if !fits_cents(&new) {
            return Err(AppError::rule("El monto admite como máximo 2 decimales"));
        }
        let adjusted = self.saldo_pendiente - (new - old);
        if adjusted < Decimal::ZERO {
            return Err(AppError::rule("El nuevo monto excedería el total de la factura"));
        }
        self.saldo_pendiente = adjusted;
        self.estado = InvoiceStatus::from_balance(self.monto_total, adjusted);
        Ok(())
    }

    /// Estado manual: só `vencida` (com saldo em aberto) ou o próprio estado do saldo.
    pub fn override_status(&mut self, estado: InvoiceStatus) -> Result<(), AppError> {
        let derived = InvoiceStatus::from_balance(self.monto_total, self.saldo_pendiente);
        let allowed = match estado {
            InvoiceStatus::Vencida => self.saldo_pendiente > Decimal::ZERO,
            other => other == derived,
        };
        if !allowed {
            return Err(AppError::rule(format!(
                "El estado {} no corresponde al saldo pendiente ({})",
                estado.as_str(),
                self.saldo_pendiente
            )));
        }
        self.estado = estado;
        Ok(())
    }

    /// Edição do total: o saldo acompanha a diferença, sem ficar negativo.
    pub fn retotal(&mut self, new_total: Decimal) {
        let diff = new_total - self.monto_total;
        self.monto_total = new_total;
        self.saldo_pendiente = (self.saldo_pendiente + diff).max(Decimal::ZERO);
        self.estado = InvoiceStatus::from_balance(self.monto_total, self.saldo_pendiente);
    }
}

pub fn ensure_same_supplier(invoice_supplier: Uuid, order_supplier: Uuid) -> Result<(), AppError> {
    if invoice_supplier != order_supplier {
        return Err(AppError::rule(
            "La factura y la orden deben pertenecer al mismo proveedor",
        ));
    }
    Ok(())
}

// =============================================================================
//  VENCIMENTOS (CUOTAS)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InvoiceDue {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub numero_cuota: i16,
    pub fecha_vencimiento: NaiveDate,
    pub monto_vencimiento: Decimal,
    pub estado: InvoiceStatus,
    pub created_at: DateTime<Utc>,
}

impl InvoiceDue {
    /// Estado da cuota a partir do total já aplicado nela.
    pub fn status_for(&self, applied: Decimal) -> InvoiceStatus {
        let remaining = (self.monto_vencimiento - applied).max(Decimal::ZERO);
        InvoiceStatus::from_balance(self.monto_vencimiento, remaining)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DueApplication {
    pub id: Uuid,
    pub due_id: Uuid,
    pub source: DueSource,
    pub source_id: Uuid,
    pub monto_aplicado: Decimal,
    pub fecha: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceDueDetail {
    #[serde(flatten)]
    pub due: InvoiceDue,
    pub pagos_aplicados: Vec<DueApplication>,
    pub monto_pagado: Decimal,
    pub saldo_pendiente: Decimal,
}

impl InvoiceDueDetail {
    pub fn new(due: InvoiceDue, pagos_aplicados: Vec<DueApplication>) -> Self {
        let monto_pagado: Decimal = pagos_aplicados.iter().map(|p| p.monto_aplicado).sum();
        let saldo_pendiente = due.monto_vencimiento - monto_pagado;
        Self { due, pagos_aplicados, monto_pagado, saldo_pendiente }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct DueInput {
    #[validate(range(min = 1, max = 3, message = "Los números de cuota deben ser 1, 2 o 3"))]
    pub numero_cuota: i16,
    pub fecha_vencimiento: NaiveDate,
    #[validate(custom(function = "positive_amount"))]
    pub monto_vencimiento: Decimal,
}

/// Regras das cuotas: 1 a 3, números únicos em {1,2,3}, soma = total (±0.01).
pub fn validate_installments(total: Decimal, dues: &[DueInput]) -> Result<(), AppError> {
    if dues.is_empty() {
        return Err(AppError::rule("Debe tener al menos un vencimiento"));
    }
    if dues.len() > MAX_INSTALLMENTS {
        return Err(AppError::rule("Máximo 3 vencimientos permitidos"));
    }

    let mut seen = HashSet::new();
    for due in dues {
        if !(1..=MAX_INSTALLMENTS as i16).contains(&due.numero_cuota) {
            return Err(AppError::rule("Los números de cuota deben ser 1, 2 o 3"));
        }
        if !seen.insert(due.numero_cuota) {
            return Err(AppError::rule("Los números de cuota deben ser únicos"));
        }
        if due.monto_vencimiento <= Decimal::ZERO {
            return Err(AppError::rule("El monto de cada cuota debe ser mayor a cero"));
        }
        if !fits_cents(&due.monto_vencimiento) {
            return Err(AppError::rule("El monto admite como máximo 2 decimales"));
        }
    }

    let sum: Decimal = dues.iter().map(|d| d.monto_vencimiento).sum();
    if (sum - total).abs() > CENT_TOLERANCE {
        return Err(AppError::rule(format!(
            "La suma de cuotas ({}) debe igualar el monto total ({})",
            sum, total
        )));
    }
    Ok(())
}

/// Cuota única pelo total, vencendo 30 dias após a emissão.
pub fn default_installment(total: Decimal, fecha_emision: NaiveDate) -> DueInput {
    let fecha_vencimiento = fecha_emision
        .checked_add_days(Days::new(DEFAULT_DUE_DAYS))
        .unwrap_or(fecha_emision);
    DueInput { numero_cuota: 1, fecha_vencimiento, monto_vencimiento: total }
}

// =============================================================================
//  VÍNCULOS E PAYLOADS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InvoicePo {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub po_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct InvoiceWithSupplier {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub invoice: Invoice,
    pub proveedor_nombre: String,
    pub proveedor_contacto: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInvoicePayload {
    pub supplier_id: Uuid,

    #[validate(length(min = 1, max = 50, message = "El número de factura es requerido (máximo 50 caracteres)"))]
    #[schema(example = "F-1001")]
    pub numero_factura: String,

    pub fecha_emision: Option<NaiveDate>,
    pub moneda: Currency,

    #[validate(custom(function = "positive_amount"))]
    pub monto_total: Decimal,

    pub tipo_factura: Option<InvoiceKind>,
    pub concepto: Option<String>,
    pub notas: Option<String>,

    /// Até 3 cuotas; se omitido, uma cuota única a 30 dias
    pub vencimientos: Option<Vec<DueInput>>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateInvoicePayload {
    #[validate(length(min = 1, max = 50))]
    pub numero_factura: Option<String>,
    pub fecha_emision: Option<NaiveDate>,
    pub moneda: Option<Currency>,
    #[validate(custom(function = "positive_amount"))]
    pub monto_total: Option<Decimal>,
    pub estado: Option<InvoiceStatus>,
    pub tipo_factura: Option<InvoiceKind>,
    pub concepto: Option<String>,
    pub notas: Option<String>,
}

impl UpdateInvoicePayload {
    pub fn is_empty(&self) -> bool {
        self.numero_factura.is_none()
            && self.fecha_emision.is_none()
            && self.moneda.is_none()
            && self.monto_total.is_none()
            && self.estado.is_none()
            && self.tipo_factura.is_none()
            && self.concepto.is_none()
            && self.notas.is_none()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LinkPurchaseOrderPayload {
    pub po_id: Uuid,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ApplyAdvancePayload {
    pub anticipo_id: Uuid,
    #[validate(custom(function = "positive_amount"))]
    pub monto_aplicar: Decimal,
    /// Cuota específica (opcional)
    pub due_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AllocationOutcome {
    pub allocation_id: Uuid,
    pub monto_aplicado: Decimal,
    pub nuevo_saldo_factura: Decimal,
    pub nuevo_estado_factura: InvoiceStatus,
    pub estado_anticipo: AdvanceStatus,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InvoiceFilter {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub supplier_id: Option<Uuid>,
    pub estado: Option<InvoiceStatus>,
    pub moneda: Option<Currency>,
    /// Busca parcial pelo número da fatura
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceStats {
    pub total_facturas: i64,
    pub por_estado: BTreeMap<String, i64>,
    pub totales_por_moneda: BTreeMap<String, Decimal>,
    pub saldos_pendientes_por_moneda: BTreeMap<String, Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(total: i64, saldo: i64) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            numero_factura: "F-1".into(),
            fecha_emision: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            moneda: Currency::Usd,
            monto_total: Decimal::from(total),
            saldo_pendiente: Decimal::from(saldo),
            estado: InvoiceStatus::from_balance(Decimal::from(total), Decimal::from(saldo)),
            tipo_factura: None,
            concepto: None,
            notas: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn due(numero: i16, monto: Decimal) -> DueInput {
        DueInput {
            numero_cuota: numero,
            fecha_vencimiento: NaiveDate::from_ymd_opt(2025, 2, 10).unwrap(),
            monto_vencimiento: monto,
        }
    }

    #[test]
    fn status_derives_from_balance() {
        let total = Decimal::from(1000);
        assert_eq!(InvoiceStatus::from_balance(total, total), InvoiceStatus::Pendiente);
        assert_eq!(
            InvoiceStatus::from_balance(total, Decimal::from(600)),
            InvoiceStatus::PagadaParcial
        );
        assert_eq!(
            InvoiceStatus::from_balance(total, Decimal::ZERO),
            InvoiceStatus::PagadaCompleta
        );
    }

    #[test]
    fn applying_part_of_the_balance_marks_partial() {
        let mut inv = invoice(1000, 1000);
        inv.apply_amount(Decimal::from(400)).unwrap();
        assert_eq!(inv.saldo_pendiente, Decimal::from(600));
        assert_eq!(inv.estado, InvoiceStatus::PagadaParcial);
    }

    #[test]
    fn applying_the_full_balance_settles_the_invoice() {
        let mut inv = invoice(1000, 250);
        inv.apply_amount(Decimal::from(250)).unwrap();
        assert!(inv.saldo_pendiente.is_zero());
        assert_eq!(inv.estado, InvoiceStatus::PagadaCompleta);
    }

    #[test]
    fn applying_more_than_the_balance_fails_and_leaves_it_untouched() {
        let mut inv = invoice(1000, 300);
        let err = inv.apply_amount(Decimal::from(301)).unwrap_err();
        assert_eq!(err.to_string(), "Monto a aplicar (301) excede el saldo pendiente (300)");
        assert_eq!(inv.saldo_pendiente, Decimal::from(300));
    }

    #[test]
    fn reversing_restores_pending_when_balance_is_full() {
        let mut inv = invoice(1000, 600);
        inv.reverse_amount(Decimal::from(400));
        assert_eq!(inv.saldo_pendiente, Decimal::from(1000));
        assert_eq!(inv.estado, InvoiceStatus::Pendiente);

        let mut inv = invoice(1000, 0);
        inv.reverse_amount(Decimal::from(100));
        assert_eq!(inv.estado, InvoiceStatus::PagadaParcial);
    }

    #[test]
    fn reversing_never_exceeds_the_total() {
        let mut inv = invoice(500, 0);
        inv.reverse_amount(Decimal::from(800));
        assert_eq!(inv.saldo_pendiente, Decimal::from(500));
    }

    #[test]
    fn amending_a_payment_moves_the_balance_by_the_difference() {
        let mut inv = invoice(1000, 600);
        inv.amend_amount(Decimal::from(400), Decimal::from(300)).unwrap();
        assert_eq!(inv.saldo_pendiente, Decimal::from(700));

        let err = inv.amend_amount(Decimal::from(300), Decimal::from(1100)).unwrap_err();
        assert_eq!(err.to_string(), "El nuevo monto excedería el total de la factura");
        assert_eq!(inv.saldo_pendiente, Decimal::from(700));
    }

    #[test]
    fn retotal_shifts_balance_and_clamps_at_zero() {
        let mut inv = invoice(1000, 600);
        inv.retotal(Decimal::from(1200));
        assert_eq!(inv.saldo_pendiente, Decimal::from(800));

        inv.retotal(Decimal::from(100));
        assert!(inv.saldo_pendiente.is_zero());
        assert_eq!(inv.estado, InvoiceStatus::PagadaCompleta);
    }

    #[test]
    fn installments_must_add_up_within_a_cent() {
        let total = Decimal::from(1000);
        let ok = vec![due(1, Decimal::new(33333, 2)), due(2, Decimal::new(33333, 2)), due(3, Decimal::new(33333, 2))];
        assert!(validate_installments(total, &ok).is_ok());

        let off = vec![due(1, Decimal::from(500)), due(2, Decimal::new(49998, 2))];
        let err = validate_installments(total, &off).unwrap_err();
        assert_eq!(
            err.to_string(),
            "La suma de cuotas (999.98) debe igualar el monto total (1000)"
        );
    }

    #[test]
    fn installments_are_limited_and_unique() {
        let total = Decimal::from(100);
        assert!(validate_installments(total, &[]).is_err());

        let four = vec![
            due(1, Decimal::from(25)),
            due(2, Decimal::from(25)),
            due(3, Decimal::from(25)),
            due(3, Decimal::from(25)),
        ];
        assert_eq!(
            validate_installments(total, &four).unwrap_err().to_string(),
            "Máximo 3 vencimientos permitidos"
        );

        let repeated = vec![due(1, Decimal::from(50)), due(1, Decimal::from(50))];
        assert_eq!(
            validate_installments(total, &repeated).unwrap_err().to_string(),
            "Los números de cuota deben ser únicos"
        );

        let out_of_range = vec![due(4, Decimal::from(100))];
        assert!(validate_installments(total, &out_of_range).is_err());
    }

    #[test]
    fn manual_status_cannot_contradict_the_balance() {
        let mut inv = invoice(1000, 1000);
        let err = inv.override_status(InvoiceStatus::PagadaCompleta).unwrap_err();
        assert_eq!(
            err.to_string(),
            "El estado pagada_completa no corresponde al saldo pendiente (1000)"
        );
        assert_eq!(inv.estado, InvoiceStatus::Pendiente);

        inv.override_status(InvoiceStatus::Vencida).unwrap();
        assert_eq!(inv.estado, InvoiceStatus::Vencida);

        inv.override_status(InvoiceStatus::Pendiente).unwrap();
        assert_eq!(inv.estado, InvoiceStatus::Pendiente);

        let mut settled = invoice(1000, 0);
        assert!(settled.override_status(InvoiceStatus::Vencida).is_err());
        assert!(settled.override_status(InvoiceStatus::PagadaCompleta).is_ok());
    }

    #[test]
    fn sub_cent_amounts_never_reach_the_balance() {
        let mut inv = invoice(1000, 1000);
        let err = inv.apply_amount(Decimal::new(5, 3)).unwrap_err();
        assert_eq!(err.to_string(), "El monto admite como máximo 2 decimales");
        assert_eq!(inv.saldo_pendiente, Decimal::from(1000));
        assert_eq!(inv.estado, InvoiceStatus::Pendiente);

        let dues = vec![due(1, Decimal::new(500_005, 3)), due(2, Decimal::new(499_995, 3))];
        assert!(validate_installments(Decimal::from(1000), &dues).is_err());
    }

    #[test]
    fn default_installment_is_due_thirty_days_after_emission() {
        let emision = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let d = default_installment(Decimal::from(750), emision);
        assert_eq!(d.numero_cuota, 1);
        assert_eq!(d.monto_vencimiento, Decimal::from(750));
        assert_eq!(d.fecha_vencimiento, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
    }

    #[test]
    fn due_status_follows_applied_total() {
        let d = InvoiceDue {
            id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            numero_cuota: 1,
            fecha_vencimiento: NaiveDate::from_ymd_opt(2025, 2, 10).unwrap(),
            monto_vencimiento: Decimal::from(500),
            estado: InvoiceStatus::Pendiente,
            created_at: Utc::now(),
        };
        assert_eq!(d.status_for(Decimal::ZERO), InvoiceStatus::Pendiente);
        assert_eq!(d.status_for(Decimal::from(200)), InvoiceStatus::PagadaParcial);
        assert_eq!(d.status_for(Decimal::from(500)), InvoiceStatus::PagadaCompleta);
    }

    #[test]
    fn linking_requires_the_same_supplier() {
        let a = Uuid::new_v4();
        assert!(ensure_same_supplier(a, a).is_ok());
        assert!(ensure_same_supplier(a, Uuid::new_v4()).is_err());
    }
}
