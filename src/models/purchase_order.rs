// src/models/purchase_order.rs

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
        advance::{AdvanceBalance, AdvanceStatus},
        invoice::InvoiceStatus,
        money::{coverage_pct, positive_amount, round2, Currency},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "purchase_order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Pendiente,
    Parcial,
    Completada,
    Cancelada,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub supplier_id: Uuid,

    #[schema(example = "PO-2025-001")]
    pub numero_orden: String,

    pub moneda: Currency,

    #[schema(example = 1000.0)]
    pub total_oc: Decimal,

    pub fecha: NaiveDate,
    pub estado: PurchaseOrderStatus,
    pub notas: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Ordem com o nome do fornecedor (JOIN em suppliers)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PurchaseOrderWithSupplier {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub proveedor_nombre: String,
    pub proveedor_contacto: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseOrderPayload {
    pub supplier_id: Uuid,

    #[validate(length(min = 1, max = 50, message = "El número de orden es requerido (máximo 50 caracteres)"))]
    #[schema(example = "PO-2025-001")]
    pub numero_orden: String,

    pub moneda: Currency,

    #[validate(custom(function = "positive_amount"))]
    pub total_oc: Decimal,

    /// Se omitida, usa a data de hoje
    pub fecha: Option<NaiveDate>,
    pub estado: Option<PurchaseOrderStatus>,
    pub notas: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePurchaseOrderPayload {
    #[validate(length(min = 1, max = 50))]
    pub numero_orden: Option<String>,
    pub moneda: Option<Currency>,
    #[validate(custom(function = "positive_amount"))]
    pub total_oc: Option<Decimal>,
    pub fecha: Option<NaiveDate>,
    pub estado: Option<PurchaseOrderStatus>,
    pub notas: Option<String>,
}

impl UpdatePurchaseOrderPayload {
    pub fn is_empty(&self) -> bool {
        self.numero_orden.is_none()
            && self.moneda.is_none()
            && self.total_oc.is_none()
            && self.fecha.is_none()
            && self.estado.is_none()
            && self.notas.is_none()
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PurchaseOrderFilter {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub supplier_id: Option<Uuid>,
    pub estado: Option<PurchaseOrderStatus>,
    pub moneda: Option<Currency>,
    /// Busca parcial pelo número da ordem
    pub search: Option<String>,
}

/// O total da ordem nunca pode ficar abaixo do que já foi adiantado.
pub fn check_total_covers_advances(total_oc: Decimal, anticipos: Decimal) -> Result<(), AppError> {
    if total_oc < anticipos {
        return Err(AppError::rule(format!(
            "El total de la orden ({}) no puede ser menor que la suma de anticipos ({})",
            total_oc, anticipos
        )));
    }
    Ok(())
}

// =============================================================================
//  DASHBOARD DE ANTICIPOS
// =============================================================================

// Fatura vinculada a uma ordem (via invoice_po)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LinkedInvoice {
    pub invoice_id: Uuid,
    pub numero_factura: String,
    pub monto_total: Decimal,
    pub saldo_pendiente: Decimal,
    pub estado: InvoiceStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderAdvancesBlock {
    pub lista: Vec<AdvanceBalance>,
    pub total: Decimal,
    pub disponibles: Decimal,
    pub aplicados: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderInvoicesBlock {
    pub lista: Vec<LinkedInvoice>,
    pub total: Decimal,
    pub saldo_pendiente: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderBalance {
    pub oc_vs_facturas: Decimal,
    pub cobertura_anticipos: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderAdvancesDashboard {
    pub orden: PurchaseOrder,
    pub anticipos: OrderAdvancesBlock,
    pub facturas: OrderInvoicesBlock,
    pub balance: OrderBalance,
}

impl OrderAdvancesDashboard {
    pub fn build(orden: PurchaseOrder, anticipos: Vec<AdvanceBalance>, facturas: Vec<LinkedInvoice>) -> Self {
        let total = anticipos.iter().map(|a| a.advance.monto).sum();
        let aplicados = anticipos.iter().map(|a| a.monto_aplicado).sum();
        let disponibles: Decimal = anticipos
            .iter()
            .filter(|a| a.advance.estado == AdvanceStatus::Disponible)
            .map(|a| a.saldo_disponible)
            .sum();

        let total_facturas: Decimal = facturas.iter().map(|f| f.monto_total).sum();
        let saldo_pendiente: Decimal = facturas.iter().map(|f| f.saldo_pendiente).sum();

        let balance = OrderBalance {
            oc_vs_facturas: round2(orden.total_oc - total_facturas),
            cobertura_anticipos: coverage_pct(disponibles, saldo_pendiente, Decimal::ZERO),
        };

        Self {
            orden,
            anticipos: OrderAdvancesBlock { lista: anticipos, total, disponibles, aplicados },
            facturas: OrderInvoicesBlock { lista: facturas, total: total_facturas, saldo_pendiente },
            balance,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurchaseOrderStats {
    pub total_ordenes: i64,
    pub por_estado: BTreeMap<String, i64>,
    pub totales_por_moneda: BTreeMap<String, Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_may_not_drop_below_advances() {
        assert!(check_total_covers_advances(Decimal::from(1000), Decimal::from(400)).is_ok());
        assert!(check_total_covers_advances(Decimal::from(400), Decimal::from(400)).is_ok());

        let err = check_total_covers_advances(Decimal::from(300), Decimal::from(400)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "El total de la orden (300) no puede ser menor que la suma de anticipos (400)"
        );
    }

    #[test]
    fn dashboard_balances_order_against_invoices() {
        let orden = PurchaseOrder {
            id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            numero_orden: "PO-1".into(),
            moneda: Currency::Usd,
            total_oc: Decimal::from(1000),
            fecha: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            estado: PurchaseOrderStatus::Pendiente,
            notas: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let advance = |monto: i64, aplicado: i64, estado: AdvanceStatus| AdvanceBalance {
            advance: crate::models::advance::AdvancePayment {
                id: Uuid::new_v4(),
                po_id: orden.id,
                monto: Decimal::from(monto),
                moneda: Currency::Usd,
                fecha_pago: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
                metodo_pago: None,
                usuario_pago: None,
                estado,
                notas: None,
                created_at: Utc::now(),
            },
            monto_aplicado: Decimal::from(aplicado),
            saldo_disponible: Decimal::from(monto - aplicado),
        };
        let anticipos = vec![
            advance(400, 400, AdvanceStatus::Aplicado),
            advance(300, 0, AdvanceStatus::Disponible),
        ];
        let facturas = vec![LinkedInvoice {
            invoice_id: Uuid::new_v4(),
            numero_factura: "F-1".into(),
            monto_total: Decimal::from(800),
            saldo_pendiente: Decimal::from(400),
            estado: InvoiceStatus::PagadaParcial,
        }];

        let dashboard = OrderAdvancesDashboard::build(orden, anticipos, facturas);

        assert_eq!(dashboard.anticipos.total, Decimal::from(700));
        assert_eq!(dashboard.anticipos.aplicados, Decimal::from(400));
        assert_eq!(dashboard.anticipos.disponibles, Decimal::from(300));
        assert_eq!(dashboard.balance.oc_vs_facturas, Decimal::from(200));
        assert_eq!(dashboard.balance.cobertura_anticipos, Decimal::from(75));
    }

    #[test]
    fn status_uses_snake_case_on_the_wire() {
        assert_eq!(
            serde_json::to_value(PurchaseOrderStatus::Completada).unwrap(),
            "completada"
        );
    }

    #[test]
    fn create_payload_rejects_non_positive_total() {
        let payload = CreatePurchaseOrderPayload {
            supplier_id: Uuid::new_v4(),
            numero_orden: "PO-1".into(),
            moneda: Currency::Usd,
            total_oc: Decimal::ZERO,
            fecha: None,
            estado: None,
            notas: None,
        };
        assert!(payload.validate().is_err());
    }
}
