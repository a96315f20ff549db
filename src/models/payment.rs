// src/models/payment.rs

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    invoice::{DueApplication, Invoice, InvoiceStatus},
    money::positive_amount,
    report::CountAmount,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct InvoicePayment {
    pub id: Uuid,
    pub invoice_id: Uuid,

    #[schema(example = 250.0)]
    pub monto_pagado: Decimal,

    pub fecha: NaiveDate,

    #[schema(example = "transferencia")]
    pub metodo_pago: Option<String>,
    pub referencia: Option<String>,
    pub notas: Option<String>,

    pub created_at: DateTime<Utc>,
}

// Pagamento com fatura e fornecedor (listagens)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PaymentWithInvoice {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub payment: InvoicePayment,
    pub numero_factura: String,
    pub factura_monto_total: Decimal,
    pub proveedor_nombre: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePaymentPayload {
    pub invoice_id: Uuid,

    #[validate(custom(function = "positive_amount"))]
    pub monto_pagado: Decimal,

    pub fecha: NaiveDate,

    #[validate(length(max = 50))]
    pub metodo_pago: Option<String>,
    #[validate(length(max = 100))]
    pub referencia: Option<String>,

    /// Cuota à qual o pagamento se aplica (opcional)
    pub due_id: Option<Uuid>,
    pub notas: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePaymentPayload {
    #[validate(custom(function = "positive_amount"))]
    pub monto_pagado: Option<Decimal>,
    pub fecha: Option<NaiveDate>,
    #[validate(length(max = 50))]
    pub metodo_pago: Option<String>,
    #[validate(length(max = 100))]
    pub referencia: Option<String>,
    pub notas: Option<String>,
}

impl UpdatePaymentPayload {
    pub fn is_empty(&self) -> bool {
        self.monto_pagado.is_none()
            && self.fecha.is_none()
            && self.metodo_pago.is_none()
            && self.referencia.is_none()
            && self.notas.is_none()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentOutcome {
    #[serde(flatten)]
    pub payment: InvoicePayment,
    pub nuevo_saldo_factura: Decimal,
    pub nuevo_estado_factura: InvoiceStatus,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaymentFilter {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub invoice_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub metodo_pago: Option<String>,
    pub fecha_desde: Option<NaiveDate>,
    pub fecha_hasta: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentWithDues {
    #[serde(flatten)]
    pub payment: InvoicePayment,
    pub aplicaciones_vencimientos: Vec<DueApplication>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentDetail {
    #[serde(flatten)]
    pub payment: PaymentWithInvoice,
    pub aplicaciones_vencimientos: Vec<DueApplication>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoicePaymentsSummary {
    pub total_pagos: Decimal,
    pub cantidad_pagos: i64,
    pub saldo_pendiente: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentsByInvoice {
    pub factura: Invoice,
    pub pagos: Vec<PaymentWithDues>,
    pub resumen: InvoicePaymentsSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentTotals {
    pub cantidad_pagos: i64,
    pub monto_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStats {
    pub totales: PaymentTotals,
    pub por_metodo: BTreeMap<String, CountAmount>,
    /// Chave no formato AAAA-MM
    pub por_mes: BTreeMap<String, CountAmount>,
}

impl PaymentStats {
    pub fn from_payments(pagos: &[InvoicePayment]) -> Self {
        let mut por_metodo: BTreeMap<String, CountAmount> = BTreeMap::new();
        let mut por_mes: BTreeMap<String, CountAmount> = BTreeMap::new();
        let mut monto_total = Decimal::ZERO;

        for pago in pagos {
            monto_total += pago.monto_pagado;

            let metodo = pago
                .metodo_pago
                .clone()
                .unwrap_or_else(|| "No especificado".to_string());
            por_metodo.entry(metodo).or_default().add(pago.monto_pagado);

            let mes = pago.fecha.format("%Y-%m").to_string();
            por_mes.entry(mes).or_default().add(pago.monto_pagado);
        }

        Self {
            totales: PaymentTotals {
                cantidad_pagos: pagos.len() as i64,
                monto_total,
            },
            por_metodo,
            por_mes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pago(monto: i64, fecha: (i32, u32, u32), metodo: Option<&str>) -> InvoicePayment {
        InvoicePayment {
            id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            monto_pagado: Decimal::from(monto),
            fecha: NaiveDate::from_ymd_opt(fecha.0, fecha.1, fecha.2).unwrap(),
            metodo_pago: metodo.map(str::to_string),
            referencia: None,
            notas: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn stats_group_by_method_and_month() {
        let pagos = vec![
            pago(100, (2025, 1, 5), Some("transferencia")),
            pago(50, (2025, 1, 20), None),
            pago(200, (2025, 2, 1), Some("transferencia")),
        ];

        let stats = PaymentStats::from_payments(&pagos);

        assert_eq!(stats.totales.cantidad_pagos, 3);
        assert_eq!(stats.totales.monto_total, Decimal::from(350));

        let transferencia = &stats.por_metodo["transferencia"];
        assert_eq!(transferencia.cantidad, 2);
        assert_eq!(transferencia.monto, Decimal::from(300));
        assert_eq!(stats.por_metodo["No especificado"].cantidad, 1);

        assert_eq!(stats.por_mes["2025-01"].monto, Decimal::from(150));
        assert_eq!(stats.por_mes["2025-02"].cantidad, 1);
    }

    #[test]
    fn empty_update_is_rejected_upfront() {
        assert!(UpdatePaymentPayload::default().is_empty());
    }
}
