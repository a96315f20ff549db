// src/models/supplier.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Supplier {
    pub id: Uuid,

    #[schema(example = "Acme Trading Co.")]
    pub nombre: String,

    pub activo: bool,

    #[schema(example = "Shanghai")]
    pub puerto_salida_default: Option<String>,
    pub contacto: Option<String>,
    pub notas: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Versão curta usada em embarques e relatórios
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SupplierSummary {
    pub id: Uuid,
    pub nombre: String,
    pub contacto: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSupplierPayload {
    #[validate(length(min = 1, max = 200, message = "El nombre es requerido (máximo 200 caracteres)"))]
    #[schema(example = "Acme Trading Co.")]
    pub nombre: String,

    #[serde(default = "default_true")]
    pub activo: bool,

    #[validate(length(max = 100))]
    pub puerto_salida_default: Option<String>,

    #[validate(length(max = 200))]
    pub contacto: Option<String>,

    pub notas: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSupplierPayload {
    #[validate(length(min = 1, max = 200, message = "El nombre no puede estar vacío (máximo 200 caracteres)"))]
    pub nombre: Option<String>,
    pub activo: Option<bool>,
    #[validate(length(max = 100))]
    pub puerto_salida_default: Option<String>,
    #[validate(length(max = 200))]
    pub contacto: Option<String>,
    pub notas: Option<String>,
}

impl UpdateSupplierPayload {
    pub fn is_empty(&self) -> bool {
        self.nombre.is_none()
            && self.activo.is_none()
            && self.puerto_salida_default.is_none()
            && self.contacto.is_none()
            && self.notas.is_none()
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SupplierFilter {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub activo: Option<bool>,
    /// Busca parcial pelo nome
    pub search: Option<String>,
}

// =============================================================================
//  REMOÇÃO
// =============================================================================

/// Fornecedores com histórico só podem ser desativados.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplierRemoval {
    Hard,
    Soft { ordenes: i64, facturas: i64 },
}

impl SupplierRemoval {
    pub fn decide(ordenes: i64, facturas: i64) -> Self {
        if ordenes > 0 || facturas > 0 {
            SupplierRemoval::Soft { ordenes, facturas }
        } else {
            SupplierRemoval::Hard
        }
    }

    pub fn message(&self) -> String {
        match self {
            SupplierRemoval::Hard => "Proveedor eliminado exitosamente".to_string(),
            SupplierRemoval::Soft { ordenes, facturas } => format!(
                "Proveedor marcado como inactivo (tiene {} órdenes y {} facturas asociadas)",
                ordenes, facturas
            ),
        }
    }
}

// =============================================================================
//  DASHBOARD
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierOrderStats {
    pub total: i64,
    pub monto_total: Decimal,
    pub por_estado: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierInvoiceStats {
    pub total: i64,
    pub monto_total: Decimal,
    pub saldo_pendiente: Decimal,
    pub por_estado: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierAdvanceStats {
    pub monto_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierDashboard {
    pub supplier: Supplier,
    pub purchase_orders: SupplierOrderStats,
    pub invoices: SupplierInvoiceStats,
    pub anticipos: SupplierAdvanceStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supplier_without_history_is_hard_deleted() {
        let removal = SupplierRemoval::decide(0, 0);
        assert_eq!(removal, SupplierRemoval::Hard);
        assert_eq!(removal.message(), "Proveedor eliminado exitosamente");
    }

    #[test]
    fn supplier_with_orders_or_invoices_is_soft_deleted() {
        assert_eq!(
            SupplierRemoval::decide(1, 0),
            SupplierRemoval::Soft { ordenes: 1, facturas: 0 }
        );

        let removal = SupplierRemoval::decide(2, 3);
        assert_eq!(
            removal.message(),
            "Proveedor marcado como inactivo (tiene 2 órdenes y 3 facturas asociadas)"
        );
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(UpdateSupplierPayload::default().is_empty());
        let payload = UpdateSupplierPayload { activo: Some(false), ..Default::default() };
        assert!(!payload.is_empty());
    }

    #[test]
    fn new_suppliers_default_to_active() {
        let payload: CreateSupplierPayload =
            serde_json::from_str(r#"{"nombre": "Acme"}"#).unwrap();
        assert!(payload.activo);
    }
}
