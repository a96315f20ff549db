// src/services/reconciliation.rs
//
// Conciliação de faturas com pagamentos e anticipos.
// Os fluxos falam só com `LedgerStore`: em produção é o `PgLedger` sobre uma
// transação aberta (com FOR UPDATE), nos testes um store em memória.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        advance::{check_deletable, check_order_capacity, AdvanceAllocation, AdvancePayment, AdvanceStatus, ReleaseOutcome, UpdateAdvancePayload},
        invoice::{AllocationOutcome, ApplyAdvancePayload, DueApplication, DueSource, Invoice, InvoiceDue},
        money::Currency,
        payment::{CreatePaymentPayload, InvoicePayment, PaymentOutcome, UpdatePaymentPayload},
        purchase_order::PurchaseOrder,
    },
};

#[derive(Debug, Clone)]
pub struct NewAdvance {
    pub po_id: Uuid,
    pub monto: Decimal,
    pub moneda: Currency,
    pub fecha_pago: NaiveDate,
    pub metodo_pago: Option<String>,
    pub usuario_pago: Option<String>,
    pub notas: Option<String>,
}

/// Acesso às linhas que a conciliação lê e grava.
/// Os métodos `lock_*` devem travar a linha até o fim da unidade de trabalho.
#[async_trait]
pub trait LedgerStore: Send {
    // Faturas e cuotas
    async fn lock_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError>;
    async fn save_invoice_balance(&mut self, invoice: &Invoice) -> Result<(), AppError>;
    async fn find_due(&mut self, id: Uuid) -> Result<Option<InvoiceDue>, AppError>;
    async fn due_applied_total(&mut self, due_id: Uuid) -> Result<Decimal, AppError>;
    async fn set_due_status(&mut self, due: &InvoiceDue) -> Result<(), AppError>;
    async fn insert_due_application(
        &mut self,
        due_id: Uuid,
        source: DueSource,
        source_id: Uuid,
        monto: Decimal,
    ) -> Result<DueApplication, AppError>;
    async fn due_applications_of(
        &mut self,
        source: DueSource,
        source_id: Uuid,
    ) -> Result<Vec<DueApplication>, AppError>;
    async fn set_due_application_amount(&mut self, id: Uuid, monto: Decimal) -> Result<(), AppError>;
    async fn delete_due_applications(&mut self, source: DueSource, source_id: Uuid) -> Result<(), AppError>;

    // Pagamentos
    async fn insert_payment(&mut self, payload: &CreatePaymentPayload) -> Result<InvoicePayment, AppError>;
    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<InvoicePayment>, AppError>;
    async fn save_payment(&mut self, payment: &InvoicePayment) -> Result<(), AppError>;
    async fn delete_payment(&mut self, id: Uuid) -> Result<(), AppError>;

    // Ordens e anticipos
    async fn lock_order(&mut self, id: Uuid) -> Result<Option<PurchaseOrder>, AppError>;
    async fn supplier_active(&mut self, supplier_id: Uuid) -> Result<bool, AppError>;
    /// Σ anticipos não devolvidos da ordem, opcionalmente sem `exclude`.
    async fn advances_total(&mut self, po_id: Uuid, exclude: Option<Uuid>) -> Result<Decimal, AppError>;
    async fn insert_advance(&mut self, advance: &NewAdvance) -> Result<AdvancePayment, AppError>;
    async fn lock_advance(&mut self, id: Uuid) -> Result<Option<AdvancePayment>, AppError>;
    async fn save_advance(&mut self, advance: &AdvancePayment) -> Result<(), AppError>;
    async fn delete_advance(&mut self, id: Uuid) -> Result<(), AppError>;

    // Aplicações de anticipo
    async fn allocated_total(&mut self, anticipo_id: Uuid) -> Result<Decimal, AppError>;
    async fn allocation_count(&mut self, anticipo_id: Uuid) -> Result<i64, AppError>;
    async fn insert_allocation(
        &mut self,
        anticipo_id: Uuid,
        invoice_id: Uuid,
        due_id: Option<Uuid>,
        monto: Decimal,
    ) -> Result<AdvanceAllocation, AppError>;
    async fn find_allocation(&mut self, id: Uuid) -> Result<Option<AdvanceAllocation>, AppError>;
    async fn delete_allocation(&mut self, id: Uuid) -> Result<(), AppError>;
}

// =============================================================================
//  AUXILIARES
// =============================================================================

async fn require_invoice<S>(store: &mut S, id: Uuid) -> Result<Invoice, AppError>
where
    S: LedgerStore + ?Sized,
{
    store
        .lock_invoice(id)
        .await?
        .ok_or_else(|| AppError::not_found("Factura no encontrada"))
}

async fn require_advance<S>(store: &mut S, id: Uuid) -> Result<AdvancePayment, AppError>
where
    S: LedgerStore + ?Sized,
{
    store
        .lock_advance(id)
        .await?
        .ok_or_else(|| AppError::not_found("Anticipo no encontrado"))
}

async fn require_order<S>(store: &mut S, id: Uuid) -> Result<PurchaseOrder, AppError>
where
    S: LedgerStore + ?Sized,
{
    store
        .lock_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("Orden de compra no encontrada"))
}

/// A cuota informada precisa existir e ser da mesma fatura.
async fn due_of_invoice<S>(
    store: &mut S,
    invoice_id: Uuid,
    due_id: Option<Uuid>,
) -> Result<Option<InvoiceDue>, AppError>
where
    S: LedgerStore + ?Sized,
{
    let Some(due_id) = due_id else {
        return Ok(None);
    };
    let due = store
        .find_due(due_id)
        .await?
        .ok_or_else(|| AppError::not_found("Vencimiento no encontrado"))?;
    if due.invoice_id != invoice_id {
        return Err(AppError::rule("El vencimiento no pertenece a esta factura"));
    }
    Ok(Some(due))
}

/// Recalcula o estado da cuota a partir do que já foi aplicado nela.
async fn refresh_due_status<S>(store: &mut S, due_id: Uuid) -> Result<(), AppError>
where
    S: LedgerStore + ?Sized,
{
    if let Some(mut due) = store.find_due(due_id).await? {
        let applied = store.due_applied_total(due_id).await?;
        due.estado = due.status_for(applied);
        store.set_due_status(&due).await?;
    }
    Ok(())
}

// =============================================================================
//  PAGAMENTOS
// =============================================================================

pub async fn register_payment<S>(
    store: &mut S,
    payload: &CreatePaymentPayload,
) -> Result<PaymentOutcome, AppError>
where
    S: LedgerStore + ?Sized,
{
    let mut invoice = require_invoice(store, payload.invoice_id).await?;
    let due = due_of_invoice(store, invoice.id, payload.due_id).await?;

    invoice.apply_amount(payload.monto_pagado)?;

    let payment = store.insert_payment(payload).await?;
    store.save_invoice_balance(&invoice).await?;

    if let Some(due) = due {
        store
            .insert_due_application(due.id, DueSource::Pago, payment.id, payment.monto_pagado)
            .await?;
        refresh_due_status(store, due.id).await?;
    }

    tracing::info!(
        "Pago {} registrado en factura {} (saldo {})",
        payment.id,
        invoice.numero_factura,
        invoice.saldo_pendiente
    );

    Ok(PaymentOutcome {
        payment,
        nuevo_saldo_factura: invoice.saldo_pendiente,
        nuevo_estado_factura: invoice.estado,
    })
}

pub async fn amend_payment<S>(
    store: &mut S,
    payment_id: Uuid,
    changes: &UpdatePaymentPayload,
) -> Result<PaymentOutcome, AppError>
where
    S: LedgerStore + ?Sized,
{
    let mut payment = store
        .lock_payment(payment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Pago no encontrado"))?;
    let mut invoice = require_invoice(store, payment.invoice_id).await?;

    if let Some(nuevo) = changes.monto_pagado.filter(|m| *m != payment.monto_pagado) {
        invoice.amend_amount(payment.monto_pagado, nuevo)?;
        store.save_invoice_balance(&invoice).await?;

        for app in store.due_applications_of(DueSource::Pago, payment.id).await? {
            store.set_due_application_amount(app.id, nuevo).await?;
            refresh_due_status(store, app.due_id).await?;
        }
        payment.monto_pagado = nuevo;
    }

    if let Some(fecha) = changes.fecha {
        payment.fecha = fecha;
    }
    if let Some(metodo) = &changes.metodo_pago {
        payment.metodo_pago = Some(metodo.clone());
    }
    if let Some(referencia) = &changes.referencia {
        payment.referencia = Some(referencia.clone());
    }
    if let Some(notas) = &changes.notas {
        payment.notas = Some(notas.clone());
    }
    store.save_payment(&payment).await?;

    Ok(PaymentOutcome {
        payment,
        nuevo_saldo_factura: invoice.saldo_pendiente,
        nuevo_estado_factura: invoice.estado,
    })
}

/// Remove o pagamento e devolve o valor ao saldo da fatura.
pub async fn remove_payment<S>(store: &mut S, payment_id: Uuid) -> Result<Invoice, AppError>
where
    S: LedgerStore + ?Sized,
{
    let payment = store
        .lock_payment(payment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Pago no encontrado"))?;
    let mut invoice = require_invoice(store, payment.invoice_id).await?;

    invoice.reverse_amount(payment.monto_pagado);
    store.save_invoice_balance(&invoice).await?;

    let apps = store.due_applications_of(DueSource::Pago, payment.id).await?;
    store.delete_due_applications(DueSource::Pago, payment.id).await?;
    for app in &apps {
        refresh_due_status(store, app.due_id).await?;
    }
    store.delete_payment(payment.id).await?;

    tracing::info!(
        "Pago {} eliminado; factura {} vuelve a saldo {}",
        payment.id,
        invoice.numero_factura,
        invoice.saldo_pendiente
    );
    Ok(invoice)
}

// =============================================================================
//  ANTICIPOS
// =============================================================================

pub async fn create_advance<S>(store: &mut S, advance: NewAdvance) -> Result<AdvancePayment, AppError>
where
    S: LedgerStore + ?Sized,
{
    let order = require_order(store, advance.po_id).await?;
    if !store.supplier_active(order.supplier_id).await? {
        return Err(AppError::rule(
            "No se pueden crear anticipos para proveedores inactivos",
        ));
    }

    let existing = store.advances_total(order.id, None).await?;
    check_order_capacity(order.total_oc, existing, advance.monto)?;

    let created = store.insert_advance(&advance).await?;
    tracing::info!(
        "Anticipo {} de {} {} registrado para la orden {}",
        created.id,
        created.monto,
        created.moneda.as_str(),
        order.numero_orden
    );
    Ok(created)
}

pub async fn update_advance<S>(
    store: &mut S,
    advance_id: Uuid,
    changes: &UpdateAdvancePayload,
) -> Result<AdvancePayment, AppError>
where
    S: LedgerStore + ?Sized,
{
    let mut advance = require_advance(store, advance_id).await?;
    advance.check_editable()?;

    if let Some(monto) = changes.monto.filter(|m| *m != advance.monto) {
        let order = require_order(store, advance.po_id).await?;
        let others = store.advances_total(order.id, Some(advance.id)).await?;
        check_order_capacity(order.total_oc, others, monto)?;

        let allocated = store.allocated_total(advance.id).await?;
        if monto < allocated {
            return Err(AppError::rule(format!(
                "El monto ({}) no puede ser menor que lo ya aplicado ({})",
                monto, allocated
            )));
        }
        advance.monto = monto;
        advance.estado = advance.status_for(allocated);
    }

    if let Some(fecha) = changes.fecha_pago {
        advance.fecha_pago = fecha;
    }
    if let Some(metodo) = &changes.metodo_pago {
        advance.metodo_pago = Some(metodo.clone());
    }
    if let Some(usuario) = &changes.usuario_pago {
        advance.usuario_pago = Some(usuario.clone());
    }
    if let Some(notas) = &changes.notas {
        advance.notas = Some(notas.clone());
    }

    store.save_advance(&advance).await?;
    Ok(advance)
}

pub async fn return_advance<S>(
    store: &mut S,
    advance_id: Uuid,
    motivo: Option<&str>,
) -> Result<AdvancePayment, AppError>
where
    S: LedgerStore + ?Sized,
{
    let mut advance = require_advance(store, advance_id).await?;
    let count = store.allocation_count(advance.id).await?;
    advance.check_returnable(count)?;

    advance.notas = advance.returned_notes(motivo);
    advance.estado = AdvanceStatus::Devuelto;
    store.save_advance(&advance).await?;

    tracing::info!("Anticipo {} devuelto", advance.id);
    Ok(advance)
}

pub async fn delete_advance<S>(store: &mut S, advance_id: Uuid) -> Result<(), AppError>
where
    S: LedgerStore + ?Sized,
{
    let advance = require_advance(store, advance_id).await?;
    check_deletable(store.allocation_count(advance.id).await?)?;
    store.delete_advance(advance.id).await
}

/// Aplica parte de um anticipo no saldo de uma fatura.
pub async fn allocate<S>(
    store: &mut S,
    invoice_id: Uuid,
    request: &ApplyAdvancePayload,
) -> Result<AllocationOutcome, AppError>
where
    S: LedgerStore + ?Sized,
{
    let mut invoice = require_invoice(store, invoice_id).await?;
    let mut advance = require_advance(store, request.anticipo_id).await?;

    let allocated = store.allocated_total(advance.id).await?;
    advance.check_allocation(allocated, request.monto_aplicar)?;

    let due = due_of_invoice(store, invoice.id, request.due_id).await?;

    invoice.apply_amount(request.monto_aplicar)?;

    let allocation = store
        .insert_allocation(advance.id, invoice.id, request.due_id, request.monto_aplicar)
        .await?;
    store.save_invoice_balance(&invoice).await?;

    if let Some(due) = due {
        store
            .insert_due_application(due.id, DueSource::Anticipo, allocation.id, allocation.monto_aplicado)
            .await?;
        refresh_due_status(store, due.id).await?;
    }

    let estado = advance.status_for(allocated + request.monto_aplicar);
    if estado != advance.estado {
        advance.estado = estado;
        store.save_advance(&advance).await?;
    }

    tracing::info!(
        "Anticipo {} aplicado a factura {}: {} (saldo {})",
        advance.id,
        invoice.numero_factura,
        allocation.monto_aplicado,
        invoice.saldo_pendiente
    );

    Ok(AllocationOutcome {
        allocation_id: allocation.id,
        monto_aplicado: allocation.monto_aplicado,
        nuevo_saldo_factura: invoice.saldo_pendiente,
        nuevo_estado_factura: invoice.estado,
        estado_anticipo: advance.estado,
    })
}

/// Desfaz uma aplicação: o valor volta à fatura e ao anticipo.
pub async fn release_allocation<S>(
    store: &mut S,
    advance_id: Uuid,
    allocation_id: Uuid,
) -> Result<ReleaseOutcome, AppError>
where
    S: LedgerStore + ?Sized,
{
    let found = store
        .find_allocation(allocation_id)
        .await?
        .filter(|a| a.anticipo_id == advance_id)
        .ok_or_else(|| AppError::not_found("Aplicación no encontrada"))?;

    // Mesma ordem de travas de `allocate`: fatura, depois anticipo.
    let mut invoice = require_invoice(store, found.invoice_id).await?;
    let mut advance = require_advance(store, advance_id).await?;
    let allocation = store
        .find_allocation(found.id)
        .await?
        .ok_or_else(|| AppError::not_found("Aplicación no encontrada"))?;

    invoice.reverse_amount(allocation.monto_aplicado);
    store.save_invoice_balance(&invoice).await?;

    let apps = store.due_applications_of(DueSource::Anticipo, allocation.id).await?;
    store.delete_due_applications(DueSource::Anticipo, allocation.id).await?;
    for app in &apps {
        refresh_due_status(store, app.due_id).await?;
    }
    store.delete_allocation(allocation.id).await?;

    if advance.estado == AdvanceStatus::Aplicado {
        let allocated = store.allocated_total(advance.id).await?;
        advance.estado = advance.status_for(allocated);
        store.save_advance(&advance).await?;
    }

    tracing::info!(
        "Aplicación {} liberada: {} vuelve al anticipo {}",
        allocation.id,
        allocation.monto_aplicado,
        advance.id
    );

    Ok(ReleaseOutcome {
        allocation_id: allocation.id,
        monto_liberado: allocation.monto_aplicado,
        nuevo_saldo_factura: invoice.saldo_pendiente,
        nuevo_estado_factura: invoice.estado,
        estado_anticipo: advance.estado,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use super::*;
    use crate::models::{invoice::InvoiceStatus, purchase_order::PurchaseOrderStatus};

    #[derive(Default)]
    struct InMemoryLedger {
        suppliers: HashMap<Uuid, bool>,
        orders: HashMap<Uuid, PurchaseOrder>,
        invoices: HashMap<Uuid, Invoice>,
        dues: HashMap<Uuid, InvoiceDue>,
        due_apps: Vec<DueApplication>,
        advances: HashMap<Uuid, AdvancePayment>,
        allocations: Vec<AdvanceAllocation>,
        payments: HashMap<Uuid, InvoicePayment>,
        locks: Vec<&'static str>,
    }

    #[async_trait]
    impl LedgerStore for InMemoryLedger {
        async fn lock_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError> {
            self.locks.push("invoice");
            Ok(self.invoices.get(&id).cloned())
        }

        async fn save_invoice_balance(&mut self, invoice: &Invoice) -> Result<(), AppError> {
            self.invoices.insert(invoice.id, invoice.clone());
            Ok(())
        }

        async fn find_due(&mut self, id: Uuid) -> Result<Option<InvoiceDue>, AppError> {
            Ok(self.dues.get(&id).cloned())
        }

        async fn due_applied_total(&mut self, due_id: Uuid) -> Result<Decimal, AppError> {
            Ok(self
                .due_apps
                .iter()
                .filter(|a| a.due_id == due_id)
                .map(|a| a.monto_aplicado)
                .sum())
        }

        async fn set_due_status(&mut self, due: &InvoiceDue) -> Result<(), AppError> {
            self.dues.insert(due.id, due.clone());
            Ok(())
        }

        async fn insert_due_application(
            &mut self,
            due_id: Uuid,
            source: DueSource,
            source_id: Uuid,
            monto: Decimal,
        ) -> Result<DueApplication, AppError> {
            let app = DueApplication {
                id: Uuid::new_v4(),
                due_id,
                source,
                source_id,
                monto_aplicado: monto,
                fecha: Utc::now(),
                created_at: Utc::now(),
            };
            self.due_apps.push(app.clone());
            Ok(app)
        }

        async fn due_applications_of(
            &mut self,
            source: DueSource,
            source_id: Uuid,
        ) -> Result<Vec<DueApplication>, AppError> {
            Ok(self
                .due_apps
                .iter()
                .filter(|a| a.source == source && a.source_id == source_id)
                .cloned()
                .collect())
        }

        async fn set_due_application_amount(&mut self, id: Uuid, monto: Decimal) -> Result<(), AppError> {
            if let Some(app) = self.due_apps.iter_mut().find(|a| a.id == id) {
                app.monto_aplicado = monto;
            }
            Ok(())
        }

        async fn delete_due_applications(&mut self, source: DueSource, source_id: Uuid) -> Result<(), AppError> {
            self.due_apps.retain(|a| !(a.source == source && a.source_id == source_id));
            Ok(())
        }

        async fn insert_payment(&mut self, payload: &CreatePaymentPayload) -> Result<InvoicePayment, AppError> {
            let payment = InvoicePayment {
                id: Uuid::new_v4(),
                invoice_id: payload.invoice_id,
                monto_pagado: payload.monto_pagado,
                fecha: payload.fecha,
                metodo_pago: payload.metodo_pago.clone(),
                referencia: payload.referencia.clone(),
                notas: payload.notas.clone(),
                created_at: Utc::now(),
            };
            self.payments.insert(payment.id, payment.clone());
            Ok(payment)
        }

        async fn lock_payment(&mut self, id: Uuid) -> Result<Option<InvoicePayment>, AppError> {
            Ok(self.payments.get(&id).cloned())
        }

        async fn save_payment(&mut self, payment: &InvoicePayment) -> Result<(), AppError> {
            self.payments.insert(payment.id, payment.clone());
            Ok(())
        }

        async fn delete_payment(&mut self, id: Uuid) -> Result<(), AppError> {
            self.payments.remove(&id);
            Ok(())
        }

        async fn lock_order(&mut self, id: Uuid) -> Result<Option<PurchaseOrder>, AppError> {
            Ok(self.orders.get(&id).cloned())
        }

        async fn supplier_active(&mut self, supplier_id: Uuid) -> Result<bool, AppError> {
            Ok(self.suppliers.get(&supplier_id).copied().unwrap_or(false))
        }

        async fn advances_total(&mut self, po_id: Uuid, exclude: Option<Uuid>) -> Result<Decimal, AppError> {
            Ok(self
                .advances
                .values()
                .filter(|a| a.po_id == po_id && a.estado != AdvanceStatus::Devuelto)
                .filter(|a| Some(a.id) != exclude)
                .map(|a| a.monto)
                .sum())
        }

        async fn insert_advance(&mut self, advance: &NewAdvance) -> Result<AdvancePayment, AppError> {
            let created = AdvancePayment {
                id: Uuid::new_v4(),
                po_id: advance.po_id,
                monto: advance.monto,
                moneda: advance.moneda,
                fecha_pago: advance.fecha_pago,
                metodo_pago: advance.metodo_pago.clone(),
                usuario_pago: advance.usuario_pago.clone(),
                estado: AdvanceStatus::Disponible,
                notas: advance.notas.clone(),
                created_at: Utc::now(),
            };
            self.advances.insert(created.id, created.clone());
            Ok(created)
        }

        async fn lock_advance(&mut self, id: Uuid) -> Result<Option<AdvancePayment>, AppError> {
            self.locks.push("advance");
            Ok(self.advances.get(&id).cloned())
        }

        async fn save_advance(&mut self, advance: &AdvancePayment) -> Result<(), AppError> {
            self.advances.insert(advance.id, advance.clone());
            Ok(())
        }

        async fn delete_advance(&mut self, id: Uuid) -> Result<(), AppError> {
            self.advances.remove(&id);
            Ok(())
        }

        async fn allocated_total(&mut self, anticipo_id: Uuid) -> Result<Decimal, AppError> {
            Ok(self
                .allocations
                .iter()
                .filter(|a| a.anticipo_id == anticipo_id)
                .map(|a| a.monto_aplicado)
                .sum())
        }

        async fn allocation_count(&mut self, anticipo_id: Uuid) -> Result<i64, AppError> {
            Ok(self.allocations.iter().filter(|a| a.anticipo_id == anticipo_id).count() as i64)
        }

        async fn insert_allocation(
            &mut self,
            anticipo_id: Uuid,
            invoice_id: Uuid,
            due_id: Option<Uuid>,
            monto: Decimal,
        ) -> Result<AdvanceAllocation, AppError> {
            let allocation = AdvanceAllocation {
                id: Uuid::new_v4(),
                anticipo_id,
                invoice_id,
                due_id,
                monto_aplicado: monto,
                fecha: Utc::now(),
                created_at: Utc::now(),
            };
            self.allocations.push(allocation.clone());
            Ok(allocation)
        }

        async fn find_allocation(&mut self, id: Uuid) -> Result<Option<AdvanceAllocation>, AppError> {
            Ok(self.allocations.iter().find(|a| a.id == id).cloned())
        }

        async fn delete_allocation(&mut self, id: Uuid) -> Result<(), AppError> {
            self.allocations.retain(|a| a.id != id);
            Ok(())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    impl InMemoryLedger {
        fn supplier(&mut self, activo: bool) -> Uuid {
            let id = Uuid::new_v4();
            self.suppliers.insert(id, activo);
            id
        }

        fn order(&mut self, supplier_id: Uuid, total: i64) -> Uuid {
            let order = PurchaseOrder {
                id: Uuid::new_v4(),
                supplier_id,
                numero_orden: "PO-1".into(),
                moneda: Currency::Usd,
                total_oc: Decimal::from(total),
                fecha: date(2025, 1, 2),
                estado: PurchaseOrderStatus::Pendiente,
                notas: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            let id = order.id;
            self.orders.insert(id, order);
            id
        }

        fn invoice(&mut self, supplier_id: Uuid, total: i64) -> Uuid {
            let invoice = Invoice {
                id: Uuid::new_v4(),
                supplier_id,
                numero_factura: "F-1".into(),
                fecha_emision: date(2025, 1, 10),
                moneda: Currency::Usd,
                monto_total: Decimal::from(total),
                saldo_pendiente: Decimal::from(total),
                estado: InvoiceStatus::Pendiente,
                tipo_factura: None,
                concepto: None,
                notas: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            let id = invoice.id;
            self.invoices.insert(id, invoice);
            id
        }

        fn due(&mut self, invoice_id: Uuid, numero: i16, monto: i64) -> Uuid {
            let due = InvoiceDue {
                id: Uuid::new_v4(),
                invoice_id,
                numero_cuota: numero,
                fecha_vencimiento: date(2025, 2, 10),
                monto_vencimiento: Decimal::from(monto),
                estado: InvoiceStatus::Pendiente,
                created_at: Utc::now(),
            };
            let id = due.id;
            self.dues.insert(id, due);
            id
        }
    }

    fn new_advance(po_id: Uuid, monto: i64) -> NewAdvance {
        NewAdvance {
            po_id,
            monto: Decimal::from(monto),
            moneda: Currency::Usd,
            fecha_pago: date(2025, 1, 5),
            metodo_pago: Some("transferencia".into()),
            usuario_pago: None,
            notas: None,
        }
    }

    fn payment(invoice_id: Uuid, monto: i64, due_id: Option<Uuid>) -> CreatePaymentPayload {
        CreatePaymentPayload {
            invoice_id,
            monto_pagado: Decimal::from(monto),
            fecha: date(2025, 2, 1),
            metodo_pago: None,
            referencia: None,
            due_id,
            notas: None,
        }
    }

    fn apply(anticipo_id: Uuid, monto: i64) -> ApplyAdvancePayload {
        ApplyAdvancePayload { anticipo_id, monto_aplicar: Decimal::from(monto), due_id: None }
    }

    #[tokio::test]
    async fn advance_applied_to_invoice_leaves_partial_balance() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let po = ledger.order(acme, 1000);
        let invoice = ledger.invoice(acme, 1000);

        let advance = create_advance(&mut ledger, new_advance(po, 400)).await.unwrap();
        let outcome = allocate(&mut ledger, invoice, &apply(advance.id, 400)).await.unwrap();

        assert_eq!(outcome.nuevo_saldo_factura, Decimal::from(600));
        assert_eq!(outcome.nuevo_estado_factura, InvoiceStatus::PagadaParcial);
        assert_eq!(outcome.estado_anticipo, AdvanceStatus::Aplicado);
        assert_eq!(ledger.advances[&advance.id].estado, AdvanceStatus::Aplicado);
        assert_eq!(ledger.invoices[&invoice].saldo_pendiente, Decimal::from(600));
    }

    #[tokio::test]
    async fn allocation_beyond_advance_is_rejected() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let po = ledger.order(acme, 1000);
        let invoice = ledger.invoice(acme, 1000);
        let advance = create_advance(&mut ledger, new_advance(po, 400)).await.unwrap();

        let err = allocate(&mut ledger, invoice, &apply(advance.id, 500)).await.unwrap_err();

        assert_eq!(err.to_string(), "Monto a aplicar (500) excede el disponible (400)");
        assert!(ledger.allocations.is_empty());
        assert_eq!(ledger.invoices[&invoice].saldo_pendiente, Decimal::from(1000));
    }

    #[tokio::test]
    async fn partial_allocations_keep_advance_available() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let po = ledger.order(acme, 1000);
        let first = ledger.invoice(acme, 250);
        let second = ledger.invoice(acme, 500);
        let advance = create_advance(&mut ledger, new_advance(po, 400)).await.unwrap();

        let outcome = allocate(&mut ledger, first, &apply(advance.id, 250)).await.unwrap();
        assert_eq!(outcome.nuevo_estado_factura, InvoiceStatus::PagadaCompleta);
        assert_eq!(outcome.estado_anticipo, AdvanceStatus::Disponible);

        let err = allocate(&mut ledger, second, &apply(advance.id, 200)).await.unwrap_err();
        assert_eq!(err.to_string(), "Monto a aplicar (200) excede el disponible (150)");

        let outcome = allocate(&mut ledger, second, &apply(advance.id, 150)).await.unwrap();
        assert_eq!(outcome.estado_anticipo, AdvanceStatus::Aplicado);
        assert_eq!(outcome.nuevo_saldo_factura, Decimal::from(350));
    }

    #[tokio::test]
    async fn advances_may_not_exceed_order_total() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let po = ledger.order(acme, 1000);

        create_advance(&mut ledger, new_advance(po, 600)).await.unwrap();
        let err = create_advance(&mut ledger, new_advance(po, 500)).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Total de anticipos (1100) excedería el total de la orden (1000)"
        );
        assert_eq!(ledger.advances.len(), 1);
    }

    #[tokio::test]
    async fn inactive_suppliers_get_no_advances() {
        let mut ledger = InMemoryLedger::default();
        let retired = ledger.supplier(false);
        let po = ledger.order(retired, 1000);

        let err = create_advance(&mut ledger, new_advance(po, 100)).await.unwrap_err();
        assert_eq!(err.to_string(), "No se pueden crear anticipos para proveedores inactivos");
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let mut ledger = InMemoryLedger::default();
        let err = create_advance(&mut ledger, new_advance(Uuid::new_v4(), 100))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn deleting_a_payment_restores_the_balance() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let invoice = ledger.invoice(acme, 1000);

        let outcome = register_payment(&mut ledger, &payment(invoice, 250, None)).await.unwrap();
        assert_eq!(outcome.nuevo_saldo_factura, Decimal::from(750));
        assert_eq!(outcome.nuevo_estado_factura, InvoiceStatus::PagadaParcial);

        let restored = remove_payment(&mut ledger, outcome.payment.id).await.unwrap();
        assert_eq!(restored.saldo_pendiente, Decimal::from(1000));
        assert_eq!(restored.estado, InvoiceStatus::Pendiente);
        assert!(ledger.payments.is_empty());
    }

    #[tokio::test]
    async fn overpayment_is_rejected_without_writes() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let invoice = ledger.invoice(acme, 100);

        let err = register_payment(&mut ledger, &payment(invoice, 150, None)).await.unwrap_err();
        assert_eq!(err.to_string(), "Monto a aplicar (150) excede el saldo pendiente (100)");
        assert!(ledger.payments.is_empty());
    }

    #[tokio::test]
    async fn releasing_an_allocation_reverses_both_sides() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let po = ledger.order(acme, 1000);
        let invoice = ledger.invoice(acme, 1000);
        let advance = create_advance(&mut ledger, new_advance(po, 400)).await.unwrap();
        let applied = allocate(&mut ledger, invoice, &apply(advance.id, 400)).await.unwrap();

        let released = release_allocation(&mut ledger, advance.id, applied.allocation_id)
            .await
            .unwrap();

        assert_eq!(released.monto_liberado, Decimal::from(400));
        assert_eq!(released.nuevo_saldo_factura, Decimal::from(1000));
        assert_eq!(released.nuevo_estado_factura, InvoiceStatus::Pendiente);
        assert_eq!(released.estado_anticipo, AdvanceStatus::Disponible);
        assert!(ledger.allocations.is_empty());
    }

    #[tokio::test]
    async fn allocate_and_release_lock_invoice_before_advance() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let po = ledger.order(acme, 1000);
        let invoice = ledger.invoice(acme, 1000);
        let advance = create_advance(&mut ledger, new_advance(po, 400)).await.unwrap();

        ledger.locks.clear();
        let applied = allocate(&mut ledger, invoice, &apply(advance.id, 100)).await.unwrap();
        assert_eq!(ledger.locks, ["invoice", "advance"]);

        ledger.locks.clear();
        release_allocation(&mut ledger, advance.id, applied.allocation_id)
            .await
            .unwrap();
        assert_eq!(ledger.locks, ["invoice", "advance"]);
    }

    #[tokio::test]
    async fn release_checks_allocation_owner() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let po = ledger.order(acme, 1000);
        let invoice = ledger.invoice(acme, 1000);
        let a1 = create_advance(&mut ledger, new_advance(po, 300)).await.unwrap();
        let a2 = create_advance(&mut ledger, new_advance(po, 300)).await.unwrap();
        let applied = allocate(&mut ledger, invoice, &apply(a1.id, 100)).await.unwrap();

        let err = release_allocation(&mut ledger, a2.id, applied.allocation_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ResourceNotFound(_)));
    }

    #[tokio::test]
    async fn due_status_follows_payments_against_it() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let invoice = ledger.invoice(acme, 1000);
        let first = ledger.due(invoice, 1, 600);
        ledger.due(invoice, 2, 400);

        let outcome = register_payment(&mut ledger, &payment(invoice, 600, Some(first)))
            .await
            .unwrap();
        assert_eq!(ledger.dues[&first].estado, InvoiceStatus::PagadaCompleta);

        let changes = UpdatePaymentPayload {
            monto_pagado: Some(Decimal::from(300)),
            ..Default::default()
        };
        let amended = amend_payment(&mut ledger, outcome.payment.id, &changes).await.unwrap();

        assert_eq!(amended.nuevo_saldo_factura, Decimal::from(700));
        assert_eq!(amended.payment.monto_pagado, Decimal::from(300));
        assert_eq!(ledger.dues[&first].estado, InvoiceStatus::PagadaParcial);

        remove_payment(&mut ledger, outcome.payment.id).await.unwrap();
        assert_eq!(ledger.dues[&first].estado, InvoiceStatus::Pendiente);
        assert!(ledger.due_apps.is_empty());
    }

    #[tokio::test]
    async fn due_from_another_invoice_is_rejected() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let invoice = ledger.invoice(acme, 1000);
        let other = ledger.invoice(acme, 500);
        let foreign_due = ledger.due(other, 1, 500);

        let err = register_payment(&mut ledger, &payment(invoice, 100, Some(foreign_due)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "El vencimiento no pertenece a esta factura");
    }

    #[tokio::test]
    async fn amending_beyond_the_total_is_rejected() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let invoice = ledger.invoice(acme, 500);
        let outcome = register_payment(&mut ledger, &payment(invoice, 400, None)).await.unwrap();

        let changes = UpdatePaymentPayload {
            monto_pagado: Some(Decimal::from(600)),
            ..Default::default()
        };
        let err = amend_payment(&mut ledger, outcome.payment.id, &changes).await.unwrap_err();
        assert_eq!(err.to_string(), "El nuevo monto excedería el total de la factura");
    }

    #[tokio::test]
    async fn advances_with_allocations_stay_put() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let po = ledger.order(acme, 1000);
        let invoice = ledger.invoice(acme, 1000);
        let advance = create_advance(&mut ledger, new_advance(po, 400)).await.unwrap();
        allocate(&mut ledger, invoice, &apply(advance.id, 100)).await.unwrap();

        assert!(return_advance(&mut ledger, advance.id, Some("duplicado")).await.is_err());
        assert!(delete_advance(&mut ledger, advance.id).await.is_err());

        let shrink = UpdateAdvancePayload {
            monto: Some(Decimal::from(50)),
            ..Default::default()
        };
        let err = update_advance(&mut ledger, advance.id, &shrink).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "El monto (50) no puede ser menor que lo ya aplicado (100)"
        );
    }

    #[tokio::test]
    async fn returned_advance_frees_order_capacity() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let po = ledger.order(acme, 1000);
        let advance = create_advance(&mut ledger, new_advance(po, 1000)).await.unwrap();

        let returned = return_advance(&mut ledger, advance.id, Some("orden cancelada"))
            .await
            .unwrap();
        assert_eq!(returned.estado, AdvanceStatus::Devuelto);
        assert_eq!(returned.notas.as_deref(), Some("[DEVUELTO] orden cancelada"));

        assert!(create_advance(&mut ledger, new_advance(po, 1000)).await.is_ok());
    }

    #[tokio::test]
    async fn advance_update_respects_order_total() {
        let mut ledger = InMemoryLedger::default();
        let acme = ledger.supplier(true);
        let po = ledger.order(acme, 1000);
        create_advance(&mut ledger, new_advance(po, 700)).await.unwrap();
        let second = create_advance(&mut ledger, new_advance(po, 200)).await.unwrap();

        let grow = UpdateAdvancePayload {
            monto: Some(Decimal::from(400)),
            ..Default::default()
        };
        assert!(update_advance(&mut ledger, second.id, &grow).await.is_err());

        let fits = UpdateAdvancePayload {
            monto: Some(Decimal::from(300)),
            notas: Some("ajuste".into()),
            ..Default::default()
        };
        let updated = update_advance(&mut ledger, second.id, &fits).await.unwrap();
        assert_eq!(updated.monto, Decimal::from(300));
        assert_eq!(updated.notas.as_deref(), Some("ajuste"));
    }
}
