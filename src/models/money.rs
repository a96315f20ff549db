// src/models/money.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::ValidationError;

/// Tolerância de um centavo usada na conferência de cuotas.
pub const CENT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "currency", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Clp,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Clp => "CLP",
        }
    }
}

// Totais separados por moeda (os relatórios nunca somam USD com CLP)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct CurrencyTotals {
    pub usd: Decimal,
    pub clp: Decimal,
}

impl CurrencyTotals {
    pub fn add(&mut self, moneda: Currency, amount: Decimal) {
        match moneda {
            Currency::Usd => self.usd += amount,
            Currency::Clp => self.clp += amount,
        }
    }

    pub fn rounded(self) -> Self {
        Self { usd: round2(self.usd), clp: round2(self.clp) }
    }
}

pub fn round2(value: Decimal) -> Decimal {
    value.round_dp(2)
}

/// As colunas são NUMERIC(16, 2): nada abaixo do centavo entra no razão.
pub fn fits_cents(value: &Decimal) -> bool {
    value.normalize().scale() <= 2
}

/// `disponible / pendiente * 100`, ou `when_empty` quando não há pendência.
pub fn coverage_pct(disponible: Decimal, pendiente: Decimal, when_empty: Decimal) -> Decimal {
    if pendiente > Decimal::ZERO {
        round2(disponible / pendiente * Decimal::ONE_HUNDRED)
    } else {
        when_empty
    }
}

// Validador usado nos payloads (`#[validate(custom(function = "positive_amount"))]`)
pub fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        let mut err = ValidationError::new("positive_amount");
        err.message = Some("El monto debe ser mayor a cero".into());
        return Err(err);
    }
    if !fits_cents(value) {
        let mut err = ValidationError::new("max_two_decimals");
        err.message = Some("El monto admite como máximo 2 decimales".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cent_tolerance_is_one_cent() {
        assert_eq!(CENT_TOLERANCE, Decimal::new(1, 2));
    }

    #[test]
    fn totals_keep_currencies_apart() {
        let mut totals = CurrencyTotals::default();
        totals.add(Currency::Usd, Decimal::new(10050, 2));
        totals.add(Currency::Clp, Decimal::from(250_000));
        totals.add(Currency::Usd, Decimal::new(4950, 2));

        assert_eq!(totals.usd, Decimal::from(150));
        assert_eq!(totals.clp, Decimal::from(250_000));
    }

    #[test]
    fn coverage_handles_empty_denominator() {
        assert_eq!(
            coverage_pct(Decimal::from(50), Decimal::from(200), Decimal::ZERO),
            Decimal::from(25)
        );
        assert_eq!(
            coverage_pct(Decimal::from(50), Decimal::ZERO, Decimal::ONE_HUNDRED),
            Decimal::ONE_HUNDRED
        );
    }

    #[test]
    fn positive_amount_rejects_zero_and_negatives() {
        assert!(positive_amount(&Decimal::ZERO).is_err());
        assert!(positive_amount(&Decimal::from(-5)).is_err());
        assert!(positive_amount(&Decimal::new(1, 2)).is_ok());
    }

    #[test]
    fn positive_amount_rejects_sub_cent_values() {
        assert!(positive_amount(&Decimal::new(5, 3)).is_err());
        assert!(positive_amount(&Decimal::new(100_0001, 4)).is_err());
        assert!(positive_amount(&Decimal::new(10_000, 3)).is_ok());
        assert!(positive_amount(&Decimal::new(1050, 2)).is_ok());
    }

    #[test]
    fn currency_serializes_uppercase() {
        assert_eq!(serde_json::to_value(Currency::Clp).unwrap(), "CLP");
        let parsed: Currency = serde_json::from_str("\"USD\"").unwrap();
        assert_eq!(parsed, Currency::Usd);
    }
}
