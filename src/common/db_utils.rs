// src/common/db_utils.rs

use crate::common::error::AppError;

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;
/// Maior página cujo OFFSET ainda cabe em i64.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

/// Página já validada: `page >= 1`, `per_page` em 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Result<Self, AppError> {
        let page = page.unwrap_or(1);
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE);

        if page < 1 {
            return Err(AppError::rule("El parámetro page debe ser mayor o igual a 1"));
        }
        if page > MAX_PAGE {
            return Err(AppError::rule(format!(
                "El parámetro page debe ser menor o igual a {}",
                MAX_PAGE
            )));
        }
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(AppError::rule(format!(
                "El parámetro per_page debe estar entre 1 y {}",
                MAX_PER_PAGE
            )));
        }

        Ok(Self { page, per_page })
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    /// Teto de total / per_page.
    pub fn pages(&self, total: i64) -> i64 {
        (total + self.per_page - 1) / self.per_page
    }
}

/// Parâmetros numéricos de query com faixa 1..=max (dias, semanas).
pub fn check_range(name: &str, value: u32, max: u32) -> Result<(), AppError> {
    if !(1..=max).contains(&value) {
        return Err(AppError::rule(format!(
            "El parámetro {} debe estar entre 1 y {}",
            name, max
        )));
    }
    Ok(())
}

// Padrão ILIKE para buscas parciais; usar com `ESCAPE '\'`
pub fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page_of_twenty() {
        let p = Pagination::new(None, None).unwrap();
        assert_eq!(p, Pagination { page: 1, per_page: 20 });
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn offset_follows_page() {
        let p = Pagination::new(Some(3), Some(10)).unwrap();
        assert_eq!(p.offset(), 20);
        assert_eq!(p.limit(), 10);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(Pagination::new(Some(0), None).is_err());
        assert!(Pagination::new(None, Some(0)).is_err());
        assert!(Pagination::new(None, Some(101)).is_err());
        assert!(Pagination::new(None, Some(100)).is_ok());
    }

    #[test]
    fn huge_pages_are_rejected_instead_of_overflowing() {
        assert!(Pagination::new(Some(i64::MAX), Some(20)).is_err());

        let last = Pagination::new(Some(MAX_PAGE), Some(MAX_PER_PAGE)).unwrap();
        assert!(last.offset() > 0);
    }

    #[test]
    fn page_count_rounds_up() {
        let p = Pagination::new(None, Some(20)).unwrap();
        assert_eq!(p.pages(0), 0);
        assert_eq!(p.pages(20), 1);
        assert_eq!(p.pages(21), 2);
    }

    #[test]
    fn range_check_accepts_bounds() {
        assert!(check_range("semanas", 1, 52).is_ok());
        assert!(check_range("semanas", 52, 52).is_ok());
    }

    #[test]
    fn range_check_rejects_zero_and_overflow() {
        let err = check_range("dias", 0, 365).unwrap_err();
        assert!(err.to_string().contains("dias"));
        assert!(check_range("dias", 366, 365).is_err());
    }

    #[test]
    fn like_pattern_wraps_and_trims() {
        assert_eq!(like_pattern(" acme "), "%acme%");
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("%"), r"%\%%");
        assert_eq!(like_pattern("F_01"), r"%F\_01%");
        assert_eq!(like_pattern(r"a\b"), r"%a\\b%");
    }
}
