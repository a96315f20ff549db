// src/config.rs

use std::{env, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        AdvanceRepository, InvoiceRepository, PaymentRepository, PurchaseOrderRepository, ReportRepository,
        ShipmentRepository, SupplierRepository,
    },
    services::{
        advance_service::AdvanceService, invoice_service::InvoiceService, payment_service::PaymentService,
        purchase_order_service::PurchaseOrderService, report_service::ReportService,
        shipment_service::ShipmentService, supplier_service::SupplierService,
    },
};

const DEFAULT_APP_NAME: &str = "SGF - Sistema de Gestión Financiera";
const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:8080",
    "https://*.netlify.app",
    "https://*.vercel.app",
];

/// Configuração lida uma única vez do ambiente (e do `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub app_name: String,
    pub app_version: String,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_run_migrations: bool,
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta as configurações a partir de qualquer fonte chave → valor.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .context("DATABASE_URL deve ser definida")?;

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT inválida: {}", raw))?,
            None => 8000,
        };

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("DB_MAX_CONNECTIONS inválido: {}", raw))?,
            None => 5,
        };

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        Ok(Self {
            database_url,
            app_name: lookup("APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            app_version: lookup("APP_VERSION").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            debug: lookup("DEBUG").map(|v| parse_bool(&v)).unwrap_or(false),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            cors_origins,
            db_max_connections,
            db_run_migrations: lookup("DB_RUN_MIGRATIONS").map(|v| parse_bool(&v)).unwrap_or(false),
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `*` libera tudo; `https://*.dominio` aceita qualquer subdomínio.
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.cors_origins.iter().any(|allowed| {
            if allowed == "*" {
                return true;
            }
            match allowed.split_once("*.") {
                Some((scheme, domain)) => origin
                    .strip_prefix(scheme)
                    .and_then(|host| host.strip_suffix(domain))
                    .is_some_and(|sub| sub.ends_with('.') && sub.len() > 1),
                None => allowed == origin,
            }
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: Settings,
    pub supplier_service: SupplierService,
    pub purchase_order_service: PurchaseOrderService,
    pub invoice_service: InvoiceService,
    pub payment_service: PaymentService,
    pub advance_service: AdvanceService,
    pub shipment_service: ShipmentService,
    pub report_service: ReportService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let settings = Settings::from_env()?;

        let db_pool = PgPoolOptions::new()
            .max_connections(settings.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::with_pool(db_pool, settings))
    }

    /// Monta o gráfico de dependências sobre um pool já aberto.
    pub fn with_pool(db_pool: PgPool, settings: Settings) -> Self {
        let supplier_repo = SupplierRepository::new(db_pool.clone());
        let order_repo = PurchaseOrderRepository::new(db_pool.clone());
        let invoice_repo = InvoiceRepository::new(db_pool.clone());
        let payment_repo = PaymentRepository::new(db_pool.clone());
        let advance_repo = AdvanceRepository::new(db_pool.clone());
        let shipment_repo = ShipmentRepository::new(db_pool.clone());
        let report_repo = ReportRepository::new(db_pool.clone());

        Self {
            supplier_service: SupplierService::new(supplier_repo.clone()),
            purchase_order_service: PurchaseOrderService::new(
                order_repo.clone(),
                supplier_repo.clone(),
                advance_repo.clone(),
            ),
            invoice_service: InvoiceService::new(invoice_repo.clone(), supplier_repo.clone(), order_repo.clone()),
            payment_service: PaymentService::new(payment_repo, invoice_repo.clone()),
            advance_service: AdvanceService::new(advance_repo.clone(), order_repo.clone()),
            shipment_service: ShipmentService::new(
                shipment_repo.clone(),
                supplier_repo.clone(),
                invoice_repo.clone(),
            ),
            report_service: ReportService::new(
                report_repo,
                supplier_repo,
                order_repo,
                invoice_repo,
                advance_repo,
                shipment_repo,
            ),
            db_pool,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn database_url_is_required() {
        assert!(settings(&[]).is_err());
        assert!(settings(&[("DATABASE_URL", "  ")]).is_err());
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let s = settings(&[("DATABASE_URL", "postgres://localhost/sgf")]).unwrap();
        assert_eq!(s.port, 8000);
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.db_max_connections, 5);
        assert!(!s.debug);
        assert!(!s.db_run_migrations);
        assert_eq!(s.app_name, DEFAULT_APP_NAME);
        assert_eq!(s.cors_origins.len(), 4);
        assert_eq!(s.listen_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn parses_explicit_values() {
        let s = settings(&[
            ("DATABASE_URL", "postgres://db/sgf"),
            ("PORT", "9001"),
            ("DEBUG", "true"),
            ("DB_RUN_MIGRATIONS", "1"),
            ("DB_MAX_CONNECTIONS", "12"),
            ("CORS_ORIGINS", "https://app.example.com, http://localhost:5173 ,"),
        ])
        .unwrap();
        assert_eq!(s.port, 9001);
        assert!(s.debug);
        assert!(s.db_run_migrations);
        assert_eq!(s.db_max_connections, 12);
        assert_eq!(
            s.cors_origins,
            vec!["https://app.example.com".to_string(), "http://localhost:5173".to_string()]
        );
    }

    #[test]
    fn invalid_port_is_an_error() {
        assert!(settings(&[("DATABASE_URL", "postgres://db"), ("PORT", "abc")]).is_err());
    }

    #[test]
    fn wildcard_subdomains_match_only_that_domain() {
        let s = settings(&[("DATABASE_URL", "postgres://db")]).unwrap();
        assert!(s.allows_origin("https://sgf.netlify.app"));
        assert!(s.allows_origin("https://preview-12.vercel.app"));
        assert!(s.allows_origin("http://localhost:3000"));
        assert!(!s.allows_origin("https://netlify.app"));
        assert!(!s.allows_origin("https://evil.com"));
        assert!(!s.allows_origin("http://sgf.netlify.app"));
    }

    #[test]
    fn star_allows_everything() {
        let s = settings(&[("DATABASE_URL", "postgres://db"), ("CORS_ORIGINS", "*")]).unwrap();
        assert!(s.allows_origin("https://anything.example"));
    }
}
