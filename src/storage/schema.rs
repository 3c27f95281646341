//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use chrono::NaiveDate;
use sea_query::Iden;

/// Format of `last_seen` when written as a SQL literal.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// External traffic intents table schema.
#[derive(Iden)]
pub enum ExternalTrafficIntents {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "client_name"]
    ClientName,
    #[iden = "client_namespace"]
    ClientNamespace,
    #[iden = "client_kind"]
    ClientKind,
    #[iden = "dns_name"]
    DnsName,
    #[iden = "last_seen"]
    LastSeen,
}

/// The four identity columns, in unique-index order.
pub const KEY_COLUMNS: [ExternalTrafficIntents; 4] = [
    ExternalTrafficIntents::ClientName,
    ExternalTrafficIntents::ClientNamespace,
    ExternalTrafficIntents::ClientKind,
    ExternalTrafficIntents::DnsName,
];

/// Render a date for a query literal. Every backend accepts `'YYYY-MM-DD'`
/// for a DATE (or TEXT, on SQLite) column.
pub fn date_literal(day: NaiveDate) -> String {
    day.format(DATE_FORMAT).to_string()
}

/// SQL for creating the intents table on SQLite.
pub const CREATE_INTENTS_TABLE_SQLITE: &str = r#"
CREATE TABLE IF NOT EXISTS external_traffic_intents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_name TEXT NOT NULL,
    client_namespace TEXT NOT NULL,
    client_kind TEXT NOT NULL,
    dns_name TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    UNIQUE (client_name, client_namespace, client_kind, dns_name)
)
"#;

/// SQL for creating the intents table on PostgreSQL.
pub const CREATE_INTENTS_TABLE_POSTGRES: &str = r#"
CREATE TABLE IF NOT EXISTS external_traffic_intents (
    id BIGSERIAL PRIMARY KEY,
    client_name VARCHAR(128) NOT NULL,
    client_namespace VARCHAR(128) NOT NULL,
    client_kind VARCHAR(128) NOT NULL,
    dns_name VARCHAR(255) NOT NULL,
    last_seen DATE NOT NULL,
    CONSTRAINT uniq_intent UNIQUE (client_name, client_namespace, client_kind, dns_name)
)
"#;

/// SQL for creating the intents table on MySQL.
pub const CREATE_INTENTS_TABLE_MYSQL: &str = r#"
CREATE TABLE IF NOT EXISTS external_traffic_intents (
    id BIGINT AUTO_INCREMENT PRIMARY KEY,
    client_name VARCHAR(128) NOT NULL,
    client_namespace VARCHAR(128) NOT NULL,
    client_kind VARCHAR(128) NOT NULL,
    dns_name VARCHAR(255) NOT NULL,
    last_seen DATE NOT NULL,
    UNIQUE KEY uniq_intent (client_name, client_namespace, client_kind, dns_name)
)
"#;
