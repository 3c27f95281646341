//! Unified SQL storage implementations.
//!
//! This module provides a shared `IntentStore` implementation for SQL-based
//! backends (PostgreSQL, SQLite, MySQL). The implementation is parameterized
//! by database type using the `SqlDatabase` trait.

mod intent_store;
mod query;

pub use intent_store::SqlIntentStore;
pub use query::SqlDatabase;

/// Generates a backend marker type and its `SqlDatabase` impl.
macro_rules! sql_backend {
    ($marker:ident, $pool:ty, $builder:expr, $name:literal, $ddl:path) => {
        /// Database marker type.
        pub struct $marker;

        impl super::SqlDatabase for $marker {
            type Pool = $pool;

            const NAME: &'static str = $name;
            const CREATE_INTENTS_TABLE: &'static str = $ddl;

            fn build_select(stmt: sea_query::SelectStatement) -> String {
                stmt.to_string($builder)
            }

            fn build_insert(stmt: sea_query::InsertStatement) -> String {
                stmt.to_string($builder)
            }

            fn build_update(stmt: sea_query::UpdateStatement) -> String {
                stmt.to_string($builder)
            }

            fn build_delete(stmt: sea_query::DeleteStatement) -> String {
                stmt.to_string($builder)
            }
        }
    };
}

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.

    sql_backend!(
        Postgres,
        sqlx::PgPool,
        sea_query::PostgresQueryBuilder,
        "postgres",
        crate::storage::schema::CREATE_INTENTS_TABLE_POSTGRES
    );

    /// PostgreSQL intent store.
    pub type PostgresIntentStore = super::SqlIntentStore<Postgres>;
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.

    sql_backend!(
        Sqlite,
        sqlx::SqlitePool,
        sea_query::SqliteQueryBuilder,
        "sqlite",
        crate::storage::schema::CREATE_INTENTS_TABLE_SQLITE
    );

    /// SQLite intent store.
    pub type SqliteIntentStore = super::SqlIntentStore<Sqlite>;
}

#[cfg(feature = "mysql")]
pub mod mysql {
    //! MySQL database backend.

    sql_backend!(
        Mysql,
        sqlx::MySqlPool,
        sea_query::MysqlQueryBuilder,
        "mysql",
        crate::storage::schema::CREATE_INTENTS_TABLE_MYSQL
    );

    /// MySQL intent store.
    pub type MysqlIntentStore = super::SqlIntentStore<Mysql>;
}
