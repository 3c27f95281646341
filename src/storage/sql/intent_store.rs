//! Unified SQL IntentStore implementation.
//!
//! Uses a macro to generate implementations for each SQL backend,
//! eliminating code duplication while maintaining type safety.

use std::marker::PhantomData;

use super::SqlDatabase;

/// SQL-based implementation of IntentStore.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite, MySQL).
pub struct SqlIntentStore<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlIntentStore<DB> {
    /// Create a new SQL intent store with the given pool.
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }
}

/// Restrict a statement to the row identified by `key`.
macro_rules! where_key {
    ($stmt:expr, $key:expr) => {{
        use crate::storage::schema::ExternalTrafficIntents as T;
        use sea_query::Expr;

        $stmt
            .and_where(Expr::col(T::ClientName).eq($key.client_name.as_str()))
            .and_where(Expr::col(T::ClientNamespace).eq($key.client_namespace.as_str()))
            .and_where(Expr::col(T::ClientKind).eq($key.client_kind.as_str()))
            .and_where(Expr::col(T::DnsName).eq($key.dns_name.as_str()))
    }};
}

/// Macro to implement IntentStore for a specific SQL backend.
///
/// This eliminates duplication between the PostgreSQL, SQLite and MySQL
/// implementations while maintaining full type safety.
macro_rules! impl_intent_store {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::IntentStore for SqlIntentStore<$db_type> {
            async fn init(&self) -> crate::storage::Result<()> {
                sqlx::query(<$db_type as SqlDatabase>::CREATE_INTENTS_TABLE)
                    .execute(&self.pool)
                    .await?;
                tracing::debug!(
                    backend = <$db_type as SqlDatabase>::NAME,
                    "Intents table ready"
                );
                Ok(())
            }

            async fn exists(
                &self,
                key: &crate::intent::DedupKey,
            ) -> crate::storage::Result<bool> {
                use sea_query::Query;

                use crate::storage::schema::ExternalTrafficIntents as T;

                // Statements are not Send; build the SQL before awaiting.
                let sql = {
                    let mut stmt = Query::select();
                    stmt.column(T::Id).from(T::Table);
                    where_key!(stmt, key);
                    stmt.limit(1);
                    <$db_type>::build_select(stmt)
                };
                let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
                Ok(row.is_some())
            }

            async fn insert(
                &self,
                key: &crate::intent::DedupKey,
                last_seen: chrono::NaiveDate,
            ) -> crate::storage::Result<()> {
                use sea_query::{OnConflict, Query};

                use crate::storage::schema::{date_literal, ExternalTrafficIntents as T, KEY_COLUMNS};

                let stmt = Query::insert()
                    .into_table(T::Table)
                    .columns([
                        T::ClientName,
                        T::ClientNamespace,
                        T::ClientKind,
                        T::DnsName,
                        T::LastSeen,
                    ])
                    .values_panic([
                        key.client_name.as_str().into(),
                        key.client_namespace.as_str().into(),
                        key.client_kind.as_str().into(),
                        key.dns_name.as_str().into(),
                        date_literal(last_seen).into(),
                    ])
                    .on_conflict(
                        OnConflict::columns(KEY_COLUMNS)
                            .update_column(T::LastSeen)
                            .to_owned(),
                    )
                    .to_owned();

                let sql = <$db_type>::build_insert(stmt);
                sqlx::query(&sql).execute(&self.pool).await?;

                Ok(())
            }

            async fn touch(
                &self,
                key: &crate::intent::DedupKey,
                last_seen: chrono::NaiveDate,
            ) -> crate::storage::Result<u64> {
                use sea_query::Query;

                use crate::storage::schema::{date_literal, ExternalTrafficIntents as T};

                let sql = {
                    let mut stmt = Query::update();
                    stmt.table(T::Table)
                        .value(T::LastSeen, date_literal(last_seen));
                    where_key!(stmt, key);
                    <$db_type>::build_update(stmt)
                };
                let result = sqlx::query(&sql).execute(&self.pool).await?;
                Ok(result.rows_affected())
            }

            async fn delete_seen_before(
                &self,
                cutoff: chrono::NaiveDate,
            ) -> crate::storage::Result<u64> {
                use sea_query::{Expr, Query};

                use crate::storage::schema::{date_literal, ExternalTrafficIntents as T};

                let stmt = Query::delete()
                    .from_table(T::Table)
                    .and_where(Expr::col(T::LastSeen).lt(date_literal(cutoff)))
                    .to_owned();

                let sql = <$db_type>::build_delete(stmt);
                let result = sqlx::query(&sql).execute(&self.pool).await?;
                Ok(result.rows_affected())
            }

            async fn list_all(
                &self,
            ) -> crate::storage::Result<Vec<crate::storage::IntentRecord>> {
                use sea_query::{Order, Query};

                use crate::storage::schema::ExternalTrafficIntents as T;

                let stmt = Query::select()
                    .columns([
                        T::Id,
                        T::ClientName,
                        T::ClientNamespace,
                        T::ClientKind,
                        T::DnsName,
                        T::LastSeen,
                    ])
                    .from(T::Table)
                    .order_by(T::LastSeen, Order::Desc)
                    .order_by(T::Id, Order::Asc)
                    .to_owned();

                let sql = <$db_type>::build_select(stmt);
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
                rows.iter().map(|row| decode_record!(row)).collect()
            }

            async fn list_seen_since(
                &self,
                since: chrono::NaiveDate,
            ) -> crate::storage::Result<Vec<crate::storage::IntentRecord>> {
                use sea_query::{Expr, Order, Query};

                use crate::storage::schema::{date_literal, ExternalTrafficIntents as T};

                let stmt = Query::select()
                    .columns([
                        T::Id,
                        T::ClientName,
                        T::ClientNamespace,
                        T::ClientKind,
                        T::DnsName,
                        T::LastSeen,
                    ])
                    .from(T::Table)
                    .and_where(Expr::col(T::LastSeen).gte(date_literal(since)))
                    .order_by(T::LastSeen, Order::Desc)
                    .to_owned();

                let sql = <$db_type>::build_select(stmt);
                let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
                rows.iter().map(|row| decode_record!(row)).collect()
            }
        }
    };
}

/// Decode one row into an `IntentRecord`.
macro_rules! decode_record {
    ($row:expr) => {{
        use sqlx::Row;

        Ok::<_, crate::storage::StorageError>(crate::storage::IntentRecord {
            id: $row.try_get("id")?,
            client_name: $row.try_get("client_name")?,
            client_namespace: $row.try_get("client_namespace")?,
            client_kind: $row.try_get("client_kind")?,
            dns_name: $row.try_get("dns_name")?,
            last_seen: $row.try_get("last_seen")?,
        })
    }};
}

// Generate implementations for each SQL backend
#[cfg(feature = "postgres")]
impl_intent_store!(super::postgres::Postgres, "postgres");
#[cfg(feature = "sqlite")]
impl_intent_store!(super::sqlite::Sqlite, "sqlite");
#[cfg(feature = "mysql")]
impl_intent_store!(super::mysql::Mysql, "mysql");
