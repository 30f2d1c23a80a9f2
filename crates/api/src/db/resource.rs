//! Generic table access shared by every REST resource.
//!
//! A [`Resource`] describes how to read a table (select statement with its
//! joins, whitelisted fields, JSON keys). A [`Writable`] resource also knows
//! how to turn validated create/update payloads into column assignments.
//! [`ResourceRepository`] implements list/get/create/update/delete once for
//! all of them.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use super::RepositoryError;
use super::query::{Field, ListQuery};
use crate::models::ValidationError;

/// A value bound into a dynamically built statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i32),
    Decimal(Decimal),
    Float(f64),
    Timestamp(DateTime<Utc>),
    /// Label of a Postgres enum type, bound as text and cast.
    Enum {
        value: String,
        type_name: &'static str,
    },
    /// Written as a literal `NULL`.
    Null,
}

impl SqlValue {
    /// `Text` for `Some`, `Null` for `None`.
    #[must_use]
    pub fn text_or_null(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

/// Column assignment produced from a payload.
pub type Assignment = (&'static str, SqlValue);

/// Push a bound value, with an enum cast or a literal `NULL` where needed.
pub fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: SqlValue) {
    match value {
        SqlValue::Text(v) => {
            builder.push_bind(v);
        }
        SqlValue::Int(v) => {
            builder.push_bind(v);
        }
        SqlValue::Decimal(v) => {
            builder.push_bind(v);
        }
        SqlValue::Float(v) => {
            builder.push_bind(v);
        }
        SqlValue::Timestamp(v) => {
            builder.push_bind(v);
        }
        SqlValue::Enum { value, type_name } => {
            builder.push_bind(value).push("::").push(type_name);
        }
        SqlValue::Null => {
            builder.push("NULL");
        }
    }
}

/// Extra row restriction applied on top of a resource's own scope.
#[derive(Debug, Clone)]
pub enum Scope {
    Eq(&'static str, SqlValue),
    IsNull(&'static str),
}

fn push_scopes(builder: &mut QueryBuilder<'_, Postgres>, scopes: &[Scope]) {
    for scope in scopes {
        builder.push(" AND ");
        match scope {
            Scope::Eq(column, value) => {
                builder.push(*column).push(" = ");
                push_value(builder, value.clone());
            }
            Scope::IsNull(column) => {
                builder.push(*column).push(" IS NULL");
            }
        }
    }
}

/// Read side of a REST resource.
pub trait Resource: Send + Sync + 'static {
    type Id: Copy + Into<i32> + std::str::FromStr + Send + Sync;
    type Record: for<'r> FromRow<'r, PgRow> + Serialize + Send + Unpin;

    /// Table written by create/update/delete.
    const TABLE: &'static str;
    /// JSON key for one record (`"product"`).
    const SINGULAR: &'static str;
    /// JSON key for a list (`"products"`).
    const PLURAL: &'static str;
    /// `SELECT ... FROM <table> <alias> [JOIN ...]`, without a `WHERE`.
    const SELECT: &'static str;
    /// Id column in `SELECT`'s aliases.
    const ID_COLUMN: &'static str;
    /// Always-on row restriction (e.g. hide deactivated accounts).
    const SCOPE: &'static str = "TRUE";
    /// Fields usable in filters, sorting and projections.
    const FIELDS: &'static [Field];
}

/// Write side of a REST resource.
pub trait Writable: Resource {
    type Create: Send;
    type Update: Send;

    /// Validate a create payload into column assignments.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` listing every rule the payload breaks.
    fn create_values(input: Self::Create) -> Result<Vec<Assignment>, ValidationError>;

    /// Validate an update payload into column assignments.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` listing every rule the payload breaks.
    fn update_values(input: Self::Update) -> Result<Vec<Assignment>, ValidationError>;
}

/// Generic repository over any [`Resource`].
pub struct ResourceRepository<'a, R> {
    pool: &'a PgPool,
    resource: PhantomData<R>,
}

impl<'a, R: Resource> ResourceRepository<'a, R> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            resource: PhantomData,
        }
    }

    fn select(scopes: &[Scope]) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(R::SELECT);
        builder.push(" WHERE ").push(R::SCOPE);
        push_scopes(&mut builder, scopes);
        builder
    }

    /// Filtered, sorted, paginated page of records.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Query` for invalid query parameters and
    /// `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        query: &ListQuery,
        scopes: &[Scope],
    ) -> Result<Vec<R::Record>, RepositoryError> {
        query.validate_fields(R::FIELDS)?;

        let mut builder = Self::select(scopes);
        query.push_filters(&mut builder, R::FIELDS)?;
        query.push_order(&mut builder, R::FIELDS, R::ID_COLUMN)?;
        query.push_pagination(&mut builder);

        let records = builder
            .build_query_as::<R::Record>()
            .fetch_all(self.pool)
            .await?;
        Ok(records)
    }

    /// One record by id, if visible under `scopes`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: R::Id,
        scopes: &[Scope],
    ) -> Result<Option<R::Record>, RepositoryError> {
        let mut builder = Self::select(scopes);
        builder
            .push(" AND ")
            .push(R::ID_COLUMN)
            .push(" = ")
            .push_bind(Into::<i32>::into(id));

        let record = builder
            .build_query_as::<R::Record>()
            .fetch_optional(self.pool)
            .await?;
        Ok(record)
    }

    /// Delete a record.
    ///
    /// Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidReference` if other rows still point
    /// at it and `RepositoryError::Database` for other failures.
    pub async fn delete(&self, id: R::Id) -> Result<bool, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM ");
        builder
            .push(R::TABLE)
            .push(" WHERE id = ")
            .push_bind(Into::<i32>::into(id));

        let result = builder.build().execute(self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

impl<R: Writable> ResourceRepository<'_, R> {
    /// Insert a row and return the full record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on unique violations,
    /// `RepositoryError::InvalidReference` on unknown foreign keys and
    /// `RepositoryError::Database` for other failures.
    pub async fn create(&self, values: Vec<Assignment>) -> Result<R::Record, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO ");
        builder.push(R::TABLE);

        if values.is_empty() {
            builder.push(" DEFAULT VALUES");
        } else {
            builder.push(" (");
            for (i, (column, _)) in values.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                builder.push(*column);
            }
            builder.push(") VALUES (");
            for (i, (_, value)) in values.into_iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_value(&mut builder, value);
            }
            builder.push(")");
        }
        builder.push(" RETURNING id");

        let id = builder
            .build_query_scalar::<i32>()
            .fetch_one(self.pool).await?;
        self.fetch_written(id).await
    }

    /// Apply assignments to a row and return the updated record.
    ///
    /// An empty assignment list returns the current record unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create`].
    pub async fn update(
        &self,
        id: R::Id,
        values: Vec<Assignment>,
    ) -> Result<Option<R::Record>, RepositoryError> {
        if values.is_empty() {
            return self.get(id, &[]).await;
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE ");
        builder.push(R::TABLE).push(" SET ");
        for (i, (column, value)) in values.into_iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(column).push(" = ");
            push_value(&mut builder, value);
        }
        builder
            .push(" WHERE id = ")
            .push_bind(Into::<i32>::into(id));
        builder.push(" RETURNING id");

        let updated = builder
            .build_query_scalar::<i32>()
            .fetch_optional(self.pool)
            .await?;
        match updated {
            Some(id) => self.fetch_written(id).await.map(Some),
            None => Ok(None),
        }
    }

    async fn fetch_written(&self, id: i32) -> Result<R::Record, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new(R::SELECT);
        builder
            .push(" WHERE ")
            .push(R::ID_COLUMN)
            .push(" = ")
            .push_bind(id);

        builder
            .build_query_as::<R::Record>()
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!("{} {id} vanished after write", R::SINGULAR))
            })
    }
}
