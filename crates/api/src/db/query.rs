//! List query parsing: filtering, sorting, field selection and pagination.
//!
//! Query strings look like
//! `?price[gte]=10&category=2&sort=-price,name&fields=name,price&page=2&limit=20`.
//! Every key other than `page`, `limit`, `sort` and `fields` is a filter.
//! Field names are checked against a per-resource whitelist, which also
//! supplies the SQL column and the type used to parse filter values. Values
//! are always bound as parameters.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use thiserror::Error;

use super::resource::{SqlValue, push_value};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 100;
const DEFAULT_SORT: &str = "-createdAt";

/// A queryable field of a resource.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// Name as it appears in JSON and query strings.
    pub name: &'static str,
    /// SQL column expression in the resource's select statement.
    pub column: &'static str,
    pub kind: FieldKind,
}

impl Field {
    #[must_use]
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
    Float,
    Timestamp,
    /// A Postgres enum type and its labels.
    Enum {
        type_name: &'static str,
        variants: &'static [&'static str],
    },
}

/// Errors from resolving a list query against a resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Invalid field: {0}")]
    UnknownField(String),
    #[error("Invalid operator [{operator}] for field {field}")]
    UnknownOperator { field: String, operator: String },
    #[error("Invalid {field}: {value}")]
    InvalidValue { field: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            _ => None,
        }
    }

    const fn sql(self) -> &'static str {
        match self {
            Self::Eq => " = ",
            Self::Ne => " <> ",
            Self::Gt => " > ",
            Self::Gte => " >= ",
            Self::Lt => " < ",
            Self::Lte => " <= ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Filter {
    field: String,
    operator: String,
    value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SortKey {
    field: String,
    descending: bool,
}

/// Parsed list query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    sort: Vec<SortKey>,
    fields: Option<Vec<String>>,
    filters: Vec<Filter>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::from_pairs(Vec::new())
    }
}

impl ListQuery {
    /// Build from decoded query string pairs.
    ///
    /// Unparsable `page`/`limit` values fall back to their defaults; field
    /// names are only checked later against a resource.
    #[must_use]
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut page = DEFAULT_PAGE;
        let mut limit = DEFAULT_LIMIT;
        let mut sort = None;
        let mut fields = None;
        let mut filters = Vec::new();

        for (key, value) in pairs {
            match key.as_str() {
                "page" => page = value.trim().parse::<u32>().unwrap_or(DEFAULT_PAGE).max(1),
                "limit" => {
                    limit = value
                        .trim()
                        .parse::<u32>()
                        .unwrap_or(DEFAULT_LIMIT)
                        .clamp(1, MAX_LIMIT);
                }
                "sort" => sort = Some(value),
                "fields" => fields = Some(split_list(&value).map(str::to_string).collect()),
                _ => {
                    let (field, operator) = match key.split_once('[') {
                        Some((field, rest)) => (field, rest.trim_end_matches(']')),
                        None => (key.as_str(), "eq"),
                    };
                    filters.push(Filter {
                        field: field.to_string(),
                        operator: operator.to_string(),
                        value,
                    });
                }
            }
        }

        let sort = split_list(sort.as_deref().unwrap_or(DEFAULT_SORT))
            .map(|key| match key.strip_prefix('-') {
                Some(field) => SortKey {
                    field: field.to_string(),
                    descending: true,
                },
                None => SortKey {
                    field: key.trim_start_matches('+').to_string(),
                    descending: false,
                },
            })
            .collect();

        Self {
            page,
            limit,
            sort,
            fields,
            filters,
        }
    }

    /// Offset of the first row on the requested page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        (u64::from(self.page) - 1) * u64::from(self.limit)
    }

    /// Append ` AND <column> <op> $n` for every filter.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` for unknown fields or operators and for values
    /// that do not parse as the field's type.
    pub fn push_filters(
        &self,
        builder: &mut QueryBuilder<'_, Postgres>,
        fields: &[Field],
    ) -> Result<(), QueryError> {
        for filter in &self.filters {
            let field = lookup(fields, &filter.field)?;
            let operator =
                Operator::parse(&filter.operator).ok_or_else(|| QueryError::UnknownOperator {
                    field: filter.field.clone(),
                    operator: filter.operator.clone(),
                })?;
            let value = parse_value(field, &filter.value)?;

            builder.push(" AND ").push(field.column).push(operator.sql());
            push_value(builder, value);
        }
        Ok(())
    }

    /// Append ` ORDER BY ...`, always ending with the id as a tiebreaker.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::UnknownField` for fields outside the whitelist.
    pub fn push_order(
        &self,
        builder: &mut QueryBuilder<'_, Postgres>,
        fields: &[Field],
        id_column: &str,
    ) -> Result<(), QueryError> {
        builder.push(" ORDER BY ");
        for key in &self.sort {
            let field = lookup(fields, &key.field)?;
            if field.column == id_column {
                continue;
            }
            builder
                .push(field.column)
                .push(if key.descending { " DESC, " } else { " ASC, " });
        }
        let id_descending = self
            .sort
            .iter()
            .find(|key| lookup(fields, &key.field).is_ok_and(|f| f.column == id_column))
            .is_some_and(|key| key.descending);
        builder
            .push(id_column)
            .push(if id_descending { " DESC" } else { " ASC" });
        Ok(())
    }

    /// Append ` LIMIT $n OFFSET $m`.
    pub fn push_pagination(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder
            .push(" LIMIT ")
            .push_bind(i64::from(self.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(self.offset()).unwrap_or(i64::MAX));
    }

    /// Check that every requested output field exists.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::UnknownField` for the first unknown name.
    pub fn validate_fields(&self, fields: &[Field]) -> Result<(), QueryError> {
        for name in self.fields.iter().flatten() {
            lookup(fields, name)?;
        }
        Ok(())
    }

    /// Keep only the requested fields (plus `id`) of a serialized record.
    #[must_use]
    pub fn project(&self, value: Value) -> Value {
        let (Some(wanted), Value::Object(map)) = (&self.fields, &value) else {
            return value;
        };
        let kept = map
            .iter()
            .filter(|(key, _)| key.as_str() == "id" || wanted.iter().any(|w| w == *key))
            .map(|(key, v)| (key.clone(), v.clone()))
            .collect();
        Value::Object(kept)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn lookup<'f>(fields: &'f [Field], name: &str) -> Result<&'f Field, QueryError> {
    fields
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| QueryError::UnknownField(name.to_string()))
}

fn parse_value(field: &Field, raw: &str) -> Result<SqlValue, QueryError> {
    let invalid = || QueryError::InvalidValue {
        field: field.name.to_string(),
        value: raw.to_string(),
    };
    let trimmed = raw.trim();

    Ok(match field.kind {
        FieldKind::Text => SqlValue::Text(raw.to_string()),
        FieldKind::Integer => SqlValue::Int(trimmed.parse().map_err(|_| invalid())?),
        FieldKind::Decimal => SqlValue::Decimal(trimmed.parse::<Decimal>().map_err(|_| invalid())?),
        FieldKind::Float => SqlValue::Float(
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(invalid)?,
        ),
        FieldKind::Timestamp => SqlValue::Timestamp(parse_timestamp(trimmed).ok_or_else(invalid)?),
        FieldKind::Enum {
            type_name,
            variants,
        } => {
            if !variants.contains(&trimmed) {
                return Err(invalid());
            }
            SqlValue::Enum {
                value: trimmed.to_string(),
                type_name,
            }
        }
    })
}

/// RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
