//! Success envelopes: `{"status":"success","data":{"<key>":...}}`.

use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::db::ListQuery;
use crate::error::AppError;

fn to_value(value: impl Serialize) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(format!("serialize response: {e}")))
}

fn data(key: &str, value: Value) -> Value {
    let mut data = Map::new();
    data.insert(key.to_string(), value);
    Value::Object(data)
}

/// `{"status":"success","data":{key: value}}`
///
/// # Errors
///
/// Returns `AppError::Internal` if `value` fails to serialize.
pub fn one(key: &str, value: impl Serialize) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({
        "status": "success",
        "data": data(key, to_value(value)?),
    })))
}

/// `{"status":"success","results":n,"data":{key: [...]}}`, with the query's
/// field selection applied to every record.
///
/// # Errors
///
/// Returns `AppError::Internal` if a record fails to serialize.
pub fn many<T: Serialize>(key: &str, records: Vec<T>, query: &ListQuery) -> Result<Json<Value>, AppError> {
    let records = records
        .into_iter()
        .map(|record| to_value(record).map(|value| query.project(value)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(json!({
        "status": "success",
        "results": records.len(),
        "data": data(key, Value::Array(records)),
    })))
}

/// `{"status":"success","token":..., "data":{"user":...}}`
///
/// # Errors
///
/// Returns `AppError::Internal` if the user fails to serialize.
pub fn with_token(token: &str, user: impl Serialize) -> Result<Json<Value>, AppError> {
    Ok(Json(json!({
        "status": "success",
        "token": token,
        "data": data("user", to_value(user)?),
    })))
}

/// `{"status":"success","message":...}`
#[must_use]
pub fn message(text: &str) -> Json<Value> {
    Json(json!({ "status": "success", "message": text }))
}
