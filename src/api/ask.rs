//! `/ask` endpoint

use super::error::ApiError;
use super::AppContext;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use casebook_search::{effective_top_k, Match};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// Parsed `/ask` request body
#[derive(Debug, PartialEq)]
pub struct AskRequest {
    pub query: String,
    /// Requested match count before clamping
    pub top_k: Option<i64>,
}

impl AskRequest {
    /// Validate a decoded JSON body.
    ///
    /// `top_k` accepts integers, integral floats and numeric strings; `null`
    /// counts as absent.
    pub fn from_json(body: Value) -> Result<Self, ApiError> {
        let Value::Object(mut fields) = body else {
            return Err(ApiError::BadRequest(
                "request body must be a JSON object".to_string(),
            ));
        };

        let query = match fields.remove("query") {
            Some(Value::String(query)) => query,
            Some(_) => {
                return Err(ApiError::BadRequest("`query` must be a string".to_string()));
            }
            None => return Err(ApiError::BadRequest("`query` is required".to_string())),
        };

        let top_k = match fields.remove("top_k") {
            None | Some(Value::Null) => None,
            Some(value) => Some(coerce_top_k(&value).ok_or_else(|| {
                ApiError::Validation(format!("`top_k` must be an integer, got {}", value))
            })?),
        };

        Ok(Self { query, top_k })
    }
}

fn coerce_top_k(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

/// `/ask` response body
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub query: String,
    /// Effective match count after clamping
    pub top_k: usize,
    pub matches: Vec<Match>,
}

impl AskResponse {
    pub fn new(query: &str, requested_top_k: i64, matches: Vec<Match>) -> Self {
        Self {
            query: query.trim().to_string(),
            top_k: effective_top_k(requested_top_k),
            matches,
        }
    }
}

#[instrument(skip_all)]
async fn ask(
    State(context): State<Arc<AppContext>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(body) = payload?;
    let request = AskRequest::from_json(body)?;
    let requested = request.top_k.unwrap_or(context.default_top_k);

    let matches = context.engine.search(&request.query, requested).await?;
    Ok(Json(AskResponse::new(&request.query, requested, matches)))
}

/// Ask routes
pub fn ask_routes() -> Router<Arc<AppContext>> {
    Router::new().route("/ask", post(ask))
}
