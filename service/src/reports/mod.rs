//! Read-only report endpoints. Each one renders a `%SCHEMA%` template for the
//! requested instance environment, runs it through [`run_report`], and
//! projects the returned rows into its response shape.

pub mod ecal;
pub mod manager;
pub mod sts;

use crate::errors::{ApiError, ReportError};
use crate::metrics_defs::{REPORT_FAILURES, REPORT_ROWS};
use crate::state::AppState;
use axum::Json;
use refdata::store::JsonRow;
use serde::Serialize;
use serde_json::Value;
use shared::{counter, histogram};

pub const SCHEMA_PLACEHOLDER: &str = "%SCHEMA%";

#[derive(Serialize, Debug, PartialEq)]
pub struct Items<T> {
    pub items: Vec<T>,
}

/// Resolves the schema, renders the template and runs it. Every failure is
/// logged here and surfaces to the caller as the generic report error.
pub(crate) async fn run_report(
    state: &AppState,
    report: &'static str,
    instance_env: &str,
    template: &str,
    order_by: Option<&str>,
    binds: &[String],
) -> Result<Vec<JsonRow>, ApiError> {
    match query(state, instance_env, template, order_by, binds).await {
        Ok(rows) => {
            tracing::debug!(report, instance_env, rows = rows.len(), "report query finished");
            histogram!(REPORT_ROWS, "report" => report).record(rows.len() as f64);
            Ok(rows)
        }
        Err(error) => {
            tracing::error!(report, instance_env, ?binds, error = %error, "report query failed");
            counter!(REPORT_FAILURES, "report" => report).increment(1);
            Err(error.into())
        }
    }
}

async fn query(
    state: &AppState,
    instance_env: &str,
    template: &str,
    order_by: Option<&str>,
    binds: &[String],
) -> Result<Vec<JsonRow>, ReportError> {
    if instance_env.is_empty() {
        return Err(ReportError::MissingEnvironment);
    }
    let schema = state
        .schemas
        .resolve(instance_env)
        .ok_or_else(|| ReportError::UnknownEnvironment(instance_env.to_string()))?;
    let sql = template.replace(SCHEMA_PLACEHOLDER, schema);
    Ok(state.store.query_json(&sql, order_by, binds).await?)
}

pub(crate) fn items<T>(rows: Vec<JsonRow>, project: impl Fn(&JsonRow) -> T) -> Json<Items<T>> {
    Json(Items {
        items: rows.iter().map(project).collect(),
    })
}

/// Column value as returned, `null` when the column is absent.
pub(crate) fn column(row: &JsonRow, name: &str) -> Value {
    row.get(name).cloned().unwrap_or(Value::Null)
}

/// Column value rendered as text; `null` renders as an empty string.
pub(crate) fn text(row: &JsonRow, name: &str) -> String {
    match row.get(name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Integer flag column; `null` and anything unparseable count as 0.
pub(crate) fn int(row: &JsonRow, name: &str) -> i64 {
    match row.get(name) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        Some(Value::Bool(b)) => i64::from(*b),
        _ => 0,
    }
}

pub(crate) fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

#[cfg(test)]
pub(crate) fn row(value: Value) -> JsonRow {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_rendering() {
        let r = row(json!({"s": "x", "n": 12, "f": 1.5, "z": null}));
        assert_eq!(text(&r, "s"), "x");
        assert_eq!(text(&r, "n"), "12");
        assert_eq!(text(&r, "f"), "1.5");
        assert_eq!(text(&r, "z"), "");
        assert_eq!(text(&r, "missing"), "");
    }

    #[test]
    fn int_rendering() {
        let r = row(json!({"n": 1, "s": "1", "f": 1.0, "z": null, "junk": "yes"}));
        assert_eq!(int(&r, "n"), 1);
        assert_eq!(int(&r, "s"), 1);
        assert_eq!(int(&r, "f"), 1);
        assert_eq!(int(&r, "z"), 0);
        assert_eq!(int(&r, "junk"), 0);
    }

    #[test]
    fn admin_flag() {
        assert!(is_truthy("TRUE"));
        assert!(is_truthy("Yes"));
        assert!(!is_truthy("1"));
        assert!(!is_truthy(""));
    }
}
