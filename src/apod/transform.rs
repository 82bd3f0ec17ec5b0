use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::{NewDailyRecord, DEFAULT_MEDIA_TYPE};

/// Reshapes an APOD response into a record for `apod_data`.
///
/// `title` and `date` are required; a response missing either is rejected
/// whole. Blank optional fields are stored as NULL, and a missing
/// `media_type` falls back to [`DEFAULT_MEDIA_TYPE`]. Some API modes answer
/// with a list, in which case only the first entry is used.
pub fn transform(response: &Value) -> Result<NewDailyRecord> {
    let entry = match response {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| AppError::Validation("response is an empty list".to_string()))?,
        other => other,
    };

    let fields = entry
        .as_object()
        .ok_or_else(|| AppError::Validation(format!("expected a JSON object, got {}", kind(entry))))?;

    let title = text_field(fields, "title")?
        .ok_or_else(|| AppError::Validation("missing title".to_string()))?;

    let date = text_field(fields, "date")?
        .ok_or_else(|| AppError::Validation("missing date".to_string()))?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| AppError::Validation(format!("invalid date {:?}: {}", date, e)))?;

    Ok(NewDailyRecord {
        title,
        explanation: text_field(fields, "explanation")?,
        url: text_field(fields, "url")?,
        date,
        media_type: text_field(fields, "media_type")?
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()),
    })
}

/// Absent, null and blank all read as `None`; non-string values are rejected.
fn text_field(fields: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(AppError::Validation(format!(
            "field {} should be a string, got {}",
            key,
            kind(other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
