//! Template pipeline functions
//!
//! The extended function set available after a `|` in a placeholder:
//! string helpers, encodings, a digest, date formatting, and list access.
//! The piped value is passed as the last argument, Go-template style.

use crate::template::errors::TemplateError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Applies a named function to the piped value
///
/// # Errors
///
/// Returns [`TemplateError::UnknownFunction`] for unrecognized names and
/// [`TemplateError::FunctionFailed`] when the value is incompatible.
pub fn apply(name: &str, args: &[String], input: Value) -> Result<Value, TemplateError> {
    match name {
        "upper" => Ok(Value::String(stringify(&input).to_uppercase())),
        "lower" => Ok(Value::String(stringify(&input).to_lowercase())),
        "title" => Ok(Value::String(title_case(&stringify(&input)))),
        "trim" => Ok(Value::String(stringify(&input).trim().to_string())),
        "trimSuffix" => {
            let suffix = arg(name, args, 0)?;
            let text = stringify(&input);
            Ok(Value::String(
                text.strip_suffix(suffix).unwrap_or(&text).to_string(),
            ))
        }
        "trimPrefix" => {
            let prefix = arg(name, args, 0)?;
            let text = stringify(&input);
            Ok(Value::String(
                text.strip_prefix(prefix).unwrap_or(&text).to_string(),
            ))
        }
        "replace" => {
            let from = arg(name, args, 0)?;
            let to = arg(name, args, 1)?;
            Ok(Value::String(stringify(&input).replace(from, to)))
        }
        "quote" => Ok(Value::String(format!("\"{}\"", stringify(&input)))),
        "squote" => Ok(Value::String(format!("'{}'", stringify(&input)))),
        "b64enc" => Ok(Value::String(STANDARD.encode(stringify(&input)))),
        "b64dec" => {
            let decoded =
                STANDARD
                    .decode(stringify(&input))
                    .map_err(|e| TemplateError::FunctionFailed {
                        name: name.to_string(),
                        reason: e.to_string(),
                    })?;
            Ok(Value::String(
                String::from_utf8_lossy(&decoded).into_owned(),
            ))
        }
        "sha256sum" => {
            let mut hasher = Sha256::new();
            hasher.update(stringify(&input).as_bytes());
            Ok(Value::String(
                hasher
                    .finalize()
                    .iter()
                    .map(|b| format!("{b:02x}"))
                    .collect(),
            ))
        }
        "date" => {
            let format = arg(name, args, 0)?;
            let text = stringify(&input);
            let parsed = DateTime::parse_from_rfc3339(&text).map_err(|e| {
                TemplateError::FunctionFailed {
                    name: name.to_string(),
                    reason: format!("'{text}' is not an RFC 3339 timestamp: {e}"),
                }
            })?;
            Ok(Value::String(parsed.format(format).to_string()))
        }
        "join" => {
            let separator = arg(name, args, 0)?;
            let items = as_list(name, &input)?;
            let joined: Vec<String> = items.iter().map(stringify).collect();
            Ok(Value::String(joined.join(separator)))
        }
        "first" => Ok(as_list(name, &input)?
            .first()
            .cloned()
            .unwrap_or(Value::Null)),
        "last" => Ok(as_list(name, &input)?
            .last()
            .cloned()
            .unwrap_or(Value::Null)),
        "default" => {
            let fallback = arg(name, args, 0)?;
            let empty = matches!(&input, Value::Null)
                || matches!(&input, Value::String(s) if s.is_empty());
            if empty {
                Ok(Value::String(fallback.to_string()))
            } else {
                Ok(input)
            }
        }
        other => Err(TemplateError::UnknownFunction {
            name: other.to_string(),
        }),
    }
}

/// Leading functions usable without a piped value (e.g. `{{ now }}`)
///
/// # Errors
///
/// Returns [`TemplateError::UnknownFunction`] for unrecognized names.
pub fn apply_leading(name: &str, args: &[String]) -> Result<Value, TemplateError> {
    match name {
        "now" => Ok(Value::String(Utc::now().to_rfc3339())),
        other => apply(other, args, Value::Null),
    }
}

/// Stringifies a value the way the renderer does
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "<no value>".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn arg<'a>(name: &str, args: &'a [String], index: usize) -> Result<&'a str, TemplateError> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| TemplateError::FunctionFailed {
            name: name.to_string(),
            reason: format!("argument {} is missing", index + 1),
        })
}

fn as_list<'a>(name: &str, value: &'a Value) -> Result<&'a Vec<Value>, TemplateError> {
    value.as_array().ok_or_else(|| TemplateError::FunctionFailed {
        name: name.to_string(),
        reason: "value is not a list".to_string(),
    })
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
