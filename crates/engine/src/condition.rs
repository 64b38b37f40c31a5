//! Preconditions: typed predicates over an instance's context document.
//!
//! Each variant addresses the context with a JSON pointer (RFC 6901).  A
//! negative answer is `Ok(false)`; an [`EvaluationError`] means the context
//! does not carry the data the condition needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EvaluationError;

/// A precondition attached to an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Precondition {
    /// The pointer resolves to a non-null value.
    Present { pointer: String },
    /// The pointer resolves to exactly `value`.
    Equals { pointer: String, value: Value },
    /// The pointer resolves to a code (string) or list of codes, at least one
    /// of which is in `codes`.
    CodeIn { pointer: String, codes: Vec<String> },
    /// The pointer resolves to an RFC 3339 timestamp at least `seconds` old.
    ElapsedSince { pointer: String, seconds: i64 },
}

impl Precondition {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Present { .. } => "present",
            Self::Equals { .. } => "equals",
            Self::CodeIn { .. } => "code_in",
            Self::ElapsedSince { .. } => "elapsed_since",
        }
    }

    /// Evaluate against `context`.
    pub fn evaluate(&self, context: &Value) -> Result<bool, EvaluationError> {
        match self {
            Self::Present { pointer } => {
                Ok(context.pointer(pointer).is_some_and(|v| !v.is_null()))
            }
            Self::Equals { pointer, value } => Ok(require(context, pointer)? == value),
            Self::CodeIn { pointer, codes } => {
                let found = match require(context, pointer)? {
                    Value::String(code) => vec![code.as_str()],
                    Value::Array(items) => items
                        .iter()
                        .map(|item| item.as_str().ok_or_else(|| wrong_type(pointer, "list of codes")))
                        .collect::<Result<_, _>>()?,
                    _ => return Err(wrong_type(pointer, "code or list of codes")),
                };
                Ok(found.iter().any(|code| codes.iter().any(|c| c == code)))
            }
            Self::ElapsedSince { pointer, seconds } => {
                let raw = require(context, pointer)?
                    .as_str()
                    .ok_or_else(|| wrong_type(pointer, "timestamp"))?;
                let since: DateTime<Utc> = DateTime::parse_from_rfc3339(raw)
                    .map_err(|_| wrong_type(pointer, "timestamp"))?
                    .with_timezone(&Utc);
                Ok((Utc::now() - since).num_seconds() >= *seconds)
            }
        }
    }
}

fn require<'a>(context: &'a Value, pointer: &str) -> Result<&'a Value, EvaluationError> {
    match context.pointer(pointer) {
        Some(Value::Null) | None => Err(EvaluationError::MissingData { pointer: pointer.to_owned() }),
        Some(value) => Ok(value),
    }
}

fn wrong_type(pointer: &str, expected: &'static str) -> EvaluationError {
    EvaluationError::WrongType { pointer: pointer.to_owned(), expected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Value {
        json!({
            "patient": { "id": "p-17" },
            "encounter": { "id": null, "status": "in-progress", "start": "2019-02-13T08:00:00Z" },
            "trigger": { "codes": ["840539006", "186747009"], "primary": "840539006" }
        })
    }

    #[test]
    fn present_is_false_for_absent_or_null() {
        let ctx = context();
        let check = |p: &str| Precondition::Present { pointer: p.into() }.evaluate(&ctx).unwrap();
        assert!(check("/patient/id"));
        assert!(!check("/encounter/id"));
        assert!(!check("/nowhere"));
    }

    #[test]
    fn equals_compares_json_values() {
        let ctx = context();
        let cond = |v: Value| Precondition::Equals { pointer: "/encounter/status".into(), value: v };
        assert!(cond(json!("in-progress")).evaluate(&ctx).unwrap());
        assert!(!cond(json!("finished")).evaluate(&ctx).unwrap());
    }

    #[test]
    fn equals_on_missing_data_is_an_evaluation_error() {
        let cond = Precondition::Equals { pointer: "/encounter/class".into(), value: json!("AMB") };
        assert!(matches!(
            cond.evaluate(&context()),
            Err(EvaluationError::MissingData { pointer }) if pointer == "/encounter/class"
        ));
    }

    #[test]
    fn code_in_accepts_single_codes_and_lists() {
        let ctx = context();
        let codes = vec!["186747009".to_string()];
        assert!(Precondition::CodeIn { pointer: "/trigger/codes".into(), codes: codes.clone() }
            .evaluate(&ctx)
            .unwrap());
        assert!(!Precondition::CodeIn { pointer: "/trigger/primary".into(), codes }
            .evaluate(&ctx)
            .unwrap());
    }

    #[test]
    fn code_in_rejects_non_code_values() {
        let cond = Precondition::CodeIn { pointer: "/patient".into(), codes: vec![] };
        assert!(matches!(cond.evaluate(&context()), Err(EvaluationError::WrongType { .. })));
    }

    #[test]
    fn elapsed_since_compares_against_now() {
        let ctx = context();
        let old_enough = Precondition::ElapsedSince { pointer: "/encounter/start".into(), seconds: 3600 };
        assert!(old_enough.evaluate(&ctx).unwrap());

        let ctx = json!({ "encounter": { "start": Utc::now().to_rfc3339() } });
        assert!(!old_enough.evaluate(&ctx).unwrap());
    }

    #[test]
    fn elapsed_since_with_garbage_timestamp_is_an_evaluation_error() {
        let ctx = json!({ "encounter": { "start": "yesterday" } });
        let cond = Precondition::ElapsedSince { pointer: "/encounter/start".into(), seconds: 1 };
        assert!(matches!(cond.evaluate(&ctx), Err(EvaluationError::WrongType { .. })));
    }
}
