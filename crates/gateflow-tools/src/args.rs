//! JSON argument extraction that accumulates per-field issues.

use gateflow_core::{FieldIssue, GateType, GateflowError, GateflowResult};
use serde_json::Value;
use uuid::Uuid;

/// Collects field-level problems while extracting arguments, then fails
/// once with the full issue list.
pub struct ArgReader<'a> {
    args: &'a Value,
    issues: Vec<FieldIssue>,
}

impl<'a> ArgReader<'a> {
    /// Wraps a JSON arguments object.
    pub fn new(args: &'a Value) -> Self {
        Self {
            args,
            issues: Vec::new(),
        }
    }

    /// A required string field.
    pub fn str(&mut self, field: &str) -> String {
        match self.args.get(field).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => s.to_string(),
            Some(_) => {
                self.issues.push(FieldIssue::new(field, "must not be empty"));
                String::new()
            }
            None => {
                self.issues
                    .push(FieldIssue::new(field, "required string field is missing"));
                String::new()
            }
        }
    }

    /// An optional string field.
    pub fn opt_str(&mut self, field: &str) -> Option<String> {
        self.args
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// An optional boolean field, defaulting to false.
    pub fn flag(&mut self, field: &str) -> bool {
        self.args.get(field).and_then(Value::as_bool).unwrap_or(false)
    }

    /// An optional f64 field.
    pub fn opt_f64(&mut self, field: &str) -> Option<f64> {
        self.args.get(field).and_then(Value::as_f64)
    }

    /// A required f64 field.
    pub fn f64(&mut self, field: &str) -> f64 {
        match self.args.get(field).and_then(Value::as_f64) {
            Some(v) => v,
            None => {
                self.issues
                    .push(FieldIssue::new(field, "required number field is missing"));
                0.0
            }
        }
    }

    /// A required gate field (`"G1"`..`"G9"`, legacy tags accepted).
    pub fn gate(&mut self, field: &str) -> GateType {
        match self.args.get(field).and_then(Value::as_str) {
            None => {
                self.issues
                    .push(FieldIssue::new(field, "required gate field is missing"));
                GateType::G1
            }
            Some(raw) => match GateType::parse_legacy_tag(raw) {
                Ok((gate, _)) => gate,
                Err(_) => {
                    self.issues
                        .push(FieldIssue::new(field, format!("unknown gate: {raw}")));
                    GateType::G1
                }
            },
        }
    }

    /// An optional gate field.
    pub fn opt_gate(&mut self, field: &str) -> Option<GateType> {
        let raw = self.args.get(field).and_then(Value::as_str)?;
        match GateType::parse_legacy_tag(raw) {
            Ok((gate, _)) => Some(gate),
            Err(_) => {
                self.issues
                    .push(FieldIssue::new(field, format!("unknown gate: {raw}")));
                None
            }
        }
    }

    /// A required uuid field.
    pub fn uuid(&mut self, field: &str) -> Uuid {
        match self
            .args
            .get(field)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
        {
            Some(id) => id,
            None => {
                self.issues
                    .push(FieldIssue::new(field, "required uuid field is missing or malformed"));
                Uuid::nil()
            }
        }
    }

    /// An optional uuid field.
    pub fn opt_uuid(&mut self, field: &str) -> Option<Uuid> {
        let raw = self.args.get(field).and_then(Value::as_str)?;
        match Uuid::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                self.issues
                    .push(FieldIssue::new(field, "malformed uuid"));
                None
            }
        }
    }

    /// A parsed enum-ish field via `FromStr`, recording parse failures.
    pub fn parsed<T: std::str::FromStr>(&mut self, field: &str, expected: &str) -> Option<T> {
        match self.args.get(field).and_then(Value::as_str) {
            None => {
                self.issues.push(FieldIssue::new(
                    field,
                    format!("required field is missing (expected {expected})"),
                ));
                None
            }
            Some(raw) => match raw.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    self.issues.push(FieldIssue::new(
                        field,
                        format!("'{raw}' is not a valid {expected}"),
                    ));
                    None
                }
            },
        }
    }

    /// An optional string-array field.
    pub fn opt_str_array(&mut self, field: &str) -> Vec<String> {
        match self.args.get(field) {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(_) => {
                self.issues
                    .push(FieldIssue::new(field, "must be an array of strings"));
                Vec::new()
            }
        }
    }

    /// A raw JSON field, defaulting to null.
    pub fn raw(&mut self, field: &str) -> Value {
        self.args.get(field).cloned().unwrap_or(Value::Null)
    }

    /// Finishes extraction: fails with the accumulated issue list, if any.
    pub fn finish(self) -> GateflowResult<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(GateflowError::invalid_fields(
                format!("{} invalid argument(s)", self.issues.len()),
                self.issues,
            ))
        }
    }
}
