//! Typed view of a raw job request.
//!
//! Shape checks run here in a fixed order so the first failure determines the
//! message a client sees. Limit fields are only classified at this point;
//! judging them needs the resolved runtime.

use std::collections::HashMap;

use runhub_protocol::{FileInput, LimitField};
use serde_json::{Map, Value};

use crate::errors::ValidationError;

/// A limit as the client sent it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestedLimit {
    /// Missing, `null` or `0`: the runtime default applies.
    Absent,
    Value(f64),
    /// Present but not a JSON number, or a number with a fractional part.
    NotANumber,
}

impl RequestedLimit {
    fn classify(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => RequestedLimit::Absent,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) if v == 0.0 => RequestedLimit::Absent,
                // Limits are whole milliseconds and bytes.
                Some(v) if v.fract() != 0.0 => RequestedLimit::NotANumber,
                Some(v) => RequestedLimit::Value(v),
                None => RequestedLimit::NotANumber,
            },
            Some(_) => RequestedLimit::NotANumber,
        }
    }
}

/// Strategy-independent request fields.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub files: Vec<FileInput>,
    pub args: Vec<String>,
    pub stdin: String,
    limits: HashMap<LimitField, RequestedLimit>,
}

impl JobRequest {
    /// Parse the shared fields of `raw`.
    ///
    /// Order: `files` is an array, `args`/`stdin` types, each file's `content`,
    /// then `files` is non-empty.
    pub fn parse(raw: &Map<String, Value>) -> Result<Self, ValidationError> {
        let entries = match raw.get("files") {
            Some(Value::Array(entries)) => entries,
            _ => return Err(ValidationError::new("files is required as an array")),
        };

        let args = match raw.get("args") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| ValidationError::new("args must be an array of strings"))?,
            Some(_) => return Err(ValidationError::new("args must be an array of strings")),
        };

        let stdin = match raw.get("stdin") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(ValidationError::new("stdin must be a string")),
        };

        let files = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| parse_file(i, entry))
            .collect::<Result<Vec<_>, _>>()?;
        if files.is_empty() {
            return Err(ValidationError::new("files must include at least one file"));
        }

        let limits = LimitField::ALL
            .into_iter()
            .map(|field| (field, RequestedLimit::classify(raw.get(field.name()))))
            .collect();

        Ok(Self {
            files,
            args,
            stdin,
            limits,
        })
    }

    pub fn limit(&self, field: LimitField) -> RequestedLimit {
        self.limits
            .get(&field)
            .copied()
            .unwrap_or(RequestedLimit::Absent)
    }
}

fn parse_file(index: usize, entry: &Value) -> Result<FileInput, ValidationError> {
    let content = entry
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ValidationError::new(format!("files[{}].content is required as a string", index))
        })?;

    let name = entry.get("name").and_then(Value::as_str).map(str::to_string);

    // Any non-string encoding is opaque rather than utf8.
    let encoding = match entry.get("encoding") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };

    Ok(FileInput {
        name,
        content: content.to_string(),
        encoding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use runhub_protocol::{Constraint, Stage};
    use serde_json::json;

    fn parse(value: Value) -> Result<JobRequest, ValidationError> {
        JobRequest::parse(value.as_object().unwrap())
    }

    #[test]
    fn test_files_must_be_array() {
        for body in [json!({}), json!({"files": null}), json!({"files": "main.py"})] {
            assert_eq!(
                parse(body).unwrap_err().message,
                "files is required as an array"
            );
        }
    }

    #[test]
    fn test_content_must_be_string() {
        let err = parse(json!({"files": [{"content": "ok"}, {"content": 5}]})).unwrap_err();
        assert_eq!(err.message, "files[1].content is required as a string");
    }

    #[test]
    fn test_files_must_not_be_empty() {
        let err = parse(json!({"files": []})).unwrap_err();
        assert_eq!(err.message, "files must include at least one file");
    }

    #[test]
    fn test_defaults() {
        let request = parse(json!({"files": [{"content": "print(1)"}]})).unwrap();
        assert!(request.args.is_empty());
        assert_eq!(request.stdin, "");
        assert_eq!(request.files[0].encoding, None);
    }

    #[test]
    fn test_args_and_stdin_types() {
        assert_eq!(
            parse(json!({"files": [], "args": ["a", 1]})).unwrap_err().message,
            "args must be an array of strings"
        );
        assert_eq!(
            parse(json!({"files": [], "stdin": 42})).unwrap_err().message,
            "stdin must be a string"
        );
    }

    #[test]
    fn test_limit_classification() {
        let request = parse(json!({
            "files": [{"content": "print(1)"}],
            "run_timeout": 0,
            "compile_memory_limit": 0.5,
            "compile_timeout": "5",
            "run_memory_limit": 1024,
        }))
        .unwrap();
        let field = |stage, constraint| request.limit(LimitField::new(stage, constraint));
        assert_eq!(field(Stage::Run, Constraint::Timeout), RequestedLimit::Absent);
        assert_eq!(
            field(Stage::Compile, Constraint::Timeout),
            RequestedLimit::NotANumber
        );
        assert_eq!(
            field(Stage::Run, Constraint::MemoryLimit),
            RequestedLimit::Value(1024.0)
        );
        assert_eq!(
            field(Stage::Compile, Constraint::MemoryLimit),
            RequestedLimit::NotANumber
        );
    }
}
