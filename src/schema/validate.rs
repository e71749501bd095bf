use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} invalid field(s): {}", .0.len(), render_errors(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldError {
            path: path.into(),
            message: message.into(),
        }])
    }

    #[cfg(test)]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }
}

fn render_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|err| format!("{}: {}", display_path(&err.path), err.message))
        .collect::<Vec<_>>()
        .join("; ")
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

pub fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

pub fn index_path(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

#[derive(Debug, Default)]
pub struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            path: path.into(),
            message: message.into(),
        });
    }

    pub fn object<'v>(&mut self, path: &str, value: &'v Value) -> Option<&'v Map<String, Value>> {
        match value.as_object() {
            Some(obj) => Some(obj),
            None => {
                self.push(path, format!("expected an object, found {}", type_name(value)));
                None
            }
        }
    }

    pub fn field_object<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        path: &str,
        key: &str,
    ) -> Option<&'v Map<String, Value>> {
        let field_path = join_path(path, key);
        match obj.get(key) {
            Some(value) => self.object(&field_path, value),
            None => {
                self.push(field_path, "is required");
                None
            }
        }
    }

    pub fn string(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> String {
        let field_path = join_path(path, key);
        match obj.get(key) {
            Some(Value::String(text)) if !text.trim().is_empty() => text.clone(),
            Some(Value::String(_)) => {
                self.push(field_path, "must not be empty");
                String::new()
            }
            Some(other) => {
                self.push(field_path, format!("expected a string, found {}", type_name(other)));
                String::new()
            }
            None => {
                self.push(field_path, "is required");
                String::new()
            }
        }
    }

    pub fn text(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> String {
        let field_path = join_path(path, key);
        match obj.get(key) {
            Some(Value::String(text)) => text.clone(),
            Some(other) => {
                self.push(field_path, format!("expected a string, found {}", type_name(other)));
                String::new()
            }
            None => {
                self.push(field_path, "is required");
                String::new()
            }
        }
    }

    pub fn opt_string(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
    ) -> Option<String> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => {
                self.push(
                    join_path(path, key),
                    format!("expected a string, found {}", type_name(other)),
                );
                None
            }
        }
    }

    pub fn integer(&mut self, obj: &Map<String, Value>, path: &str, key: &str) -> i64 {
        match obj.get(key) {
            Some(value) => self.integer_value(&join_path(path, key), value).unwrap_or_default(),
            None => {
                self.push(join_path(path, key), "is required");
                0
            }
        }
    }

    pub fn opt_integer(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
    ) -> Option<i64> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => self.integer_value(&join_path(path, key), value),
        }
    }

    fn integer_value(&mut self, path: &str, value: &Value) -> Option<i64> {
        match value.as_i64() {
            Some(number) => Some(number),
            None => {
                self.push(path, format!("expected an integer, found {}", type_name(value)));
                None
            }
        }
    }

    pub fn boolean(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
        default: bool,
    ) -> bool {
        match obj.get(key) {
            None | Some(Value::Null) => default,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                self.push(
                    join_path(path, key),
                    format!("expected a boolean, found {}", type_name(other)),
                );
                default
            }
        }
    }

    pub fn string_list(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        key: &str,
    ) -> Vec<String> {
        let field_path = join_path(path, key);
        match obj.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(text)) => vec![text.clone()],
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    match item {
                        Value::String(text) => out.push(text.clone()),
                        other => self.push(
                            index_path(&field_path, index),
                            format!("expected a string, found {}", type_name(other)),
                        ),
                    }
                }
                out
            }
            Some(other) => {
                self.push(
                    field_path,
                    format!("expected a string or an array of strings, found {}", type_name(other)),
                );
                Vec::new()
            }
        }
    }

    pub fn into_errors(self) -> ValidationErrors {
        ValidationErrors(self.errors)
    }

    pub fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
