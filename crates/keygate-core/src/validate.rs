//! Request-body validation for registration and login.
//!
//! Validation reports every failing field at once instead of stopping at
//! the first; per field, only the first broken rule is reported.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

pub const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Ok,
    ValidationFailed(Vec<String>),
    /// The validator itself could not run; says nothing about the body.
    InternalError(String),
}

impl Validation {
    fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            Self::Ok
        } else {
            Self::ValidationFailed(errors)
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

fn email_regex() -> Result<&'static Regex, String> {
    static EMAIL: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(EMAIL_PATTERN))
        .as_ref()
        .map_err(|e| format!("email pattern failed to compile: {e}"))
}

/// A field counts as present when it is not missing, null, `false`, zero or
/// an empty string/collection.
fn present<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    doc.get(field).filter(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}

fn check_email(doc: &Value, errors: &mut Vec<String>) -> Result<(), String> {
    match present(doc, "email") {
        None => errors.push("Email is required".to_string()),
        Some(email) => {
            let re = email_regex()?;
            if !email.as_str().is_some_and(|e| re.is_match(e)) {
                errors.push("Invalid email format".to_string());
            }
        }
    }
    Ok(())
}

fn not_an_object() -> Validation {
    Validation::ValidationFailed(vec!["Request body must be a JSON object".to_string()])
}

pub fn validate_registration(doc: &Value) -> Validation {
    if !doc.is_object() {
        return not_an_object();
    }
    let mut errors = Vec::new();
    if let Err(e) = check_email(doc, &mut errors) {
        return Validation::InternalError(e);
    }

    match present(doc, "password") {
        None => errors.push("Password is required".to_string()),
        Some(password) => {
            let password = password.as_str().unwrap_or_default();
            if password.chars().count() < MIN_PASSWORD_CHARS {
                errors.push(format!(
                    "Password must be at least {MIN_PASSWORD_CHARS} characters long"
                ));
            } else if !password.chars().any(|c| c.is_ascii_digit()) {
                errors.push("Password must contain at least one number".to_string());
            } else if !password.chars().any(char::is_uppercase) {
                errors.push("Password must contain at least one uppercase letter".to_string());
            }
        }
    }

    if doc.get("name").is_some() && present(doc, "name").is_none() {
        errors.push("Name cannot be empty if provided".to_string());
    }

    Validation::from_errors(errors)
}

pub fn validate_login(doc: &Value) -> Validation {
    if !doc.is_object() {
        return not_an_object();
    }
    let mut errors = Vec::new();
    if let Err(e) = check_email(doc, &mut errors) {
        return Validation::InternalError(e);
    }
    if present(doc, "password").is_none() {
        errors.push("Password is required".to_string());
    }
    Validation::from_errors(errors)
}
