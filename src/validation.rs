// src/validation.rs

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::AppError;

const PASSWORD_SYMBOLS: &str = "@$!%*?&#";

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"))
}

fn mobile_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{10}$").expect("mobile regex"))
}

pub fn email(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        Some("Email is required".into())
    } else if !email_re().is_match(value) {
        Some("Invalid email format".into())
    } else {
        None
    }
}

/// 8+ characters drawn from letters, digits and `@$!%*?&#`, with at least one
/// of each class.
pub fn password(value: &str) -> Option<String> {
    if value.is_empty() {
        return Some("Password is required".into());
    }
    let allowed = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c));
    let ok = allowed
        && value.chars().count() >= 8
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| PASSWORD_SYMBOLS.contains(c));
    (!ok).then(|| "8+ chars, Uppercase, Number & Symbol required".into())
}

pub fn mobile(value: &str) -> Option<String> {
    (!mobile_re().is_match(value.trim())).then(|| "Mobile number must be 10 digits".into())
}

pub fn required(label: &str, value: &str) -> Option<String> {
    value.trim().is_empty().then(|| format!("{label} is required"))
}

/// Collects per-field errors; empty means the form is valid.
#[derive(Debug, Default)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn check(&mut self, field: &'static str, result: Option<String>) -> &mut Self {
        if let Some(msg) = result {
            self.0.insert(field, msg);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            return Ok(());
        }
        Err(AppError::Validation {
            message: "Please correct the highlighted fields".into(),
            fields: self.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_format() {
        assert!(email("asha@college.edu").is_none());
        assert_eq!(email("").as_deref(), Some("Email is required"));
        assert_eq!(email("asha@college").as_deref(), Some("Invalid email format"));
        assert!(email("a sha@college.edu").is_some());
    }

    #[test]
    fn password_complexity() {
        assert!(password("Hostel#2024").is_none());
        assert!(password("hostel#2024").is_some(), "needs uppercase");
        assert!(password("Hostel2024").is_some(), "needs symbol");
        assert!(password("Ho#1").is_some(), "too short");
        assert!(password("Hostel#2024~").is_some(), "disallowed symbol");
    }

    #[test]
    fn mobile_digits() {
        assert!(mobile("9876543210").is_none());
        assert!(mobile("98765").is_some());
        assert!(mobile("98765432101").is_some());
        assert!(mobile("98765-4321").is_some());
        assert!(mobile("१२३४५६७८९०").is_some(), "devanagari digits");
        assert!(mobile("٠١٢٣٤٥٦٧٨٩").is_some(), "arabic-indic digits");
    }

    #[test]
    fn one_bad_field_keeps_form_invalid() {
        let mut errs = FieldErrors::default();
        errs.check("email", email("asha@college.edu"))
            .check("password", password("weak"))
            .check("mobile_number", mobile("9876543210"));
        assert!(!errs.is_empty());

        match errs.into_result() {
            Err(AppError::Validation { fields, .. }) => {
                assert_eq!(fields.len(), 1);
                assert!(fields.contains_key("password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
