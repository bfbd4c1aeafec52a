use crate::error::SchemaError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(alias = "firstName", default)]
    pub first_name: String,
    #[serde(alias = "lastName", default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(alias = "subscriptionTier", default)]
    pub subscription_tier: Option<String>,
    #[serde(default)]
    pub credits: Option<i64>,
}

impl User {
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref().map(str::trim) {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user: Option<User>,
}

impl LoginResponse {
    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access: self.access.clone(),
            refresh: self.refresh.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterData {
    pub email: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub password: String,
    pub password_confirmation: String,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .unwrap_or_else(|_| unreachable!("email pattern is a valid regex"))
    })
}

pub fn validate_email(email: &str) -> Result<(), SchemaError> {
    if email_pattern().is_match(email) {
        Ok(())
    } else {
        Err(SchemaError::InvalidField {
            field: "email".into(),
            reason: "Invalid email".into(),
        })
    }
}

/// Returns every rule the password breaks, in display order.
pub fn validate_password(password: &str, confirmation: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if password.chars().count() < 8 {
        errors.push("Password must be at least 8 characters long.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain at least one lowercase letter.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain at least one uppercase letter.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one number.".to_string());
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        errors.push("Password must contain at least one special character.".to_string());
    }
    if password != confirmation {
        errors.push("Passwords do not match.".to_string());
    }

    errors
}

pub fn validate_register(data: &RegisterData) -> Result<(), SchemaError> {
    validate_email(&data.email)?;
    if data.first_name.trim().is_empty() {
        return Err(SchemaError::InvalidField {
            field: "first_name".into(),
            reason: "First name is required".into(),
        });
    }

    let errors = validate_password(&data.password, &data.password_confirmation);
    if let Some(first) = errors.into_iter().next() {
        return Err(SchemaError::InvalidField {
            field: "password".into(),
            reason: first,
        });
    }
    Ok(())
}
