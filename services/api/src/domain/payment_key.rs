use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::ValidateEmail;

use super::ValidationErrors;

/// Kind of PIX key a withdrawal pays out to. Only e-mail keys are accepted
/// today; the tag is persisted so other kinds can be added later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKeyType {
    Email,
}

impl PaymentKeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
        }
    }
}

impl fmt::Display for PaymentKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentKeyType {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            other => Err(ValidationErrors::single(format!(
                "Unsupported PIX key type '{other}', only email keys are supported"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentKey {
    pub key_type: PaymentKeyType,
    pub value: String,
}

impl PaymentKey {
    pub fn parse(key_type: &str, value: &str) -> Result<Self, ValidationErrors> {
        let key_type = key_type.parse::<PaymentKeyType>()?;
        let key = Self {
            key_type,
            value: value.trim().to_string(),
        };
        key.validate()?;
        Ok(key)
    }

    pub fn email(value: &str) -> Result<Self, ValidationErrors> {
        Self::parse(PaymentKeyType::Email.as_str(), value)
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self.key_type {
            PaymentKeyType::Email if self.value.validate_email() => Ok(()),
            PaymentKeyType::Email => Err(ValidationErrors::single("Invalid email format for PIX key")),
        }
    }

    pub fn is_deliverable_email(&self) -> bool {
        self.key_type == PaymentKeyType::Email && self.value.validate_email()
    }
}
