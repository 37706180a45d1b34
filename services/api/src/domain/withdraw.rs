use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{PaymentKey, ValidationErrors};

pub const INSUFFICIENT_BALANCE_REASON: &str = "Insufficient balance";
pub const ACCOUNT_NOT_FOUND_REASON: &str = "Account not found";
pub const INTERNAL_ERROR_PREFIX: &str = "Internal error";

/// Largest value a `NUMERIC(15, 2)` column holds.
fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999_999, 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawMethod {
    #[serde(rename = "PIX")]
    Pix,
}

impl WithdrawMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pix => "PIX",
        }
    }
}

impl fmt::Display for WithdrawMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawMethod {
    type Err = ValidationErrors;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PIX" => Ok(Self::Pix),
            _ => Err(ValidationErrors::single("Only PIX method is supported")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawStatus {
    Pending,
    Succeeded,
    Failed { reason: String },
}

/// The four mutually exclusive states a withdrawal moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawState {
    CreatedImmediate,
    CreatedScheduled,
    DoneSuccess,
    DoneError,
}

impl WithdrawState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::DoneSuccess | Self::DoneError)
    }
}

/// Outcome applied to a pending withdrawal by the execution step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Succeeded,
    Failed(String),
}

impl Settlement {
    pub fn internal_error(detail: impl fmt::Display) -> Self {
        Self::Failed(format!("{INTERNAL_ERROR_PREFIX}: {detail}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Withdrawal {
    pub id: Uuid,
    pub account_id: Uuid,
    pub method: WithdrawMethod,
    pub amount: Decimal,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub status: WithdrawStatus,
    pub payment_key: PaymentKey,
    pub created_at: DateTime<Utc>,
}

impl Withdrawal {
    pub fn state(&self) -> WithdrawState {
        match (&self.status, self.scheduled_for) {
            (WithdrawStatus::Pending, None) => WithdrawState::CreatedImmediate,
            (WithdrawStatus::Pending, Some(_)) => WithdrawState::CreatedScheduled,
            (WithdrawStatus::Succeeded, _) => WithdrawState::DoneSuccess,
            (WithdrawStatus::Failed { .. }, _) => WithdrawState::DoneError,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled_for.is_some()
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, WithdrawStatus::Failed { .. })
    }

    pub fn succeeded(&self) -> bool {
        self.status == WithdrawStatus::Succeeded
    }

    pub fn error_reason(&self) -> Option<&str> {
        match &self.status {
            WithdrawStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Immediate withdrawals are always due; scheduled ones once their time
    /// has come.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_for.map_or(true, |at| at <= now)
    }

    /// Moves a pending withdrawal to its terminal state. Terminal
    /// withdrawals are never mutated again, so settling one twice is refused.
    pub fn settle(mut self, settlement: &Settlement) -> Result<Self, Self> {
        if self.is_done() {
            return Err(self);
        }
        self.status = match settlement {
            Settlement::Succeeded => WithdrawStatus::Succeeded,
            Settlement::Failed(reason) => WithdrawStatus::Failed {
                reason: reason.clone(),
            },
        };
        Ok(self)
    }
}

pub fn validate_amount(amount: Decimal) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if amount <= Decimal::ZERO {
        errors.push("Amount must be greater than zero");
    } else if amount.normalize().scale() > 2 {
        errors.push("Amount must have at most two decimal places");
    } else if amount > max_amount() {
        errors.push("Amount exceeds the maximum allowed value");
    }
    errors.into_result()
}
