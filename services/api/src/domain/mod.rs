//! Value types shared by the stores, the engine and the HTTP layer.

mod account;
mod event;
mod payment_key;
mod schedule;
mod withdraw;

pub use account::Account;
pub use event::{EventKind, WithdrawEvent};
pub use payment_key::{PaymentKey, PaymentKeyType};
pub use schedule::{parse_schedule, SchedulePolicy};
pub use withdraw::{
    validate_amount, Settlement, WithdrawMethod, WithdrawState, WithdrawStatus, Withdrawal,
    ACCOUNT_NOT_FOUND_REASON, INSUFFICIENT_BALANCE_REASON, INTERNAL_ERROR_PREFIX,
};

/// Accumulated validation failures, reported together like a form error list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![message.into()])
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}
