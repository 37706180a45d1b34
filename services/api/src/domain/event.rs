use super::Withdrawal;

/// What a notification is about. Part of the deduplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Scheduled,
    Succeeded,
    Failed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Succeeded => "success",
            Self::Failed => "error",
        }
    }
}

/// Emitted by the engine only after the state it describes is committed.
#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawEvent {
    Scheduled(Withdrawal),
    Processed {
        withdrawal: Withdrawal,
        success: bool,
        reason: Option<String>,
    },
}

impl WithdrawEvent {
    pub fn processed(withdrawal: Withdrawal) -> Self {
        let success = withdrawal.succeeded();
        let reason = withdrawal.error_reason().map(str::to_string);
        Self::Processed {
            withdrawal,
            success,
            reason,
        }
    }

    pub fn withdrawal(&self) -> &Withdrawal {
        match self {
            Self::Scheduled(withdrawal) | Self::Processed { withdrawal, .. } => withdrawal,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Scheduled(_) => EventKind::Scheduled,
            Self::Processed { success: true, .. } => EventKind::Succeeded,
            Self::Processed { success: false, .. } => EventKind::Failed,
        }
    }

    /// `email_sent:<withdraw id>_<scheduled|success|error>`
    pub fn dedup_key(&self) -> String {
        format!("email_sent:{}_{}", self.withdrawal().id, self.kind().as_str())
    }
}
