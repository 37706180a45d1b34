use uuid::Uuid;

use crate::domain::ValidationErrors;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid withdraw request: {0}")]
    InvalidRequest(#[from] ValidationErrors),

    #[error("Account {0} not found")]
    AccountNotFound(Uuid),

    #[error("Withdraw {0} not found")]
    WithdrawNotFound(Uuid),

    #[error("Deadline expired before the withdrawal was started")]
    DeadlineExceeded,

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("Withdraw task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type EngineResult<T> = Result<T, EngineError>;
