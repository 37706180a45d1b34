use axum::Router;

mod accounts;
mod withdraws;

pub use withdraws::{PixResponse, WithdrawResponse};

pub fn router() -> Router<crate::AppState> {
    Router::new().nest(
        "/account/:account_id",
        accounts::router().merge(withdraws::router()),
    )
}
