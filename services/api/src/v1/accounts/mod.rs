use axum::{routing::get, Router};

mod balance;
mod show;

pub fn router() -> Router<crate::AppState> {
    Router::new()
        .route("/", get(show::handler))
        .route("/balance", get(balance::handler))
}
