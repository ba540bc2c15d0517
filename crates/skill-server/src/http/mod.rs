use axum::routing::{get, post};
use axum::{Router, middleware};
use shared::skill::SkillRouter;

mod errors;
mod health;
mod observability;
mod skill;
mod verification;

pub use verification::RequestVerification;

#[derive(Clone)]
pub struct AppState {
    pub skill_router: SkillRouter,
    pub verification: RequestVerification,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/v1/skill", post(skill::handle_skill_request))
        .layer(middleware::from_fn(
            observability::request_observability_middleware,
        ))
        .with_state(app_state)
}
