use std::sync::Arc;

use sqlx::PgPool;

use crate::services::analysis_service::AnalysisService;
use crate::services::review_service::ReviewService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub analysis: Arc<AnalysisService>,
    pub review: Arc<ReviewService>,
}
