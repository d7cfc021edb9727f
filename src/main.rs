mod app;
mod db;
mod errors;
mod external;
mod logging;
mod models;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::external::dify::DifyGateway;
use crate::logging::{init_logging, LoggingConfig};
use crate::models::NewPosition;
use crate::services::analysis_service::AnalysisService;
use crate::services::audit::DbAudit;
use crate::services::review_service::ReviewService;
use crate::services::workflow_invoker::{WorkflowConfig, WorkflowInvoker};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_logging(LoggingConfig::from_env()).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    seed_positions(&pool).await?;

    let workflow_config = Arc::new(WorkflowConfig::from_env());
    let gateway = Arc::new(DifyGateway::new(workflow_config.base_url.clone()));
    let audit = Arc::new(DbAudit::new(pool.clone()));
    let invoker = WorkflowInvoker::new(gateway, audit.clone(), workflow_config.clone());

    let approve_on_apply_failure = std::env::var("APPROVE_ON_APPLY_FAILURE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let state = AppState {
        pool: pool.clone(),
        analysis: Arc::new(AnalysisService::new(
            pool.clone(),
            invoker,
            audit.clone(),
            workflow_config,
        )),
        review: Arc::new(ReviewService::new(pool, audit, approve_on_apply_failure)),
    };
    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Aivest backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// First boot gets a starter allocation so the reconciliation engine always
/// has a current ledger to merge adjustments into.
async fn seed_positions(pool: &PgPool) -> anyhow::Result<()> {
    if db::position_queries::count(pool).await? > 0 {
        return Ok(());
    }

    let seed = [
        ("BTC", 40, 4_000_000),
        ("ETH", 35, 3_500_000),
        ("SOL", 15, 1_500_000),
        ("USDT", 10, 1_000_000),
    ];
    let rows: Vec<NewPosition> = seed
        .iter()
        .map(|(symbol, percent, amount)| NewPosition {
            symbol: symbol.to_string(),
            percent: BigDecimal::from(*percent),
            amount_usd: BigDecimal::from(*amount),
        })
        .collect();

    let mut tx = pool.begin().await?;
    db::position_queries::insert_set(&mut tx, &rows, chrono::Utc::now()).await?;
    tx.commit().await?;
    tracing::info!("Seeded initial allocation ledger with {} positions", rows.len());
    Ok(())
}
