use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use creditdesk_core::config::Settings;
use creditdesk_core::domain::company::Company;
use creditdesk_core::ingest::{load_dataset, Dataset, DatasetPaths};
use creditdesk_core::review::{PanelState, ReviewError, ReviewSession, Reviewer, SelectionTicket};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let paths = DatasetPaths {
        companies: settings.companies_path(),
        workbook: settings.workbook_path(),
    };
    let dataset = match load_dataset(&paths).await {
        Ok(dataset) => dataset,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %format!("{e:#}"), "dataset load failed; refusing to start");
            return Err(e);
        }
    };

    let reviewer = Reviewer::from_secrets(&settings, &settings)?;
    let state = AppState::new(dataset, reviewer);
    select_initial_company(&state).await;

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Clone)]
struct AppState {
    dataset: Arc<Dataset>,
    reviewer: Arc<Reviewer>,
    session: Arc<Mutex<ReviewSession>>,
}

impl AppState {
    fn new(dataset: Dataset, reviewer: Reviewer) -> Self {
        Self {
            dataset: Arc::new(dataset),
            reviewer: Arc::new(reviewer),
            session: Arc::new(Mutex::new(ReviewSession::default())),
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/companies", get(list_companies))
        .route("/session", get(get_session))
        .route("/session/select/:company_id", post(select_company))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct CompanyQuery {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// All companies, or those matching `q` by id, name or English name.
async fn list_companies(
    State(state): State<AppState>,
    Query(query): Query<CompanyQuery>,
) -> Json<Vec<Company>> {
    let directory = &state.dataset.directory;
    let companies = match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => directory.search(q).into_iter().cloned().collect(),
        _ => directory.all().to_vec(),
    };
    Json(companies)
}

async fn get_session(State(state): State<AppState>) -> Json<ReviewSession> {
    Json(state.session.lock().await.clone())
}

async fn select_company(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
) -> ApiResult<ReviewSession> {
    let (session, ticket) = begin_selection(&state, &company_id)
        .await
        .map_err(|e| (StatusCode::NOT_FOUND, Json(ApiError { error: e.to_string() })))?;
    spawn_panels(&state, ticket);
    Ok(Json(session))
}

/// Swaps in the new selection under the lock; the panels run after it is released.
async fn begin_selection(
    state: &AppState,
    company_id: &str,
) -> Result<(ReviewSession, SelectionTicket), ReviewError> {
    let mut session = state.session.lock().await;
    let (next, ticket) = session.select(&state.dataset, company_id)?;
    *session = next.clone();
    Ok((next, ticket))
}

fn spawn_panels(state: &AppState, ticket: SelectionTicket) {
    let ticket = Arc::new(ticket);

    let (score_state, score_ticket) = (state.clone(), ticket.clone());
    tokio::spawn(async move {
        let result = score_state.reviewer.run_score(&score_ticket).await;
        report_failure("score", &result);
        score_state
            .session
            .lock()
            .await
            .apply_score(score_ticket.generation, result);
    });

    let aml_state = state.clone();
    tokio::spawn(async move {
        let result = aml_state.reviewer.run_aml(&ticket).await;
        report_failure("aml", &result);
        aml_state
            .session
            .lock()
            .await
            .apply_aml(ticket.generation, result);
    });
}

fn report_failure<T>(panel: &str, state: &PanelState<T>) {
    if let PanelState::Failed { message, .. } = state {
        sentry::capture_message(&format!("{panel} panel failed: {message}"), sentry::Level::Warning);
    }
}

async fn select_initial_company(state: &AppState) {
    let Some(first) = state.dataset.directory.first() else {
        return;
    };
    match begin_selection(state, &first.id).await {
        Ok((_, ticket)) => spawn_panels(state, ticket),
        Err(e) => tracing::warn!(error = %e, "initial company selection failed"),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
