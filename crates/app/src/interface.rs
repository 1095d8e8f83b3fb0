use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gitpulse_core::domain::RepoId;
use poem::http::StatusCode;
use poem::middleware::{AddData, Tracing};
use poem::web::{Data, Json, Query};
use poem::{get, handler, listener::TcpListener, Endpoint, EndpointExt, IntoResponse, Response, Route, Server};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::services::stats_service::StatsService;

/// How long in-flight requests get to finish once shutdown starts
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct StatisticsParams {
    repository_name: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

#[handler]
async fn statistics(service: Data<&Arc<StatsService>>, Query(params): Query<StatisticsParams>) -> Response {
    let repo = match params.repository_name.as_deref().map(RepoId::parse) {
        Some(Ok(repo)) => repo,
        _ => {
            return Json(ErrorBody { error: "Repository name is required" })
                .with_status(StatusCode::BAD_REQUEST)
                .into_response()
        }
    };

    debug!("Statistics requested for {}", repo);
    let stats = service.statistics(&repo).await;
    Json(stats).into_response()
}

/// The API routes, with the service attached
pub fn routes(service: Arc<StatsService>) -> impl Endpoint {
    Route::new()
        .nest("/api", Route::new().at("/statistics", get(statistics)))
        .with(AddData::new(service))
        .with(Tracing)
}

/// Serve the API until `shutdown` resolves
pub async fn serve<F>(bind_address: String, service: Arc<StatsService>, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    Server::new(TcpListener::bind(bind_address))
        .run_with_graceful_shutdown(routes(service), shutdown, Some(SHUTDOWN_GRACE))
        .await
}
