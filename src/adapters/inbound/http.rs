use crate::application::{JobLedger, JobState, Producer};
use crate::ports::outbound::{JobQueue, ResultStore};
use crate::shared::ErrorCategory;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

/// Shared handler state, assembled once at startup.
#[derive(Clone)]
pub struct AppState {
    pub producer: Arc<Producer>,
    pub queue: Arc<dyn JobQueue>,
    pub store: Arc<dyn ResultStore>,
    pub ledger: Arc<JobLedger>,
    pub started_at: Instant,
}

/// Builds the control-surface router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/analyze", post(submit_analysis))
        .route("/analyze/{job_id}", get(get_analysis))
        .route("/queue/status", get(queue_status))
        .route("/queue/clear", post(clear_queue))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    targets: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AnalyzeAccepted {
    job_id: String,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct JobStatusBody {
    job_id: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<ErrorCategory>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    category: ErrorCategory,
}

#[derive(Debug, Serialize)]
struct PurgeBody {
    purged: usize,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    service: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

async fn submit_analysis(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    match state.producer.enqueue(request.targets).await {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(AnalyzeAccepted {
                job_id,
                status: "queued",
            }),
        )
            .into_response(),
        Err(e) => {
            let category = e.category();
            let status = match category {
                ErrorCategory::MalformedJob => StatusCode::BAD_REQUEST,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            };
            if status == StatusCode::SERVICE_UNAVAILABLE {
                error!(error = %e, "failed to enqueue analysis job");
            }
            (
                status,
                Json(ErrorBody {
                    error: e.to_string(),
                    category,
                }),
            )
                .into_response()
        }
    }
}

/// Resolution order: completed result from the store, else ledger state,
/// else not found. Dead-lettered jobs surface their failure category, not
/// internal error details.
async fn get_analysis(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    match state.store.get(&job_id).await {
        Ok(Some(result)) => return Json(result).into_response(),
        Ok(None) => {}
        Err(e) => {
            error!(job_id = %job_id, error = %e, "result lookup failed");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    error: "result store unavailable".to_string(),
                    category: ErrorCategory::Persistence,
                }),
            )
                .into_response();
        }
    }

    match state.ledger.get(&job_id) {
        Some(JobState::Failed { category }) => Json(JobStatusBody {
            job_id,
            status: "failed",
            category: Some(category),
        })
        .into_response(),
        Some(_) => Json(JobStatusBody {
            job_id,
            status: "pending",
            category: None,
        })
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(JobStatusBody {
                job_id,
                status: "not_found",
                category: None,
            }),
        )
            .into_response(),
    }
}

async fn queue_status(State(state): State<AppState>) -> Response {
    Json(state.queue.status().await).into_response()
}

async fn clear_queue(State(state): State<AppState>) -> Response {
    match state.queue.purge().await {
        Ok(purged) => Json(PurgeBody { purged }).into_response(),
        Err(e) => {
            error!(error = %e, "queue purge failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    error: e.to_string(),
                    category: e.category(),
                }),
            )
                .into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> Response {
    Json(HealthBody {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::memory::{InMemoryJobQueue, InMemoryResultStore};
    use crate::risk_analysis::domain::{AnalysisResult, OverallRiskScore, Severity};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        queue: Arc<InMemoryJobQueue>,
        store: Arc<InMemoryResultStore>,
        ledger: Arc<JobLedger>,
    }

    fn app() -> TestApp {
        let queue = Arc::new(InMemoryJobQueue::new());
        let store = Arc::new(InMemoryResultStore::new());
        let ledger = Arc::new(JobLedger::new());
        let producer = Arc::new(Producer::new(
            Arc::clone(&queue) as Arc<dyn JobQueue>,
            Arc::clone(&ledger),
        ));
        let state = AppState {
            producer,
            queue: Arc::clone(&queue) as Arc<dyn JobQueue>,
            store: Arc::clone(&store) as Arc<dyn ResultStore>,
            ledger: Arc::clone(&ledger),
            started_at: Instant::now(),
        };
        TestApp {
            router: create_router(state),
            queue,
            store,
            ledger,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_submit_analysis_accepts_and_enqueues() {
        let app = app();
        let response = app
            .router
            .oneshot(post_json(
                "/analyze",
                serde_json::json!({ "targets": ["nginx:1.18.0"] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["status"], "queued");
        let job_id = body["job_id"].as_str().unwrap();
        assert!(!job_id.is_empty());

        assert_eq!(app.queue.status().await.depth, 1);
        assert_eq!(app.ledger.get(job_id), Some(JobState::Queued));
    }

    #[tokio::test]
    async fn test_submit_analysis_rejects_empty_batch() {
        let app = app();
        let response = app
            .router
            .oneshot(post_json("/analyze", serde_json::json!({ "targets": [] })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["category"], "malformed_job");
        assert_eq!(app.queue.status().await.depth, 0);
    }

    #[tokio::test]
    async fn test_get_analysis_unknown_job_is_not_found() {
        let app = app();
        let response = app
            .router
            .oneshot(get_req("/analyze/no-such-job"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["status"], "not_found");
    }

    #[tokio::test]
    async fn test_get_analysis_reports_pending_while_queued() {
        let app = app();
        app.ledger.mark_queued("job-1");

        let response = app.router.oneshot(get_req("/analyze/job-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "pending");
    }

    #[tokio::test]
    async fn test_get_analysis_reports_failure_category() {
        let app = app();
        app.ledger
            .mark_failed("job-1", ErrorCategory::TransientNetwork);

        let response = app.router.oneshot(get_req("/analyze/job-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["category"], "transient_network");
    }

    #[tokio::test]
    async fn test_get_analysis_returns_completed_result() {
        let app = app();
        app.store
            .put(AnalysisResult {
                job_id: "job-1".to_string(),
                asset_analyses: vec![],
                overall: OverallRiskScore {
                    value: 98.0,
                    level: Severity::Critical,
                    recommendations: vec![],
                },
                completed_at: Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        app.ledger.mark_completed("job-1");

        let response = app.router.oneshot(get_req("/analyze/job-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["job_id"], "job-1");
        assert_eq!(body["overall"]["level"], "CRITICAL");
        assert_eq!(body["overall"]["value"], 98.0);
    }

    #[tokio::test]
    async fn test_queue_status_reports_depths() {
        let app = app();
        app.router
            .clone()
            .oneshot(post_json(
                "/analyze",
                serde_json::json!({ "targets": ["nginx:1.18.0"] }),
            ))
            .await
            .unwrap();

        let response = app.router.oneshot(get_req("/queue/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["depth"], 1);
        assert_eq!(body["in_flight"], 0);
        assert_eq!(body["dead_letter"], 0);
    }

    #[tokio::test]
    async fn test_queue_clear_purges_pending() {
        let app = app();
        for _ in 0..3 {
            app.router
                .clone()
                .oneshot(post_json(
                    "/analyze",
                    serde_json::json!({ "targets": ["nginx:1.18.0"] }),
                ))
                .await
                .unwrap();
        }

        let response = app
            .router
            .clone()
            .oneshot(post_json("/queue/clear", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["purged"], 3);

        assert_eq!(app.queue.status().await.depth, 0);
    }

    #[tokio::test]
    async fn test_health_reports_service_identity() {
        let app = app();
        let response = app.router.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["service"], env!("CARGO_PKG_NAME"));
        assert!(body["uptime_seconds"].is_number());
    }
}
