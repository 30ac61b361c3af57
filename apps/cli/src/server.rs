//! HTTP surface: `POST /create-blog`.
//!
//! 200 with `{summary, report, fullResults}` on success, 400 when the input
//! is invalid or the body is not a JSON run input, 500 when a stage fails.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use blogsmith_core::{BlogDeps, SilentProgress, create_blog, summarize};
use blogsmith_shared::{BlogsmithError, ErrorKind, RunInput};
use color_eyre::eyre::Result;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// State shared with the handlers.
#[derive(Clone)]
pub(crate) struct ServerState {
    pub deps: Arc<BlogDeps>,
    /// Cancelled on shutdown; each request runs under a child token.
    pub shutdown: CancellationToken,
}

pub(crate) fn router(state: ServerState) -> Router {
    Router::new()
        .route("/create-blog", post(handle_create_blog))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

/// Bind `host:port` and serve until Ctrl-C.
pub(crate) async fn serve(host: &str, port: u16, deps: BlogDeps) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let shutdown = CancellationToken::new();
    let state = ServerState {
        deps: Arc::new(deps),
        shutdown: shutdown.clone(),
    };

    info!(%addr, "listening");
    println!("Serving POST http://{addr}/create-blog");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            shutdown.cancel();
        })
        .await?;
    Ok(())
}

/// Error body for a request that never reached the pipeline.
fn rejected(e: &BlogsmithError, started: Instant) -> (StatusCode, Json<Value>) {
    let status = if e.kind() == ErrorKind::Validation {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(json!({
            "success": false,
            "error": e.to_string(),
            "errorKind": e.kind(),
            "processingTimeMs": started.elapsed().as_millis() as u64,
        })),
    )
}

async fn handle_create_blog(
    State(state): State<ServerState>,
    payload: Result<Json<RunInput>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let started = Instant::now();
    let input = match payload {
        Ok(Json(input)) => input,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "unreadable request body");
            let err = BlogsmithError::validation(format!(
                "request body must be a JSON object with a `url`: {}",
                rejection.body_text()
            ));
            return rejected(&err, started);
        }
    };
    let cancel = state.shutdown.child_token();
    let url = input.url.clone();

    let outcome = match create_blog(input, &state.deps, &SilentProgress, &cancel).await {
        Ok(outcome) => outcome,
        Err(e) => return rejected(&e, started),
    };

    let report = &outcome.report;
    match &report.failure {
        None => {
            info!(%url, elapsed_ms = report.total_duration_ms, "blog created");
            (
                StatusCode::OK,
                Json(json!({
                    "summary": summarize(&outcome),
                    "report": report,
                    "fullResults": outcome.context,
                })),
            )
        }
        Some(failure) => {
            error!(
                %url,
                stage = %failure.failed_stage,
                error = %failure.error_message,
                "blog creation failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Blog creation pipeline failed",
                    "failedStage": failure.failed_stage,
                    "failedAtIndex": failure.failed_at_index,
                    "errorMessage": failure.error_message,
                    "errorKind": failure.error_kind,
                    "stepsCompleted": report.steps_completed,
                    "processingTimeMs": report.total_duration_ms,
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use blogsmith_core::{Capabilities, Orchestrator};
    use blogsmith_shared::{
        BlogsmithError, Document, Fetcher, Generation, GenerationRequest, Generator, ModelRole,
        PipelineOptions, PublishReceipt, Publisher, SiteSnapshot,
    };

    use super::*;

    /// Fails every generation call.
    #[derive(Default)]
    struct DownGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for DownGenerator {
        async fn generate(&self, _request: GenerationRequest) -> blogsmith_shared::Result<Generation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BlogsmithError::Generation("503 Service Unavailable".into()))
        }

        fn model_for(&self, role: ModelRole) -> String {
            format!("stub-{role}")
        }
    }

    struct StubFetcher;

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> blogsmith_shared::Result<SiteSnapshot> {
            Ok(SiteSnapshot {
                url: url.to_string(),
                title: "Leaf & Kettle".into(),
                ..SiteSnapshot::default()
            })
        }
    }

    struct StubPublisher;

    #[async_trait]
    impl Publisher for StubPublisher {
        async fn publish(&self, _document: &Document) -> blogsmith_shared::Result<PublishReceipt> {
            Ok(PublishReceipt::default())
        }
    }

    async fn spawn_server() -> (String, Arc<DownGenerator>) {
        let generator = Arc::new(DownGenerator::default());
        let caps = Capabilities {
            generator: generator.clone(),
            fetcher: Arc::new(StubFetcher),
            publisher: Arc::new(StubPublisher),
        };
        let deps = BlogDeps::new(Orchestrator::new(caps, PipelineOptions::default()));
        let state = ServerState {
            deps: Arc::new(deps),
            shutdown: CancellationToken::new(),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        (format!("http://{addr}"), generator)
    }

    #[tokio::test]
    async fn missing_url_is_a_bad_request() {
        let (base, generator) = spawn_server().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/create-blog"))
            .json(&json!({"selectedTopic": "Tea"}))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["errorKind"], "validation");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_a_json_bad_request() {
        let (base, generator) = spawn_server().await;
        let client = reqwest::Client::new();

        for (content_type, body) in [
            ("application/json", "{\"url\": "),
            ("text/plain", "https://leafandkettle.com"),
        ] {
            let resp = client
                .post(format!("{base}/create-blog"))
                .header("Content-Type", content_type)
                .body(body)
                .send()
                .await
                .unwrap();

            assert_eq!(resp.status().as_u16(), 400, "{content_type}");
            let body: Value = resp.json().await.unwrap();
            assert_eq!(body["success"], false);
            assert_eq!(body["errorKind"], "validation");
            assert!(body["error"].as_str().unwrap().starts_with("validation error: "));
            assert!(body["processingTimeMs"].is_u64());
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stage_failure_reports_the_stage() {
        let (base, generator) = spawn_server().await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/create-blog"))
            .json(&json!({"url": "https://leafandkettle.com"}))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status().as_u16(), 500);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["failedStage"], "analyze-site");
        assert_eq!(body["failedAtIndex"], 0);
        assert!(
            body["errorMessage"]
                .as_str()
                .unwrap()
                .starts_with("analyze-site: ")
        );
        assert!(body["processingTimeMs"].is_u64());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn health_responds() {
        let (base, _) = spawn_server().await;
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(resp.text().await.unwrap(), "ok");
    }
}
