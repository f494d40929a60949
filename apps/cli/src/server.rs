//! HTTP surface for the pipeline and the standalone tools.
//!
//! Every tool endpoint answers 200; faults are reported in the body as
//! `{"error": "<message>"}`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use color_eyre::eyre::{Result, eyre};
use duediligence_core::tools::{
    self, AnalyzeRequest, AnalyzeResponse, LinkedInRequest, ScrapeRequest, ScrapeResponse,
    SummaryRequest, SummaryResponse, ToolReply, VideoRequest, VideoResponse,
};
use duediligence_core::{Clients, Pipeline};
use duediligence_shared::{AppConfig, LinkedInData};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Shared handler state.
#[derive(Clone)]
pub(crate) struct ServerState {
    clients: Clients,
    pipeline: Arc<Pipeline>,
    text_char_limit: usize,
}

impl ServerState {
    pub(crate) fn new(clients: Clients, config: &AppConfig) -> Result<Self> {
        let pipeline = Pipeline::with_defaults(clients.clone(), config)?;
        Ok(Self {
            clients,
            pipeline: Arc::new(pipeline),
            text_char_limit: config.fetch.content_char_limit,
        })
    }
}

/// Build the router.
pub(crate) fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/scrape", post(handle_scrape))
        .route("/analyze-video", post(handle_analyze_video))
        .route("/linkedin-data", post(handle_linkedin))
        .route("/summarize", post(handle_summarize))
        .route("/analyze", post(handle_analyze))
        .with_state(state)
}

/// Bind `{host}:{port}` and serve until Ctrl-C.
pub(crate) async fn serve(clients: Clients, config: &AppConfig) -> Result<()> {
    let app = router(ServerState::new(clients, config)?);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| eyre!("failed to bind {bind_addr}: {e}"))?;
    let addr: SocketAddr = listener.local_addr()?;

    info!("serving on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {e}");
            }
        })
        .await?;

    info!("server stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn handle_scrape(
    State(state): State<ServerState>,
    Json(request): Json<ScrapeRequest>,
) -> Json<ToolReply<ScrapeResponse>> {
    let result = match tools::require_non_empty("url", &request.url) {
        Ok(()) => {
            let fetcher = state.clients.fetcher.as_ref();
            tools::scrape(fetcher, &request, state.text_char_limit).await
        }
        Err(e) => Err(e),
    };
    Json(log_fault("scrape", result).into())
}

async fn handle_analyze_video(
    State(state): State<ServerState>,
    Json(request): Json<VideoRequest>,
) -> Json<ToolReply<VideoResponse>> {
    let result = match tools::require_non_empty("video_url", &request.video_url) {
        Ok(()) => tools::analyze_video(state.clients.transcripts.as_ref(), &request).await,
        Err(e) => Err(e),
    };
    Json(log_fault("analyze-video", result).into())
}

async fn handle_linkedin(Json(request): Json<LinkedInRequest>) -> Json<LinkedInData> {
    Json(tools::simulated_linkedin(&request))
}

async fn handle_summarize(
    State(state): State<ServerState>,
    Json(request): Json<SummaryRequest>,
) -> Json<ToolReply<SummaryResponse>> {
    let result = tools::summarize(state.clients.llm.as_ref(), &request).await;
    Json(log_fault("summarize", result).into())
}

async fn handle_analyze(
    State(state): State<ServerState>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<ToolReply<AnalyzeResponse>> {
    let result = tools::analyze(&state.pipeline, &request).await;
    Json(log_fault("analyze", result).into())
}

fn log_fault<T>(
    endpoint: &str,
    result: duediligence_shared::Result<T>,
) -> duediligence_shared::Result<T> {
    if let Err(e) = &result {
        warn!(endpoint, error = %e, "request failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn spawn(config: AppConfig) -> String {
        let clients = Clients::with_keys(&config, "search-key", "llm-key").unwrap();
        let app = router(ServerState::new(clients, &config).unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn post_json(url: &str, body: serde_json::Value) -> serde_json::Value {
        let response = reqwest::Client::new().post(url).json(&body).send().await.unwrap();
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let base = spawn(AppConfig::default()).await;
        let body: serde_json::Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn linkedin_data_is_simulated() {
        let base = spawn(AppConfig::default()).await;
        let body = post_json(
            &format!("{base}/linkedin-data"),
            serde_json::json!({"company_name": "Acme Corp"}),
        )
        .await;
        assert_eq!(body["recent_updates"][0], "Acme Corp announced new cloud product");
        assert_eq!(body["hiring_trends"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn scrape_fault_is_error_body() {
        let base = spawn(AppConfig::default()).await;
        let body = post_json(
            &format!("{base}/scrape"),
            serde_json::json!({"url": "http://127.0.0.1:9/admin"}),
        )
        .await;
        assert!(body["error"].as_str().unwrap().contains("blocked target"));
    }

    #[tokio::test]
    async fn scrape_returns_page_surface() {
        let site = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><title>Acme</title></head><body><p>Anvils</p><a href="/jobs">Jobs</a><div class="tier">Pro</div></body></html>"#,
            ))
            .mount(&site)
            .await;

        let mut config = AppConfig::default();
        config.fetch.allow_private_targets = true;
        let base = spawn(config).await;

        let body = post_json(
            &format!("{base}/scrape"),
            serde_json::json!({"url": site.uri(), "extract_rules": {"products": "div.tier"}}),
        )
        .await;
        assert_eq!(body["title"], "Acme");
        assert_eq!(body["text_content"], "Acme Anvils Jobs Pro");
        assert_eq!(body["extracted_data"], serde_json::json!({"products": ["Pro"]}));
        assert!(body["links"][0].as_str().unwrap().ends_with("/jobs"));
    }

    #[tokio::test]
    async fn summarize_calls_model() {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Strategic summary"}}]
            })))
            .mount(&llm)
            .await;

        let mut config = AppConfig::default();
        config.llm.base_url = format!("{}/v1", llm.uri());
        let base = spawn(config).await;

        let body = post_json(
            &format!("{base}/summarize"),
            serde_json::json!({"text": "Acme builds anvils."}),
        )
        .await;
        assert_eq!(body, serde_json::json!({"summary": "Strategic summary"}));
    }

    #[tokio::test]
    async fn analyze_rejects_blank_query() {
        let base = spawn(AppConfig::default()).await;
        let body = post_json(&format!("{base}/analyze"), serde_json::json!({"query": " "})).await;
        assert!(body["error"].as_str().unwrap().contains("query must not be empty"));
    }
}
