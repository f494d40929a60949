//! MCP tool server over stdio.
//!
//! Exposes the standalone tools to MCP clients. A tool fault comes back as an
//! error result whose text is `{"error": "<message>"}`.

use rmcp::{
    ErrorData, ServerHandler, ServiceExt,
    handler::server::tool::{Parameters, ToolRouter},
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    schemars, tool, tool_handler, tool_router,
    transport::stdio,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use duediligence_core::Clients;
use duediligence_core::tools::{
    self, ExtractRules, LinkedInRequest, ScrapeRequest, SummaryRequest, VideoRequest,
};
use duediligence_shared::AppConfig;

/// MCP request for scraping a page
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct WebScraperParams {
    #[schemars(description = "Page URL to fetch")]
    pub url: String,

    #[schemars(description = "Optional CSS selectors for product and career texts")]
    pub extract_rules: Option<ExtractRuleParams>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExtractRuleParams {
    #[schemars(description = "CSS selector matching product mentions")]
    pub products: Option<String>,

    #[schemars(description = "CSS selector matching career mentions")]
    pub careers: Option<String>,
}

/// MCP request for a video transcript
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct VideoAnalyzerParams {
    #[schemars(description = "Watch URL of the video")]
    pub video_url: String,

    #[schemars(description = "Accepted for compatibility; visuals are not analyzed")]
    pub analyze_visuals: Option<bool>,
}

/// MCP request for professional-network data
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LinkedInSimulatorParams {
    #[schemars(description = "Company name")]
    pub company_name: String,
}

/// MCP request for a strategic summary
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SummarizerParams {
    #[schemars(description = "Text to summarize")]
    pub text: String,

    #[schemars(description = "Focus areas; defaults to strategy, products, hiring")]
    pub focus_areas: Option<Vec<String>>,
}

/// Due-diligence MCP server
#[derive(Clone)]
pub(crate) struct ToolServer {
    clients: Clients,
    text_char_limit: usize,
    tool_router: ToolRouter<ToolServer>,
}

impl ToolServer {
    pub(crate) fn new(clients: Clients, config: &AppConfig) -> Self {
        Self {
            clients,
            text_char_limit: config.fetch.content_char_limit,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl ToolServer {
    #[tool(
        description = "Fetch a web page and return its title, links, and visible text. Optional CSS selectors return matching product and career texts."
    )]
    async fn web_scraper(
        &self,
        Parameters(WebScraperParams { url, extract_rules }): Parameters<WebScraperParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = ScrapeRequest {
            url,
            extract_rules: extract_rules.map(|rules| ExtractRules {
                products: rules.products,
                careers: rules.careers,
            }),
        };

        let result = match tools::require_non_empty("url", &request.url) {
            Ok(()) => {
                let fetcher = self.clients.fetcher.as_ref();
                tools::scrape(fetcher, &request, self.text_char_limit).await
            }
            Err(e) => Err(e),
        };
        tool_result("web_scraper", result)
    }

    #[tool(description = "Return the transcript of a video given its watch URL.")]
    async fn video_analyzer(
        &self,
        Parameters(VideoAnalyzerParams {
            video_url,
            analyze_visuals,
        }): Parameters<VideoAnalyzerParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = VideoRequest {
            video_url,
            analyze_visuals: analyze_visuals.unwrap_or(false),
        };

        let result = match tools::require_non_empty("video_url", &request.video_url) {
            Ok(()) => tools::analyze_video(self.clients.transcripts.as_ref(), &request).await,
            Err(e) => Err(e),
        };
        tool_result("video_analyzer", result)
    }

    #[tool(description = "Return simulated hiring trends and recent updates for a company.")]
    async fn linkedin_simulator(
        &self,
        Parameters(LinkedInSimulatorParams { company_name }): Parameters<LinkedInSimulatorParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let data = tools::simulated_linkedin(&LinkedInRequest { company_name });
        tool_result("linkedin_simulator", Ok(data))
    }

    #[tool(
        description = "Summarize text strategically: key initiatives, product developments, hiring trends, competitive positioning."
    )]
    async fn summarizer(
        &self,
        Parameters(SummarizerParams { text, focus_areas }): Parameters<SummarizerParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let mut request = SummaryRequest::new(text);
        if let Some(focus_areas) = focus_areas {
            request.focus_areas = focus_areas;
        }

        let result = tools::summarize(self.clients.llm.as_ref(), &request).await;
        tool_result("summarizer", result)
    }
}

#[tool_handler]
impl ServerHandler for ToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "duediligence".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some("Company research tools. Available tools: 'web_scraper' (page title, links, text), 'video_analyzer' (video transcript), 'linkedin_simulator' (simulated hiring and activity data), 'summarizer' (strategic summary).".to_string()),
        }
    }
}

/// Fold a tool outcome into an MCP result.
fn tool_result<T: Serialize>(
    tool: &str,
    result: duediligence_shared::Result<T>,
) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(value) => {
            let body = serde_json::to_string_pretty(&value)
                .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
            Ok(CallToolResult::success(vec![Content::text(body)]))
        }
        Err(e) => {
            warn!(tool, error = %e, "tool call failed");
            let body = serde_json::json!({"error": e.to_string()}).to_string();
            Ok(CallToolResult::error(vec![Content::text(body)]))
        }
    }
}

/// Serve the tools on stdin/stdout until the client disconnects.
pub(crate) async fn serve(clients: Clients, config: &AppConfig) -> color_eyre::eyre::Result<()> {
    info!("serving MCP tools on stdio");

    let service = ToolServer::new(clients, config)
        .serve(stdio())
        .await
        .inspect_err(|e| error!("MCP serving error: {e:?}"))?;

    service.waiting().await?;
    info!("MCP client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ToolServer {
        let config = AppConfig::default();
        let clients = Clients::with_keys(&config, "search-key", "llm-key").unwrap();
        ToolServer::new(clients, &config)
    }

    /// The JSON body carried in a tool result's single text item.
    fn result_body(result: &CallToolResult) -> serde_json::Value {
        let json = serde_json::to_value(result).unwrap();
        let text = json["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    fn is_error(result: &CallToolResult) -> bool {
        serde_json::to_value(result).unwrap()["isError"] == serde_json::json!(true)
    }

    #[test]
    fn lists_the_four_tools() {
        let mut names: Vec<String> = server()
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["linkedin_simulator", "summarizer", "video_analyzer", "web_scraper"]
        );
    }

    #[tokio::test]
    async fn linkedin_simulator_returns_canned_data() {
        let result = server()
            .linkedin_simulator(Parameters(LinkedInSimulatorParams {
                company_name: "Acme Corp".into(),
            }))
            .await
            .unwrap();

        assert!(!is_error(&result));
        let body = result_body(&result);
        assert_eq!(body["recent_updates"][0], "Acme Corp announced new cloud product");
        assert_eq!(body["hiring_trends"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn scraper_fault_is_error_result() {
        let result = server()
            .web_scraper(Parameters(WebScraperParams {
                url: "http://127.0.0.1:9/admin".into(),
                extract_rules: None,
            }))
            .await
            .unwrap();

        assert!(is_error(&result));
        let body = result_body(&result);
        assert!(body["error"].as_str().unwrap().contains("blocked target"));
    }

    #[tokio::test]
    async fn blank_video_url_is_error_result() {
        let result = server()
            .video_analyzer(Parameters(VideoAnalyzerParams {
                video_url: " ".into(),
                analyze_visuals: None,
            }))
            .await
            .unwrap();

        assert!(is_error(&result));
        assert!(
            result_body(&result)["error"]
                .as_str()
                .unwrap()
                .contains("video_url must not be empty")
        );
    }
}
