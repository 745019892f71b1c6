//! MCP server implementation.
//!
//! This module contains the main server setup using rmcp.

use crate::context::Context;
use crate::error::Error;
use crate::models::{AnalyzeParams, ApplyChangeParams, DependentsParams, ImpactParams, QueryParams};
use crate::tools::Tools;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::transport::stdio;
use rmcp::{
    ErrorData as McpError, ServiceExt, handler::server::ServerHandler, tool, tool_handler,
    tool_router,
};
use sheetgraph::config::SheetgraphConfig;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Client mistakes become invalid-params errors; everything else is internal.
fn to_mcp_error(err: &Error) -> McpError {
    if err.is_client_error() {
        McpError::invalid_params(err.to_string(), None)
    } else {
        McpError::internal_error(err.to_string(), None)
    }
}

/// The sheetgraph MCP server.
///
/// Provides MCP protocol handling over stdio transport.
#[derive(Clone)]
pub struct SheetgraphMcpServer {
    /// Shared graph context.
    context: Arc<RwLock<Context>>,
    /// Tool implementations.
    tools: Arc<Tools>,
    /// Tool router for MCP dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SheetgraphMcpServer {
    /// Build the graph from a spreadsheet.
    #[tool(
        description = "Build the dependency graph from a spreadsheet snapshot. Call this first; it replaces any previously loaded graph."
    )]
    async fn analyze(
        &self,
        Parameters(params): Parameters<AnalyzeParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.tools.analyze(&params.spreadsheet_id).await {
            Ok(report) => Ok(CallToolResult::success(vec![Content::json(report)?])),
            Err(e) => Err(to_mcp_error(&e)),
        }
    }

    /// Answer a natural-language question.
    #[tool(
        description = "Ask a question about the spreadsheet, e.g. 'show cells where value > 100', 'what depends on revenue', or 'what is the impact of A1' (pass cellId in parameters)."
    )]
    async fn query(
        &self,
        Parameters(params): Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.tools.query(params.query, params.parameters).await {
            Ok(answer) => Ok(CallToolResult::success(vec![Content::json(answer)?])),
            Err(e) => Err(to_mcp_error(&e)),
        }
    }

    /// Trace every dependency path into a cell.
    #[tool(
        description = "Show every cell affected if the given cell changes, with the dependency paths that connect them."
    )]
    async fn impact(
        &self,
        Parameters(params): Parameters<ImpactParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.tools.impact(&params.cell_id).await {
            Ok(impact) => Ok(CallToolResult::success(vec![Content::json(impact)?])),
            Err(e) => Err(to_mcp_error(&e)),
        }
    }

    /// List cells depending on a cell.
    #[tool(description = "List the cells that transitively depend on a cell, nearest first.")]
    async fn dependents(
        &self,
        Parameters(params): Parameters<DependentsParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .dependents(&params.cell_id, params.max_depth)
            .await
        {
            Ok(cells) => Ok(CallToolResult::success(vec![Content::json(cells)?])),
            Err(e) => Err(to_mcp_error(&e)),
        }
    }

    /// Sample the graph.
    #[tool(description = "Return a capped sample of DEPENDS_ON edges for drawing the graph.")]
    async fn visualize(&self) -> Result<CallToolResult, McpError> {
        match self.tools.visualize().await {
            Ok(sample) => Ok(CallToolResult::success(vec![Content::json(sample)?])),
            Err(e) => Err(to_mcp_error(&e)),
        }
    }

    /// Apply a cell change.
    #[tool(
        description = "Apply a cell edit (new value and/or formula) to the graph and report which cells it affects."
    )]
    async fn apply_change(
        &self,
        Parameters(params): Parameters<ApplyChangeParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .apply_change(
                &params.cell_id,
                params.old_value,
                params.new_value,
                params.formula,
                params.sheet_name,
            )
            .await
        {
            Ok(outcome) => Ok(CallToolResult::success(vec![Content::json(outcome)?])),
            Err(e) => Err(to_mcp_error(&e)),
        }
    }

    /// Report the loaded spreadsheet and graph size.
    #[tool(description = "Show which spreadsheet is loaded and how many sheets, cells and edges the graph holds.")]
    async fn status(&self) -> Result<CallToolResult, McpError> {
        match self.tools.status().await {
            Ok(status) => Ok(CallToolResult::success(vec![Content::json(status)?])),
            Err(e) => Err(to_mcp_error(&e)),
        }
    }
}

impl SheetgraphMcpServer {
    /// Create a new sheetgraph MCP server.
    #[must_use]
    pub fn new(config: SheetgraphConfig) -> Self {
        let context = Arc::new(RwLock::new(Context::new(config)));
        let tools = Arc::new(Tools::new(Arc::clone(&context)));

        Self {
            context,
            tools,
            tool_router: Self::tool_router(),
        }
    }

    /// Get a reference to the context.
    #[must_use]
    pub fn context(&self) -> &Arc<RwLock<Context>> {
        &self.context
    }

    /// Serve MCP over stdin/stdout until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to start or terminates abnormally.
    pub async fn run(self) -> anyhow::Result<()> {
        let service = self.serve(stdio()).await?;
        service.waiting().await?;
        Ok(())
    }
}

impl Default for SheetgraphMcpServer {
    fn default() -> Self {
        Self::new(SheetgraphConfig::default())
    }
}

#[tool_handler]
impl ServerHandler for SheetgraphMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sheetgraph-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Sheetgraph MCP server for spreadsheet dependency analysis. Call analyze first to load a spreadsheet."
                    .into(),
            ),
        }
    }
}
