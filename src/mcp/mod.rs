//! MCP server exposing the project registry and orchestrators as tools.

mod types;

pub use types::*;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;

use crate::error::Error;
use crate::registry::ProjectRegistry;
use crate::stream::FrameStream;

#[derive(Clone)]
pub struct McpServer {
    registry: ProjectRegistry,
    tool_router: ToolRouter<Self>,
}

fn mcp_error(e: Error) -> McpError {
    match e {
        Error::InvalidInput(_) | Error::InvalidConfig(_) | Error::ProjectNotFound(_) => {
            McpError::invalid_params(e.to_string(), None)
        }
        _ => McpError::internal_error(e.to_string(), None),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

impl McpServer {
    pub fn new(registry: ProjectRegistry) -> Self {
        Self {
            registry,
            tool_router: Self::tool_router(),
        }
    }

    async fn transcript(frames: FrameStream) -> Result<CallToolResult, McpError> {
        let transcript = StreamTranscript::new(frames.collect().await);
        let json = serde_json::to_string_pretty(&transcript)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        if transcript.succeeded {
            Ok(CallToolResult::success(vec![Content::text(json)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(json)]))
        }
    }

    // ============================================================
    // Test helpers - expose tool logic for testing
    // ============================================================

    pub async fn test_create_project(&self, name: &str) -> Result<CreatedProject, McpError> {
        let identifier = self
            .registry
            .create_project(name)
            .map_err(mcp_error)?;
        Ok(CreatedProject { identifier })
    }

    pub async fn test_update_config(
        &self,
        identifier: &str,
        config_json: &str,
    ) -> Result<(), McpError> {
        let orchestrator = self.registry.orchestrator(identifier).map_err(mcp_error)?;
        orchestrator
            .update_config(config_json)
            .await
            .map_err(mcp_error)?;
        Ok(())
    }

    pub async fn test_plan(
        &self,
        identifier: &str,
        description: &str,
    ) -> Result<StreamTranscript, McpError> {
        let orchestrator = self.registry.orchestrator(identifier).map_err(mcp_error)?;
        let frames = orchestrator.plan(description).map_err(mcp_error)?;
        Ok(StreamTranscript::new(frames.collect().await))
    }

    pub async fn test_iterate(&self, identifier: &str) -> Result<StreamTranscript, McpError> {
        let orchestrator = self.registry.orchestrator(identifier).map_err(mcp_error)?;
        let frames = orchestrator.iterate().map_err(mcp_error)?;
        Ok(StreamTranscript::new(frames.collect().await))
    }
}

#[tool_router]
impl McpServer {
    // ============================================================
    // Registry Tools
    // ============================================================

    #[tool(
        description = "Create a new project from a human-readable name. Returns the project's unique identifier (e.g. 'My Cool App!!!' becomes 'my-cool-app', a second one 'my-cool-app-2'). Use the identifier with every other tool."
    )]
    async fn create_project(
        &self,
        params: Parameters<CreateProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        let identifier = self
            .registry
            .create_project(&params.0.name)
            .map_err(mcp_error)?;

        json_result(&CreatedProject { identifier })
    }

    #[tool(
        description = "List every project, newest first. Returns identifier, displayName and createdAt for each."
    )]
    async fn list_projects(&self) -> Result<CallToolResult, McpError> {
        let projects = self.registry.list_projects().map_err(mcp_error)?;
        json_result(&projects)
    }

    #[tool(
        description = "Get a project's current state: lifecycle phase, display name, skills, agent configuration, and the last generated requirements document and backlog."
    )]
    async fn get_project(
        &self,
        params: Parameters<ProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        let snapshot = self
            .registry
            .orchestrator(&params.0.identifier)
            .and_then(|orchestrator| orchestrator.snapshot())
            .map_err(mcp_error)?;

        json_result(&snapshot)
    }

    // ============================================================
    // Project Tools
    // ============================================================

    #[tool(description = "Set a project's display name. Safe to call again to rename.")]
    async fn setup_project(
        &self,
        params: Parameters<SetupProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let orchestrator = self
            .registry
            .orchestrator(&req.identifier)
            .map_err(mcp_error)?;
        let response = orchestrator
            .setup(&req.display_name)
            .await
            .map_err(mcp_error)?;

        json_result(&response)
    }

    #[tool(
        description = "Bring up the project's sandbox and write credentials, the agent configuration and every skill into it. Safe to repeat; files are overwritten."
    )]
    async fn initialize_sandbox(
        &self,
        params: Parameters<ProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        let orchestrator = self
            .registry
            .orchestrator(&params.0.identifier)
            .map_err(mcp_error)?;
        orchestrator.initialize_sandbox().await.map_err(mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(
            "Sandbox initialized",
        )]))
    }

    #[tool(
        description = "Replace the project's agent configuration. The text must be valid JSON; invalid input is rejected and the previous configuration kept. Does not touch the sandbox - call write_config_to_sandbox afterwards."
    )]
    async fn update_config(
        &self,
        params: Parameters<UpdateConfigRequest>,
    ) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let orchestrator = self
            .registry
            .orchestrator(&req.identifier)
            .map_err(mcp_error)?;
        let response = orchestrator
            .update_config(&req.config_json)
            .await
            .map_err(mcp_error)?;

        json_result(&response)
    }

    #[tool(description = "Write the project's current agent configuration into its sandbox.")]
    async fn write_config_to_sandbox(
        &self,
        params: Parameters<ProjectRequest>,
    ) -> Result<CallToolResult, McpError> {
        let orchestrator = self
            .registry
            .orchestrator(&params.0.identifier)
            .map_err(mcp_error)?;
        let response = orchestrator
            .write_config_to_sandbox()
            .await
            .map_err(mcp_error)?;

        json_result(&response)
    }

    // ============================================================
    // Streamed Tools
    // ============================================================

    #[tool(
        description = "Plan an app: runs the planning skill in the project's sandbox and waits for it to finish. Returns every frame in order (status, output, then one complete or error frame). The complete frame carries the requirements document and the story backlog."
    )]
    async fn plan(&self, params: Parameters<PlanRequest>) -> Result<CallToolResult, McpError> {
        let req = params.0;
        let orchestrator = self
            .registry
            .orchestrator(&req.identifier)
            .map_err(mcp_error)?;
        let frames = orchestrator.plan(&req.description).map_err(mcp_error)?;

        Self::transcript(frames).await
    }

    #[tool(
        description = "Continue implementation: runs the implementation skill in the project's sandbox once and returns every frame in order, ending with one complete or error frame."
    )]
    async fn iterate(&self, params: Parameters<ProjectRequest>) -> Result<CallToolResult, McpError> {
        let orchestrator = self
            .registry
            .orchestrator(&params.0.identifier)
            .map_err(mcp_error)?;
        let frames = orchestrator.iterate().map_err(mcp_error)?;

        Self::transcript(frames).await
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "backlog-forge".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            instructions: Some(
                r#"Backlog Forge turns a one-line app idea into a requirements document and a story backlog, then implements the stories, all inside a per-project sandbox.

WORKFLOW:
1. create_project with a name; keep the returned identifier.
2. initialize_sandbox to provision the sandbox with the agent config and skills.
3. plan with a description of the app. Wait for the transcript; the final
   'complete' frame holds the requirements document and the backlog.
4. iterate to implement the next story. Repeat as needed.

CONFIGURATION:
- get_project shows the current agent configuration (configDocument).
- update_config replaces it (must be valid JSON), then write_config_to_sandbox
  pushes it into the running sandbox.

NOTES:
- Operations on one project run one at a time; a second request waits.
- A backlog that fails to parse is reported as empty; the requirements
  document is still returned."#
                    .into(),
            ),
            ..Default::default()
        }
    }
}

pub async fn run_stdio_server(registry: ProjectRegistry) -> anyhow::Result<()> {
    use tokio::io::{stdin, stdout};

    tracing::info!("Starting MCP server via stdio");

    let service = McpServer::new(registry);
    let server = service.serve((stdin(), stdout())).await?;

    let quit_reason = server.waiting().await?;
    tracing::info!("MCP server stopped: {:?}", quit_reason);

    Ok(())
}
