//! MCP server integration tests.
//!
//! Tools are exercised through the server's `test_*` helpers, which run the
//! same registry and orchestrator calls as the tool handlers.

mod common;

use std::sync::Arc;

use backlog_forge::mcp::McpServer;
use backlog_forge::stream::{Completion, Frame};
use common::*;

fn mcp_setup() -> (McpServer, Arc<ScriptedProvider>) {
    let (registry, provider) = setup();
    (McpServer::new(registry), provider)
}

mod registry_tools {
    use super::*;

    #[tokio::test]
    async fn create_project_allocates_unique_identifiers() {
        let (server, _) = mcp_setup();

        let first = server.test_create_project("My Cool App!!!").await.unwrap();
        let second = server.test_create_project("My Cool App!!!").await.unwrap();

        assert_eq!(first.identifier, "my-cool-app");
        assert_eq!(second.identifier, "my-cool-app-2");
    }

    #[tokio::test]
    async fn create_project_rejects_blank_names() {
        let (server, _) = mcp_setup();

        let result = server.test_create_project("   ").await;

        assert!(result.is_err());
    }
}

mod project_tools {
    use super::*;

    #[tokio::test]
    async fn update_config_rejects_invalid_json() {
        let (server, _) = mcp_setup();
        let project = server.test_create_project("Todo").await.unwrap();

        let result = server
            .test_update_config(&project.identifier, "not json")
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn update_config_accepts_valid_json() {
        let (server, _) = mcp_setup();
        let project = server.test_create_project("Todo").await.unwrap();

        let result = server
            .test_update_config(&project.identifier, r#"{"tools":{"skill":true}}"#)
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn unknown_projects_are_rejected() {
        let (server, _) = mcp_setup();

        assert!(server.test_update_config("ghost", "{}").await.is_err());
        assert!(server.test_iterate("ghost").await.is_err());
    }
}

mod streamed_tools {
    use super::*;

    #[tokio::test]
    async fn plan_returns_the_full_transcript() {
        let (server, provider) = mcp_setup();
        let project = server.test_create_project("Todo").await.unwrap();
        provider
            .sandbox
            .set_script(Script::planning(VALID_BACKLOG, DOCUMENT));

        let transcript = server
            .test_plan(&project.identifier, "a todo app")
            .await
            .unwrap();

        assert!(transcript.succeeded);
        assert!(matches!(transcript.frames[0], Frame::Status { .. }));
        match transcript.terminal() {
            Some(Frame::Complete(done)) => {
                assert_eq!(done.document.as_deref(), Some(DOCUMENT));
                assert_eq!(done.backlog.as_ref().map(|b| b.len()), Some(2));
            }
            other => panic!("expected complete frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn plan_failure_is_reported_in_the_transcript() {
        let (server, provider) = mcp_setup();
        let project = server.test_create_project("Todo").await.unwrap();
        provider.set_unavailable(true);

        let transcript = server
            .test_plan(&project.identifier, "a todo app")
            .await
            .unwrap();

        assert!(!transcript.succeeded);
        assert!(matches!(transcript.terminal(), Some(Frame::Error { .. })));
    }

    #[tokio::test]
    async fn plan_rejects_an_empty_description() {
        let (server, _) = mcp_setup();
        let project = server.test_create_project("Todo").await.unwrap();

        let result = server.test_plan(&project.identifier, "").await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn iterate_completes() {
        let (server, _) = mcp_setup();
        let project = server.test_create_project("Todo").await.unwrap();

        let transcript = server.test_iterate(&project.identifier).await.unwrap();

        assert!(transcript.succeeded);
        assert_eq!(
            transcript.terminal(),
            Some(&Frame::Complete(Completion::message("Iteration complete")))
        );
    }
}
