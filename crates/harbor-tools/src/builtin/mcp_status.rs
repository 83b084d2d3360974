use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use harbor_config::ToolCategory;

use crate::registry::DynamicRegistry;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Report configured vs connected remote-protocol servers and what each one
/// contributes.  Never errors: with nothing configured it returns zeroed
/// counts.
pub struct GetMcpStatusTool {
    pub dynamic: Arc<DynamicRegistry>,
}

#[async_trait]
impl Tool for GetMcpStatusTool {
    fn name(&self) -> &str {
        "get_mcp_status"
    }

    fn description(&self) -> &str {
        "Status of remote-protocol tool servers: which are configured, which \
         are connected, and the tool/resource/prompt counts each contributes."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::ReadOnly
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let connected = self.dynamic.connected_servers();

        // Union of configured and connected: a server can register tools
        // without being named in configuration (e.g. added at runtime).
        let mut names: Vec<String> = self.dynamic.configured_servers().to_vec();
        for s in &connected {
            if !names.contains(s) {
                names.push(s.clone());
            }
        }
        names.sort();

        let servers: Vec<Value> = names
            .iter()
            .map(|name| {
                let inv = self.dynamic.inventory(name);
                json!({
                    "name": name,
                    "configured": self.dynamic.configured_servers().contains(name),
                    "connected": connected.contains(name),
                    "tools": inv.tools,
                    "resources": inv.resources,
                    "prompts": inv.prompts,
                })
            })
            .collect();

        ToolOutput::ok(
            &call.id,
            json!({
                "configuredCount": self.dynamic.configured_servers().len(),
                "connectedCount": connected.len(),
                "servers": servers,
            }),
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::DynamicTool;

    struct Remote {
        name: String,
    }

    #[async_trait]
    impl DynamicTool for Remote {
        fn name(&self) -> &str {
            &self.name
        }
        async fn execute(&self, call: &ToolCall) -> ToolOutput {
            ToolOutput::ok(&call.id, json!({}))
        }
    }

    fn call() -> ToolCall {
        ToolCall {
            id: "m1".into(),
            name: "get_mcp_status".into(),
            args: json!({}),
        }
    }

    #[tokio::test]
    async fn no_servers_returns_zeroed_counts_not_error() {
        let t = GetMcpStatusTool {
            dynamic: Arc::new(DynamicRegistry::new(vec![])),
        };
        let out = t.execute(&call()).await;
        assert!(!out.is_error);
        assert_eq!(out.value["configuredCount"], json!(0));
        assert_eq!(out.value["connectedCount"], json!(0));
        assert_eq!(out.value["servers"], json!([]));
    }

    #[tokio::test]
    async fn configured_but_disconnected_server_shows_zero_tools() {
        let t = GetMcpStatusTool {
            dynamic: Arc::new(DynamicRegistry::new(vec!["files".into()])),
        };
        let out = t.execute(&call()).await;
        let server = &out.value["servers"][0];
        assert_eq!(server["name"], json!("files"));
        assert_eq!(server["configured"], json!(true));
        assert_eq!(server["connected"], json!(false));
        assert_eq!(server["tools"], json!(0));
    }

    #[tokio::test]
    async fn connected_server_reports_its_counts() {
        let dynamic = Arc::new(DynamicRegistry::new(vec!["files".into()]));
        dynamic.register(Arc::new(Remote {
            name: "files::read".into(),
        }));
        dynamic.register(Arc::new(Remote {
            name: "files::write".into(),
        }));
        dynamic.set_server_inventory("files", 4, 1);

        let t = GetMcpStatusTool { dynamic };
        let out = t.execute(&call()).await;
        let server = &out.value["servers"][0];
        assert_eq!(server["connected"], json!(true));
        assert_eq!(server["tools"], json!(2));
        assert_eq!(server["resources"], json!(4));
        assert_eq!(server["prompts"], json!(1));
        assert_eq!(out.value["connectedCount"], json!(1));
    }

    #[tokio::test]
    async fn runtime_registered_server_appears_unconfigured() {
        let dynamic = Arc::new(DynamicRegistry::new(vec![]));
        dynamic.register(Arc::new(Remote {
            name: "adhoc::tool".into(),
        }));
        let t = GetMcpStatusTool { dynamic };
        let out = t.execute(&call()).await;
        let server = &out.value["servers"][0];
        assert_eq!(server["configured"], json!(false));
        assert_eq!(server["connected"], json!(true));
    }
}
