// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use harbor_config::AgentMode;

use crate::gate::ToolPermissionGate;
use crate::{DynamicTool, Tool, ToolCall, ToolOutput};

/// A tool schema as offered to the model.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

// ── Built-in registry ─────────────────────────────────────────────────────────

/// Registry holding the static built-in tools.  Immutable after construction.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Schemas for the tools usable in `mode`, per the permission gate.
    pub fn schemas_for_mode(&self, mode: AgentMode) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .filter(|t| ToolPermissionGate::is_allowed(mode, t.name()).allowed)
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Dynamic registry ──────────────────────────────────────────────────────────

/// Per-server inventory counts reported by `get_mcp_status`.
#[derive(Debug, Clone, Default)]
pub struct ServerInventory {
    pub tools: usize,
    pub resources: usize,
    pub prompts: usize,
}

/// Open registry of dynamically discovered tools: MCP tools named
/// `server::tool` and plugin tools registered under plain names.
///
/// Availability changes between agent turns (servers connect and drop), so
/// this registry is interior-mutable and the dispatcher re-reads it on every
/// manifest build.
pub struct DynamicRegistry {
    tools: RwLock<HashMap<String, Arc<dyn DynamicTool>>>,
    /// Remote servers named in configuration, whether or not connected.
    configured_servers: Vec<String>,
    inventories: RwLock<HashMap<String, ServerInventory>>,
}

impl DynamicRegistry {
    pub fn new(configured_servers: Vec<String>) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            configured_servers,
            inventories: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, tool: Arc<dyn DynamicTool>) {
        let name = tool.name().to_string();
        if let Some(server) = name.split_once("::").map(|(s, _)| s.to_string()) {
            self.inventories
                .write()
                .unwrap()
                .entry(server)
                .or_default()
                .tools += 1;
        }
        self.tools.write().unwrap().insert(name, tool);
    }

    pub fn unregister(&self, name: &str) {
        if self.tools.write().unwrap().remove(name).is_some() {
            if let Some((server, _)) = name.split_once("::") {
                if let Some(inv) = self.inventories.write().unwrap().get_mut(server) {
                    inv.tools = inv.tools.saturating_sub(1);
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynamicTool>> {
        self.tools.read().unwrap().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().unwrap().contains_key(name)
    }

    /// Record resource/prompt counts advertised by a connected server.
    pub fn set_server_inventory(&self, server: &str, resources: usize, prompts: usize) {
        let mut map = self.inventories.write().unwrap();
        let inv = map.entry(server.to_string()).or_default();
        inv.resources = resources;
        inv.prompts = prompts;
    }

    pub fn configured_servers(&self) -> &[String] {
        &self.configured_servers
    }

    /// Servers that currently contribute at least one tool.
    pub fn connected_servers(&self) -> Vec<String> {
        let mut servers: Vec<String> = self
            .inventories
            .read()
            .unwrap()
            .iter()
            .filter(|(_, inv)| inv.tools > 0)
            .map(|(s, _)| s.clone())
            .collect();
        servers.sort();
        servers
    }

    pub fn inventory(&self, server: &str) -> ServerInventory {
        self.inventories
            .read()
            .unwrap()
            .get(server)
            .cloned()
            .unwrap_or_default()
    }

    /// Schemas for all currently registered dynamic tools.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .read()
            .unwrap()
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match self.get(&call.name) {
            Some(tool) => tool.execute(call).await,
            None => ToolOutput::err(&call.id, format!("unknown dynamic tool: {}", call.name)),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
