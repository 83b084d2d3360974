// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
pub mod builtin;
mod dispatcher;
mod gate;
mod registry;
mod safety;
mod tool;
mod workspace;

pub use dispatcher::Dispatcher;
pub use gate::{GateDecision, ToolPermissionGate, BUILTIN_TOOLS};
pub use registry::{DynamicRegistry, ServerInventory, ToolRegistry, ToolSchema};
pub use safety::{CommandPolicy, RiskLevel, SafetyAssessment};
pub use tool::{DynamicTool, Tool, ToolCall, ToolOutput};
pub use workspace::{TestReport, Workspace};
