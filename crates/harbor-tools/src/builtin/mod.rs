pub mod context;
pub mod edit_file;
pub mod fs_manage;
pub mod git;
pub mod list_dir;
pub mod mcp_status;
pub mod read_file;
pub mod search_files;
pub mod shell;
pub mod tests_run;
pub mod web_fetch;
pub mod write_file;

use std::sync::Arc;

use harbor_config::ToolsConfig;

use crate::registry::{DynamicRegistry, ToolRegistry};
use crate::workspace::Workspace;

/// Build the registry of every built-in tool, wired to the shared workspace
/// context.  The set registered here must match the gate's static table.
pub fn registry(
    ws: Arc<Workspace>,
    cfg: &ToolsConfig,
    dynamic: Arc<DynamicRegistry>,
) -> ToolRegistry {
    let mut reg = ToolRegistry::new();

    reg.register(read_file::ReadFileTool { ws: ws.clone() });
    reg.register(read_file::ReadMultipleFilesTool { ws: ws.clone() });
    reg.register(list_dir::ListDirectoryTool { ws: ws.clone() });
    reg.register(search_files::SearchFilesTool { ws: ws.clone() });

    reg.register(write_file::WriteFileTool { ws: ws.clone() });
    reg.register(write_file::CreateDirectoryTool { ws: ws.clone() });
    reg.register(edit_file::EditFileTool { ws: ws.clone() });
    reg.register(edit_file::EditLinesTool { ws: ws.clone() });
    reg.register(edit_file::InsertAtLineTool { ws: ws.clone() });
    reg.register(fs_manage::DeleteFileTool { ws: ws.clone() });
    reg.register(fs_manage::MoveFileTool { ws: ws.clone() });
    reg.register(fs_manage::RevertFileTool { ws: ws.clone() });

    reg.register(git::GitStatusTool { ws: ws.clone() });
    reg.register(git::GitDiffSummaryTool { ws: ws.clone() });
    reg.register(git::GitChangedFilesTool { ws: ws.clone() });
    reg.register(git::GitCheckpointTool { ws: ws.clone() });
    reg.register(git::GitRevertCheckpointTool { ws: ws.clone() });
    reg.register(git::GitShowDiffTool { ws: ws.clone() });

    reg.register(shell::RunCommandTool {
        ws: ws.clone(),
        default_timeout_secs: cfg.command_timeout_secs,
    });

    reg.register(tests_run::RunTestsTool {
        ws: ws.clone(),
        timeout_secs: cfg.test_timeout_secs,
    });
    reg.register(tests_run::GetTestStatusTool { ws: ws.clone() });

    reg.register(context::GetContextTool { ws });
    reg.register(mcp_status::GetMcpStatusTool { dynamic });
    reg.register(web_fetch::WebFetchTool);

    reg
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
