// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Result of the most recent `run_tests` invocation, kept for
/// `get_test_status` to query.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub command: String,
    pub passed: u32,
    pub failed: u32,
    pub success: bool,
    /// Failure excerpts parsed from combined stdout+stderr
    pub failures: Vec<String>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Shared per-session execution context handed to the tool handlers.
///
/// This is the only state the dispatcher carries beyond a single call:
/// the dry-run flag and the single-slot last-test-result cache.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    dry_run: AtomicBool,
    last_test: Mutex<Option<TestReport>>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dry_run: AtomicBool::new(false),
            last_test: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool-supplied path against the workspace root.
    /// Absolute paths pass through unchanged.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run.load(Ordering::Relaxed)
    }

    pub fn set_dry_run(&self, on: bool) {
        self.dry_run.store(on, Ordering::Relaxed);
    }

    pub fn record_test_report(&self, report: TestReport) {
        *self.last_test.lock().unwrap() = Some(report);
    }

    pub fn last_test_report(&self) -> Option<TestReport> {
        self.last_test.lock().unwrap().clone()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_root() {
        let ws = Workspace::new("/work/project");
        assert_eq!(
            ws.resolve("src/main.rs"),
            PathBuf::from("/work/project/src/main.rs")
        );
    }

    #[test]
    fn absolute_paths_pass_through() {
        let ws = Workspace::new("/work/project");
        assert_eq!(ws.resolve("/tmp/x"), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn dry_run_defaults_off_and_toggles() {
        let ws = Workspace::new("/tmp");
        assert!(!ws.dry_run());
        ws.set_dry_run(true);
        assert!(ws.dry_run());
    }

    #[test]
    fn last_test_report_starts_empty() {
        let ws = Workspace::new("/tmp");
        assert!(ws.last_test_report().is_none());
    }
}
