use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    paths.push(PathBuf::from("/etc/harbor/config.toml"));

    // 2. XDG / home
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/harbor/config.toml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("harbor/config.toml"));
    }

    // 3. Workspace-local
    paths.push(PathBuf::from(".harbor/config.toml"));
    paths.push(PathBuf::from("harbor.toml"));

    paths
}

/// Load configuration by merging all discovered TOML files.
/// The `extra` argument may provide an explicit path (e.g. `--config` CLI flag).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = toml::Value::Table(toml::map::Map::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: toml::Value = toml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_toml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: toml::Value =
            toml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_toml(&mut merged, layer);
    }

    let config: Config = merged.try_into().unwrap_or_default();
    Ok(config)
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_toml(dst: &mut toml::Value, src: toml::Value) {
    match (dst, src) {
        (toml::Value::Table(d), toml::Value::Table(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(toml::Value::Table(toml::map::Map::new()));
                merge_toml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn scalar_conflict_src_wins() {
        let mut dst = val("[tools]\ncommand_timeout_secs = 120");
        merge_toml(&mut dst, val("[tools]\ncommand_timeout_secs = 30"));
        assert_eq!(
            dst["tools"]["command_timeout_secs"],
            toml::Value::Integer(30)
        );
    }

    #[test]
    fn disjoint_tables_are_both_kept() {
        let mut dst = val("[agent]\ndefault_mode = \"plan\"");
        merge_toml(&mut dst, val("[node]\nbind = \"0.0.0.0:9000\""));
        assert!(dst.get("agent").is_some());
        assert!(dst.get("node").is_some());
    }

    #[test]
    fn arrays_are_replaced_not_appended() {
        let mut dst = val("[tools]\ndeny_patterns = [\"a\"]");
        merge_toml(&mut dst, val("[tools]\ndeny_patterns = [\"b\", \"c\"]"));
        let arr = dst["tools"]["deny_patterns"].as_array().unwrap();
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn explicit_path_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harbor.toml");
        std::fs::write(&path, "[agent]\ndefault_mode = \"review\"\n").unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.agent.default_mode, crate::AgentMode::Review);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        assert!(load(Some(Path::new("/nonexistent/harbor.toml"))).is_err());
    }

    #[test]
    fn empty_merge_yields_defaults() {
        let cfg = load(None).unwrap_or_default();
        // Whatever layers exist on the host, the result must deserialize.
        assert!(cfg.tools.command_timeout_secs > 0);
    }
}
