// src/infra/paths.rs — Well-known locations and artifact file names
//
// All per-user paths respect the CASEFORGE_HOME environment variable.
// When unset, configuration and credentials live under ~/.caseforge/.

use std::path::{Path, PathBuf};

/// Returns the CASEFORGE_HOME override, if set.
fn caseforge_home() -> Option<PathBuf> {
    std::env::var_os("CASEFORGE_HOME").map(PathBuf::from)
}

/// Home directory (falls back to the working directory on exotic systems).
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $CASEFORGE_HOME/ or ~/.caseforge/
pub fn config_dir() -> PathBuf {
    if let Some(home) = caseforge_home() {
        return home;
    }
    dirs_home().join(".caseforge")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Credentials directory
pub fn credentials_dir() -> PathBuf {
    config_dir().join("credentials")
}

/// Strategy registry kept beside the plans it indexes.
pub fn strategy_registry_path(plan_dir: &Path) -> PathBuf {
    plan_dir.join("strategies.json")
}

/// Default directory of per-target signal catalogs.
pub fn signals_dir() -> PathBuf {
    config_dir().join("signals")
}

/// Track/job registry override location.
pub fn registry_file_path() -> PathBuf {
    config_dir().join("registry.toml")
}

// ─── Artifact naming ────────────────────────────────────────────────────────

pub const PLAN_SUFFIX: &str = ".plan.json";
pub const STRATEGY_SUFFIX: &str = ".strategy.json";
pub const CASES_SUFFIX: &str = ".cases.json";
pub const REPORT_SUFFIX: &str = ".report.json";
pub const DIGEST_SUFFIX: &str = ".digest.csv";
pub const BATCH_META_SUFFIX: &str = ".meta.json";
pub const GOLDEN_SUFFIX: &str = ".golden.json";
pub const SIGNALS_SUFFIX: &str = ".signals.json";

/// File name of the `n`th generated batch for a target.
pub fn batch_file_name(target_id: &str, batch_index: u32) -> String {
    format!("{}_batch_{batch_index}{CASES_SUFFIX}", file_stem_for(target_id))
}

/// Sidecar metadata file name for a batch.
pub fn batch_meta_file_name(target_id: &str, batch_index: u32) -> String {
    format!(
        "{}_batch_{batch_index}{BATCH_META_SUFFIX}",
        file_stem_for(target_id)
    )
}

/// Metric ids contain dots (e.g. "C41.1a"); keep them out of file names.
pub fn file_stem_for(target_id: &str) -> String {
    target_id.replace(['.', '/', ' '], "_").to_uppercase()
}

/// Strip a known multi-part suffix (".report.json") and append another.
pub fn sibling_with_suffix(path: &Path, from_suffix: &str, to_suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = name.strip_suffix(from_suffix).unwrap_or_else(|| {
        name.rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(name.as_str())
    });
    path.with_file_name(format!("{stem}{to_suffix}"))
}
