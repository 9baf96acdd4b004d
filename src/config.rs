//! Settings discovery and effective configuration resolution.
//!
//! Settings are read from `clang-analyze.toml|yaml|yml|json` in the working
//! root (or the closest ancestor), or from an explicit `--config` path, and
//! merged with CLI flags to produce an [`Effective`] config.
//! Defaults:
//! - `tool.command`: `clang/clang++.exe` on Windows, `clang++` elsewhere
//! - `tool.baseArgs`: `-cc1 -analyze` with the standard checker set
//! - `tool.extension`: `cpp`
//! - `tool.jobs`: 1
//! - `output`: `human`
//!
//! Overrides precedence: CLI > settings file > defaults.
//!
//! The JSON form also accepts the PascalCase keys written by older settings
//! files (`AnalyzeDirectory`, `Profiles`, `Name`, `Bit`, `Options`).

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILES: [&str; 4] = [
    "clang-analyze.toml",
    "clang-analyze.yaml",
    "clang-analyze.yml",
    "clang-analyze.json",
];

#[cfg(windows)]
pub const DEFAULT_COMMAND: &str = "clang/clang++.exe";
#[cfg(not(windows))]
pub const DEFAULT_COMMAND: &str = "clang++";

pub const DEFAULT_EXTENSION: &str = "cpp";

/// Fixed analyzer arguments placed before profile options.
pub const DEFAULT_BASE_ARGS: [&str; 6] = [
    "-cc1",
    "-analyze",
    "-analyzer-checker=cplusplus,alpha.cplusplus,core,unix.Malloc,unix.MismatchedDeallocator",
    "-fdiagnostics-show-option",
    "-Wall",
    "-Wno-unused-command-line-argument",
];

fn default_bit() -> u8 {
    32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A named bundle of extra analyzer options applied to every file.
pub struct Profile {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default = "default_bit", alias = "Bit")]
    pub bit: u8,
    #[serde(default, alias = "Options")]
    pub options: Vec<String>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bit: default_bit(),
            options: Vec::new(),
        }
    }

    /// Replace options from multi-line text, one option per non-empty line.
    pub fn set_options_from_text(&mut self, text: &str) {
        self.options = text
            .replace("\r\n", "\n")
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
    }

    /// Options rendered one per line (inverse of `set_options_from_text`).
    pub fn options_text(&self) -> String {
        self.options.iter().map(|o| format!("{}\n", o)).collect()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Analyzer invocation settings under `[tool]`.
pub struct ToolCfg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Root settings loaded from `clang-analyze.{toml,yaml,json}`.
pub struct Settings {
    #[serde(default, alias = "AnalyzeDirectory")]
    pub analyze_directory: String,
    #[serde(default, alias = "Profiles")]
    pub profiles: Vec<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default)]
    pub tool: ToolCfg,
}

impl Settings {
    /// Settings written by `init`.
    pub fn starter(analyze_directory: &str) -> Self {
        let mut x86 = Profile::new("x86");
        x86.options = vec!["-triple i686-pc-windows-msvc".to_string()];
        let mut x64 = Profile::new("x64");
        x64.bit = 64;
        x64.options = vec!["-triple x86_64-pc-windows-msvc".to_string()];
        Self {
            analyze_directory: analyze_directory.to_string(),
            profiles: vec![x86, x64],
            output: None,
            tool: ToolCfg {
                command: Some(DEFAULT_COMMAND.to_string()),
                base_args: None,
                extension: Some(DEFAULT_EXTENSION.to_string()),
                jobs: Some(1),
            },
        }
    }

    /// Check the invariants the analyzer relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analyze_directory.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "analyzeDirectory is not configured".into(),
            ));
        }
        for p in &self.profiles {
            if p.name.trim().is_empty() {
                return Err(ConfigError::Invalid("profile name must not be empty".into()));
            }
            if p.bit != 32 && p.bit != 64 {
                return Err(ConfigError::Invalid(format!(
                    "profile '{}': bit must be 32 or 64 (got {})",
                    p.name, p.bit
                )));
            }
        }
        if self.tool.jobs == Some(0) {
            return Err(ConfigError::Invalid("tool.jobs must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub root: PathBuf,
    pub config_path: Option<PathBuf>,
    pub analyze_directory: PathBuf,
    pub profiles: Vec<Profile>,
    pub command: String,
    pub base_args: Vec<String>,
    pub extension: String,
    pub jobs: usize,
    pub output: String,
}

/// Walk upward from `start` to the first directory holding a settings file.
///
/// Falls back to `start` when none is found.
pub fn detect_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_FILES.iter().any(|f| cur.join(f).is_file()) {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Locate the settings file inside `root`, if any.
pub fn find_config(root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|f| root.join(f))
        .find(|p| p.is_file())
}

/// Load settings from `path`, choosing the parser by extension.
pub fn load_file(path: &Path) -> Result<Settings, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "json" => serde_json::from_str(&s).map_err(|e| ConfigError::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(&s).map_err(|e| ConfigError::parse(path, e)),
        _ => toml::from_str(&s).map_err(|e| ConfigError::parse(path, e)),
    }
}

/// Load the settings file discovered in `root`, if present.
pub fn load_config(root: &Path) -> Result<Option<(PathBuf, Settings)>, ConfigError> {
    match find_config(root) {
        Some(p) => {
            let settings = load_file(&p)?;
            Ok(Some((p, settings)))
        }
        None => Ok(None),
    }
}

/// Resolve `Effective` by merging CLI flags, discovered settings, and defaults.
///
/// `cli_profiles` restricts the run to the named profiles, in settings order.
pub fn resolve_effective(
    cli_root: Option<&str>,
    cli_config: Option<&str>,
    cli_dir: Option<&str>,
    cli_profiles: &[String],
    cli_tool: Option<&str>,
    cli_jobs: Option<usize>,
    cli_output: Option<&str>,
) -> Result<Effective, ConfigError> {
    let start = PathBuf::from(cli_root.unwrap_or("."));
    let (root, config_path, mut settings) = match cli_config {
        Some(p) => {
            let p = PathBuf::from(p);
            let settings = load_file(&p)?;
            let root = p
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| start.clone());
            (root, Some(p), settings)
        }
        None => {
            let root = detect_root(&start);
            match load_config(&root)? {
                Some((p, s)) => (root, Some(p), s),
                None => (root, None, Settings::default()),
            }
        }
    };

    if let Some(dir) = cli_dir {
        settings.analyze_directory = dir.to_string();
    }
    if let Some(jobs) = cli_jobs {
        settings.tool.jobs = Some(jobs);
    }
    for p in &mut settings.profiles {
        p.options.retain(|o| !o.trim().is_empty());
    }
    settings.validate()?;

    let profiles = select_profiles(&settings.profiles, cli_profiles)?;

    let dir = PathBuf::from(&settings.analyze_directory);
    let analyze_directory = if dir.is_absolute() || cli_dir.is_some() {
        dir
    } else {
        root.join(dir)
    };

    let command = cli_tool
        .map(str::to_string)
        .or(settings.tool.command.clone())
        .unwrap_or_else(|| DEFAULT_COMMAND.to_string());
    let base_args = settings
        .tool
        .base_args
        .clone()
        .unwrap_or_else(|| DEFAULT_BASE_ARGS.iter().map(|s| s.to_string()).collect());
    let extension = settings
        .tool
        .extension
        .clone()
        .map(|e| e.trim_start_matches('.').to_string())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    let output = cli_output
        .map(str::to_string)
        .or(settings.output.clone())
        .unwrap_or_else(|| "human".to_string());

    Ok(Effective {
        root,
        config_path,
        analyze_directory,
        profiles,
        command,
        base_args,
        extension,
        jobs: settings.tool.jobs.unwrap_or(1),
        output,
    })
}

fn select_profiles(all: &[Profile], wanted: &[String]) -> Result<Vec<Profile>, ConfigError> {
    if wanted.is_empty() {
        return Ok(all.to_vec());
    }
    if let Some(missing) = wanted.iter().find(|w| !all.iter().any(|p| &p.name == *w)) {
        return Err(ConfigError::Invalid(format!("unknown profile '{}'", missing)));
    }
    Ok(all
        .iter()
        .filter(|p| wanted.contains(&p.name))
        .cloned()
        .collect())
}

/// Write starter settings to `path`. Refuses to overwrite unless `force`.
pub fn write_starter(path: &Path, analyze_directory: &str, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    let settings = Settings::starter(analyze_directory);
    let body = toml::to_string_pretty(&settings).map_err(|e| ConfigError::parse(path, e))?;
    fs::write(path, body).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
