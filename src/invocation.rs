//! Building the server's command line.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::{BIND_HOST, LaunchConfig};
use crate::error::LaunchError;

const SCRATCH_PREFIX: &str = "personaplex-ssl-";

/// The ordered command line and child environment for one server start.
///
/// Built once per launch; nothing mutates it after hand-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    #[serde(skip_serializing)]
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    /// Full token list, program first.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Names of the variables set on the child, values omitted.
    pub fn env_keys(&self) -> Vec<&str> {
        self.env.keys().map(String::as_str).collect()
    }
}

/// Optional flags in the order they are appended.
pub fn optional_flags(config: &LaunchConfig) -> Vec<String> {
    let mut flags = Vec::new();
    if config.cpu_offload {
        flags.push("--cpu-offload".to_string());
    }
    if config.use_float16 {
        flags.push("--half".to_string());
    }
    if let Some(repo) = &config.hf_repo {
        flags.push("--hf-repo".to_string());
        flags.push(repo.clone());
    }
    if let Some(coef) = &config.cfg_coef {
        flags.push("--cfg-coef".to_string());
        flags.push(coef.clone());
    }
    flags
}

pub fn build_invocation(config: &LaunchConfig, ssl_dir: &Path) -> Invocation {
    let mut args = vec![
        "-m".to_string(),
        config.server_module.clone(),
        "--ssl".to_string(),
        ssl_dir.to_string_lossy().into_owned(),
        "--host".to_string(),
        BIND_HOST.to_string(),
        "--port".to_string(),
        config.port.to_string(),
    ];
    args.extend(optional_flags(config));

    let mut env = BTreeMap::new();
    if let Some(token) = &config.hf_token {
        env.insert("HF_TOKEN".to_string(), token.clone());
    }

    Invocation {
        program: config.interpreter.clone(),
        args,
        env,
    }
}

/// Creates a fresh, uniquely named, owner-only directory under `root`.
///
/// The directory is removed when the returned guard drops.
pub fn scratch_dir(root: &Path) -> Result<TempDir, LaunchError> {
    tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir_in(root)
        .map_err(|source| LaunchError::ScratchDir {
            path: root.to_path_buf(),
            source,
        })
}

/// Like [`scratch_dir`], but the directory outlives the launcher.
pub fn create_scratch_dir(root: &Path) -> Result<PathBuf, LaunchError> {
    Ok(scratch_dir(root)?.keep())
}
