//! Environment-backed configuration for the launcher and the probe server.
//!
//! Both components read their settings exactly once at startup. Malformed
//! values never abort startup; they fall back to defaults with a warning.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 8998;
pub const DEFAULT_INTERPRETER: &str = "python3";
pub const DEFAULT_SERVER_MODULE: &str = "moshi.server";
pub const DEFAULT_MODEL_ID: &str = "nvidia/personaplex-7b-v1";
pub const BIND_HOST: &str = "0.0.0.0";

/// Read-only view over a set of environment variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| (*v).to_string())
    }
}

/// `"true"` in any letter case is true; everything else, unset included, is false.
pub fn parse_flag(raw: Option<&str>) -> bool {
    raw.is_some_and(|v| v.to_lowercase() == "true")
}

pub fn env_flag(env: &impl EnvSource, key: &str) -> bool {
    parse_flag(env.var(key).as_deref())
}

/// Empty values are treated the same as unset ones.
pub fn env_string(env: &impl EnvSource, key: &str) -> Option<String> {
    env.var(key).filter(|v| !v.is_empty())
}

pub fn env_port(env: &impl EnvSource) -> u16 {
    match env.var("PORT") {
        Some(raw) => match raw.trim().parse::<u16>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("Invalid PORT='{}', falling back to {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }
        },
        None => DEFAULT_PORT,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Replace the launcher's process image with the server.
    Replace,
    /// Spawn the server as a child, wait, and forward its exit code.
    Supervise,
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchMode::Replace => write!(f, "replace"),
            LaunchMode::Supervise => write!(f, "supervise"),
        }
    }
}

/// Everything the launcher derives from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub interpreter: String,
    pub server_module: String,
    pub ssl_root: PathBuf,
    pub port: u16,
    pub cpu_offload: bool,
    pub use_float16: bool,
    pub hf_repo: Option<String>,
    pub cfg_coef: Option<String>,
    pub hf_token: Option<String>,
    pub mode: LaunchMode,
}

impl LaunchConfig {
    pub fn from_env(env: &impl EnvSource) -> Self {
        let mode = if env_flag(env, "SUPERVISE") {
            LaunchMode::Supervise
        } else {
            LaunchMode::Replace
        };

        Self {
            interpreter: env_string(env, "PYTHON_BIN")
                .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string()),
            server_module: env_string(env, "SERVER_MODULE")
                .unwrap_or_else(|| DEFAULT_SERVER_MODULE.to_string()),
            ssl_root: env_string(env, "SSL_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            port: env_port(env),
            cpu_offload: env_flag(env, "CPU_OFFLOAD"),
            use_float16: env_flag(env, "USE_FLOAT16"),
            hf_repo: env_string(env, "HF_REPO"),
            cfg_coef: env_string(env, "CFG_COEF"),
            hf_token: env_string(env, "HF_TOKEN"),
            mode,
        }
    }
}

impl fmt::Debug for LaunchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchConfig")
            .field("interpreter", &self.interpreter)
            .field("server_module", &self.server_module)
            .field("ssl_root", &self.ssl_root)
            .field("port", &self.port)
            .field("cpu_offload", &self.cpu_offload)
            .field("use_float16", &self.use_float16)
            .field("hf_repo", &self.hf_repo)
            .field("cfg_coef", &self.cfg_coef)
            .field("hf_token", &self.hf_token.as_ref().map(|_| "<redacted>"))
            .field("mode", &self.mode)
            .finish()
    }
}

/// Settings for the probe server.
#[derive(Clone)]
pub struct ProbeSettings {
    pub hf_token: String,
    pub port: u16,
    pub model_id: String,
}

impl ProbeSettings {
    pub fn from_env(env: &impl EnvSource) -> Self {
        Self {
            hf_token: env.var("HF_TOKEN").unwrap_or_default(),
            port: env_port(env),
            model_id: env_string(env, "HF_REPO").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            hf_token: String::new(),
            port: DEFAULT_PORT,
            model_id: DEFAULT_MODEL_ID.to_string(),
        }
    }
}

impl fmt::Debug for ProbeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.hf_token.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("ProbeSettings")
            .field("hf_token", &token)
            .field("port", &self.port)
            .field("model_id", &self.model_id)
            .finish()
    }
}
