use crate::security::AuthMode;
use anyhow::{Context, Result};
use directories::UserDirs;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const CONFIG_DIR_ENV: &str = "OPENGRASP_CONFIG_DIR";
const CONFIG_FILE: &str = "config.toml";
const GATEWAY_TOKEN_BYTES: usize = 24;

// ── Top-level config ──────────────────────────────────────────────

/// Top-level OpenGrasp configuration, loaded from `config.toml`.
///
/// Resolution order: `OPENGRASP_CONFIG_DIR` env → `~/.opengrasp/config.toml`.
/// Every section deserializes with defaults, so an empty file is a valid
/// config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Gateway server configuration: bind address, port, auth (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Dev-preview probing configuration (`[dev]`).
    #[serde(default)]
    pub dev: DevConfig,

    /// Login provider identifiers surfaced to the dashboard (`[auth]`).
    #[serde(default)]
    pub auth: AuthConfig,

    /// Per-agent defaults: workspace, model, compaction (`[agents]`).
    #[serde(default)]
    pub agents: AgentsConfig,

    /// In-memory session cache bounds (`[sessions]`).
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// Gateway server configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 18789)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway bind address (default: 127.0.0.1)
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    /// Authentication settings (`[gateway.auth]`).
    #[serde(default)]
    pub auth: GatewayAuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            auth: GatewayAuthConfig::default(),
        }
    }
}

/// Gateway authentication (`[gateway.auth]` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayAuthConfig {
    /// Auth mode: `"none"`, `"token"` or `"password"`. Default: `"token"`.
    #[serde(default)]
    pub mode: AuthMode,
    /// Shared bearer token. Auto-generated on first load when empty and
    /// mode is `"token"`.
    #[serde(default)]
    pub token: String,
    /// scrypt password hash (`scrypt$<salt>$<hash>`), set by `auth set-password`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

/// Dev tooling configuration (`[dev]` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevConfig {
    /// Dev-server preview detection (`[dev.preview]`).
    #[serde(default)]
    pub preview: PreviewConfig,
}

/// Dev-server preview detection (`[dev.preview]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// `"auto"` probes local ports; `"fixed"` returns `url` as-is. Default: `"auto"`.
    #[serde(default)]
    pub mode: PreviewMode,
    /// Fixed preview URL, used when mode is `"fixed"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Ports probed in order under `"auto"`. Default: common dev-server ports.
    #[serde(default = "default_preview_ports")]
    pub ports: Vec<u16>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            mode: PreviewMode::default(),
            url: None,
            ports: default_preview_ports(),
        }
    }
}

/// How `/api/dev-preview` resolves the preview URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewMode {
    /// Probe `ports` on localhost and report the first open one.
    #[default]
    Auto,
    /// Report the configured `url` without probing.
    Fixed,
}

/// Login providers surfaced to the dashboard (`[auth]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Provider identifiers, in display order.
    #[serde(default = "default_auth_providers")]
    pub providers: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            providers: default_auth_providers(),
        }
    }
}

/// Agent configuration (`[agents]` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Defaults applied to every agent (`[agents.defaults]`).
    #[serde(default)]
    pub defaults: AgentDefaultsConfig,
}

/// Per-agent defaults (`[agents.defaults]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaultsConfig {
    /// Agent workspace directory; `~` expands to the home directory.
    #[serde(default = "default_workspace")]
    pub workspace: String,
    /// Model context window in tokens. Default: `128000`.
    #[serde(default = "default_context_window")]
    pub context_window: u64,
    /// Deadline for one reply call in seconds. Absent: no deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_timeout_secs: Option<u64>,
    /// Model routing (`[agents.defaults.model]`).
    #[serde(default)]
    pub model: ModelConfig,
    /// Context compaction thresholds (`[agents.defaults.compaction]`).
    #[serde(default)]
    pub compaction: CompactionConfig,
}

impl Default for AgentDefaultsConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            context_window: default_context_window(),
            reply_timeout_secs: None,
            model: ModelConfig::default(),
            compaction: CompactionConfig::default(),
        }
    }
}

/// Model routing (`[agents.defaults.model]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Primary model identifier. Empty by default: the agent backend
    /// picks its own model until one is configured.
    #[serde(default)]
    pub primary: String,
    /// Fallback model identifiers, tried in order.
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            primary: String::new(),
            fallbacks: Vec::new(),
        }
    }
}

/// Context compaction thresholds (`[agents.defaults.compaction]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Tokens kept free below the context window. Default: `20000`.
    #[serde(default = "default_reserve_tokens_floor")]
    pub reserve_tokens_floor: u64,
    /// Pre-compaction memory flush (`[agents.defaults.compaction.memory_flush]`).
    #[serde(default)]
    pub memory_flush: MemoryFlushConfig,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            reserve_tokens_floor: default_reserve_tokens_floor(),
            memory_flush: MemoryFlushConfig::default(),
        }
    }
}

/// Pre-compaction memory flush (`[agents.defaults.compaction.memory_flush]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFlushConfig {
    /// Whether the flush fires at all. Default: `true`.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Extra headroom subtracted before the flush line. Default: `4000`.
    #[serde(default = "default_soft_threshold_tokens")]
    pub soft_threshold_tokens: u64,
    /// System prompt injected for the flush exchange.
    #[serde(default = "default_flush_system_prompt")]
    pub system_prompt: String,
    /// User-visible flush instruction.
    #[serde(default = "default_flush_prompt")]
    pub prompt: String,
}

impl Default for MemoryFlushConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            soft_threshold_tokens: default_soft_threshold_tokens(),
            system_prompt: default_flush_system_prompt(),
            prompt: default_flush_prompt(),
        }
    }
}

/// Session cache bounds (`[sessions]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Maximum live login sessions. Default: `256`.
    #[serde(default = "default_max_auth_sessions")]
    pub max_auth_sessions: usize,
    /// Maximum in-memory agent sessions. Default: `128`.
    #[serde(default = "default_max_agent_sessions")]
    pub max_agent_sessions: usize,
    /// Seconds of inactivity before a session is dropped; `0` disables.
    /// Default: `86400` (one day).
    #[serde(default = "default_session_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_auth_sessions: default_max_auth_sessions(),
            max_agent_sessions: default_max_agent_sessions(),
            idle_timeout_secs: default_session_idle_timeout_secs(),
        }
    }
}

fn default_gateway_port() -> u16 {
    18789
}

fn default_gateway_bind() -> String {
    "127.0.0.1".into()
}

fn default_preview_ports() -> Vec<u16> {
    vec![3000, 5173, 8080, 4173, 9000]
}

fn default_auth_providers() -> Vec<String> {
    vec!["anthropic".into(), "openai-codex".into(), "kimi".into()]
}

fn default_workspace() -> String {
    "~/.opengrasp/workspace".into()
}

fn default_context_window() -> u64 {
    128_000
}

fn default_reserve_tokens_floor() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

fn default_soft_threshold_tokens() -> u64 {
    4_000
}

fn default_flush_system_prompt() -> String {
    "Session nearing compaction. Store durable memories now.".into()
}

fn default_flush_prompt() -> String {
    "Write any lasting notes to memory/YYYY-MM-DD.md; reply with NO_REPLY if nothing to store."
        .into()
}

fn default_max_auth_sessions() -> usize {
    256
}

fn default_max_agent_sessions() -> usize {
    128
}

fn default_session_idle_timeout_secs() -> u64 {
    86_400
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let dir = config_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            config_path: dir.join(CONFIG_FILE),
            gateway: GatewayConfig::default(),
            dev: DevConfig::default(),
            auth: AuthConfig::default(),
            agents: AgentsConfig::default(),
            sessions: SessionsConfig::default(),
        }
    }
}

/// Directory holding `config.toml`: `$OPENGRASP_CONFIG_DIR` or `~/.opengrasp`.
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".opengrasp"))
}

/// New shared token: 24 random bytes, hex-encoded.
pub fn generate_gateway_token() -> String {
    let mut bytes = [0u8; GATEWAY_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl Config {
    /// Load `config.toml`, writing a default one on first run.
    ///
    /// A missing token under token mode is generated and persisted here, so
    /// a hand-written config without one still comes up usable. Env
    /// overrides apply after the file is read and are never written back.
    pub async fn load_or_init() -> Result<Self> {
        let dir = config_dir()?;
        let config_path = dir.join(CONFIG_FILE);

        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let mut created = false;
        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path.clone();
            config
        } else {
            created = true;
            let mut config = Config::default();
            config.config_path = config_path.clone();
            config
        };

        if config.gateway.auth.mode == AuthMode::Token && config.gateway.auth.token.is_empty() {
            config.gateway.auth.token = generate_gateway_token();
            created = true;
        }

        if created {
            config.save().await?;
        }

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            auth_mode = config.gateway.auth.mode.as_str(),
            initialized = created,
            "Config loaded"
        );
        Ok(config)
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = env_var("OPENGRASP_GATEWAY_PORT").or_else(|| env_var("PORT")) {
            match port.parse::<u16>() {
                Ok(port) if port > 0 => self.gateway.port = port,
                _ => tracing::warn!(value = %port, "Ignoring invalid gateway port override"),
            }
        }

        if let Some(bind) = env_var("OPENGRASP_GATEWAY_BIND").or_else(|| env_var("HOST")) {
            self.gateway.bind = bind;
        }

        if let Some(token) = env_var("OPENGRASP_GATEWAY_TOKEN") {
            self.gateway.auth.token = token;
        }

        if let Some(mode) = env_var("OPENGRASP_AUTH_MODE") {
            match mode.parse::<AuthMode>() {
                Ok(mode) => self.gateway.auth.mode = mode,
                Err(_) => tracing::warn!(value = %mode, "Ignoring invalid auth mode override"),
            }
        }

        if let Some(workspace) = env_var("OPENGRASP_WORKSPACE") {
            self.agents.defaults.workspace = workspace;
        }
    }

    /// Validate configuration values that would cause runtime failures.
    ///
    /// Called after TOML deserialization and env-override application to
    /// catch obviously invalid values early instead of failing at arbitrary
    /// runtime points.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.bind.trim().is_empty() {
            anyhow::bail!("gateway.bind must not be empty");
        }
        if self.gateway.port == 0 {
            anyhow::bail!("gateway.port must be greater than 0");
        }
        if self.gateway.auth.mode == AuthMode::Password && self.gateway.auth.password_hash.is_none()
        {
            tracing::warn!(
                "auth mode is \"password\" but no password is set; \
                 run `opengrasp auth set-password` (all logins fail until then)"
            );
        }
        Ok(())
    }

    /// Agent workspace directory with `~` expanded.
    pub fn workspace_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.agents.defaults.workspace).as_ref())
    }

    /// Write the config back to `config_path`, atomically, mode 0600.
    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;
        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or(CONFIG_FILE);
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        // The token lands on disk, so lock the file down before it becomes
        // visible under the final name.
        #[cfg(unix)]
        {
            use std::{fs::Permissions, os::unix::fs::PermissionsExt};
            fs::set_permissions(&temp_path, Permissions::from_mode(0o600))
                .await
                .context("Failed to restrict config file permissions")?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        Ok(())
    }

    /// The shape `/api/config` exposes: secrets dropped, not masked.
    pub fn redacted_view(&self) -> serde_json::Value {
        json!({
            "gateway": {
                "port": self.gateway.port,
                "bind": self.gateway.bind,
                "auth": { "mode": self.gateway.auth.mode.as_str() },
            },
            "dev": { "preview": {
                "mode": self.dev.preview.mode,
                "url": self.dev.preview.url,
                "ports": self.dev.preview.ports,
            }},
            "auth": { "providers": self.auth.providers },
        })
    }
}

fn env_var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}
