pub mod schema;

#[allow(unused_imports)]
pub use schema::{
    config_dir, generate_gateway_token, AgentDefaultsConfig, AgentsConfig, AuthConfig,
    CompactionConfig, Config, DevConfig, GatewayAuthConfig, GatewayConfig, MemoryFlushConfig,
    ModelConfig, PreviewConfig, PreviewMode, SessionsConfig,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::AuthMode;

    #[test]
    fn reexported_config_default_is_constructible() {
        let config = Config::default();

        assert_eq!(config.gateway.auth.mode, AuthMode::Token);
        assert!(config.gateway.port > 0);
        assert!(!config.agents.defaults.workspace.is_empty());
    }
}
