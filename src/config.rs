use crate::resolve::ResolveScopes;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "ResolverConfig::default_user_namespace")]
    pub user_namespace: String,
    #[serde(default = "ResolverConfig::default_framework_namespaces")]
    pub framework_namespaces: Vec<String>,
}

impl ResolverConfig {
    fn default_user_namespace() -> String {
        "Scripts".to_string()
    }

    fn default_framework_namespaces() -> Vec<String> {
        vec!["Merlin".to_string(), "Merlin.Core".to_string(), "Merlin.UI".to_string()]
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            user_namespace: Self::default_user_namespace(),
            framework_namespaces: Self::default_framework_namespaces(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "TransportConfig::default_max_frame_bytes")]
    pub max_frame_bytes: u32,
}

impl TransportConfig {
    const fn default_max_frame_bytes() -> u32 {
        1 << 20
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { max_frame_bytes: Self::default_max_frame_bytes() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    /// Optional schema file describing the host's script types.
    #[serde(default)]
    pub schema: Option<String>,
    /// Optional stage file to populate the graph from at startup.
    #[serde(default)]
    pub stage: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BridgeConfigOverrides {
    pub user_namespace: Option<String>,
    pub schema: Option<String>,
    pub stage: Option<String>,
}

impl BridgeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("[config] {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &BridgeConfigOverrides) {
        if let Some(user_namespace) = &overrides.user_namespace {
            self.resolver.user_namespace = user_namespace.clone();
        }
        if let Some(schema) = &overrides.schema {
            self.schema = Some(schema.clone());
        }
        if let Some(stage) = &overrides.stage {
            self.stage = Some(stage.clone());
        }
    }

    pub fn scopes(&self) -> ResolveScopes {
        ResolveScopes {
            user_namespace: self.resolver.user_namespace.clone(),
            framework_namespaces: self.resolver.framework_namespaces.clone(),
        }
    }
}
