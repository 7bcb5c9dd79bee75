use crate::config::BridgeConfigOverrides;
use anyhow::{anyhow, bail, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    config: Option<String>,
    user_namespace: Option<String>,
    schema: Option<String>,
    stage: Option<String>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Use --config/--schema/--stage/--user-namespace with values.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(value),
                "user-namespace" => overrides.user_namespace = Some(value),
                "schema" => overrides.schema = Some(value),
                "stage" => overrides.stage = Some(value),
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --config, --schema, --stage, --user-namespace."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn into_config_overrides(self) -> BridgeConfigOverrides {
        BridgeConfigOverrides {
            user_namespace: self.user_namespace,
            schema: self.schema,
            stage: self.stage,
        }
    }
}
