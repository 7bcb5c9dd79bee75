use anyhow::Result;
use merlin_bridge::cli::CliOverrides;
use merlin_bridge::config::BridgeConfig;
use merlin_bridge::ops::BridgeHost;
use merlin_bridge::remote;
use merlin_bridge::scene::StageDoc;
use merlin_bridge::schema::SchemaDoc;

const DEFAULT_CONFIG_PATH: &str = "bridge.json";

fn main() {
    let overrides = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(overrides) {
        eprintln!("Bridge error: {err:?}");
        std::process::exit(1);
    }
}

fn run(overrides: CliOverrides) -> Result<()> {
    let config_path = overrides.config_path().unwrap_or(DEFAULT_CONFIG_PATH).to_string();
    let mut config = BridgeConfig::load_or_default(&config_path);
    config.apply_overrides(&overrides.into_config_overrides());

    let mut host = BridgeHost::new(config.scopes());
    if let Some(schema_path) = &config.schema {
        let schema = SchemaDoc::load_from_path(schema_path)?;
        host.load_schema(&schema)?;
    }
    if let Some(stage_path) = &config.stage {
        let stage = StageDoc::load_from_path(stage_path)?;
        host.load_stage(&stage)?;
    }

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    remote::serve(
        &mut host,
        &mut stdin.lock(),
        &mut stdout.lock(),
        config.transport.max_frame_bytes,
    )?;
    Ok(())
}
