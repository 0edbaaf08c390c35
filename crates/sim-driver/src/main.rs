use anyhow::Context;
use sim_driver::SimConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sim_driver=info".parse()?))
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let out_dir_override = args.next().map(PathBuf::from);

    let config = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            SimConfig::from_toml_str(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => SimConfig::default(),
    };
    config.validate().context("invalid configuration")?;

    // Mirrors the original `output/{TEST_CASE_NAME}` layout when the
    // caller doesn't name an explicit output directory.
    let out_dir = out_dir_override
        .unwrap_or_else(|| PathBuf::from("output").join(&config.test_case_name));

    sim_driver::run(config, &out_dir, true)?;
    Ok(())
}
