//! Default configuration output.

use std::path::PathBuf;

use cadenza_config::{EngineConfig, default_config_path};
use clap::Args;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Write the configuration to FILE instead of printing it
    #[arg(short, long, value_name = "FILE")]
    write: Option<PathBuf>,

    /// Write to the user configuration file
    #[arg(long, conflicts_with = "write")]
    install: bool,
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let target = if args.install {
        Some(default_config_path())
    } else {
        args.write
    };

    match target {
        Some(path) => {
            config.save(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        None => print!("{}", config.to_toml()?),
    }
    Ok(())
}
