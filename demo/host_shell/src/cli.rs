use clap::{ArgAction, Parser};
use rmf_core::launch::parse_bool;
use rmf_core::{LaunchParams, RmfError};
use std::path::PathBuf;

/// Launch extras use the `am start` spellings, e.g. `--es API_KEY abc --ez AUTO_RUN true`
#[derive(Parser, Debug)]
#[command(name = "rmf-host")]
#[command(about = "ReadMyFeed host shell", long_about = None)]
pub struct Cli {
    /// String extra
    #[arg(long = "es", num_args = 2, value_names = ["KEY", "VALUE"], action = ArgAction::Append)]
    pub string_extras: Vec<String>,

    /// Boolean extra (true/false)
    #[arg(long = "ez", num_args = 2, value_names = ["KEY", "VALUE"], action = ArgAction::Append)]
    pub bool_extras: Vec<String>,

    /// Integer extra
    #[arg(long = "ei", num_args = 2, value_names = ["KEY", "VALUE"], action = ArgAction::Append)]
    pub int_extras: Vec<String>,

    /// TOML config file (overrides RMF_HOST_CONFIG)
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn launch_params(&self) -> Result<LaunchParams, RmfError> {
        let mut params = LaunchParams::new();
        for [key, value] in pairs(&self.string_extras) {
            params = params.with_string(key, value);
        }
        for [key, value] in pairs(&self.bool_extras) {
            let b = parse_bool(value).ok_or_else(|| {
                RmfError::ConfigError(format!("{} is not a boolean: {}", key, value))
            })?;
            params = params.with_bool(key, b);
        }
        for [key, value] in pairs(&self.int_extras) {
            let n = value.parse::<i64>().map_err(|_| {
                RmfError::ConfigError(format!("{} is not an integer: {}", key, value))
            })?;
            params = params.with_int(key, n);
        }
        Ok(params)
    }
}

// clap guarantees two values per occurrence
fn pairs(values: &[String]) -> impl Iterator<Item = [&str; 2]> {
    values
        .chunks_exact(2)
        .map(|kv| [kv[0].as_str(), kv[1].as_str()])
}
