use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "poegate")]
#[command(about = "Webhook service for PoE port power control via the UniFi Network API")]
#[command(version)]
pub struct Args {
    /// Path to the configuration file (created with defaults if missing)
    #[arg(short, long, default_value = "config.json", value_name = "FILE")]
    pub config: PathBuf,

    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Override the bind address from the config file
    #[arg(long, value_name = "ADDR")]
    pub bind_addr: Option<String>,

    /// Override the listen port from the config file
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Path to a .env file for loading API keys
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,
}
