use clap::Parser;
use clio::Input;

#[derive(Debug, Parser)]
#[command(name = "trip-server", about = "Trip planner backend service")]
pub struct Opt {
    /// Config file path
    #[arg(short, long, value_parser, default_value = "config.toml")]
    pub config: Input,

    /// Session token secret, takes precedence over the config file
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,
}
