use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "waypoint", version, about = "Anthropic-to-OpenAI translation gateway")]
pub struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "WAYPOINT_CONFIG")]
    pub config: PathBuf,

    /// Address to listen on, overriding the default.
    #[arg(short, long, env = "WAYPOINT_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: std::net::SocketAddr,
}
