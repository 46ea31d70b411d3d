use clap::Parser;

/// A chunked, replicated message broker.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, env = "KAVKA_CONFIG", default_value = "/etc/kavka/kavka.yaml")]
    pub config: String,

    /// The address to listen on for client connections.
    #[clap(flatten)]
    pub listen_args: tokio_listener::ListenerAddressLFlag,
}
