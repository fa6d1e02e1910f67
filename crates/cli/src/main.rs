use clap::{Args, Parser, Subcommand};
use doqd_domain::CliOverrides;
use tracing::info;

mod bootstrap;
mod commands;
mod di;
mod server;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "doqd")]
#[command(version)]
#[command(about = "doqd - DNS-over-QUIC server, proxy and client")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Offer the legacy DoQ identifiers next to the current draft
    #[arg(long, global = true)]
    compat: bool,

    /// Accept any server certificate (client side)
    #[arg(long, global = true)]
    insecure: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve DNS over QUIC, relaying queries to a UDP backend
    Server(ServerArgs),
    /// Accept plain UDP DNS and forward it to a DoQ server
    Proxy(ProxyArgs),
    /// Send a single query to a DoQ server and print the answer
    Query(QueryArgs),
}

#[derive(Args)]
struct ServerArgs {
    /// Listen address, repeatable
    #[arg(short = 'l', long = "listen", value_name = "ADDR")]
    listen: Vec<String>,

    /// UDP DNS backend
    #[arg(short = 'b', long, value_name = "ADDR")]
    backend: Option<String>,

    /// PEM certificate chain
    #[arg(long = "cert", value_name = "FILE")]
    cert: Option<String>,

    /// PEM private key
    #[arg(long = "key", value_name = "FILE")]
    key: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long = "metrics", value_name = "ADDR")]
    metrics: Option<String>,
}

#[derive(Args)]
struct ProxyArgs {
    /// UDP listen address
    #[arg(short = 'l', long, value_name = "ADDR")]
    listen: Option<String>,

    /// DoQ server
    #[arg(short = 's', long, value_name = "ADDR")]
    server: Option<String>,

    /// TLS server name
    #[arg(long, value_name = "NAME")]
    server_name: Option<String>,
}

#[derive(Args)]
struct QueryArgs {
    /// Name to resolve
    #[arg(short = 'n', long)]
    name: String,

    /// Record type
    #[arg(short = 't', long = "type", default_value = "A")]
    record_type: String,

    /// DoQ server
    #[arg(short = 's', long, value_name = "ADDR")]
    server: Option<String>,

    /// TLS server name
    #[arg(long, value_name = "NAME")]
    server_name: Option<String>,

    /// Request DNSSEC records (sets the DO bit)
    #[arg(long)]
    dnssec: bool,

    /// Clear the recursion-desired flag
    #[arg(long)]
    no_recursion: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        let mut overrides = CliOverrides {
            compat: self.compat,
            insecure: self.insecure,
            log_level: self.log_level.clone(),
            ..Default::default()
        };

        match &self.command {
            Command::Server(args) => {
                overrides.listen = args.listen.clone();
                overrides.backend = args.backend.clone();
                overrides.tls_cert = args.cert.clone();
                overrides.tls_key = args.key.clone();
                overrides.metrics_listen = args.metrics.clone();
            }
            Command::Proxy(args) => {
                overrides.proxy_listen = args.listen.clone();
                overrides.server = args.server.clone();
                overrides.server_name = args.server_name.clone();
            }
            Command::Query(args) => {
                overrides.server = args.server.clone();
                overrides.server_name = args.server_name.clone();
            }
        }

        overrides
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = bootstrap::load_config(cli.config.as_deref(), cli.overrides())?;

    bootstrap::init_logging(&config.logging);

    match cli.command {
        Command::Server(_) => {
            info!("Starting doqd v{}", env!("CARGO_PKG_VERSION"));
            commands::server::run(config).await
        }
        Command::Proxy(_) => {
            info!("Starting doqd proxy v{}", env!("CARGO_PKG_VERSION"));
            commands::proxy::run(config).await
        }
        Command::Query(args) => {
            let request = commands::query::QueryRequest {
                name: args.name,
                record_type: args.record_type,
                recursion_desired: !args.no_recursion,
                dnssec: args.dnssec,
            };
            commands::query::run(&config, &request).await
        }
    }
}
