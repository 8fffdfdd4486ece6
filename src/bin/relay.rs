use bullet::DEFAULT_PORT;
use clap::Parser;

/// Standalone relay server
#[derive(Parser)]
#[command(name = "bullet-server")]
#[command(about = "Relay that pairs bullet senders and receivers by share code", long_about = None)]
#[command(version)]
struct Args {
    /// Server port
    #[arg(short, long, env = "BULLET_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env().filter_level(level).init();

    if let Err(e) = bullet::commands::relay::run(args.port).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
