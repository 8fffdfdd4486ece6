use bullet::commands::receive::ReceiveOptions;
use bullet::{DEFAULT_PORT, RELAY_ADDR};
use clap::{Parser, Subcommand};
use std::error::Error;

#[derive(Parser)]
#[command(name = "bullet")]
#[command(about = "Share a file through a relay with a short code", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a file
    Send {
        /// Relay server address
        #[arg(long, env = "BULLET_RELAY", default_value = RELAY_ADDR)]
        relay: String,

        /// Custom share code, generated by the relay if not provided
        #[arg(long)]
        code: Option<String>,

        /// Path to the file to send
        file: String,
    },
    /// Receive a file
    Recv {
        /// Relay server address
        #[arg(long, env = "BULLET_RELAY", default_value = RELAY_ADDR)]
        relay: String,

        /// Output file name, `-` for stdout (default: the sender's file name)
        #[arg(short, long)]
        output: Option<String>,

        /// Overwrite an existing output file without asking
        #[arg(short, long)]
        yes: bool,

        /// Share code printed by the sender
        share_code: String,
    },
    /// Run as a relay server
    Relay {
        /// Port to bind to
        #[arg(short, long, env = "BULLET_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configure logging based on verbose flag
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env().filter_level(level).init();
    log::debug!("Verbose logging enabled");

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Send { relay, code, file } => {
            bullet::commands::send::run(&relay, &file, code).await
        }
        Commands::Recv {
            relay,
            output,
            yes,
            share_code,
        } => {
            let options = ReceiveOptions {
                output,
                assume_yes: yes,
            };
            bullet::commands::receive::run(&relay, &share_code, options).await
        }
        Commands::Relay { port } => bullet::commands::relay::run(port).await,
    }
}
