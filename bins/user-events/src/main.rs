mod cmd;

use clap::{Parser, Subcommand};
use cmd::config::{CommonArgs, Effective, ProduceArgs};

#[derive(Parser)]
#[command(name = "user-events", about = "Kafka + Avro user event producer/consumer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume the topic and produce a synthetic event every interval
    Run(CommonArgs),
    /// Only consume
    Consume(CommonArgs),
    /// Produce `--count` events and exit
    Produce(ProduceArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let common = match &cli.command {
        Commands::Run(args) | Commands::Consume(args) => args,
        Commands::Produce(args) => &args.common,
    };

    let eff = match Effective::new(common) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match &cli.command {
        Commands::Run(_) => cmd::run::run(&eff, true).await,
        Commands::Consume(_) => cmd::run::run(&eff, false).await,
        Commands::Produce(args) => cmd::produce::run(&eff, args.count).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
