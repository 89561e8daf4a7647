//! Command-line interface for kafka-toolkit
//!
//! Connection settings come from flags or `KAFKA_*` environment variables and
//! precede the subcommand:
//!
//! ```bash
//! kafka-toolkit --brokers localhost:9092 --group-id demo \
//!   publish --topic orders --format json --data '{"id":"o-1"}' --key o-1 --header tenant=acme
//!
//! kafka-toolkit --brokers localhost:9092 --group-id demo --consumer-priority ORDER \
//!   consume --topic orders --format json --max-messages 10
//! ```

use clap::{Parser, Subcommand};
use kafka_toolkit::engine::{Client, Settings};
use kafka_toolkit::{commands, logging, shutdown, ConsumeArgs, PublishArgs};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kafka-toolkit")]
#[command(about = "Publish and consume typed Kafka messages")]
#[command(long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish one JSON document
    Publish(PublishArgs),

    /// Print records from a topic as JSON lines
    Consume(ConsumeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(logging::log_filter(directives.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = Client::connect(cli.settings)?;

    match cli.command {
        Commands::Publish(args) => {
            let correlation_id = commands::publish(&client, args).await?;
            println!("{correlation_id}");
        }
        Commands::Consume(args) => {
            let bridge = shutdown::cancel_on_signal(client.cancellation_token());
            let result = commands::consume(&client, args).await;
            client.shutdown();
            let _ = bridge.await;
            let handled = result?;
            tracing::info!("Consumed {handled} records");
        }
    }

    Ok(())
}
