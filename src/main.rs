use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sqs_local_engine::{EngineConfig, SqsEngine};

#[derive(Parser, Debug)]
#[command(name = "sqs-local-engine", about = "Local in-memory Amazon SQS engine")]
struct Args {
    #[arg(long, default_value = "000000000000", env = "SQS_ACCOUNT_ID")]
    account_id: String,

    #[arg(long, default_value = "us-east-1", env = "SQS_REGION")]
    region: String,

    /// Host rendered into queue URLs
    #[arg(long, default_value = "localhost:4566", env = "SQS_HOST")]
    host: String,

    /// Period of the visibility/delay sweep
    #[arg(long, default_value = "1000", env = "SQS_UPDATE_INTERVAL_MS")]
    update_interval_ms: u64,

    /// Drop messages older than the queue's MessageRetentionPeriod
    #[arg(long, env = "SQS_ENABLE_RETENTION")]
    enable_retention: bool,

    #[arg(long, env = "SQS_DELAY_RECENTLY_DELETED")]
    delay_recently_deleted: bool,

    #[arg(long, env = "SQS_DELAY_PURGE_RETRY")]
    delay_purge_retry: bool,

    #[arg(long, env = "SQS_DISABLE_MAX_NUMBER_OF_MESSAGE_LIMIT")]
    disable_max_number_of_message_limit: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SQS_LOG_LEVEL")]
    log_level: String,
}

impl From<Args> for EngineConfig {
    fn from(args: Args) -> Self {
        EngineConfig {
            account_id: args.account_id,
            region: args.region,
            host: args.host,
            queue_update_interval_ms: args.update_interval_ms,
            enable_message_retention_period: args.enable_retention,
            delay_recently_deleted: args.delay_recently_deleted,
            delay_purge_retry: args.delay_purge_retry,
            disable_max_number_of_message_limit: args.disable_max_number_of_message_limit,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sqs_local_engine={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let engine = SqsEngine::new(EngineConfig::from(args));
    engine.start();
    info!(
        account_id = %engine.config().account_id,
        region = %engine.config().region,
        host = %engine.config().host,
        "sqs-local-engine running, press ctrl-c to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    engine.shutdown();
    Ok(())
}
