use crate::{
    commands::Commands,
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::{
    cdc::stream::CdcRecordStream,
    error::SourceError,
    file::{csv::CsvRecordReader, jsonl::JsonlRecordReader},
};
use engine_config::sink::SinkConfig;
use engine_runtime::execution::{
    factory::{create_connector, open_store},
    request::SyncRequest,
};
use model::execution::partition::{QRepConfig, QRepPartition};
use std::{
    path::Path,
    sync::{Arc, atomic::AtomicI64},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod shutdown;

/// Records buffered between a file reader and the sync loop.
const RECORD_BUFFER: usize = 1024;

#[derive(Parser)]
#[command(
    name = "kafka-sink",
    version = "0.1.0",
    about = "Transforms change records with Lua and produces them to Kafka"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match run(cli.command, &shutdown.cancel_token()).await {
        Ok(()) => ExitCode::Success,
        Err(err) if shutdown.is_shutdown_requested() => {
            warn!(error = %err, "Stopped by shutdown request");
            ExitCode::ShutdownRequested
        }
        Err(err) => {
            error!(error = %err, "kafka-sink failed");
            ExitCode::GeneralError
        }
    };
    code.into()
}

async fn run(command: Commands, cancel: &CancellationToken) -> Result<(), CliError> {
    match command {
        Commands::Sync {
            config,
            input,
            script,
            batch_id,
        } => run_sync(&config, &input, script.as_deref(), batch_id, cancel).await,
        Commands::Qrep {
            config,
            input,
            destination,
            script,
            partition_id,
        } => {
            run_qrep(
                &config,
                &input,
                destination,
                script.as_deref(),
                partition_id,
                cancel,
            )
            .await
        }
        Commands::Ping { config } => {
            let config = SinkConfig::load(&config)?;
            let connector = create_connector(&config)?;
            let result = connector.connection_active().await;
            connector.close();
            result?;
            info!(servers = %config.kafka.bootstrap_servers(), "Broker reachable");
            Ok(())
        }
        Commands::Offset { config, flow } => {
            let config = SinkConfig::load(&config)?;
            let flow = flow.unwrap_or_else(|| config.flow_job_name.clone());
            let store = open_store(&config)?;
            let json = serde_json::json!({
                "flow": flow,
                "last_offset": store.last_offset(&flow).await?,
                "last_sync_batch_id": store.last_sync_batch_id(&flow).await?,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
            Ok(())
        }
    }
}

async fn run_sync(
    config_path: &str,
    input: &str,
    script: Option<&str>,
    batch_id: Option<i64>,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let config = SinkConfig::load(config_path)?;
    let script = read_script(script).await?;
    let connector = create_connector(&config)?;
    let flow = config.flow_job_name.clone();

    let batch_id = match batch_id {
        Some(id) => id,
        None => connector.last_sync_batch_id(&flow).await? + 1,
    };
    let consumed_offset = Arc::new(AtomicI64::new(connector.last_offset(&flow).await?));

    let session = cancel.child_token();
    let (sender, records) = CdcRecordStream::channel(RECORD_BUFFER);
    let reader = JsonlRecordReader::open(input).await?;
    let reader_task: JoinHandle<Result<u64, SourceError>> = {
        let session = session.clone();
        tokio::spawn(async move {
            // Keeps the stream open until the session is cancelled on error,
            // so a half-read file is never committed.
            let keep_open = sender.clone();
            let result = reader.pump(sender, session.clone()).await;
            if result.is_err() {
                session.cancel();
            }
            drop(keep_open);
            result
        })
    };

    let request = SyncRequest::new(flow, batch_id, records)
        .with_script(script)
        .with_consumed_offset(consumed_offset);
    let result = connector.sync_records(request, &session).await;
    connector.close();

    join_reader(reader_task).await?;
    let summary = result?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_qrep(
    config_path: &str,
    input: &str,
    destination: String,
    script: Option<&str>,
    partition_id: Option<String>,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let config = SinkConfig::load(config_path)?;
    let script = read_script(script).await?;
    let connector = create_connector(&config)?;

    let source_name = Path::new(input)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string());
    let partition = QRepPartition::new(partition_id.unwrap_or_else(|| source_name.clone()));
    let qrep = QRepConfig {
        flow_job_name: config.flow_job_name.clone(),
        watermark_table: source_name,
        destination_table: destination,
        script,
    };

    let session = cancel.child_token();
    let (stream, reader_task) =
        CsvRecordReader::open(input)?.into_stream(RECORD_BUFFER, session.clone());
    let result = connector
        .sync_qrep_records(&qrep, &partition, stream, &session)
        .await;
    connector.close();

    join_reader(reader_task).await?;
    let synced = result?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "partition_id": partition.partition_id,
            "records_synced": synced,
        }))?
    );
    Ok(())
}

async fn read_script(path: Option<&str>) -> Result<String, CliError> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CliError::ScriptRead {
                path: path.to_string(),
                source,
            }),
        None => Ok(String::new()),
    }
}

async fn join_reader(task: JoinHandle<Result<u64, SourceError>>) -> Result<u64, CliError> {
    let rows = task
        .await
        .map_err(|e| SourceError::Task(e.to_string()))??;
    info!(rows, "Input fully read");
    Ok(rows)
}
