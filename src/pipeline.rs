use std::path::Path;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::ContractDirectoryPort;
use crate::constants::SPEED_THRESHOLD_KPH;
use crate::contracts::ContractDirectory;
use crate::error::{AlertError, FieldExtractionReason, Result};
use crate::parser::{source_for, validate_extension};
use crate::types::{Alert, AlertSource, Provider};

/// Result of one provider batch
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub provider: Provider,
    pub total_rows: usize,
    pub retained: usize,
    pub dropped: usize,
    pub alerts: Vec<Alert>,
}

pub struct Pipeline;

impl Pipeline {
    /// Parse a source document, gate on the speed threshold and resolve contracts.
    #[instrument(skip(source, bytes, directory), fields(provider = %source.provider()))]
    pub fn run_for_source(
        source: &dyn AlertSource,
        bytes: &[u8],
        directory: &ContractDirectory,
    ) -> Result<PipelineResult> {
        let provider = source.provider();
        let started = Instant::now();

        let outcomes = match source.parse(bytes) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                counter!("speed_alerts_batches_failed_total", "provider" => provider.name()).increment(1);
                return Err(e);
            }
        };
        let total_rows = outcomes.len();

        let mut alerts = Vec::new();
        let mut dropped = 0usize;
        for outcome in outcomes {
            match outcome {
                Ok(shell) if shell.speed_kph >= SPEED_THRESHOLD_KPH => {
                    let contract = directory.resolve(&shell.plate).to_string();
                    alerts.push(Alert::new(shell, contract));
                }
                Ok(shell) => {
                    dropped += 1;
                    let reason = FieldExtractionReason::BelowThreshold { speed_kph: shell.speed_kph };
                    debug!(plate = %shell.plate, "Dropping row: {}", reason);
                }
                Err(e @ AlertError::FieldExtraction { .. }) => {
                    dropped += 1;
                    debug!("{}", e);
                }
                Err(e) => {
                    dropped += 1;
                    warn!("Unexpected row failure: {}", e);
                }
            }
        }

        counter!("speed_alerts_rows_total", "provider" => provider.name()).increment(total_rows as u64);
        counter!("speed_alerts_rows_retained_total", "provider" => provider.name()).increment(alerts.len() as u64);
        counter!("speed_alerts_rows_dropped_total", "provider" => provider.name()).increment(dropped as u64);
        histogram!("speed_alerts_parse_duration_seconds", "provider" => provider.name())
            .record(started.elapsed().as_secs_f64());

        info!(
            "✅ {} rows processed ({} alerts, {} dropped)",
            total_rows,
            alerts.len(),
            dropped
        );

        Ok(PipelineResult {
            provider,
            total_rows,
            retained: alerts.len(),
            dropped,
            alerts,
        })
    }

    /// Validate the extension, read the file and run the provider's parser.
    #[instrument(skip(path, directory), fields(path = %path.display()))]
    pub async fn ingest_file(
        provider: Provider,
        path: &Path,
        directory: &ContractDirectory,
    ) -> Result<PipelineResult> {
        validate_extension(provider, path)?;
        let bytes = tokio::fs::read(path).await?;
        info!("📥 Read {} bytes for {}", bytes.len(), provider);
        let source = source_for(provider);
        Self::run_for_source(source.as_ref(), &bytes, directory)
    }

    /// Fetch the directory once. A failure is logged and returned alongside an
    /// empty directory so ingestion can continue with unassigned contracts.
    pub async fn load_directory(port: &dyn ContractDirectoryPort) -> (ContractDirectory, Option<AlertError>) {
        match port.fetch().await {
            Ok(directory) => (directory, None),
            Err(e) => {
                warn!("Continuing with an empty contract directory: {}", e);
                (ContractDirectory::empty(), Some(e))
            }
        }
    }
}
