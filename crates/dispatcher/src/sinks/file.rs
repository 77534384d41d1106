//! FileSink - appends published updates to daily JSON-lines files

use chrono::{DateTime, Utc};
use contracts::{ContractError, DataSink, MarketUpdate};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
    /// File name prefix, the UTC date is appended
    pub prefix: String,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));
        let prefix = params
            .get("prefix")
            .cloned()
            .unwrap_or_else(|| "ticks".to_string());

        Self { base_path, prefix }
    }
}

/// One JSON line per published update
#[derive(serde::Serialize)]
struct Record<'a> {
    symbol: &'a str,
    price: f64,
    observed_at: u64,
    written_at: String,
}

/// Sink that appends updates to `<base_path>/<prefix>-<YYYY-MM-DD>.jsonl`
///
/// The file rolls over when the UTC date changes.
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    /// Date of the open file and its writer
    current: Option<(String, BufWriter<File>)>,
}

impl FileSink {
    /// Create a new FileSink
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        // Create base directory if it doesn't exist
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
            current: None,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params);
        Self::new(name, config)
    }

    /// Path of the file holding updates written on `date`
    pub fn path_for(&self, date: &str) -> PathBuf {
        self.config
            .base_path
            .join(format!("{}-{}.jsonl", self.config.prefix, date))
    }

    fn writer_for(&mut self, now: DateTime<Utc>) -> std::io::Result<&mut BufWriter<File>> {
        let date = now.format("%Y-%m-%d").to_string();
        let stale = !matches!(&self.current, Some((open, _)) if *open == date);

        if stale {
            if let Some((_, mut old)) = self.current.take() {
                old.flush()?;
            }
            let path = self.path_for(&date);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            debug!(sink = %self.name, path = %path.display(), "Opened output file");
            self.current = Some((date, BufWriter::new(file)));
        }

        match self.current.as_mut() {
            Some((_, writer)) => Ok(writer),
            None => Err(std::io::Error::other("no open file")),
        }
    }

    fn append(&mut self, update: &MarketUpdate) -> std::io::Result<()> {
        let now = Utc::now();
        let record = Record {
            symbol: update.symbol.as_str(),
            price: update.price,
            observed_at: update.observed_at,
            written_at: now.to_rfc3339(),
        };
        let line = serde_json::to_string(&record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let writer = self.writer_for(now)?;
        writeln!(writer, "{line}")
    }

    fn persist_update(&mut self, update: &MarketUpdate) -> Result<(), ContractError> {
        self.append(update).map_err(|e| {
            error!(sink = %self.name, symbol = %update.symbol, error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, update),
        fields(sink = %self.name, symbol = %update.symbol)
    )]
    async fn write(&mut self, update: &MarketUpdate) -> Result<(), ContractError> {
        self.persist_update(update)?;
        Ok(())
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some((_, writer)) = self.current.as_mut() {
            writer
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        self.current = None;
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
