//! Layered error definitions
//!
//! Categorized by source: config / ingestion / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Ingestion Errors =====
    /// Update rejected before entering the store
    #[error("malformed update for symbol '{symbol}': {message}")]
    MalformedUpdate { symbol: String, message: String },

    /// Ingestion channel closed
    #[error("ingestion channel '{channel}' closed")]
    ChannelClosed { channel: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    /// Sink queue full, update dropped
    #[error("sink '{sink_name}' queue full, update for '{symbol}' dropped")]
    SinkQueueFull { sink_name: String, symbol: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create malformed update error
    pub fn malformed_update(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedUpdate {
            symbol: symbol.into(),
            message: message.into(),
        }
    }

    /// Create channel closed error
    pub fn channel_closed(channel: impl Into<String>) -> Self {
        Self::ChannelClosed {
            channel: channel.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// True for errors raised by a sink rather than by the caller
    pub fn is_sink_error(&self) -> bool {
        matches!(
            self,
            Self::SinkWrite { .. } | Self::SinkConnection { .. } | Self::SinkQueueFull { .. }
        )
    }
}
