//! Engine configuration read from KDL
//!
//! ```kdl
//! render error-mode="strict" timeout-ms=250 decimal-separator=","
//! ```

use crate::error::{Error, Result};
use crate::render::{ErrorMode, RenderOptions};
use crate::value::FormatSettings;
use facet::Facet;
use facet_kdl as kdl;
use std::time::Duration;

/// Top-level configuration document
#[derive(Debug, Clone, Default, Facet)]
#[facet(traits(Default))]
pub struct EngineConfig {
    /// Defaults applied to every render
    #[facet(kdl::child, default)]
    pub render: RenderConfig,
}

/// The `render` node
#[derive(Debug, Clone, Default, Facet)]
#[facet(traits(Default), rename_all = "kebab-case")]
pub struct RenderConfig {
    /// `inline` (default) or `strict`
    #[facet(kdl::property, default)]
    pub error_mode: Option<String>,

    /// Per-render time limit in milliseconds
    #[facet(kdl::property, default)]
    pub timeout_ms: Option<u64>,

    /// Single character written in place of `.` in numbers
    #[facet(kdl::property, default)]
    pub decimal_separator: Option<String>,
}

impl EngineConfig {
    pub fn from_kdl(source: &str) -> Result<Self> {
        kdl::from_str(source)
            .map_err(|e| Error::argument(format!("invalid engine configuration: {e}")))
    }
}

impl RenderOptions {
    /// Options carrying the configured defaults
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let render = &config.render;
        let mut options = RenderOptions::new();

        if let Some(mode) = &render.error_mode {
            options.error_mode = match mode.as_str() {
                "inline" => ErrorMode::Inline,
                "strict" => ErrorMode::Strict,
                other => {
                    return Err(Error::argument(format!(
                        "unknown error mode '{other}', expected 'inline' or 'strict'"
                    )));
                }
            };
        }

        if let Some(ms) = render.timeout_ms {
            options.timeout = Some(Duration::from_millis(ms));
        }

        if let Some(separator) = &render.decimal_separator {
            let mut chars = separator.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return Err(Error::argument(format!(
                    "decimal separator must be one character, got '{separator}'"
                )));
            };
            options.format = FormatSettings {
                decimal_separator: c,
            };
        }

        tracing::debug!(
            error_mode = ?options.error_mode,
            timeout = ?options.timeout,
            "loaded render configuration"
        );
        Ok(options)
    }
}
