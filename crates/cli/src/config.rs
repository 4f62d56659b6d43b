//! The TOML configuration file and its command-line overrides.
//!
//! Every table and every key is optional; missing values fall back to the
//! defaults of the owning crate ([`RunConfig`], [`LlmConfig`],
//! [`SearchConfig`], [`NormalizerConfig`]).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use llm::LlmConfig;
use normalizer::NormalizerConfig;
use pipeline::{Language, LoopBounds, ModelName, QualityThresholds, RunConfig, SourceBounds};
use search::SearchConfig;
use serde::{Deserialize, Serialize};

/// Configuration file looked up in the working directory when `--config` is
/// not given.
pub const DEFAULT_CONFIG_FILE: &str = "research.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub research: ResearchSection,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub normalizer: NormalizerConfig,
    pub telemetry: TelemetrySection,
    pub queue: QueueSection,
}

/// `[research]`: run bounds, quality thresholds and where reports go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchSection {
    pub language: String,
    pub max_queries: usize,
    pub min_loops: u32,
    pub max_loops: u32,
    pub min_sources: usize,
    pub max_sources: usize,
    pub min_draft_chars: usize,
    pub required_sections: Vec<String>,
    pub output_dir: PathBuf,
}

impl Default for ResearchSection {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            language: run.language.to_string(),
            max_queries: run.max_queries,
            min_loops: run.loops.min,
            max_loops: run.loops.max,
            min_sources: run.sources.min,
            max_sources: run.sources.max,
            min_draft_chars: run.quality.min_draft_chars,
            required_sections: run.quality.required_sections,
            output_dir: PathBuf::from("reports"),
        }
    }
}

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// `[telemetry]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is not set.
    pub filter: String,
    /// OTLP/gRPC collector endpoint; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "info".to_string(),
            otlp_endpoint: None,
            service_name: "research-agent".to_string(),
        }
    }
}

/// `[queue]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    pub path: PathBuf,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("research-queue.yaml"),
        }
    }
}

/// Flags that take precedence over the configuration file.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Minimum number of validation loops.
    #[arg(long, global = true)]
    pub min_loops: Option<u32>,

    /// Maximum number of validation loops.
    #[arg(long, global = true)]
    pub max_loops: Option<u32>,

    /// Sources required per query before the quality gate is satisfied.
    #[arg(long, global = true)]
    pub min_sources: Option<usize>,

    /// Sources kept per query.
    #[arg(long, global = true)]
    pub max_sources: Option<usize>,

    /// Language of queries and report.
    #[arg(long, global = true)]
    pub language: Option<String>,

    /// Model name sent to the LLM server.
    #[arg(long, global = true, env = "RESEARCH_MODEL")]
    pub model: Option<String>,

    /// Directory reports are written to.
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Reads the configuration file.
    ///
    /// `path` is `Some` when the user named a file explicitly; that file must
    /// exist. Otherwise [`DEFAULT_CONFIG_FILE`] is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("invalid configuration in '{}'", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        let research = &mut self.research;
        if let Some(v) = overrides.min_loops {
            research.min_loops = v;
        }
        if let Some(v) = overrides.max_loops {
            research.max_loops = v;
        }
        if let Some(v) = overrides.min_sources {
            research.min_sources = v;
        }
        if let Some(v) = overrides.max_sources {
            research.max_sources = v;
        }
        if let Some(v) = &overrides.language {
            research.language = v.clone();
        }
        if let Some(v) = &overrides.output_dir {
            research.output_dir = v.clone();
        }
        if let Some(v) = &overrides.model {
            self.llm.model = v.clone();
        }
    }

    /// Builds and validates the engine's per-run configuration.
    pub fn run_config(&self) -> Result<RunConfig> {
        let research = &self.research;
        let config = RunConfig {
            language: Language::new(&research.language)
                .context("[research] language must not be empty")?,
            max_queries: research.max_queries,
            loops: LoopBounds {
                min: research.min_loops,
                max: research.max_loops,
            },
            sources: SourceBounds {
                min: research.min_sources,
                max: research.max_sources,
            },
            quality: QualityThresholds {
                min_draft_chars: research.min_draft_chars,
                required_sections: research.required_sections.clone(),
            },
            model: ModelName::new(&self.llm.model),
        };
        config.validate()?;
        Ok(config)
    }
}
