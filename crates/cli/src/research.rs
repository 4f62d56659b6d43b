//! Composition of the workflow engine from configuration, and the single-run
//! operation shared by `run` and `queue run`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use llm::OpenAiCompatibleClient;
use nodes::{CancellationToken, WorkflowEngine};
use normalizer::{HttpNormalizer, LocalNormalizer};
use pipeline::{ContentNormalizer, RunConfig, RunId, RunState};
use search::SearxngCollector;
use tracing::info;

use crate::config::AppConfig;
use crate::report;

pub struct Researcher {
    engine: WorkflowEngine,
    run_config: RunConfig,
    output_dir: PathBuf,
}

impl Researcher {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let run_config = config.run_config()?;
        let gateway = OpenAiCompatibleClient::new(config.llm.clone())
            .context("invalid [llm] configuration")?;
        let collector = SearxngCollector::new(config.search.clone())
            .context("invalid [search] configuration")?;
        let normalizer: Arc<dyn ContentNormalizer> = match &config.normalizer.base_url {
            Some(_) => Arc::new(
                HttpNormalizer::new(&config.normalizer)
                    .context("invalid [normalizer] configuration")?,
            ),
            None => Arc::new(LocalNormalizer::new()),
        };
        info!(
            llm = %config.llm.base_url,
            model = %config.llm.model,
            search = %config.search.base_url,
            normalizer = config.normalizer.base_url.as_deref().unwrap_or("in-process"),
            "collaborators configured"
        );

        Ok(Self {
            engine: WorkflowEngine::new(Arc::new(gateway), Arc::new(collector), normalizer),
            run_config,
            output_dir: config.research.output_dir.clone(),
        })
    }

    /// Runs one prompt to completion and writes its report.
    ///
    /// Returns the report path. Fails when the run is fatal or ends without a
    /// report (cancelled before a draft existed).
    pub async fn research(
        &self,
        run_id: RunId,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<PathBuf> {
        let state = RunState::with_run_id(run_id, prompt, self.run_config.clone());
        let state = self
            .engine
            .run_with_cancellation(state, cancel)
            .await
            .context("research run failed")?;
        report::write_report(&self.output_dir, &state, Utc::now())
    }
}
