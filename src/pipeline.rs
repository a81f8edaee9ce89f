//! One upload, start to finish.
//!
//! ```text
//!   RawAttachment
//!        │  try_acquire slot ── none free ──► PipelineError::RateLimited
//!        ▼
//!   detect + open + extract      (spawn_blocking)
//!        ▼
//!   normalize ── AMD lookup missed ──► refresh table once, normalize again
//!        ▼
//!   piracy? ──► Diagnosis with hand-off payload, no notes
//!        ▼
//!   gather enrichment ──► evaluate ──► Diagnosis
//! ```
//!
//! Slots are load shedding, not a queue: a request that finds every slot
//! taken fails immediately. Everything inside one run is sequential.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;

use crate::amd::{AmdTableProvider, RefreshOutcome};
use crate::archive::{self, ArchiveError, ArchiveHandler};
use crate::config::{Config, FreshnessConfig, LimitsConfig};
use crate::extraction::{self, ExtractionBounds, PiracyFilter, TriggerList};
use crate::models::{ExtractionModel, ParseOutcome, RawAttachment};
use crate::normalize::{normalize, NormalizedModel};
use crate::rules::{evaluate, EnrichmentSources, KnownIds, Note, RuleContext, Section};

#[derive(Debug)]
pub enum PipelineError {
    /// Every slot is busy.
    RateLimited,
    /// Too small to be a log.
    NotALog { size: u64, min: u64 },
    Archive(ArchiveError),
    /// The extraction task died.
    Internal(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::RateLimited => write!(f, "too many logs are being processed, try again later"),
            PipelineError::NotALog { size, min } => {
                write!(f, "not a log: {} bytes is below the minimum of {} bytes", size, min)
            }
            PipelineError::Archive(e) => write!(f, "{}", e),
            PipelineError::Internal(msg) => write!(f, "log processing failed: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Archive(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ArchiveError> for PipelineError {
    fn from(e: ArchiveError) -> Self {
        PipelineError::Archive(e)
    }
}

/// What the moderation collaborator receives instead of a diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PiracyHandoff {
    pub trigger: String,
    pub context: String,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub file_name: String,
    pub outcome: ParseOutcome,
    pub sections: Vec<Section>,
    pub notes: Vec<Note>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piracy: Option<PiracyHandoff>,
    #[serde(skip)]
    pub model: NormalizedModel,
}

pub struct LogPipeline {
    handlers: Arc<Vec<Box<dyn ArchiveHandler>>>,
    slots: Arc<Semaphore>,
    limits: LimitsConfig,
    freshness: FreshnessConfig,
    similarity_threshold: f64,
    piracy: Arc<dyn PiracyFilter>,
    known: Arc<KnownIds>,
    amd: Arc<AmdTableProvider>,
    sources: Arc<EnrichmentSources>,
}

impl LogPipeline {
    pub fn new(config: &Config, amd: Arc<AmdTableProvider>, sources: EnrichmentSources) -> Self {
        Self {
            handlers: Arc::new(archive::default_handlers()),
            slots: Arc::new(Semaphore::new(config.pipeline.slots.max(1))),
            limits: config.limits.clone(),
            freshness: config.freshness.clone(),
            similarity_threshold: config.clustering.similarity_threshold,
            piracy: Arc::new(TriggerList::from_config(&config.piracy)),
            known: Arc::new(KnownIds::builtin()),
            amd,
            sources: Arc::new(sources),
        }
    }

    pub fn with_piracy_filter(mut self, filter: Arc<dyn PiracyFilter>) -> Self {
        self.piracy = filter;
        self
    }

    pub fn with_known_ids(mut self, known: KnownIds) -> Self {
        self.known = Arc::new(known);
        self
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Decompresses and extracts on the blocking pool.
    async fn extract(&self, attachment: RawAttachment) -> Result<ExtractionModel, PipelineError> {
        let handlers = Arc::clone(&self.handlers);
        let piracy = Arc::clone(&self.piracy);
        let limits = self.limits.clone();
        let task = tokio::task::spawn_blocking(move || {
            let handler = archive::detect(&handlers, &attachment)?;
            let stream = handler.open(&attachment, &limits)?;
            let bounds = ExtractionBounds::from_limits(&limits);
            let model = extraction::extract(stream.reader, stream.log_size, piracy.as_ref(), &bounds);
            tracing::debug!(
                file = %attachment.file_name,
                handler = handler.name(),
                read_bytes = model.read_bytes,
                outcome = ?model.outcome,
                "log extracted"
            );
            Ok::<_, ArchiveError>(model)
        });
        match task.await {
            Ok(result) => Ok(result?),
            Err(e) => {
                tracing::error!(error = %e, "extraction task failed");
                Err(PipelineError::Internal(e.to_string()))
            }
        }
    }

    /// Normalizes, refreshing the AMD table once when a lookup missed.
    async fn normalize(&self, raw: &ExtractionModel) -> NormalizedModel {
        let model = normalize(raw, &self.amd.snapshot());
        if !model.amd_lookup_missed {
            return model;
        }
        match self.amd.refresh().await {
            RefreshOutcome::Refreshed => normalize(raw, &self.amd.snapshot()),
            _ => model,
        }
    }

    pub async fn run(&self, attachment: RawAttachment) -> Result<Diagnosis, PipelineError> {
        let _permit = Arc::clone(&self.slots).try_acquire_owned().map_err(|_| {
            tracing::warn!(file = %attachment.file_name, "no free pipeline slot, upload rejected");
            PipelineError::RateLimited
        })?;

        let size = attachment.bytes.len() as u64;
        if size < self.limits.min_log_size {
            return Err(PipelineError::NotALog {
                size,
                min: self.limits.min_log_size,
            });
        }

        let file_name = attachment.file_name.clone();
        let raw = self.extract(attachment).await?;
        let model = self.normalize(&raw).await;
        let outcome = model.model.outcome.clone();

        if let ParseOutcome::PiracyDetected { trigger, context } = &outcome {
            tracing::info!(file = %file_name, %trigger, "piracy trigger found, diagnosis skipped");
            let piracy = Some(PiracyHandoff {
                trigger: trigger.clone(),
                context: context.clone(),
            });
            return Ok(Diagnosis {
                file_name,
                outcome,
                sections: Vec::new(),
                notes: Vec::new(),
                piracy,
                model,
            });
        }

        let enrichment = self.sources.gather(&model).await;
        let ctx = RuleContext::new(&self.known, &enrichment, &self.freshness)
            .with_similarity_threshold(self.similarity_threshold);
        let evaluation = evaluate(&model, &ctx);
        tracing::info!(
            file = %file_name,
            notes = evaluation.notes.len(),
            sections = evaluation.sections.len(),
            "log diagnosed"
        );
        Ok(Diagnosis {
            file_name,
            outcome,
            sections: evaluation.sections,
            notes: evaluation.notes,
            piracy: None,
            model,
        })
    }
}
