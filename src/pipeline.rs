use ahash::{AHashMap, AHashSet};
use crossbeam_channel::Sender;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::blocking::{BlockStats, CandidateGenerator};
use crate::cluster::{ClusterCache, ClusteringEngine, ClusteringResult};
use crate::config::DedupeConfig;
use crate::error::{Error, Result};
use crate::exec::{CancellationToken, Executor};
use crate::scoring::PairScorer;
use crate::survivor::{MergePreview, PreviewBuilder, PrimarySelector};
use crate::types::{Record, ScoredPair, SimilarityEdge};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Blocking,
    Scoring,
    Clustering,
    Survivorship,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Blocking => "blocking",
            Stage::Scoring => "scoring",
            Stage::Clustering => "clustering",
            Stage::Survivorship => "survivorship",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort progress notifications. Delivery is never allowed to
/// slow the pipeline down; a full channel simply drops the event.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    StageStarted { stage: Stage },
    /// Periodic advancement inside a stage: buckets scanned for
    /// blocking, chunks finished for scoring.
    StageAdvanced {
        stage: Stage,
        completed: usize,
        total: usize,
    },
    StageFinished { stage: Stage, items: usize },
    Cancelled { stage: Stage },
}

/// Everything one run produces. `group_ids` and `primary_flags` run
/// parallel to the input records; unclustered records carry the
/// sentinel group and are never primary.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub block_stats: BlockStats,
    pub scored_pairs: Vec<ScoredPair>,
    pub clustering: Arc<ClusteringResult>,
    pub group_ids: Vec<i64>,
    pub primary_flags: Vec<bool>,
    pub previews: Vec<MergePreview>,
    /// True when cancellation stopped the run early; the fields above
    /// hold whatever the finished stages produced.
    pub cancelled: bool,
}

impl PipelineOutput {
    pub fn primary_count(&self) -> usize {
        self.primary_flags.iter().filter(|f| **f).count()
    }
}

/// Facade wiring the four stages together over one shared execution
/// substrate. Construction validates the whole configuration once, so
/// `run` can only fail on input or stage errors.
pub struct DedupePipeline {
    config: DedupeConfig,
    executor: Executor,
    generator: CandidateGenerator,
    scorer: PairScorer,
    engine: ClusteringEngine,
    selector: PrimarySelector,
    previewer: PreviewBuilder,
    cache: ClusterCache,
    progress: Option<Sender<ProgressEvent>>,
}

impl DedupePipeline {
    pub fn new(config: &DedupeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            executor: Executor::new(&config.executor),
            generator: CandidateGenerator::new(&config.blocking)?,
            scorer: PairScorer::new(&config.scoring)?,
            engine: ClusteringEngine::new(&config.clustering)?,
            selector: PrimarySelector::new(&config.survivorship)?,
            previewer: PreviewBuilder::new(&config.survivorship)?,
            cache: ClusterCache::new(),
            progress: None,
            config: config.clone(),
        })
    }

    pub fn with_progress(mut self, sender: Sender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn config(&self) -> &DedupeConfig {
        &self.config
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Runs blocking, scoring, clustering and survivorship in order.
    ///
    /// Cancellation is honored between stages and at chunk boundaries
    /// inside the two heavy ones; a cancelled run returns early with
    /// the completed stages' output and `cancelled` set. Clustering
    /// results are reused through the cache when the same universe,
    /// edges and configuration show up again.
    pub fn run(&self, records: &[Record], token: &CancellationToken) -> Result<PipelineOutput> {
        let started = Instant::now();
        check_unique_ids(records)?;
        info!("Deduplicating {} record(s)", records.len());

        self.notify(ProgressEvent::StageStarted {
            stage: Stage::Blocking,
        });
        let on_bucket = self.stage_observer(Stage::Blocking);
        let (pairs, block_stats) =
            self.generator
                .generate_with(records, &self.executor, token, Some(&on_bucket))?;
        self.notify(ProgressEvent::StageFinished {
            stage: Stage::Blocking,
            items: pairs.len(),
        });
        if token.is_cancelled() {
            return Ok(self.cancelled_output(records, block_stats, Vec::new(), Stage::Blocking));
        }

        self.notify(ProgressEvent::StageStarted {
            stage: Stage::Scoring,
        });
        let on_chunk = self.stage_observer(Stage::Scoring);
        let scored_pairs = self.scorer.score_candidates_with(
            records,
            &pairs,
            &self.executor,
            token,
            Some(&on_chunk),
        )?;
        self.notify(ProgressEvent::StageFinished {
            stage: Stage::Scoring,
            items: scored_pairs.len(),
        });
        if token.is_cancelled() {
            return Ok(self.cancelled_output(records, block_stats, scored_pairs, Stage::Scoring));
        }

        self.notify(ProgressEvent::StageStarted {
            stage: Stage::Clustering,
        });
        let universe: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let edges: Vec<SimilarityEdge> = scored_pairs.iter().map(|p| p.to_edge()).collect();
        let clustering = self.engine.cluster_cached(&universe, &edges, &self.cache)?;
        self.notify(ProgressEvent::StageFinished {
            stage: Stage::Clustering,
            items: clustering.clusters.len(),
        });

        self.notify(ProgressEvent::StageStarted {
            stage: Stage::Survivorship,
        });
        let group_ids = self.assign_groups(records, &clustering);
        let primary_flags = self.selector.select(records, &group_ids)?;
        let previews = self.previewer.build(records, &group_ids, &primary_flags)?;
        let primaries = primary_flags.iter().filter(|f| **f).count();
        self.notify(ProgressEvent::StageFinished {
            stage: Stage::Survivorship,
            items: primaries,
        });

        info!(
            "Pipeline finished in {:.2?}: {} pair(s) kept, {} cluster(s), {} outlier(s), {} primarie(s)",
            started.elapsed(),
            scored_pairs.len(),
            clustering.clusters.len(),
            clustering.outliers.len(),
            primaries
        );

        Ok(PipelineOutput {
            block_stats,
            scored_pairs,
            clustering,
            group_ids,
            primary_flags,
            previews,
            cancelled: false,
        })
    }

    /// Maps each record to its cluster id, or to the sentinel group
    /// for outliers.
    fn assign_groups(&self, records: &[Record], clustering: &ClusteringResult) -> Vec<i64> {
        let mut by_id: AHashMap<&str, i64> = AHashMap::new();
        for cluster in &clustering.clusters {
            for member in &cluster.members {
                by_id.insert(member.as_str(), cluster.id as i64);
            }
        }
        let sentinel = self.config.survivorship.sentinel_group;
        records
            .iter()
            .map(|r| by_id.get(r.id.as_str()).copied().unwrap_or(sentinel))
            .collect()
    }

    fn cancelled_output(
        &self,
        records: &[Record],
        block_stats: BlockStats,
        scored_pairs: Vec<ScoredPair>,
        stage: Stage,
    ) -> PipelineOutput {
        warn!(
            "Pipeline cancelled after {} stage; returning partial results",
            stage
        );
        self.notify(ProgressEvent::Cancelled { stage });
        let sentinel = self.config.survivorship.sentinel_group;
        PipelineOutput {
            block_stats,
            scored_pairs,
            clustering: Arc::new(ClusteringResult {
                clusters: Vec::new(),
                outliers: Vec::new(),
                policy: self.config.clustering.policy,
                threshold: self.config.clustering.threshold,
            }),
            group_ids: vec![sentinel; records.len()],
            primary_flags: vec![false; records.len()],
            previews: Vec::new(),
            cancelled: true,
        }
    }

    fn notify(&self, event: ProgressEvent) {
        if let Some(sender) = &self.progress {
            let _ = sender.try_send(event);
        }
    }

    /// Callback forwarding in-stage advancement to the progress channel.
    fn stage_observer(&self, stage: Stage) -> impl Fn(usize, usize) + Send + Sync + '_ {
        move |completed, total| {
            self.notify(ProgressEvent::StageAdvanced {
                stage,
                completed,
                total,
            });
        }
    }
}

fn check_unique_ids(records: &[Record]) -> Result<()> {
    let mut seen: AHashSet<&str> = AHashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id.as_str()) {
            return Err(Error::input(format!(
                "duplicate record id in input: {}",
                record.id
            )));
        }
    }
    Ok(())
}
