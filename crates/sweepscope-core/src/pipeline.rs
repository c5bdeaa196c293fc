//! # Detection Pipeline
//!
//! Wires the stages together into one producer and one clustering worker:
//!
//! ```text
//!  sweep lines ──► SweepProducer ──► scan message ──────────────► Publisher
//!  (BufRead)       parse+classify         │
//!                                         ▼
//!                               HandoffQueue (1-2, policy)
//!                                         │
//!                                         ▼
//!                  ClusterWorker: HistoryWindow ─► epsilon ─► DBSCAN ─► summaries
//!                  (own thread)                                          │
//!                                                                        ▼
//!                                                         signal message ─► Publisher
//! ```
//!
//! The producer never waits on clustering under `DropOldest`. The worker owns
//! the history window; nothing else touches it.
//!
//! A malformed record stops the pipeline: sweeps still waiting in the queue
//! are discarded, the worker finishes the pass in progress, and the framing
//! error is returned. At end of input the queue is closed and drained instead,
//! unless the input is a live stream ([`EndOfInput::Fatal`]).

use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, error, info, trace, warn};

use crate::classifier::{AdaptiveThresholdClassifier, CompletedSweep, NoiseFloorTiers};
use crate::codec::{encode_scan, encode_signals};
use crate::config::{ClusteringConfig, SweepScopeConfig};
use crate::dbscan::DensityClusterer;
use crate::epsilon::EpsilonSelector;
use crate::handoff::{HandoffQueue, OverflowPolicy};
use crate::history::HistoryWindow;
use crate::observe::Metrics;
use crate::publish::{Publisher, Topic};
use crate::record::SweepRecord;
use crate::summary::summarize_all;
use crate::types::{SignalSummary, SweepError, SweepResult};

/// Name of the clustering worker thread.
pub const WORKER_THREAD_NAME: &str = "sweep-cluster";

/// Where the producer is within the current sweep cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    /// Classifying samples of the sweep in progress
    Accumulating,
    /// A sweep just completed and is being published and handed off
    Finalizing,
}

/// What end of input means for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EndOfInput {
    /// Recorded or bounded input: finish cleanly
    #[default]
    Finish,
    /// Live producer output: the producer died, stop with an error
    Fatal,
}

/// Everything the pipeline needs from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub sweep_start_hz: u64,
    pub initial_floors: NoiseFloorTiers,
    pub dbm_adjust: f64,
    pub cluster_history: usize,
    pub clustering: ClusteringConfig,
    pub handoff_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    pub end_of_input: EndOfInput,
}

impl From<&SweepScopeConfig> for PipelineSettings {
    fn from(config: &SweepScopeConfig) -> Self {
        Self {
            sweep_start_hz: config.sweep.sweep_start_hz(),
            initial_floors: config.detector.tiers(),
            dbm_adjust: config.sweep.dbm_adjust,
            cluster_history: config.sweep.cluster_history,
            clustering: config.clustering.clone(),
            handoff_capacity: config.pipeline.handoff_capacity,
            overflow_policy: config.pipeline.overflow_policy,
            end_of_input: EndOfInput::Finish,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&SweepScopeConfig::default())
    }
}

/// Totals for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Input lines read
    pub records: u64,
    pub sweeps_completed: u64,
    pub detections: u64,
    pub clustering_passes: u64,
    /// Passes skipped for too few feature points
    pub passes_skipped: u64,
    pub clusters_found: u64,
    pub signals_published: u64,
    /// Completed sweeps displaced from the hand-off queue
    pub handoffs_dropped: u64,
    pub publish_failures: u64,
}

/// Parses sweep lines and classifies them, tracking the sweep cycle.
#[derive(Debug, Clone)]
pub struct SweepProducer {
    classifier: AdaptiveThresholdClassifier,
    sweep_start_hz: u64,
    phase: SweepPhase,
}

impl SweepProducer {
    pub fn new(classifier: AdaptiveThresholdClassifier, sweep_start_hz: u64) -> Self {
        Self {
            classifier,
            sweep_start_hz,
            phase: SweepPhase::Accumulating,
        }
    }

    /// Classify one line. Returns the sweep it completed, if any, and moves
    /// to [`SweepPhase::Finalizing`] until [`SweepProducer::resume`].
    pub fn feed_line(&mut self, line: &str) -> SweepResult<Option<CompletedSweep>> {
        let record = SweepRecord::parse(line)?;
        let completed = self.classifier.classify_record(&record, self.sweep_start_hz);
        if let Some(sweep) = &completed {
            trace!(sweep = sweep.index, "finalizing sweep");
            self.phase = SweepPhase::Finalizing;
        }
        Ok(completed)
    }

    /// Back to accumulating once the completed sweep has been dispatched.
    pub fn resume(&mut self) {
        if self.phase == SweepPhase::Finalizing {
            trace!(next_sweep = self.classifier.next_sweep_index(), "accumulating");
        }
        self.phase = SweepPhase::Accumulating;
    }

    pub fn phase(&self) -> SweepPhase {
        self.phase
    }

    pub fn classifier(&self) -> &AdaptiveThresholdClassifier {
        &self.classifier
    }
}

/// Result of one clustering attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    /// Not enough feature points; nothing was published
    Skipped { points: usize },
    /// Clustering ran; `signals` holds one summary per cluster
    Clustered {
        points: usize,
        epsilon: f64,
        signals: Vec<SignalSummary>,
    },
}

/// Worker-side totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub passes: u64,
    pub skipped: u64,
    pub clusters_found: u64,
    pub signals_published: u64,
    pub publish_failures: u64,
}

/// Owns the history window and runs one clustering pass per handed-off sweep.
pub struct ClusterWorker {
    history: HistoryWindow,
    selector: EpsilonSelector,
    min_points: usize,
    min_feature_points: usize,
    publisher: Arc<dyn Publisher>,
    metrics: Arc<Metrics>,
    stats: WorkerStats,
}

impl ClusterWorker {
    pub fn new(
        cluster_history: usize,
        clustering: &ClusteringConfig,
        publisher: Arc<dyn Publisher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            history: HistoryWindow::new(cluster_history),
            selector: EpsilonSelector::new(clustering.neighbor_k),
            min_points: clustering.min_points,
            min_feature_points: clustering.min_feature_points,
            publisher,
            metrics,
            stats: WorkerStats::default(),
        }
    }

    /// Add a completed sweep to the window and cluster the window.
    ///
    /// Too few points (for the pass or for the neighbor rank) skips the pass.
    /// Publish failures are logged and counted, never returned.
    pub fn process(&mut self, sweep: CompletedSweep) -> SweepResult<PassOutcome> {
        let index = sweep.index;
        self.history.push(sweep.detections);

        let started = Instant::now();
        let outcome = match self.cluster_window() {
            Ok(outcome) => outcome,
            Err(SweepError::InsufficientData { actual, .. }) => {
                PassOutcome::Skipped { points: actual }
            }
            Err(e) => return Err(e),
        };

        match &outcome {
            PassOutcome::Skipped { points } => {
                self.stats.skipped += 1;
                self.metrics.passes_skipped.inc();
                debug!(sweep = index, points, "clustering pass skipped");
            }
            PassOutcome::Clustered {
                points,
                epsilon,
                signals,
            } => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.stats.passes += 1;
                self.stats.clusters_found += signals.len() as u64;
                self.metrics.clustering_passes.inc();
                self.metrics.clusters_found.inc_by(signals.len() as u64);
                self.metrics.record_epsilon(*epsilon);
                self.metrics.pass_duration_ms.observe(elapsed_ms);
                debug!(
                    sweep = index,
                    points,
                    epsilon,
                    clusters = signals.len(),
                    elapsed_ms,
                    "clustering pass complete"
                );

                if !signals.is_empty() {
                    match self.publisher.publish(Topic::Signal, &encode_signals(signals)) {
                        Ok(()) => self.stats.signals_published += 1,
                        Err(e) => {
                            self.stats.publish_failures += 1;
                            self.metrics.publish_failures.inc();
                            warn!(sweep = index, error = %e, "signal publish failed");
                        }
                    }
                }
            }
        }

        Ok(outcome)
    }

    fn cluster_window(&self) -> SweepResult<PassOutcome> {
        let points = self.history.viable_snapshot(self.min_feature_points)?;
        let epsilon = self.selector.select(&points)?;
        let clustering = DensityClusterer::new(epsilon, self.min_points).fit(&points)?;
        let signals = summarize_all(&clustering.clusters(&points));
        Ok(PassOutcome::Clustered {
            points: points.len(),
            epsilon,
            signals,
        })
    }

    /// Process sweeps until the queue is closed and drained.
    ///
    /// A fatal error closes the queue so the producer stops too.
    pub fn run(mut self, queue: &HandoffQueue<CompletedSweep>) -> SweepResult<WorkerStats> {
        while let Some(sweep) = queue.pop() {
            if let Err(e) = self.process(sweep) {
                error!(error = %e, "clustering worker stopped");
                queue.close();
                return Err(e);
            }
        }
        Ok(self.stats)
    }

    pub fn history(&self) -> &HistoryWindow {
        &self.history
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }
}

/// Producer plus clustering worker over one input stream.
pub struct SweepPipeline {
    settings: PipelineSettings,
    publisher: Arc<dyn Publisher>,
    metrics: Arc<Metrics>,
}

impl SweepPipeline {
    pub fn new(settings: PipelineSettings, publisher: Arc<dyn Publisher>) -> Self {
        Self::with_metrics(settings, publisher, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(
        settings: PipelineSettings,
        publisher: Arc<dyn Publisher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            settings,
            publisher,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run until `reader` is exhausted or a fatal error occurs.
    ///
    /// A partial sweep pending at end of input is not finalized. With
    /// [`EndOfInput::Fatal`] the end of input itself is a
    /// [`SweepError::StreamEnded`] error.
    pub fn run<R: BufRead>(&self, reader: R) -> SweepResult<PipelineReport> {
        let s = &self.settings;
        let queue = Arc::new(HandoffQueue::new(s.handoff_capacity, s.overflow_policy));

        let worker = ClusterWorker::new(
            s.cluster_history,
            &s.clustering,
            Arc::clone(&self.publisher),
            Arc::clone(&self.metrics),
        );
        let worker_queue = Arc::clone(&queue);
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run(&worker_queue))?;

        info!(
            sweep_start_hz = s.sweep_start_hz,
            tiers = s.initial_floors.len(),
            history = s.cluster_history,
            policy = ?s.overflow_policy,
            "pipeline started"
        );

        let mut report = PipelineReport::default();
        let produced = self.produce(reader, &queue, &mut report);

        if produced.is_err() {
            let discarded = queue.abort();
            if discarded > 0 {
                warn!(discarded, "discarded pending sweeps on fatal error");
            }
        } else {
            queue.close();
        }
        let worker_result = handle
            .join()
            .map_err(|_| SweepError::Io("clustering worker panicked".to_string()))?;

        match (produced, worker_result) {
            (Err(e), _) => Err(e),
            // The worker closed the queue on its own error
            (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(stats)) => {
                report.clustering_passes = stats.passes;
                report.passes_skipped = stats.skipped;
                report.clusters_found = stats.clusters_found;
                report.signals_published = stats.signals_published;
                report.publish_failures += stats.publish_failures;
                report.handoffs_dropped = queue.dropped();
                info!(
                    sweeps = report.sweeps_completed,
                    passes = report.clustering_passes,
                    dropped = report.handoffs_dropped,
                    "pipeline finished"
                );
                Ok(report)
            }
        }
    }

    fn produce<R: BufRead>(
        &self,
        reader: R,
        queue: &HandoffQueue<CompletedSweep>,
        report: &mut PipelineReport,
    ) -> SweepResult<()> {
        let s = &self.settings;
        let classifier = AdaptiveThresholdClassifier::new(s.initial_floors.clone(), s.dbm_adjust);
        let mut producer = SweepProducer::new(classifier, s.sweep_start_hz);

        for line in reader.lines() {
            let line = line?;
            report.records += 1;

            let completed = match producer.feed_line(&line) {
                Ok(Some(sweep)) => sweep,
                Ok(None) => continue,
                Err(e) => {
                    error!(record = report.records, error = %e, "malformed sweep record");
                    return Err(e);
                }
            };

            report.sweeps_completed += 1;
            report.detections += completed.detections.len() as u64;
            self.metrics.sweeps_completed.inc();
            self.metrics.detections.inc_by(completed.detections.len() as u64);
            self.metrics.record_floors(completed.floors.floors());
            info!(
                sweep = completed.index,
                detections = completed.detections.len(),
                samples = completed.samples_seen,
                floors = ?completed.floors.floors(),
                "sweep complete"
            );

            if let Err(e) = self
                .publisher
                .publish(Topic::Scan, &encode_scan(&completed.detections))
            {
                report.publish_failures += 1;
                self.metrics.publish_failures.inc();
                warn!(sweep = completed.index, error = %e, "scan publish failed");
            }

            let index = completed.index;
            match queue.push(completed) {
                Ok(Some(displaced)) => {
                    self.metrics.handoffs_dropped.inc();
                    warn!(
                        sweep = index,
                        dropped = displaced.index,
                        "clustering behind, dropped oldest sweep"
                    );
                }
                Ok(None) => {}
                // Worker failed and closed the queue; its error is reported on join
                Err(SweepError::QueueClosed) => return Ok(()),
                Err(e) => return Err(e),
            }
            producer.resume();
        }

        if s.end_of_input == EndOfInput::Fatal {
            error!(
                records = report.records,
                phase = ?producer.phase(),
                "sweep stream ended"
            );
            return Err(SweepError::StreamEnded(format!(
                "producer output closed after {} records",
                report.records
            )));
        }
        Ok(())
    }
}
