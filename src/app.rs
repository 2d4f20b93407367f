use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tempfile::Builder;
use tracing::info;

use crate::authority::AuthorityClient;
use crate::config::ResolvedConfig;
use crate::error::SlError;
use crate::hgnc::SymbolResolver;
use crate::ingest::{DatasetIngestor, StudyStats, ingestors_for};
use crate::record::InteractionRecord;
use crate::store::{Metadata, Store, ensure_parent};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Worker threads; defaults to the available parallelism.
    pub threads: Option<usize>,
}

impl RunOptions {
    fn worker_count(&self, studies: usize) -> usize {
        let wanted = self.threads.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        });
        wanted.clamp(1, studies.max(1))
    }
}

/// Harmonized records in configuration order plus per-study statistics.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub records: Vec<InteractionRecord>,
    pub studies: Vec<StudyStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub records: usize,
    pub positive: usize,
    pub negative: usize,
    pub canonical: usize,
    pub studies: Vec<StudyStats>,
}

impl RunResult {
    pub fn report(&self) -> RunReport {
        let positive = self.records.iter().filter(|r| r.is_interaction()).count();
        RunReport {
            records: self.records.len(),
            positive,
            negative: self.records.len() - positive,
            canonical: self.records.iter().filter(|r| r.is_canonical()).count(),
            studies: self.studies.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorityFetch {
    pub path: String,
    pub action: String,
    pub source: Option<String>,
    pub downloaded_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<A: AuthorityClient> {
    store: Store,
    authority: A,
}

impl<A: AuthorityClient> App<A> {
    pub fn new(store: Store, authority: A) -> Self {
        Self { store, authority }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    /// Makes sure the cached authority file exists, downloading it when absent
    /// or when `force` is set. A download is parsed before it replaces the
    /// cached copy.
    pub fn ensure_authority(
        &self,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<AuthorityFetch, SlError> {
        let path = self.store.authority_path();
        let metadata_path = self.store.authority_metadata_path();
        if path.as_std_path().exists() && !force {
            let metadata = Store::read_metadata(&metadata_path)?;
            return Ok(AuthorityFetch {
                path: path.to_string(),
                action: "cached".to_string(),
                source: metadata.as_ref().map(|meta| meta.url.clone()),
                downloaded_at: metadata.map(|meta| meta.downloaded_at),
            });
        }

        sink.event(ProgressEvent {
            message: format!("downloading {}", self.authority.source_url()),
            elapsed: None,
        });
        let started = Instant::now();
        let parent = ensure_parent(&path)?;
        let temp = Builder::new()
            .prefix(".slh-hgnc")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| SlError::Filesystem(err.to_string()))?;
        self.authority.download_hgnc(temp.path())?;
        let resolver = SymbolResolver::from_path(temp.path())?;
        temp.persist(path.as_std_path())
            .map_err(|err| SlError::Filesystem(err.to_string()))?;

        let metadata = Metadata {
            source: "HGNC".to_string(),
            dataset_type: "authority".to_string(),
            url: self.authority.source_url().to_string(),
            downloaded_at: chrono::Utc::now().to_rfc3339(),
            tool: format!("slh/{}", env!("CARGO_PKG_VERSION")),
            resolved_path: path.to_string(),
        };
        Store::write_metadata(&metadata_path, &metadata)?;
        info!(symbols = resolver.len(), path = %path, "authority file downloaded");
        sink.event(ProgressEvent {
            message: format!("stored {} approved symbols", resolver.len()),
            elapsed: Some(started.elapsed()),
        });

        Ok(AuthorityFetch {
            path: path.to_string(),
            action: "downloaded".to_string(),
            source: Some(metadata.url),
            downloaded_at: Some(metadata.downloaded_at),
        })
    }

    /// Loads the configured authority file, or the cached download.
    pub fn load_resolver(
        &self,
        configured: Option<&Path>,
        sink: &dyn ProgressSink,
    ) -> Result<SymbolResolver, SlError> {
        let resolver = match configured {
            Some(path) => SymbolResolver::from_path(path)?,
            None => {
                let fetch = self.ensure_authority(false, sink)?;
                SymbolResolver::from_path(&fetch.path)?
            }
        };
        info!(symbols = resolver.len(), "authority loaded");
        Ok(resolver)
    }

    pub fn run(
        &self,
        resolver: &SymbolResolver,
        config: &ResolvedConfig,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, SlError> {
        let ingestors = ingestors_for(&config.studies, &config.manual);
        harmonize(resolver, &ingestors, options, sink)
    }
}

/// Runs every ingestor against the shared resolver and concatenates their
/// records in the order of `ingestors`, independent of thread scheduling.
/// The first failing study in that order aborts the run.
pub fn harmonize(
    resolver: &SymbolResolver,
    ingestors: &[Box<dyn DatasetIngestor>],
    options: &RunOptions,
    sink: &dyn ProgressSink,
) -> Result<RunResult, SlError> {
    if ingestors.is_empty() {
        return Ok(RunResult::default());
    }
    let workers = options.worker_count(ingestors.len());
    let started = Instant::now();

    thread::scope(|scope| -> Result<RunResult, SlError> {
        // Study i goes to worker i % workers; each worker reports on its own
        // channel in assignment order.
        let mut receivers = Vec::with_capacity(workers);
        for worker in 0..workers {
            let (tx, rx) = mpsc::channel();
            receivers.push(rx);
            scope.spawn(move || {
                for ingestor in ingestors.iter().skip(worker).step_by(workers) {
                    let outcome = ingestor.ingest(resolver);
                    let failed = outcome.is_err();
                    if tx.send(outcome).is_err() || failed {
                        break;
                    }
                }
            });
        }

        let mut result = RunResult::default();
        for (idx, ingestor) in ingestors.iter().enumerate() {
            let outcome = receivers[idx % workers].recv().map_err(|_| SlError::StudyRead {
                study: ingestor.study_id().to_string(),
                message: "worker stopped before reporting".to_string(),
            })??;
            let stats = outcome.stats();
            sink.event(ProgressEvent {
                message: format!(
                    "{}: {} records ({} positive, {} negative)",
                    stats.study_id, stats.records, stats.positive, stats.negative
                ),
                elapsed: Some(started.elapsed()),
            });
            result.studies.push(stats);
            result.records.extend(outcome.records);
        }
        Ok(result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_is_bounded_by_studies() {
        let options = RunOptions { threads: Some(8) };
        assert_eq!(options.worker_count(3), 3);
        assert_eq!(options.worker_count(0), 1);
        let options = RunOptions { threads: Some(0) };
        assert_eq!(options.worker_count(5), 1);
        assert!(RunOptions::default().worker_count(4) >= 1);
    }
}
