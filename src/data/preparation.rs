//! Background batch preparation: `NotPrepared → Preparing(count) → Ready`.
//!
//! `start()` spawns a worker thread that streams the CSV through the encoder
//! and reports back over a channel owned by the preparer. Status is only
//! mutated on the owner's side, while draining that channel in `poll()` or
//! `wait()`. Each run gets a fresh channel, so restarting drops the previous
//! receiver: a superseded worker can never publish, and it stops as soon as it
//! notices (either its cancel flag or a failed send).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{debug, info, warn};

use crate::data::batch::{Batch, BatchBuilder};
use crate::data::encoder::{encode, TargetMode};
use crate::data::reader::DatasetReader;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPreparationStatus {
    NotPrepared,
    /// Rows encoded so far; never decreases within a run.
    Preparing { count: usize },
    /// The batch is frozen and available from [`BatchPreparer::batch`].
    Ready,
}

impl BatchPreparationStatus {
    pub fn description(&self) -> String {
        match self {
            BatchPreparationStatus::NotPrepared => "Not Prepared".to_string(),
            BatchPreparationStatus::Preparing { count } => format!("Preparing {}", count),
            BatchPreparationStatus::Ready => "Ready".to_string(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, BatchPreparationStatus::Ready)
    }
}

impl std::fmt::Display for BatchPreparationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PreparationOptions {
    pub target_mode: TargetMode,
    /// Publish a progress update every this many rows. The final count is
    /// always published before `Ready`.
    pub progress_interval: usize,
}

impl Default for PreparationOptions {
    fn default() -> Self {
        PreparationOptions { target_mode: TargetMode::OneHot, progress_interval: 100 }
    }
}

enum PreparationEvent {
    Progress(usize),
    /// Carries the frozen batch, so status and batch change in the same step.
    Ready(Arc<Batch>),
    Failed(Error),
}

struct PreparationRun {
    id: u64,
    rx: Receiver<PreparationEvent>,
    cancel: Arc<AtomicBool>,
}

/// Owns one batch slot (e.g. "training" or "validation") and the run that fills it.
pub struct BatchPreparer {
    name: &'static str,
    source: PathBuf,
    options: PreparationOptions,
    status: BatchPreparationStatus,
    batch: Option<Arc<Batch>>,
    failure: Option<String>,
    run: Option<PreparationRun>,
    runs_started: u64,
}

impl BatchPreparer {
    pub fn new(name: &'static str, source: impl Into<PathBuf>, options: PreparationOptions) -> Self {
        BatchPreparer {
            name,
            source: source.into(),
            options,
            status: BatchPreparationStatus::NotPrepared,
            batch: None,
            failure: None,
            run: None,
            runs_started: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Last status observed by `poll`/`wait`.
    pub fn status(&self) -> BatchPreparationStatus {
        self.status
    }

    /// The frozen batch; `Some` exactly when the status is `Ready`.
    pub fn batch(&self) -> Option<Arc<Batch>> {
        self.batch.clone()
    }

    /// Diagnostic text of the failure that ended the latest run, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Points the slot at a different file and starts preparing it.
    pub fn start_from(&mut self, source: impl Into<PathBuf>) {
        self.source = source.into();
        self.start();
    }

    /// Discards any batch or in-flight run and starts a fresh preparation on a
    /// background thread. Returns immediately with the status at `Preparing(0)`.
    pub fn start(&mut self) {
        if let Some(old) = self.run.take() {
            old.cancel.store(true, Ordering::Relaxed);
            info!("{} preparation run {} superseded", self.name, old.id);
        }
        self.runs_started += 1;
        let id = self.runs_started;

        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        self.run = Some(PreparationRun { id, rx, cancel: cancel.clone() });
        self.status = BatchPreparationStatus::Preparing { count: 0 };
        self.batch = None;
        self.failure = None;

        info!("{} preparation run {} started from '{}'", self.name, id, self.source.display());
        let name = self.name;
        let source = self.source.clone();
        let options = self.options;
        thread::spawn(move || run_pipeline(name, id, &source, options, &tx, &cancel));
    }

    /// Applies every event published so far without blocking.
    ///
    /// Returns the failure of the current run once, when it arrives; the
    /// status then stays at its last `Preparing` value and the batch stays empty.
    pub fn poll(&mut self) -> Result<BatchPreparationStatus> {
        loop {
            let Some(run) = &self.run else {
                return Ok(self.status);
            };
            match run.rx.try_recv() {
                Ok(event) => self.apply(event)?,
                Err(TryRecvError::Empty) => return Ok(self.status),
                Err(TryRecvError::Disconnected) => return Err(self.worker_lost()),
            }
        }
    }

    /// Blocks until the current run is `Ready` or has failed. Once a run has
    /// failed, later calls keep reporting that failure until the next `start`.
    pub fn wait(&mut self) -> Result<Arc<Batch>> {
        loop {
            let Some(run) = &self.run else {
                return match (&self.batch, self.status, &self.failure) {
                    (Some(batch), BatchPreparationStatus::Ready, _) => Ok(batch.clone()),
                    (_, _, Some(reason)) => Err(Error::PreparationFailed { slot: self.name, reason: reason.clone() }),
                    _ => Err(Error::Usage(format!("{} batch preparation has not been started", self.name))),
                };
            };
            match run.rx.recv() {
                Ok(event) => self.apply(event)?,
                Err(_) => return Err(self.worker_lost()),
            }
        }
    }

    fn apply(&mut self, event: PreparationEvent) -> Result<()> {
        match event {
            PreparationEvent::Progress(n) => {
                if let BatchPreparationStatus::Preparing { count } = self.status {
                    if n >= count {
                        self.status = BatchPreparationStatus::Preparing { count: n };
                    }
                }
                Ok(())
            }
            PreparationEvent::Ready(batch) => {
                self.batch = Some(batch);
                self.status = BatchPreparationStatus::Ready;
                self.run = None;
                Ok(())
            }
            PreparationEvent::Failed(e) => {
                self.failure = Some(e.to_string());
                self.run = None;
                Err(e)
            }
        }
    }

    fn worker_lost(&mut self) -> Error {
        let err = Error::WorkerLost { task: "batch preparation" };
        self.failure = Some(err.to_string());
        self.run = None;
        err
    }
}

impl Drop for BatchPreparer {
    fn drop(&mut self) {
        if let Some(run) = &self.run {
            run.cancel.store(true, Ordering::Relaxed);
        }
    }
}

fn run_pipeline(
    name: &'static str,
    id: u64,
    source: &Path,
    options: PreparationOptions,
    tx: &Sender<PreparationEvent>,
    cancel: &AtomicBool,
) {
    let t_start = Instant::now();
    match build_batch(source, options, tx, cancel) {
        Ok(Some(batch)) => {
            info!(
                "{} preparation run {} ready: {} samples (~{} MB) in {} ms",
                name,
                id,
                batch.count(),
                batch.approx_bytes() / 1_000_000,
                t_start.elapsed().as_millis()
            );
            let _ = tx.send(PreparationEvent::Ready(Arc::new(batch)));
        }
        Ok(None) => debug!("{} preparation run {} stopped after being superseded", name, id),
        Err(e) => {
            warn!("{} preparation run {} failed: {}", name, id, e);
            let _ = tx.send(PreparationEvent::Failed(e));
        }
    }
}

/// Streams `source` into a batch. `Ok(None)` means the run was superseded.
fn build_batch(
    source: &Path,
    options: PreparationOptions,
    tx: &Sender<PreparationEvent>,
    cancel: &AtomicBool,
) -> Result<Option<Batch>> {
    let interval = options.progress_interval.max(1);
    let mut builder = BatchBuilder::new(options.target_mode);

    for sample in DatasetReader::open(source)? {
        if cancel.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let count = builder.push(encode(&sample?, options.target_mode)?)?;
        if count % interval == 0 {
            debug!("prepared {} rows from '{}'", count, source.display());
            if tx.send(PreparationEvent::Progress(count)).is_err() {
                return Ok(None);
            }
        }
    }

    if tx.send(PreparationEvent::Progress(builder.count())).is_err() {
        return Ok(None);
    }
    Ok(Some(builder.freeze()))
}
