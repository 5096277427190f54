// batch.rs
//! Batch coordinator: owns the job table and drives every job through
//! access, decode, transform, encode and persist.
//!
//! Job states only move forward (`Pending -> Running -> Succeeded | Failed`).
//! A failure is recorded on its job and the batch carries on with the next
//! one. Observers see the table through [`BatchSnapshot`] copies and the
//! events pushed into a [`ProgressSink`].

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

use crate::access::{FileAccessProvider, ScopedAccess, Unrestricted};
use crate::config::{BatchOptions, ConverterConfig, EncodeSettings};
use crate::decode::decode;
use crate::encode::encode;
use crate::error::{ConfigError, ConvertError, IoError};
use crate::progress::{checkpoint, JobEvent, JobId, JobState, ProgressSink};
use crate::transform::{Identity, PixelTransform};
use crate::utils::{get_memory_usage, measure_time};

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionJob {
    pub id: JobId,
    pub source: PathBuf,
    pub state: JobState,
    pub progress: f64,
}

#[derive(Debug, Default)]
struct BatchState {
    jobs: Vec<ConversionJob>,
    next_id: u64,
}

impl BatchState {
    fn job_mut(&mut self, id: JobId) -> Option<&mut ConversionJob> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }
}

/// Point-in-time copy of the job table, in submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSnapshot {
    pub jobs: Vec<ConversionJob>,
}

impl BatchSnapshot {
    pub fn job(&self, id: JobId) -> Option<&ConversionJob> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn pending(&self) -> usize {
        self.count(|state| matches!(state, JobState::Pending))
    }

    pub fn running(&self) -> usize {
        self.count(|state| matches!(state, JobState::Running))
    }

    pub fn succeeded(&self) -> usize {
        self.count(|state| matches!(state, JobState::Succeeded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|state| matches!(state, JobState::Failed(_)))
    }

    pub fn is_finished(&self) -> bool {
        self.jobs.iter().all(|job| job.state.is_terminal())
    }

    pub fn output_bytes(&self) -> u64 {
        self.jobs
            .iter()
            .map(|job| match job.state {
                JobState::Succeeded { bytes, .. } => bytes,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&JobState) -> bool) -> usize {
        self.jobs.iter().filter(|job| pred(&job.state)).count()
    }
}

pub struct BatchCoordinator {
    state: Mutex<BatchState>,
    settings: EncodeSettings,
    transform: Box<dyn PixelTransform>,
    access: Arc<dyn FileAccessProvider>,
    options: BatchOptions,
    cancelled: AtomicBool,
}

impl BatchCoordinator {
    pub fn new(settings: EncodeSettings) -> Self {
        Self {
            state: Mutex::new(BatchState::default()),
            settings,
            transform: Box::new(Identity),
            access: Arc::new(Unrestricted::default()),
            options: BatchOptions::default(),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.encode_settings()?)
            .with_transform(config.pixel_transform()?)
            .with_options(config.batch_options()?))
    }

    pub fn with_transform(mut self, transform: Box<dyn PixelTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_access(mut self, access: Arc<dyn FileAccessProvider>) -> Self {
        self.access = access;
        self
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn settings(&self) -> EncodeSettings {
        self.settings
    }

    /// Queues `source` for conversion.
    ///
    /// A source that is already in the table loses its old entry; the new
    /// job is appended at the end of the submission order.
    pub fn submit(&self, source: impl Into<PathBuf>) -> JobId {
        let source = source.into();
        let mut state = self.state.lock();
        let id = JobId(state.next_id);
        state.next_id += 1;

        if let Some(pos) = state.jobs.iter().position(|job| job.source == source) {
            let previous = state.jobs.remove(pos);
            log::info!("job {} supersedes {} for {}", id, previous.id, source.display());
        }
        state.jobs.push(ConversionJob {
            id,
            source,
            state: JobState::Pending,
            progress: checkpoint::STARTED,
        });
        id
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            jobs: self.state.lock().jobs.clone(),
        }
    }

    pub fn job(&self, id: JobId) -> Option<ConversionJob> {
        self.state.lock().jobs.iter().find(|job| job.id == id).cloned()
    }

    /// Drops succeeded and failed jobs from the table.
    pub fn clear_finished(&self) {
        self.state.lock().jobs.retain(|job| !job.state.is_terminal());
    }

    /// Asks the current batch, or the next one if none is running yet, to
    /// stop. Checked between pipeline stages and cleared when `run` returns.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Where the WebP for `source` ends up.
    pub fn output_path(&self, source: &Path) -> PathBuf {
        match &self.options.output_directory {
            Some(dir) => {
                let mut name = source.file_stem().unwrap_or_default().to_os_string();
                name.push(".webp");
                dir.join(name)
            }
            None => source.with_extension("webp"),
        }
    }

    /// Runs every pending job and returns the resulting table.
    pub fn run(&self, sink: &dyn ProgressSink) -> BatchSnapshot {
        let snapshot = self.run_pending(sink);
        self.cancelled.store(false, Ordering::SeqCst);
        snapshot
    }

    fn run_pending(&self, sink: &dyn ProgressSink) -> BatchSnapshot {
        let pending: Vec<(JobId, PathBuf)> = self
            .state
            .lock()
            .jobs
            .iter()
            .filter(|job| matches!(job.state, JobState::Pending))
            .map(|job| (job.id, job.source.clone()))
            .collect();

        if pending.is_empty() {
            log::debug!("no pending jobs");
            return self.snapshot();
        }

        log::info!(
            "starting batch of {} job(s): transform={}, quality={}, parallel={}",
            pending.len(),
            self.transform.name(),
            self.settings.quality(),
            self.options.parallel
        );
        log::debug!("{}", get_memory_usage());

        let ((), took) = measure_time(|| {
            if self.options.parallel {
                self.run_parallel(&pending, sink);
            } else {
                self.run_sequential(&pending, sink);
            }
        });

        let snapshot = self.snapshot();
        log::info!(
            "batch finished in {:?}: {} succeeded, {} failed",
            took,
            snapshot.succeeded(),
            snapshot.failed()
        );
        log::debug!("{}", get_memory_usage());
        snapshot
    }

    fn run_sequential(&self, pending: &[(JobId, PathBuf)], sink: &dyn ProgressSink) {
        for (id, source) in pending {
            self.run_job(*id, source, sink);
        }
    }

    fn run_parallel(&self, pending: &[(JobId, PathBuf)], sink: &dyn ProgressSink) {
        let mut builder = ThreadPoolBuilder::new();
        if let Some(threads) = self.options.threads {
            builder = builder.num_threads(threads);
        }
        match builder.build() {
            Ok(pool) => pool.install(|| {
                pending
                    .par_iter()
                    .for_each(|(id, source)| self.run_job(*id, source, sink));
            }),
            Err(err) => {
                log::warn!("thread pool unavailable ({}), running sequentially", err);
                self.run_sequential(pending, sink);
            }
        }
    }

    fn run_job(&self, id: JobId, source: &Path, sink: &dyn ProgressSink) {
        if !self.start(id) {
            log::debug!("job {} no longer pending, skipping", id);
            return;
        }
        self.checkpoint(id, checkpoint::STARTED, sink);

        let (result, took) = measure_time(|| self.convert(id, source, sink));
        let state = match result {
            Ok((output, bytes)) => {
                log::info!(
                    "{} -> {} ({} bytes) in {:?}",
                    source.display(),
                    output.display(),
                    bytes,
                    took
                );
                JobState::Succeeded { output, bytes }
            }
            Err(err) => {
                log::warn!("{} failed: {}", source.display(), err);
                JobState::Failed(err)
            }
        };

        if self.finish(id, state.clone()) {
            sink.report(id, JobEvent::Finished(state));
        }
    }

    fn convert(
        &self,
        id: JobId,
        source: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<(PathBuf, u64), ConvertError> {
        let output = self.output_path(source);
        if same_file(source, &output) {
            return Err(IoError::WouldOverwriteSource(output).into());
        }
        let _source_access = ScopedAccess::begin(self.access.as_ref(), source)?;
        let _output_access = ScopedAccess::begin(self.access.as_ref(), &output)?;
        self.ensure_running()?;

        let (image, took) = measure_time(|| decode(source));
        let image = image?;
        log::debug!(
            "decoded {} ({}x{}) in {:?}",
            source.display(),
            image.width(),
            image.height(),
            took
        );

        self.ensure_running()?;
        let (image, took) = measure_time(|| self.transform.transform(image));
        let image = image?;
        log::debug!("{} transform took {:?}", self.transform.name(), took);
        self.checkpoint(id, checkpoint::TRANSFORMED, sink);
        self.checkpoint(id, checkpoint::PIXELS_READY, sink);

        self.ensure_running()?;
        let (encoded, took) = measure_time(|| encode(image, &self.settings));
        let encoded = encoded?;
        log::debug!(
            "encoded {} bytes (lossless={}) in {:?}",
            encoded.len(),
            encoded.is_lossless(),
            took
        );
        self.checkpoint(id, checkpoint::ENCODED, sink);

        self.ensure_running()?;
        let bytes = write_replacing(&output, encoded.as_slice())?;
        self.checkpoint(id, checkpoint::PERSISTED, sink);

        Ok((output, bytes))
    }

    fn ensure_running(&self) -> Result<(), ConvertError> {
        if self.is_cancelled() {
            Err(ConvertError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn start(&self, id: JobId) -> bool {
        let mut state = self.state.lock();
        match state.job_mut(id) {
            Some(job) if matches!(job.state, JobState::Pending) => {
                job.state = JobState::Running;
                job.progress = checkpoint::STARTED;
                true
            }
            _ => false,
        }
    }

    fn finish(&self, id: JobId, next: JobState) -> bool {
        let mut state = self.state.lock();
        match state.job_mut(id) {
            Some(job) if !job.state.is_terminal() => {
                job.state = next;
                true
            }
            _ => false,
        }
    }

    fn checkpoint(&self, id: JobId, progress: f64, sink: &dyn ProgressSink) {
        let live = {
            let mut state = self.state.lock();
            match state.job_mut(id) {
                Some(job) if !job.state.is_terminal() => {
                    job.progress = job.progress.max(progress);
                    true
                }
                _ => false,
            }
        };
        // report outside the lock so sinks may take snapshots
        if live {
            sink.report(id, JobEvent::Progress(progress));
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Writes `bytes` to `output` through a temp file in the same directory.
///
/// Any existing file at `output` is removed first. A failed or abandoned
/// write leaves nothing behind.
fn write_replacing(output: &Path, bytes: &[u8]) -> Result<u64, IoError> {
    let fail = |err: std::io::Error| IoError::write_failed(output, err);
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(fail)?;
    temp.write_all(bytes).map_err(fail)?;
    temp.as_file().sync_all().map_err(fail)?;

    match fs::remove_file(output) {
        Ok(()) => log::debug!("replacing {}", output.display()),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(fail(err)),
    }
    temp.persist(output).map_err(|err| fail(err.error))?;

    Ok(bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodeError;
    use crate::progress::NullSink;
    use image::{Rgba, RgbaImage};

    fn write_png(path: &Path, rgba: [u8; 4]) {
        RgbaImage::from_pixel(8, 8, Rgba(rgba)).save(path).unwrap();
    }

    fn coordinator() -> BatchCoordinator {
        BatchCoordinator::new(EncodeSettings::lossless())
    }

    #[test]
    fn output_is_sibling_by_default() {
        let batch = coordinator();
        assert_eq!(
            batch.output_path(Path::new("/pics/cat.png")),
            PathBuf::from("/pics/cat.webp")
        );
    }

    #[test]
    fn output_directory_keeps_dotted_stems() {
        let batch = coordinator().with_options(BatchOptions {
            output_directory: Some(PathBuf::from("/out")),
            ..Default::default()
        });
        assert_eq!(
            batch.output_path(Path::new("/pics/cat.v2.png")),
            PathBuf::from("/out/cat.v2.webp")
        );
    }

    #[test]
    fn resubmission_replaces_entry() {
        let batch = coordinator();
        let first = batch.submit("/pics/a.png");
        batch.submit("/pics/b.png");
        let second = batch.submit("/pics/a.png");

        let snapshot = batch.snapshot();
        assert_eq!(snapshot.jobs.len(), 2);
        assert!(snapshot.job(first).is_none());
        assert_eq!(snapshot.jobs[1].id, second);
        assert_eq!(snapshot.pending(), 2);
    }

    #[test]
    fn finished_jobs_stay_finished() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("gone.png");
        let batch = coordinator();
        let id = batch.submit(&source);

        batch.run(&NullSink);
        let failed = JobState::Failed(ConvertError::Decode(DecodeError::NotFound));
        assert_eq!(batch.job(id).unwrap().state, failed);

        // a second run has nothing pending and must not touch the job
        write_png(&source, [1, 2, 3, 255]);
        batch.run(&NullSink);
        assert_eq!(batch.job(id).unwrap().state, failed);
        assert!(!batch.finish(id, JobState::Running));
    }

    #[test]
    fn cancel_between_stages_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("cancel.png");
        write_png(&source, [9, 9, 9, 255]);

        let batch = coordinator();
        let id = batch.submit(&source);
        let sink = |_: JobId, event: JobEvent| {
            if event == JobEvent::Progress(checkpoint::ENCODED) {
                batch.cancel();
            }
        };
        batch.run(&sink);

        assert_eq!(batch.job(id).unwrap().state, JobState::Failed(ConvertError::Cancelled));
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("cancel.png")]);
    }

    #[test]
    fn cancel_before_run_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("early.png");
        write_png(&source, [4, 5, 6, 255]);

        let batch = coordinator();
        let id = batch.submit(&source);
        batch.cancel();
        batch.run(&NullSink);

        assert_eq!(batch.job(id).unwrap().state, JobState::Failed(ConvertError::Cancelled));
        assert!(!dir.path().join("early.webp").exists());

        // the request is spent once that run returns
        assert!(!batch.is_cancelled());
        let again = batch.submit(&source);
        batch.run(&NullSink);
        assert!(matches!(batch.job(again).unwrap().state, JobState::Succeeded { .. }));
    }

    #[test]
    fn source_with_webp_extension_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("already.webp");
        write_png(&source, [7, 7, 7, 255]);
        let original = fs::read(&source).unwrap();

        let batch = coordinator();
        let id = batch.submit(&source);
        batch.run(&NullSink);

        assert_eq!(
            batch.job(id).unwrap().state,
            JobState::Failed(ConvertError::Io(IoError::WouldOverwriteSource(source.clone())))
        );
        assert_eq!(fs::read(&source).unwrap(), original);
    }

    #[test]
    fn clear_finished_keeps_pending() {
        let dir = tempfile::tempdir().unwrap();
        let batch = coordinator();
        batch.submit(dir.path().join("missing.png"));
        batch.run(&NullSink);
        let pending = batch.submit(dir.path().join("later.png"));

        batch.clear_finished();
        let snapshot = batch.snapshot();
        assert_eq!(snapshot.jobs.len(), 1);
        assert_eq!(snapshot.jobs[0].id, pending);
    }

    #[test]
    fn write_replacing_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.webp");
        fs::write(&output, b"stale contents that are longer").unwrap();

        assert_eq!(write_replacing(&output, b"fresh").unwrap(), 5);
        assert_eq!(fs::read(&output).unwrap(), b"fresh");
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nope").join("out.webp");
        assert!(matches!(
            write_replacing(&output, b"x"),
            Err(IoError::WriteFailed { .. })
        ));
    }
}
