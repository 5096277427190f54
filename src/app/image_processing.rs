// image_processing.rs
use crate::app::App;
use png_to_webp_coder::utils::{get_memory_usage, Logger};
use png_to_webp_coder::{
    BatchCoordinator, BatchSnapshot, ChannelSink, ConverterConfig, JobEvent, JobState, ProgressUpdate,
};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// A batch running on a worker thread.
pub struct Conversion {
    pub coordinator: Arc<BatchCoordinator>,
    pub receiver: Receiver<ProgressUpdate>,
    pub worker: JoinHandle<()>,
    pub started: Instant,
}

impl Conversion {
    pub fn cancel(&self) {
        self.coordinator.cancel();
    }

    /// Joins the worker and returns the final job table.
    ///
    /// Updates the UI has not drained yet are logged here, since the
    /// receiver goes away with `self`.
    pub fn finish(self, logger: &Logger) -> BatchSnapshot {
        if self.worker.join().is_err() {
            logger.error("Conversion worker panicked".to_string());
        }
        let snapshot = self.coordinator.snapshot();
        for update in self.receiver.try_iter() {
            log_outcome(logger, &snapshot, update);
        }
        logger.log(format!(
            "Conversion finished in {:?}: {} succeeded, {} failed",
            self.started.elapsed(),
            snapshot.succeeded(),
            snapshot.failed()
        ));
        snapshot
    }
}

/// Writes a line to the log panel for every finished job.
pub fn log_outcome(logger: &Logger, snapshot: &BatchSnapshot, update: ProgressUpdate) {
    let JobEvent::Finished(state) = update.event else {
        return;
    };
    let name = snapshot
        .job(update.job)
        .map(|job| job.source.display().to_string())
        .unwrap_or_else(|| update.job.to_string());
    match state {
        JobState::Succeeded { output, bytes } => logger.log(format!(
            "{} -> {} ({:.1} KB)",
            name,
            output.display(),
            bytes as f64 / 1024.0
        )),
        JobState::Failed(err) => logger.error(format!("{} failed: {}", name, err)),
        _ => {}
    }
}

pub fn config_from(app: &App) -> ConverterConfig {
    ConverterConfig {
        quality: app.compression_quality,
        resize: app.resize_enabled.then(|| (app.width, app.height)),
        output_directory: app.output_directory.clone(),
        parallel: app.parallel_enabled,
    }
}

/// Submits the queued files to a fresh coordinator and runs it off the UI thread.
pub fn start_conversion(app: &mut App) {
    if app.is_converting() {
        app.logger.log("A conversion is already running".to_string());
        return;
    }
    if app.queued_files.is_empty() {
        app.logger.log("No images queued for conversion".to_string());
        return;
    }

    let coordinator = match BatchCoordinator::from_config(&config_from(app)) {
        Ok(coordinator) => Arc::new(coordinator),
        Err(err) => {
            app.logger.error(format!("Invalid settings: {}", err));
            return;
        }
    };

    for path in app.queued_files.drain(..) {
        coordinator.submit(path);
    }
    app.snapshot = coordinator.snapshot();
    app.logger.log(format!(
        "Starting conversion of {} image(s) at quality {}",
        app.snapshot.jobs.len(),
        app.compression_quality
    ));

    let (sender, receiver) = channel();
    let worker_coordinator = coordinator.clone();
    let logger = app.logger.clone();
    let worker = thread::spawn(move || {
        logger.log(get_memory_usage());
        let sink = ChannelSink::new(sender);
        worker_coordinator.run(&sink);
        logger.log(get_memory_usage());
    });

    app.conversion = Some(Conversion {
        coordinator,
        receiver,
        worker,
        started: Instant::now(),
    });
}
