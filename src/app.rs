// app.rs
pub mod gui;
pub mod image_processing;
pub mod file_dialogs;

use eframe::egui;
use eframe::App as EframeApp;
use parking_lot::Mutex;
use png_to_webp_coder::config::DEFAULT_QUALITY;
use png_to_webp_coder::utils::Logger;
use png_to_webp_coder::BatchSnapshot;
use std::path::PathBuf;
use std::sync::Arc;

use image_processing::Conversion;

pub struct App {
    // Application state
    pub queued_files: Vec<PathBuf>,
    pub output_directory: Option<PathBuf>,
    pub resize_enabled: bool,
    pub width: u32,
    pub height: u32,
    pub compression_quality: f32,
    pub parallel_enabled: bool,
    pub convert_on_drop: bool,
    pub log_messages: Arc<Mutex<Vec<String>>>,
    pub logger: Logger,
    pub conversion: Option<Conversion>,
    pub snapshot: BatchSnapshot,
}

impl Default for App {
    fn default() -> Self {
        let log_messages = Arc::new(Mutex::new(Vec::new()));
        Self {
            queued_files: Vec::new(),
            output_directory: None,
            resize_enabled: false,
            width: 800,
            height: 600,
            compression_quality: DEFAULT_QUALITY,
            parallel_enabled: false,
            convert_on_drop: true,
            logger: Logger::new(log_messages.clone()),
            log_messages,
            conversion: None,
            snapshot: BatchSnapshot::default(),
        }
    }
}

impl App {
    pub fn is_converting(&self) -> bool {
        self.conversion.is_some()
    }

    /// Queues PNG files, ignoring duplicates and anything else.
    pub fn add_files(&mut self, files: Vec<PathBuf>) {
        for path in files {
            let is_png = path
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("png"));
            if !is_png {
                self.logger.log(format!("Skipping {} (not a PNG)", path.display()));
            } else if !self.queued_files.contains(&path) {
                self.logger.log(format!("Queued {}", path.display()));
                self.queued_files.push(path);
            }
        }
    }

    fn drain_updates(&mut self) {
        let Some(conversion) = &self.conversion else {
            return;
        };

        let updates: Vec<_> = conversion.receiver.try_iter().collect();
        if !updates.is_empty() {
            self.snapshot = conversion.coordinator.snapshot();
        }
        for update in updates {
            image_processing::log_outcome(&self.logger, &self.snapshot, update);
        }

        if conversion.worker.is_finished() {
            if let Some(conversion) = self.conversion.take() {
                self.snapshot = conversion.finish(&self.logger);
            }
        }
    }
}

impl EframeApp for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let dropped: Vec<PathBuf> = ctx
            .input()
            .raw
            .dropped_files
            .iter()
            .filter_map(|file| file.path.clone())
            .collect();
        if !dropped.is_empty() {
            self.add_files(dropped);
            if self.convert_on_drop && !self.is_converting() {
                image_processing::start_conversion(self);
            }
        }

        self.drain_updates();

        // Render the GUI
        gui::render(self, ctx);

        // Keep polling the worker while a batch is running
        if self.is_converting() {
            ctx.request_repaint();
        }
    }
}
