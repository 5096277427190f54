use crate::app::App;
use crate::app::file_dialogs;
use crate::app::image_processing;
use egui::{Color32, Frame, ProgressBar, Rounding, Slider, Stroke, RichText};
use png_to_webp_coder::config::LOSSLESS_QUALITY;
use png_to_webp_coder::{ConversionJob, JobState};

const ACCENT: Color32 = Color32::from_rgb(100, 200, 250);
const MUTED: Color32 = Color32::from_rgb(200, 200, 200);

pub fn render(app: &mut App, ctx: &egui::Context) {
    let frame = Frame {
        fill: Color32::from_rgb(30, 30, 40),
        rounding: Rounding::same(10.0),
        stroke: Stroke::new(1.0, ACCENT),
        inner_margin: egui::style::Margin::same(20.0),
        ..Default::default()
    };

    let hovering = !ctx.input().raw.hovered_files.is_empty();

    egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
        ui.heading(RichText::new("PNG to WebP Converter").size(28.0).color(ACCENT));
        if hovering {
            ui.label(RichText::new("Release to add the dropped PNG files").size(18.0).color(Color32::YELLOW));
        } else {
            ui.label(RichText::new("Drop PNG files anywhere on this window").color(MUTED));
        }
        ui.add_space(20.0);

        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                let button_width = 200.0;
                if ui.add_sized([button_width, 30.0], egui::Button::new("Select Images")).clicked() {
                    if let Some(files) = file_dialogs::select_images() {
                        app.add_files(files);
                    }
                }
                ui.add_space(5.0);
                if ui.add_sized([button_width, 30.0], egui::Button::new("Select Output Directory")).clicked() {
                    if let Some(dir) = file_dialogs::select_output_directory() {
                        app.logger.log(format!("Output directory set to {}", dir.display()));
                        app.output_directory = Some(dir);
                    }
                }

                ui.add_space(10.0);

                // Display output directory
                ui.group(|ui| {
                    ui.set_width(button_width);
                    ui.label(RichText::new("Output Directory:").size(16.0).color(ACCENT));
                    if let Some(dir) = &app.output_directory {
                        ui.label(dir.to_string_lossy());
                        if ui.small_button("Use source folders").clicked() {
                            app.output_directory = None;
                        }
                    } else {
                        ui.label("Next to each source file");
                    }
                });

                ui.add_space(10.0);

                // Conversion Settings
                ui.group(|ui| {
                    ui.set_width(button_width);
                    ui.label(RichText::new("Conversion Settings").size(16.0).color(ACCENT));
                    ui.add(Slider::new(&mut app.compression_quality, 0.0..=LOSSLESS_QUALITY).text("Quality"));
                    if app.compression_quality >= LOSSLESS_QUALITY {
                        ui.label(RichText::new("Lossless (exact)").color(Color32::GREEN));
                    } else {
                        ui.label(RichText::new("Lossy").color(MUTED));
                    }
                    ui.checkbox(&mut app.resize_enabled, "Enable Resizing");
                    if app.resize_enabled {
                        ui.horizontal(|ui| {
                            ui.add(egui::DragValue::new(&mut app.width).clamp_range(1..=16383).prefix("Width: ").suffix("px"));
                            ui.add(egui::DragValue::new(&mut app.height).clamp_range(1..=16383).prefix("Height: ").suffix("px"));
                        });
                    }
                    ui.checkbox(&mut app.parallel_enabled, "Convert in parallel");
                    ui.checkbox(&mut app.convert_on_drop, "Convert on drop");
                });

                ui.add_space(10.0);

                // Results
                ui.group(|ui| {
                    ui.set_width(button_width);
                    ui.label(RichText::new("Results").size(16.0).color(ACCENT));

                    let snapshot = &app.snapshot;
                    let total_original_size: f64 = snapshot.jobs.iter()
                        .filter_map(|job| std::fs::metadata(&job.source).ok())
                        .map(|m| m.len() as f64 / (1024.0 * 1024.0))
                        .sum();
                    let total_compressed_size = snapshot.output_bytes() as f64 / (1024.0 * 1024.0);

                    ui.label(RichText::new(format!("Queued: {}", app.queued_files.len())).color(MUTED));
                    ui.label(RichText::new(format!("Files: {}", snapshot.jobs.len())).color(MUTED));
                    ui.label(RichText::new(format!("Succeeded: {}", snapshot.succeeded())).color(MUTED));
                    ui.label(RichText::new(format!("Failed: {}", snapshot.failed())).color(MUTED));
                    ui.label(RichText::new(format!("Original Size: {:.2} MB", total_original_size)).color(MUTED));
                    ui.label(RichText::new(format!("Compressed Size: {:.2} MB", total_compressed_size)).color(MUTED));
                });

                ui.add_space(10.0);

                if let Some(conversion) = &app.conversion {
                    if ui.add_sized([button_width, 30.0], egui::Button::new("Cancel")).clicked() {
                        app.logger.log("Cancelling conversion...".to_string());
                        conversion.cancel();
                    }
                } else if ui.add_sized([button_width, 30.0], egui::Button::new("Start Conversion")).clicked() {
                    image_processing::start_conversion(app);
                }
            });

            ui.add_space(10.0);

            // Jobs (scrollable table)
            ui.vertical(|ui| {
                ui.group(|ui| {
                    ui.set_min_width(ui.available_width());
                    ui.set_min_height(ui.available_height() - 250.0);
                    ui.label(RichText::new("Jobs:").size(16.0).color(ACCENT));

                    egui::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
                        egui::Grid::new("job_grid")
                        .num_columns(5)
                        .striped(true)
                        .show(ui, |ui| {
                            ui.label(RichText::new("#").strong());
                            ui.label(RichText::new("Name").strong());
                            ui.label(RichText::new("Progress").strong());
                            ui.label(RichText::new("Output Size").strong());
                            ui.label(RichText::new("Status").strong());
                            ui.end_row();

                            for (index, job) in app.snapshot.jobs.iter().enumerate() {
                                job_row(ui, index, job);
                            }
                            for path in &app.queued_files {
                                ui.label("-");
                                ui.label(file_name(path));
                                ui.label("-");
                                ui.label("-");
                                ui.label(RichText::new("Queued").color(MUTED));
                                ui.end_row();
                            }
                        });
                    });
                });
            });
        });

        ui.add_space(20.0);

        // Conversion Log
        ui.group(|ui| {
            ui.set_min_width(ui.available_width());
            ui.label(RichText::new("Conversion Log").size(16.0).color(ACCENT));

            egui::ScrollArea::vertical()
                .max_height(200.0)
                .auto_shrink([false; 2])
                .show(ui, |ui| {
                let logs = app.log_messages.lock();
                for log in logs.iter() {
                    if log.contains("error:") {
                        ui.label(RichText::new(log).color(Color32::RED));
                    } else {
                        ui.label(log);
                    }
                }
            });
        });
    });
}

fn job_row(ui: &mut egui::Ui, index: usize, job: &ConversionJob) {
    let (status, color, size) = match &job.state {
        JobState::Pending => ("Pending".to_string(), Color32::WHITE, "-".to_string()),
        JobState::Running => ("Processing...".to_string(), Color32::YELLOW, "-".to_string()),
        JobState::Succeeded { bytes, .. } => (
            "Converted".to_string(),
            Color32::GREEN,
            format!("{:.2} MB", *bytes as f64 / (1024.0 * 1024.0)),
        ),
        JobState::Failed(err) => (err.to_string(), Color32::RED, "-".to_string()),
    };

    ui.label(format!("{}", index + 1));
    ui.label(file_name(&job.source));
    ui.add(ProgressBar::new(job.progress as f32).text(format!("{:.0}%", job.progress * 100.0)));
    ui.label(size);
    ui.label(RichText::new(status).color(color));
    ui.end_row();
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
