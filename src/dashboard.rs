use crate::timeline::ConcurrencyTimeline;

#[cfg(feature = "ui")]
use eframe::egui;

#[cfg(feature = "ui")]
pub struct FlightView {
    title: String,
    timeline: ConcurrencyTimeline,
    selected_tab: usize,
}

/// Show the concurrency series in a window; blocks until it is closed
#[cfg(feature = "ui")]
pub fn show_timeline(title: &str, timeline: ConcurrencyTimeline) -> anyhow::Result<()> {
    let options = eframe::NativeOptions::default();
    let view = FlightView::new(title, timeline);
    eframe::run_native(
        "Drone Flight Timeline",
        options,
        Box::new(move |_cc| Box::new(view)),
    )
    .map_err(|e| anyhow::anyhow!("flight view failed: {}", e))
}

#[cfg(feature = "ui")]
impl FlightView {
    fn new(title: &str, timeline: ConcurrencyTimeline) -> Self {
        Self {
            title: title.to_string(),
            timeline,
            selected_tab: 0,
        }
    }

    fn draw_chart(&self, ui: &mut egui::Ui, first: &[u32], second: &[u32], label: &str) {
        ui.group(|ui| {
            ui.label(label);
            let height = 90.0;
            let width = ui.available_width().max(300.0);

            if first.is_empty() {
                ui.label("No samples");
                return;
            }

            let (rect, _response) =
                ui.allocate_exact_size(egui::vec2(width, height), egui::Sense::hover());
            let painter = ui.painter_at(rect);
            painter.rect_filled(rect, 0.0, egui::Color32::from_rgb(20, 20, 30));

            let peak = self.timeline.peak() as f32;
            for level in 0..=self.timeline.peak() {
                let y = rect.bottom() - (level as f32 / peak) * (height - 8.0) - 4.0;
                painter.line_segment(
                    [egui::pos2(rect.left(), y), egui::pos2(rect.right(), y)],
                    egui::Stroke::new(0.5, egui::Color32::from_rgb(60, 60, 80)),
                );
            }

            let span = self.timeline.span_s().max(1.0) as f32;
            let to_screen = |offset: f64, count: u32| {
                egui::pos2(
                    rect.left() + (offset as f32 / span) * width,
                    rect.bottom() - (count as f32 / peak) * (height - 8.0) - 4.0,
                )
            };

            for (data, color) in [
                (first, egui::Color32::LIGHT_BLUE),
                (second, egui::Color32::RED),
            ] {
                let points: Vec<egui::Pos2> = self
                    .timeline
                    .offsets_s
                    .iter()
                    .zip(data)
                    .map(|(&x, &c)| to_screen(x, c))
                    .collect();
                for pair in points.windows(2) {
                    painter.line_segment([pair[0], pair[1]], egui::Stroke::new(2.0, color));
                }
            }

            let busy = |data: &[u32]| data.iter().filter(|&&c| c > 0).count();
            ui.horizontal(|ui| {
                ui.colored_label(
                    egui::Color32::LIGHT_BLUE,
                    format!("First drone: {} samples airborne", busy(first)),
                );
                ui.colored_label(
                    egui::Color32::RED,
                    format!("Second drone: {} samples airborne", busy(second)),
                );
            });
        });
    }
}

#[cfg(feature = "ui")]
impl eframe::App for FlightView {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(&self.title);
            ui.label(format!(
                "{} samples every {} s from {}",
                self.timeline.len(),
                self.timeline.interval_s,
                self.timeline.start.format("%H:%M:%S")
            ));
            ui.separator();

            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.selected_tab, 0, "All positions");
                for (i, series) in self.timeline.positions.iter().enumerate() {
                    ui.selectable_value(&mut self.selected_tab, i + 1, series.position.code());
                }
            });
            ui.separator();

            egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .show(ui, |ui| {
                    for (i, series) in self.timeline.positions.iter().enumerate() {
                        if self.selected_tab == 0 || self.selected_tab == i + 1 {
                            let label = format!("Position {}", series.position);
                            self.draw_chart(ui, &series.first, &series.second, &label);
                        }
                    }
                });
        });
    }
}

#[cfg(not(feature = "ui"))]
pub fn show_timeline(_title: &str, _timeline: ConcurrencyTimeline) -> anyhow::Result<()> {
    tracing::info!("Live view requires 'ui' feature. Build with: cargo build --features ui");
    Ok(())
}
