//! Live viewer for beatscope
//! eframe window that drives the compositor once per repaint and shows its surface

use std::time::Instant;

use beatscope::{Compositor, EffectMode, SignalSource, Surface};
use eframe::egui;
use tracing::info;

pub struct ViewerApp {
    compositor: Compositor,
    source: Box<dyn SignalSource>,
    started: Instant,

    texture: Option<egui::TextureHandle>,
    pixels: Vec<u8>,

    show_controls: bool,
    last_frame: Instant,
    last_dt: f32,
}

impl ViewerApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        compositor: Compositor,
        source: Box<dyn SignalSource>,
        intro: bool,
    ) -> Self {
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_unmultiplied(15, 15, 25, 245);
        visuals.panel_fill = egui::Color32::from_rgba_unmultiplied(20, 20, 35, 240);
        cc.egui_ctx.set_visuals(visuals);

        let mut app = Self {
            compositor,
            source,
            started: Instant::now(),
            texture: None,
            pixels: Vec::new(),
            show_controls: true,
            last_frame: Instant::now(),
            last_dt: 1.0 / 30.0,
        };
        if intro {
            app.compositor.queue_intro();
        }
        app
    }

    fn now_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn render_controls(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("controls_panel")
            .min_width(220.0)
            .show(ctx, |ui| {
                ui.heading("beatscope");
                ui.separator();

                let mut mode = self.compositor.mode();
                ui.horizontal(|ui| {
                    ui.label("Mode:");
                    egui::ComboBox::from_id_source("mode_combo")
                        .selected_text(mode.label())
                        .show_ui(ui, |ui| {
                            for option in EffectMode::ALL {
                                ui.selectable_value(&mut mode, option, option.label());
                            }
                        });
                });
                if mode != self.compositor.mode() {
                    info!(%mode, "mode selected");
                    self.compositor.set_mode(mode);
                }

                ui.add_space(8.0);
                if ui.button("Replay intro").clicked() {
                    let now = self.now_ms();
                    self.compositor.start_intro(now);
                }

                ui.add_space(8.0);
                ui.separator();
                ui.heading("Signal");

                let features = self.compositor.features();
                let impacts = self.compositor.engine().impacts();
                ui.add(egui::ProgressBar::new(features.volume_level).text("Volume"));
                ui.add(egui::ProgressBar::new(features.bass).text("Bass"));
                ui.add(egui::ProgressBar::new(features.mid).text("Mid"));
                ui.add(egui::ProgressBar::new(features.treble).text("Treble"));

                ui.add_space(4.0);
                ui.add(egui::ProgressBar::new(impacts.beat).text("Beat"));
                ui.add(egui::ProgressBar::new(impacts.guitar).text("Guitar"));

                ui.add_space(8.0);
                ui.separator();
                ui.label(format!("Particles: {}", self.compositor.engine().pool().len()));
                ui.label(format!("FPS: {:.0}", 1.0 / self.last_dt.max(0.001)));
                ui.label(format!("Frames: {}", self.compositor.frames_rendered()));
                ui.label(format!(
                    "Pixels shaded: {}",
                    self.compositor.surface().pixels_visited()
                ));
            });
    }

    fn render_canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let size = ui.available_size();
                self.compositor
                    .resize(size.x.max(0.0) as u32, size.y.max(0.0) as u32);

                let now = self.now_ms();
                if self.compositor.frame(now, self.source.as_mut()) {
                    self.upload_frame(ctx);
                }

                if let Some(texture) = &self.texture {
                    ui.add(egui::Image::new((texture.id(), size)));
                }
            });
    }

    fn upload_frame(&mut self, ctx: &egui::Context) {
        let surface = self.compositor.surface();
        let (w, h) = (surface.width() as usize, surface.height() as usize);
        if w == 0 || h == 0 {
            return;
        }

        self.pixels.resize(w * h * 4, 0);
        surface.write_rgba8(&mut self.pixels);
        let image = egui::ColorImage::from_rgba_unmultiplied([w, h], &self.pixels);

        match &mut self.texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture =
                    Some(ctx.load_texture("beatscope-frame", image, egui::TextureOptions::LINEAR));
            }
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.last_dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if ctx.input(|i| i.key_pressed(egui::Key::Tab)) {
            self.show_controls = !self.show_controls;
        }
        if self.show_controls {
            self.render_controls(ctx);
        }
        self.render_canvas(ctx);

        ctx.request_repaint();
    }
}
