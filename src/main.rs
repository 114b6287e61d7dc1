use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use eframe::egui;

use ring_gallery::config::GalleryConfig;
use ring_gallery::dataset::Dataset;
use ring_gallery::net::image::ImageLoader;
use ring_gallery::net::metadata::GatewayResolver;
use ring_gallery::render::ring::Selection;
use ring_gallery::render::scene::{FrameStats, GalleryScene, Sprite, SpriteKind};
use ring_gallery::render::tile::{Material, ERROR_COLOR, PLACEHOLDER_COLOR};

const BACKGROUND: egui::Color32 = egui::Color32::from_rgb(14, 14, 20);
const INDICATOR_COLOR: egui::Color32 = egui::Color32::from_rgb(120, 200, 255);

fn main() {
    env_logger::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match GalleryConfig::load(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };

    let resolver = GatewayResolver::with_ipfs_gateway(&config.dataset.ipfs_gateway);
    let dataset = Dataset::from_config(&config.dataset, &resolver);
    if dataset.is_empty() {
        log::warn!("No gallery items configured; set `dataset.items` in the config file");
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };

    let result = eframe::run_native(
        "Ring Gallery",
        options,
        Box::new(move |_cc| Ok(Box::new(GalleryApp::new(config, dataset)))),
    );
    if let Err(e) = result {
        log::error!("Viewer exited with error: {}", e);
    }
}

struct GalleryApp {
    scene: GalleryScene,
    /// GPU textures keyed by image URL, mirroring the scene's registry
    textures: HashMap<String, egui::TextureHandle>,
    selection: Option<Selection>,
    stats: FrameStats,
    show_stats: bool,
}

impl GalleryApp {
    fn new(config: GalleryConfig, dataset: Dataset) -> Self {
        Self {
            scene: GalleryScene::new(config, dataset, Box::new(ImageLoader::new())),
            textures: HashMap::new(),
            selection: None,
            stats: FrameStats::default(),
            show_stats: true,
        }
    }

    /// Forward pointer, touch and wheel input to the scene.
    fn handle_input(&mut self, ui: &egui::Ui, response: &egui::Response, now: Instant) {
        let rect = response.rect;
        let to_ndc = |pos: egui::Pos2| {
            [
                (pos.x - rect.center().x) / (rect.width() * 0.5),
                (pos.y - rect.center().y) / (rect.height() * 0.5),
            ]
        };

        // Touch: only the first finger drives the tracker
        let mut saw_touch = false;
        ui.input(|i| {
            for event in &i.events {
                if let egui::Event::Touch { id, phase, pos, .. } = event {
                    saw_touch = true;
                    let tracker = self.scene.input();
                    match phase {
                        egui::TouchPhase::Start => tracker.touch_start(pos.x, pos.y, id.0),
                        egui::TouchPhase::Move => tracker.touch_move(pos.x, pos.y, id.0),
                        egui::TouchPhase::End | egui::TouchPhase::Cancel => tracker.touch_end(id.0),
                    }
                }
            }
        });

        // Mouse drag (egui also emulates the pointer from touches, skip those)
        if !saw_touch && !self.scene.input().touch_active() {
            if let Some(pos) = response.interact_pointer_pos() {
                if response.drag_started() {
                    self.scene.input().press(pos.x, pos.y);
                } else if response.dragged() {
                    self.scene.input().drag(pos.x, pos.y);
                }
            }
            if response.drag_stopped() {
                self.scene.input().release();
            }
        }

        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta);
            if scroll.x.abs() > 0.1 || scroll.y.abs() > 0.1 {
                self.scene.input().wheel(scroll.x, scroll.y);
            }
        }

        if let Some(pos) = response.hover_pos() {
            self.scene.pointer_moved(to_ndc(pos), now);
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                if let Some(sel) = self.scene.click(to_ndc(pos), now) {
                    self.selection = Some(sel);
                    self.scene.set_paused(true);
                }
            }
        }
    }

    /// Drop handles for freed textures, upload newly ready ones.
    fn sync_textures(&mut self, ctx: &egui::Context, sprites: &[Sprite]) {
        for url in self.scene.resources_mut().textures.take_released() {
            self.textures.remove(&url);
        }
        for sprite in sprites {
            let SpriteKind::Tile {
                material: Material::Textured { .. },
                url,
                ..
            } = &sprite.kind
            else {
                continue;
            };
            if self.textures.contains_key(url) {
                continue;
            }
            if let Some(data) = self.scene.resources().textures.image(url) {
                let image = egui::ColorImage::from_rgba_unmultiplied(
                    [data.width as usize, data.height as usize],
                    &data.rgba,
                );
                let tex = ctx.load_texture(format!("tile_{}", url), image, egui::TextureOptions::LINEAR);
                self.textures.insert(url.clone(), tex);
            }
        }
    }

    fn paint(&self, painter: &egui::Painter, rect: egui::Rect, sprites: &[Sprite]) {
        painter.rect_filled(rect, 0.0, BACKGROUND);
        let half = rect.size() * 0.5;
        let radius = self.scene.config().radius.max(f32::EPSILON);

        for sprite in sprites {
            let center = rect.center() + egui::vec2(sprite.center[0] * half.x, sprite.center[1] * half.y);
            let extent = egui::vec2(sprite.half_extent[0] * half.x, sprite.half_extent[1] * half.y);
            let area = egui::Rect::from_center_size(center, extent * 2.0);
            if !area.intersects(rect) {
                continue;
            }
            // Dim surfaces turning away from the view direction
            let fade = (sprite.depth / radius).clamp(0.3, 1.0);

            match &sprite.kind {
                SpriteKind::Tile {
                    material,
                    url,
                    hovered,
                    ..
                } => {
                    match (material, self.textures.get(url)) {
                        (Material::Textured { .. }, Some(tex)) => {
                            painter.image(
                                tex.id(),
                                area,
                                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                                egui::Color32::WHITE.gamma_multiply(fade),
                            );
                        }
                        (Material::Error, _) => {
                            painter.rect_filled(area, 2.0, color(ERROR_COLOR).gamma_multiply(fade));
                        }
                        _ => {
                            painter.rect_filled(area, 2.0, color(PLACEHOLDER_COLOR).gamma_multiply(fade));
                        }
                    }
                    if *hovered {
                        painter.rect_stroke(area, 2.0, egui::Stroke::new(2.0, egui::Color32::WHITE));
                    }
                }
                SpriteKind::Indicator { spin } => {
                    // Spinning arrow: width follows the spin angle
                    let w = extent.x * spin.cos().abs().max(0.15);
                    let points = vec![
                        center + egui::vec2(0.0, -extent.y),
                        center + egui::vec2(w, extent.y),
                        center + egui::vec2(-w, extent.y),
                    ];
                    painter.add(egui::Shape::convex_polygon(
                        points,
                        INDICATOR_COLOR.gamma_multiply(fade),
                        egui::Stroke::NONE,
                    ));
                }
            }
        }
    }

    fn draw_stats(&self, ui: &mut egui::Ui) {
        let window = self.scene.window();
        ui.horizontal(|ui| {
            ui.label(format!("camera y {:.2}", self.stats.camera_y));
            ui.separator();
            ui.label(format!("speed {:.3}", self.stats.scroll_speed));
            ui.separator();
            ui.label(format!(
                "rings {} (base {})",
                window.len(),
                window
                    .current_ring_index()
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "-".into())
            ));
            ui.separator();
            ui.label(format!("pooled {}", window.pool().len()));
            ui.separator();
            ui.label(format!(
                "textures {}/{}",
                self.textures.len(),
                self.scene.resources().textures.live_count()
            ));
            ui.separator();
            ui.label(format!("planner {}", window.planner_name()));
            if self.stats.paused {
                ui.separator();
                ui.label("paused");
            }
        });
    }

    fn draw_selection(&mut self, ctx: &egui::Context) {
        let Some(sel) = self.selection.clone() else {
            return;
        };
        let mut open = true;
        egui::Window::new("Selected item")
            .collapsible(false)
            .resizable(false)
            .open(&mut open)
            .show(ctx, |ui| {
                if let Some(tex) = self.textures.get(&sel.url) {
                    ui.add(egui::Image::new(tex).max_width(320.0));
                }
                ui.label(format!("Ring {} / tile {}", sel.ring_index, sel.tile_index));
                if let Some(id) = &sel.external_id {
                    ui.label(format!("Token {}", id));
                }
                ui.label(egui::RichText::new(&sel.url).small().weak());
            });
        if !open {
            self.selection = None;
            self.scene.set_paused(false);
        }
    }
}

fn color(c: [f32; 4]) -> egui::Color32 {
    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u8;
    egui::Color32::from_rgba_unmultiplied(to_u8(c[0]), to_u8(c[1]), to_u8(c[2]), to_u8(c[3]))
}

impl eframe::App for GalleryApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        if ctx.input(|i| i.key_pressed(egui::Key::F3)) {
            self.show_stats = !self.show_stats;
        }
        if self.show_stats {
            egui::TopBottomPanel::top("stats").show(ctx, |ui| {
                self.draw_stats(ui);
            });
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let response = ui.allocate_response(
                    ui.available_size(),
                    egui::Sense::click_and_drag().union(egui::Sense::hover()),
                );
                let rect = response.rect;
                self.scene.set_aspect(rect.width() / rect.height().max(1.0));

                if self.selection.is_none() {
                    self.handle_input(ui, &response, now);
                }

                self.stats = self.scene.frame(now);
                let sprites = self.scene.visible_sprites();
                self.sync_textures(ctx, &sprites);
                self.paint(&ui.painter_at(rect), rect, &sprites);
            });

        self.draw_selection(ctx);

        // The frame chain never stops, paused or not
        ctx.request_repaint();
    }
}
