use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use eframe::egui;
use egui::{
    Color32, ColorImage, Pos2, Rect, Sense, Shape, Stroke as UiStroke, TextureHandle,
    TextureOptions, Vec2,
};
use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::{AnnotationShape, Layer, SceneState, Selection, Tool};
use crate::gesture::{self, InteractionController};
use crate::ops::generate::{
    EditorAccess, GenerationRecord, GenerationService, HistoryStore, Orchestrator, ServiceError,
    User,
};
use crate::ops::instruction;
use crate::ops::transform::{CropHandle, RectBox, ResizeHandle};
use crate::presets::PresetStore;
use crate::speech::Dictation;
use crate::{io, log_err, log_info, speech};

/// Longest display edge a freshly placed layer gets.
const PLACED_LAYER_MAX_EDGE: f32 = 480.0;

/// Where uploads and pasted images land on the canvas.
const PLACEMENT_ORIGIN: Pos2 = Pos2::new(40.0, 40.0);

const HANDLE_SIZE: f32 = 8.0;
const SELECTION_COLOR: Color32 = Color32::from_rgb(64, 140, 255);
const SNAP_COLOR: Color32 = Color32::from_rgb(80, 220, 100);
const ANNOTATION_UI_COLOR: Color32 = Color32::from_rgb(235, 87, 50);

// ============================================================================
// DEFAULT COLLABORATORS
// ============================================================================
//
// The hosted product supplies identity, billing, and the generation
// endpoint from its backend; the standalone binary wires these local
// stand-ins so the editor is fully exercisable offline.

/// Entitlement is enforced server-side in the hosted product; the
/// standalone build admits everyone.
struct OpenAccess;

impl EditorAccess for OpenAccess {
    fn can_use_editor(&self, _user: &User) -> bool {
        true
    }
    fn has_sufficient_balance(&self, _user: &User, _cost: u32) -> bool {
        true
    }
}

/// Loopback generation: echoes the submitted composite back as the
/// result. Lets the whole submit → result → adopt-as-layer flow run
/// without a remote endpoint.
struct LoopbackService;

impl GenerationService for LoopbackService {
    fn generate(&self, _instruction: &str, images: &[String]) -> Result<String, ServiceError> {
        images.first().cloned().ok_or_else(|| ServiceError {
            code: "other".to_string(),
            message: "no images submitted".to_string(),
        })
    }
}

/// Append-only history as JSON lines in the app data dir.
struct JsonlHistory {
    path: std::path::PathBuf,
    // Serializes appends from worker threads.
    lock: Mutex<()>,
}

impl JsonlHistory {
    fn in_data_dir() -> Self {
        Self {
            path: io::app_data_dir().join("history.jsonl"),
            lock: Mutex::new(()),
        }
    }
}

impl HistoryStore for JsonlHistory {
    fn append(&self, record: GenerationRecord) {
        let _guard = self.lock.lock();
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                log_err!("history record not serializable: {}", e);
                return;
            }
        };
        use std::io::Write;
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{}", line));
        if let Err(e) = result {
            log_err!("could not append history record: {}", e);
        }
    }
}

// ============================================================================
// APP
// ============================================================================

/// Deferred side-panel actions, applied after the lists finish rendering.
enum PanelAction {
    SelectLayer(Uuid),
    MoveLayerUp(Uuid),
    MoveLayerDown(Uuid),
    DeleteLayer(Uuid),
    DeleteAnnotation(Uuid),
    ApplyPreset(Uuid),
    DeletePreset(Uuid),
}

struct StatusMessage {
    text: String,
    is_error: bool,
    frames_left: u32,
}

pub struct StageFEApp {
    scene: SceneState,
    controller: InteractionController,
    orchestrator: Orchestrator,
    user: User,
    presets: PresetStore,

    manual_instruction: String,
    preset_name: String,
    dictation_available: bool,
    /// Live capture session: which annotation is being dictated into.
    dictation: Option<(Uuid, Box<dyn Dictation>)>,

    /// Per-layer GPU textures, keyed by layer id; the stored revision
    /// detects source replacement (crop) and forces a re-upload.
    textures: HashMap<Uuid, (u64, TextureHandle)>,
    result_image: Option<RgbaImage>,
    result_texture: Option<TextureHandle>,

    canvas_size: Vec2,
    pointer_was_down: bool,
    confirm_clear: bool,
    status: Option<StatusMessage>,
}

impl StageFEApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self::with_collaborators(
            Arc::new(OpenAccess),
            Arc::new(LoopbackService),
            Arc::new(JsonlHistory::in_data_dir()),
        )
    }

    /// Hosted deployments inject their real identity/billing, generation
    /// endpoint, and history backends here.
    pub fn with_collaborators(
        access: Arc<dyn EditorAccess>,
        service: Arc<dyn GenerationService>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let dictation_available = speech::dictation_available();
        log_info!("editor session opened (dictation available: {})", dictation_available);
        Self {
            scene: SceneState::new(),
            controller: InteractionController::new(),
            orchestrator: Orchestrator::new(access, service, history),
            user: User { id: "local".to_string() },
            presets: PresetStore::load_default(),
            manual_instruction: String::new(),
            preset_name: String::new(),
            dictation_available,
            dictation: None,
            textures: HashMap::new(),
            result_image: None,
            result_texture: None,
            canvas_size: Vec2::new(960.0, 640.0),
            pointer_was_down: false,
            confirm_clear: false,
            status: None,
        }
    }

    fn set_status(&mut self, text: impl Into<String>, is_error: bool) {
        self.status = Some(StatusMessage {
            text: text.into(),
            is_error,
            frames_left: 360,
        });
    }

    // ---- generation --------------------------------------------------------

    fn start_generation(&mut self) {
        // Drop any half-finished gesture before submitting: a drag left
        // live by a lost pointer-up must not keep mutating the scene that
        // is being rasterized.
        self.controller.reset_gesture();

        let result = self.orchestrator.start(
            &self.scene,
            &self.user,
            &self.manual_instruction,
            self.canvas_size.x.round() as u32,
            self.canvas_size.y.round() as u32,
        );
        if let Err(e) = result {
            self.set_status(e.to_string(), true);
        }
    }

    fn process_generation_results(&mut self) {
        if let Some(outcome) = self.orchestrator.poll(&self.scene) {
            match outcome {
                Ok(done) => match io::decode_base64_image(&done.result_image) {
                    Ok(img) => {
                        log_info!("generation finished: {}x{}", img.width(), img.height());
                        self.result_image = Some(img);
                        self.result_texture = None;
                        self.set_status("Generation complete.", false);
                    }
                    Err(e) => {
                        log_err!("generation result not decodable: {}", e);
                        self.set_status("Generation returned an unreadable image.", true);
                    }
                },
                Err(e) => self.set_status(e.to_string(), true),
            }
        }
    }

    /// Place the last generation result on the canvas as a new layer.
    fn adopt_result_as_layer(&mut self) {
        if let Some(img) = self.result_image.take() {
            let layer = Layer::from_image(
                Arc::new(img),
                PLACEMENT_ORIGIN.x,
                PLACEMENT_ORIGIN.y,
                PLACED_LAYER_MAX_EDGE,
            );
            let id = self.scene.add_layer(layer);
            self.scene.select_layer(id);
            self.result_texture = None;
        }
    }

    // ---- imports -----------------------------------------------------------

    fn upload_layer(&mut self) {
        let Some(path) = io::open_image_dialog() else {
            return;
        };
        match io::load_image_from_path(&path) {
            Ok(img) => {
                let layer = Layer::from_image(
                    Arc::new(img),
                    PLACEMENT_ORIGIN.x,
                    PLACEMENT_ORIGIN.y,
                    PLACED_LAYER_MAX_EDGE,
                );
                let id = self.scene.add_layer(layer);
                self.scene.select_layer(id);
            }
            Err(e) => self.set_status(e, true),
        }
    }

    fn paste_layer(&mut self) {
        match io::clipboard_image() {
            Ok(img) => {
                let layer = Layer::from_image(
                    Arc::new(img),
                    PLACEMENT_ORIGIN.x,
                    PLACEMENT_ORIGIN.y,
                    PLACED_LAYER_MAX_EDGE,
                );
                let id = self.scene.add_layer(layer);
                self.scene.select_layer(id);
            }
            Err(e) => self.set_status(e, true),
        }
    }

    // ---- dictation ---------------------------------------------------------

    /// Start capturing into the annotation's note, or stop the running
    /// capture and append its transcript.
    fn toggle_dictation(&mut self, annotation_id: Uuid) {
        if let Some((active_id, mut session)) = self.dictation.take() {
            if let Some(transcript) = session.finish() {
                if let Some(ann) = self.scene.annotation_mut(active_id) {
                    if !ann.note.is_empty() {
                        ann.note.push(' ');
                    }
                    ann.note.push_str(&transcript);
                }
            }
            if active_id == annotation_id {
                return; // Stop was the whole request.
            }
        }
        if let Some(mut session) = speech::system_dictation() {
            match session.begin() {
                Ok(()) => self.dictation = Some((annotation_id, session)),
                Err(e) => self.set_status(format!("Dictation failed to start: {}", e), true),
            }
        }
    }

    // ---- keyboard ----------------------------------------------------------

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        // Ignore editing keys while any text field has focus.
        if ctx.wants_keyboard_input() {
            return;
        }
        let (delete, undo) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace),
                i.modifiers.command && i.key_pressed(egui::Key::Z),
            )
        });
        if delete {
            self.controller.key_delete(&mut self.scene);
        }
        if undo {
            self.controller.key_undo(&mut self.scene);
        }
    }

    // ---- textures ----------------------------------------------------------

    fn layer_texture(&mut self, ctx: &egui::Context, layer: &Layer) -> TextureHandle {
        match self.textures.get(&layer.id) {
            Some((revision, handle)) if *revision == layer.revision => handle.clone(),
            _ => {
                let img = layer.image.as_ref();
                let color_image = ColorImage::from_rgba_unmultiplied(
                    [img.width() as usize, img.height() as usize],
                    img.as_raw(),
                );
                let handle = ctx.load_texture(
                    format!("layer_{}", layer.id),
                    color_image,
                    TextureOptions::LINEAR,
                );
                self.textures
                    .insert(layer.id, (layer.revision, handle.clone()));
                handle
            }
        }
    }

    fn prune_textures(&mut self) {
        let live: Vec<Uuid> = self.scene.layers.iter().map(|l| l.id).collect();
        self.textures.retain(|id, _| live.contains(id));
    }

    // ---- canvas ------------------------------------------------------------

    fn show_canvas(&mut self, ui: &mut egui::Ui) {
        let size = ui.available_size();
        self.canvas_size = size;
        let (response, painter) = ui.allocate_painter(size, Sense::click_and_drag());
        let origin = response.rect.min;

        painter.rect_filled(response.rect, 0.0, Color32::from_gray(245));

        // Layers in z-order (index 0 first = bottom).
        let layers: Vec<Layer> = self.scene.layers.clone();
        for layer in &layers {
            let tex = self.layer_texture(ui.ctx(), layer);
            let rect = Rect::from_min_size(
                Pos2::new(origin.x + layer.x, origin.y + layer.y),
                Vec2::new(layer.width, layer.height),
            );
            let sized = egui::load::SizedTexture::from_handle(&tex);
            let mut img = egui::Image::from_texture(sized);
            if layer.rotation != 0.0 {
                img = img.rotate(layer.rotation.to_radians(), Vec2::splat(0.5));
            }
            img.paint_at(ui, rect);
        }

        // Strokes.
        for stroke in &self.scene.strokes {
            if stroke.points.len() == 1 {
                let p = stroke.points[0];
                painter.circle_filled(
                    Pos2::new(origin.x + p.x, origin.y + p.y),
                    stroke.width * 0.5,
                    stroke.color,
                );
            } else {
                let points: Vec<Pos2> = stroke
                    .points
                    .iter()
                    .map(|p| Pos2::new(origin.x + p.x, origin.y + p.y))
                    .collect();
                painter.add(Shape::line(points, UiStroke::new(stroke.width, stroke.color)));
            }
        }

        // Annotations: dashed outline plus label.
        for ann in &self.scene.annotations {
            self.draw_annotation_overlay(&painter, origin, ann);
        }

        // Candidate annotation while the drag is live.
        if let Some(b) = self.controller.annotate_preview() {
            let rect = Rect::from_min_size(
                Pos2::new(origin.x + b.x, origin.y + b.y),
                Vec2::new(b.w, b.h),
            );
            painter.rect_stroke(rect, 0.0, UiStroke::new(1.0, ANNOTATION_UI_COLOR));
        }

        self.draw_selection_overlay(&painter, origin);
        self.draw_crop_overlay(&painter, origin);

        self.route_pointer_events(ui, &response, origin);
    }

    fn route_pointer_events(&mut self, ui: &egui::Ui, response: &egui::Response, origin: Pos2) {
        let primary_down = ui.input(|i| i.pointer.primary_down());
        let pointer_pos = ui.input(|i| i.pointer.interact_pos());
        let on_canvas = pointer_pos.is_some_and(|p| response.rect.contains(p));

        let scene_pos = pointer_pos.map(|p| Pos2::new(p.x - origin.x, p.y - origin.y));

        if primary_down && !self.pointer_was_down {
            // hovered() (not just rect containment) keeps presses that
            // started on overlapping widgets from reaching the canvas.
            if response.hovered() {
                if let Some(sp) = scene_pos {
                    self.controller.pointer_down(&mut self.scene, sp);
                    self.pointer_was_down = true;
                }
            }
        } else if primary_down && self.pointer_was_down {
            if let Some(sp) = scene_pos {
                if on_canvas {
                    self.controller.pointer_move(&mut self.scene, sp);
                } else {
                    // Pointer left the canvas mid-gesture: treat as release.
                    self.controller.pointer_up(&mut self.scene);
                    self.pointer_was_down = false;
                }
            }
        } else if !primary_down && self.pointer_was_down {
            self.controller.pointer_up(&mut self.scene);
            self.pointer_was_down = false;
        }
    }

    fn draw_annotation_overlay(
        &self,
        painter: &egui::Painter,
        origin: Pos2,
        ann: &crate::canvas::Annotation,
    ) {
        let stroke = UiStroke::new(1.5, ANNOTATION_UI_COLOR);
        let rect = Rect::from_min_size(
            Pos2::new(origin.x + ann.x, origin.y + ann.y),
            Vec2::new(ann.width, ann.height),
        );
        match ann.shape {
            AnnotationShape::Rectangle => {
                let corners = [
                    rect.left_top(),
                    rect.right_top(),
                    rect.right_bottom(),
                    rect.left_bottom(),
                    rect.left_top(),
                ];
                for pair in corners.windows(2) {
                    painter.extend(Shape::dashed_line(&[pair[0], pair[1]], stroke, 6.0, 4.0));
                }
            }
            AnnotationShape::Ellipse => {
                let center = rect.center();
                let rx = rect.width() / 2.0;
                let ry = rect.height() / 2.0;
                let segments = 64;
                let points: Vec<Pos2> = (0..=segments)
                    .map(|i| {
                        let angle = 2.0 * std::f32::consts::PI * (i as f32) / (segments as f32);
                        Pos2::new(center.x + rx * angle.cos(), center.y + ry * angle.sin())
                    })
                    .collect();
                painter.extend(Shape::dashed_line(&points, stroke, 6.0, 4.0));
            }
        }
        painter.text(
            rect.left_top() + Vec2::new(4.0, 2.0),
            egui::Align2::LEFT_TOP,
            &ann.label,
            egui::FontId::proportional(13.0),
            ANNOTATION_UI_COLOR,
        );
    }

    fn draw_selection_overlay(&self, painter: &egui::Painter, origin: Pos2) {
        match self.scene.selection {
            Some(Selection::Layer(id)) => {
                // Crop mode draws its own chrome instead.
                if self.controller.crop.is_some() {
                    return;
                }
                let Some(layer) = self.scene.layer(id) else { return };
                let b = RectBox::of_layer(layer);
                let rect = Rect::from_min_size(
                    Pos2::new(origin.x + b.x, origin.y + b.y),
                    Vec2::new(b.w, b.h),
                );
                painter.rect_stroke(rect, 0.0, UiStroke::new(1.5, SELECTION_COLOR));

                for handle in ResizeHandle::all() {
                    let p = handle.anchor_on(&b);
                    let center = Pos2::new(origin.x + p.x, origin.y + p.y);
                    painter.rect_filled(
                        Rect::from_center_size(center, Vec2::splat(HANDLE_SIZE)),
                        1.0,
                        SELECTION_COLOR,
                    );
                }

                let rotate = gesture::rotate_handle_pos(&b);
                let rotate_center = Pos2::new(origin.x + rotate.x, origin.y + rotate.y);
                let color = if self.controller.rotation_snapped() {
                    SNAP_COLOR
                } else {
                    SELECTION_COLOR
                };
                painter.line_segment(
                    [Pos2::new(rect.center().x, rect.top()), rotate_center],
                    UiStroke::new(1.0, color),
                );
                painter.circle_filled(rotate_center, HANDLE_SIZE * 0.6, color);
            }
            Some(Selection::Stroke(id)) => {
                if let Some(stroke) = self.scene.strokes.iter().find(|s| s.id == id) {
                    for p in &stroke.points {
                        painter.circle_stroke(
                            Pos2::new(origin.x + p.x, origin.y + p.y),
                            stroke.width * 0.5 + 2.0,
                            UiStroke::new(1.0, SELECTION_COLOR),
                        );
                    }
                }
            }
            None => {}
        }
    }

    fn draw_crop_overlay(&self, painter: &egui::Painter, origin: Pos2) {
        let Some(session) = self.controller.crop else { return };
        let Some(layer) = self.scene.layer(session.layer_id) else { return };

        let layer_rect = Rect::from_min_size(
            Pos2::new(origin.x + layer.x, origin.y + layer.y),
            Vec2::new(layer.width, layer.height),
        );
        let crop_rect = Rect::from_min_size(
            Pos2::new(origin.x + session.rect.x, origin.y + session.rect.y),
            Vec2::new(session.rect.w, session.rect.h),
        );

        // Dim the parts of the layer that the crop will discard.
        let shade = Color32::from_black_alpha(120);
        let strips = [
            Rect::from_min_max(layer_rect.min, Pos2::new(layer_rect.max.x, crop_rect.min.y)),
            Rect::from_min_max(Pos2::new(layer_rect.min.x, crop_rect.max.y), layer_rect.max),
            Rect::from_min_max(
                Pos2::new(layer_rect.min.x, crop_rect.min.y),
                Pos2::new(crop_rect.min.x, crop_rect.max.y),
            ),
            Rect::from_min_max(
                Pos2::new(crop_rect.max.x, crop_rect.min.y),
                Pos2::new(layer_rect.max.x, crop_rect.max.y),
            ),
        ];
        for strip in strips {
            if strip.width() > 0.0 && strip.height() > 0.0 {
                painter.rect_filled(strip, 0.0, shade);
            }
        }

        painter.rect_stroke(crop_rect, 0.0, UiStroke::new(1.5, Color32::WHITE));
        for handle in CropHandle::edges() {
            let p = handle.anchor_on(&session.rect);
            painter.rect_filled(
                Rect::from_center_size(
                    Pos2::new(origin.x + p.x, origin.y + p.y),
                    Vec2::splat(HANDLE_SIZE),
                ),
                1.0,
                Color32::WHITE,
            );
        }
    }

    // ---- toolbar -----------------------------------------------------------

    fn show_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            for &tool in Tool::all() {
                let selected = self.scene.tool == tool;
                if ui.selectable_label(selected, tool.label()).clicked() {
                    self.scene.tool = tool;
                    self.controller.reset_gesture();
                }
            }

            ui.separator();

            match self.scene.tool {
                Tool::Draw => {
                    ui.label("Brush:");
                    let mut rgba = self.scene.brush.color;
                    if ui.color_edit_button_srgba(&mut rgba).changed() {
                        self.scene.brush.color = rgba;
                    }
                    ui.add(
                        egui::Slider::new(&mut self.scene.brush.width, 1.0..=32.0)
                            .text("width"),
                    );
                }
                Tool::Annotate => {
                    ui.label("Shape:");
                    for &shape in AnnotationShape::all() {
                        let selected = self.scene.annotation_shape == shape;
                        if ui.selectable_label(selected, shape.label()).clicked() {
                            self.scene.annotation_shape = shape;
                        }
                    }
                    ui.label(format!("{}/9 regions", self.scene.annotations.len()));
                }
                Tool::Select => {}
            }

            ui.separator();

            if ui.button("Upload image").clicked() {
                self.upload_layer();
            }
            if ui.button("Paste image").clicked() {
                self.paste_layer();
            }

            ui.separator();

            // Crop controls for the selected layer.
            if self.controller.crop.is_some() {
                if ui.button("Apply crop").clicked() {
                    self.controller.confirm_crop(&mut self.scene);
                }
                if ui.button("Cancel crop").clicked() {
                    self.controller.cancel_crop();
                }
            } else if self.scene.selected_layer().is_some() && ui.button("Crop").clicked() {
                self.controller.begin_crop(&self.scene);
            }

            ui.separator();

            if ui.button("Clear canvas").clicked() && !self.scene.is_empty() {
                self.confirm_clear = true;
            }
        });
    }

    // ---- side panel --------------------------------------------------------

    fn show_side_panel(&mut self, ui: &mut egui::Ui) {
        let mut actions: Vec<PanelAction> = Vec::new();

        ui.heading("Layers");
        if self.scene.layers.is_empty() {
            ui.weak("Upload or paste an image to get started.");
        }
        // Topmost first in the list, like the z-stack reads visually.
        for (idx, layer) in self.scene.layers.iter().enumerate().rev() {
            ui.horizontal(|ui| {
                let selected = self.scene.selection == Some(Selection::Layer(layer.id));
                let (nw, nh) = layer.native_size();
                let name = if idx == 0 {
                    format!("Base {}×{}", nw, nh)
                } else {
                    format!("Layer {} {}×{}", idx + 1, nw, nh)
                };
                if ui.selectable_label(selected, name).clicked() {
                    actions.push(PanelAction::SelectLayer(layer.id));
                }
                if ui.small_button("▲").clicked() {
                    actions.push(PanelAction::MoveLayerUp(layer.id));
                }
                if ui.small_button("▼").clicked() {
                    actions.push(PanelAction::MoveLayerDown(layer.id));
                }
                if ui.small_button("✕").clicked() {
                    actions.push(PanelAction::DeleteLayer(layer.id));
                }
            });
        }

        ui.separator();
        ui.heading("Regions");
        for i in 0..self.scene.annotations.len() {
            let (id, label) = {
                let a = &self.scene.annotations[i];
                (a.id, a.label.clone())
            };
            let mut toggle_mic = false;
            ui.horizontal(|ui| {
                ui.label(&label);
                if self.dictation_available {
                    let capturing = self.dictation.as_ref().is_some_and(|(aid, _)| *aid == id);
                    if ui.selectable_label(capturing, "🎤").clicked() {
                        toggle_mic = true;
                    }
                } else {
                    ui.add_enabled(false, egui::Button::new("🎤").small())
                        .on_disabled_hover_text("Dictation is not available on this system");
                }
                if ui.small_button("✕").clicked() {
                    actions.push(PanelAction::DeleteAnnotation(id));
                }
            });
            if toggle_mic {
                self.toggle_dictation(id);
            }
            let note = &mut self.scene.annotations[i].note;
            ui.add(egui::TextEdit::singleline(note).hint_text("Describe the edit for this region"));
        }

        ui.separator();
        ui.heading("Instruction");
        match instruction::derive_instruction(&self.scene.annotations) {
            Some(derived) => {
                // Region notes own the instruction while they exist.
                let mut text = derived;
                ui.add_enabled(
                    false,
                    egui::TextEdit::multiline(&mut text).desired_rows(3),
                );
                ui.weak("Built from region notes; clear them to type freely.");
            }
            None => {
                ui.add(
                    egui::TextEdit::multiline(&mut self.manual_instruction)
                        .desired_rows(3)
                        .hint_text("Describe what to generate"),
                );
            }
        }

        ui.separator();
        ui.heading("Presets");
        for preset in self.presets.all() {
            ui.horizontal(|ui| {
                if ui.button(&preset.name).on_hover_text(&preset.text).clicked() {
                    actions.push(PanelAction::ApplyPreset(preset.id));
                }
                if ui.small_button("✕").clicked() {
                    actions.push(PanelAction::DeletePreset(preset.id));
                }
            });
        }
        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.preset_name)
                    .hint_text("Preset name")
                    .desired_width(120.0),
            );
            let can_save =
                !self.preset_name.trim().is_empty() && !self.manual_instruction.trim().is_empty();
            if ui.add_enabled(can_save, egui::Button::new("Save")).clicked() {
                self.presets
                    .add(self.preset_name.trim(), self.manual_instruction.trim());
                self.preset_name.clear();
            }
        });

        ui.separator();
        let generating = self.orchestrator.is_generating();
        if ui
            .add_enabled(!generating, egui::Button::new("✨ Generate"))
            .clicked()
        {
            self.start_generation();
        }

        if let Some(result) = &self.result_image {
            ui.separator();
            ui.heading("Result");
            if self.result_texture.is_none() {
                let color_image = ColorImage::from_rgba_unmultiplied(
                    [result.width() as usize, result.height() as usize],
                    result.as_raw(),
                );
                self.result_texture = Some(ui.ctx().load_texture(
                    "generation_result",
                    color_image,
                    TextureOptions::LINEAR,
                ));
            }
            if let Some(tex) = &self.result_texture {
                let aspect = result.height() as f32 / result.width() as f32;
                let w = ui.available_width().min(220.0);
                let sized = egui::load::SizedTexture::from_handle(tex);
                ui.add(
                    egui::Image::from_texture(sized)
                        .fit_to_exact_size(Vec2::new(w, w * aspect)),
                );
            }
            if ui.button("Add result as layer").clicked() {
                self.adopt_result_as_layer();
            }
        }

        // Apply deferred actions now that the borrows above are done.
        for action in actions {
            match action {
                PanelAction::SelectLayer(id) => self.scene.select_layer(id),
                PanelAction::MoveLayerUp(id) => self.scene.move_layer_up(id),
                PanelAction::MoveLayerDown(id) => self.scene.move_layer_down(id),
                PanelAction::DeleteLayer(id) => {
                    if self.controller.crop.map(|c| c.layer_id) == Some(id) {
                        self.controller.cancel_crop();
                    }
                    self.scene.remove_layer(id);
                }
                PanelAction::DeleteAnnotation(id) => self.scene.remove_annotation(id),
                PanelAction::ApplyPreset(id) => {
                    if let Some(preset) = self.presets.get(id) {
                        self.manual_instruction = preset.text.clone();
                    }
                }
                PanelAction::DeletePreset(id) => self.presets.remove(id),
            }
        }
    }

    // ---- dialogs & overlays ------------------------------------------------

    fn show_confirm_clear(&mut self, ctx: &egui::Context) {
        if !self.confirm_clear {
            return;
        }
        egui::Window::new("Clear canvas?")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label("This removes every layer, stroke, and region. It cannot be undone.");
                ui.horizontal(|ui| {
                    if ui.button("Cancel").clicked() {
                        self.confirm_clear = false;
                    }
                    let clear =
                        egui::Button::new(egui::RichText::new("Clear everything").color(Color32::WHITE))
                            .fill(Color32::from_rgb(200, 60, 50));
                    if ui.add(clear).clicked() {
                        self.controller.cancel_crop();
                        self.scene.clear();
                        self.confirm_clear = false;
                    }
                });
            });
    }

    fn show_generating_overlay(&mut self, ctx: &egui::Context) {
        if !self.orchestrator.is_generating() {
            return;
        }
        // Keep polling while the worker runs.
        ctx.request_repaint();
        egui::Area::new(egui::Id::new("generating_overlay"))
            .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Generating…");
                    });
                });
            });
    }

    fn show_status(&mut self, ui: &mut egui::Ui) {
        if self.status.as_ref().is_some_and(|s| s.frames_left == 0) {
            self.status = None;
        }
        if let Some(status) = &mut self.status {
            status.frames_left -= 1;
            let color = if status.is_error {
                Color32::from_rgb(200, 60, 50)
            } else {
                Color32::from_rgb(60, 140, 60)
            };
            let text = status.text.clone();
            ui.colored_label(color, text);
        }
    }
}

impl eframe::App for StageFEApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_generation_results();
        self.handle_keyboard(ctx);
        self.prune_textures();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.show_toolbar(ui);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.show_status(ui);
        });

        egui::SidePanel::right("inspector")
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.show_side_panel(ui);
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_canvas(ui);
        });

        self.show_confirm_clear(ctx);
        self.show_generating_overlay(ctx);
    }
}
