use std::sync::Arc;
use egui::{Color32, Pos2};
use image::RgbaImage;
use uuid::Uuid;

// ============================================================================
// SCENE CONSTANTS
// ============================================================================

/// Smallest display width/height a layer may have after any transform.
pub const MIN_LAYER_SIZE: f32 = 20.0;

/// Smallest width/height an annotation box may have once committed.
pub const MIN_ANNOTATION_SIZE: f32 = 10.0;

/// Hard cap on live annotations per scene.
pub const MAX_ANNOTATIONS: usize = 9;

// ============================================================================
// TOOLS & BRUSH
// ============================================================================

/// The three editing tools. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Draw,
    Annotate,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Select => "Select",
            Tool::Draw => "Draw",
            Tool::Annotate => "Annotate",
        }
    }

    pub fn all() -> &'static [Tool] {
        &[Tool::Select, Tool::Draw, Tool::Annotate]
    }
}

/// Brush configuration used by the Draw tool.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushSettings {
    pub color: Color32,
    pub width: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            color: Color32::from_rgb(220, 50, 50),
            width: 4.0,
        }
    }
}

// ============================================================================
// SCENE ELEMENTS
// ============================================================================

/// A placed image element. `image` holds the native-resolution source
/// pixels; `width`/`height` are the display size in scene coordinates and
/// are decoupled from the pixel dimensions.
#[derive(Clone)]
pub struct Layer {
    pub id: Uuid,
    pub image: Arc<RgbaImage>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Rotation angle in degrees, applied about the display-box center.
    pub rotation: f32,
    /// Bumped whenever `image` is replaced (crop confirm), so the shell's
    /// texture cache knows to re-upload.
    pub revision: u64,
}

impl Layer {
    /// Place an image at `(x, y)` with a display size derived from its
    /// native size, scaled down to fit `max_edge` on the longest side.
    pub fn from_image(image: Arc<RgbaImage>, x: f32, y: f32, max_edge: f32) -> Self {
        let (nw, nh) = (image.width() as f32, image.height() as f32);
        let scale = if nw.max(nh) > max_edge {
            max_edge / nw.max(nh)
        } else {
            1.0
        };
        Self {
            id: Uuid::new_v4(),
            image,
            x,
            y,
            width: (nw * scale).max(MIN_LAYER_SIZE),
            height: (nh * scale).max(MIN_LAYER_SIZE),
            rotation: 0.0,
            revision: 0,
        }
    }

    /// Native pixel dimensions of the source image.
    pub fn native_size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Center of the display box in scene coordinates.
    pub fn center(&self) -> Pos2 {
        Pos2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Replace the source pixels (crop confirm). The revision bump
    /// invalidates cached textures.
    pub fn replace_image(&mut self, image: Arc<RgbaImage>) {
        self.image = image;
        self.revision += 1;
    }

    /// Hit test a point against the display box, honoring rotation by
    /// un-rotating the point about the box center first.
    pub fn contains(&self, p: Pos2) -> bool {
        let local = if self.rotation != 0.0 {
            let c = self.center();
            let (s, cs) = (-self.rotation).to_radians().sin_cos();
            let (dx, dy) = (p.x - c.x, p.y - c.y);
            Pos2::new(c.x + dx * cs - dy * s, c.y + dx * s + dy * cs)
        } else {
            p
        };
        local.x >= self.x
            && local.x <= self.x + self.width
            && local.y >= self.y
            && local.y <= self.y + self.height
    }
}

/// A freehand stroke: ordered points in scene coordinates. Points are
/// append-only while the draw gesture is active; afterwards the stroke can
/// only be translated as a whole or deleted.
#[derive(Clone, Debug)]
pub struct Stroke {
    pub id: Uuid,
    pub points: Vec<Pos2>,
    pub color: Color32,
    pub width: f32,
}

impl Stroke {
    pub fn begin(first: Pos2, brush: &BrushSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            points: vec![first],
            color: brush.color,
            width: brush.width,
        }
    }

    /// Distance from `p` to the nearest point of the stroke, for hit
    /// testing under the select tool.
    pub fn distance_to(&self, p: Pos2) -> f32 {
        self.points
            .iter()
            .map(|q| ((q.x - p.x).powi(2) + (q.y - p.y).powi(2)).sqrt())
            .fold(f32::INFINITY, f32::min)
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        for p in &mut self.points {
            p.x += dx;
            p.y += dy;
        }
    }
}

/// Outline shape for an annotation region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AnnotationShape {
    #[default]
    Rectangle,
    Ellipse,
}

impl AnnotationShape {
    pub fn label(&self) -> &'static str {
        match self {
            AnnotationShape::Rectangle => "Rectangle",
            AnnotationShape::Ellipse => "Ellipse",
        }
    }

    pub fn all() -> &'static [AnnotationShape] {
        &[AnnotationShape::Rectangle, AnnotationShape::Ellipse]
    }
}

/// A labeled region of interest. `label` is assigned at creation
/// ("Box 1", "Box 2", …); `note` is the user's free-text edit request for
/// that region and may be empty.
#[derive(Clone, Debug)]
pub struct Annotation {
    pub id: Uuid,
    pub shape: AnnotationShape,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub label: String,
    pub note: String,
}

impl Annotation {
    pub fn contains(&self, p: Pos2) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// Current single-element selection. A layer and a stroke are never
/// selected at the same time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    Layer(Uuid),
    Stroke(Uuid),
}

// ============================================================================
// SCENE STATE
// ============================================================================

/// The canonical editing-session state: ordered layers (index 0 = bottom,
/// drawn first), strokes, annotations, the active tool, brush and
/// annotation-shape settings, and the current selection.
///
/// Owned exclusively by the session and passed `&mut` into the interaction
/// controller — nothing else mutates it.
pub struct SceneState {
    pub layers: Vec<Layer>,
    pub strokes: Vec<Stroke>,
    pub annotations: Vec<Annotation>,
    pub tool: Tool,
    pub brush: BrushSettings,
    pub annotation_shape: AnnotationShape,
    pub selection: Option<Selection>,
    /// Bumped on `clear()` so late generation results can be flagged as
    /// stale in the log.
    pub epoch: u64,
}

impl Default for SceneState {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneState {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            strokes: Vec::new(),
            annotations: Vec::new(),
            tool: Tool::default(),
            brush: BrushSettings::default(),
            annotation_shape: AnnotationShape::default(),
            selection: None,
            epoch: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.strokes.is_empty() && self.annotations.is_empty()
    }

    // ---- layers ------------------------------------------------------------

    pub fn add_layer(&mut self, layer: Layer) -> Uuid {
        let id = layer.id;
        self.layers.push(layer);
        id
    }

    pub fn layer(&self, id: Uuid) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: Uuid) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn layer_index(&self, id: Uuid) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn remove_layer(&mut self, id: Uuid) {
        self.layers.retain(|l| l.id != id);
        if self.selection == Some(Selection::Layer(id)) {
            self.selection = None;
        }
    }

    /// Swap the layer with its upper neighbor (toward the top of the
    /// z-stack). Moving the topmost layer up is a no-op.
    pub fn move_layer_up(&mut self, id: Uuid) {
        if let Some(idx) = self.layer_index(id) {
            if idx + 1 < self.layers.len() {
                self.layers.swap(idx, idx + 1);
            }
        }
    }

    /// Swap the layer with its lower neighbor (toward the bottom of the
    /// z-stack). Moving the bottom layer down is a no-op.
    pub fn move_layer_down(&mut self, id: Uuid) {
        if let Some(idx) = self.layer_index(id) {
            if idx > 0 {
                self.layers.swap(idx, idx - 1);
            }
        }
    }

    /// Topmost layer whose display box contains `p`, if any. Iterates in
    /// reverse because later indices draw on top.
    pub fn layer_at(&self, p: Pos2) -> Option<&Layer> {
        self.layers.iter().rev().find(|l| l.contains(p))
    }

    // ---- strokes -----------------------------------------------------------

    pub fn add_stroke(&mut self, stroke: Stroke) -> Uuid {
        let id = stroke.id;
        self.strokes.push(stroke);
        id
    }

    pub fn stroke_mut(&mut self, id: Uuid) -> Option<&mut Stroke> {
        self.strokes.iter_mut().find(|s| s.id == id)
    }

    pub fn remove_stroke(&mut self, id: Uuid) {
        self.strokes.retain(|s| s.id != id);
        if self.selection == Some(Selection::Stroke(id)) {
            self.selection = None;
        }
    }

    /// Undo for the draw tool: drop the most recently committed stroke.
    /// Layers and annotations are deliberately untouched.
    pub fn pop_last_stroke(&mut self) {
        if let Some(s) = self.strokes.pop() {
            if self.selection == Some(Selection::Stroke(s.id)) {
                self.selection = None;
            }
        }
    }

    /// Nearest stroke within `radius` of `p`, for select-tool hit testing.
    pub fn stroke_near(&self, p: Pos2, radius: f32) -> Option<&Stroke> {
        self.strokes
            .iter()
            .rev()
            .find(|s| s.distance_to(p) <= radius)
    }

    // ---- annotations -------------------------------------------------------

    /// Room left under the annotation cap.
    pub fn can_annotate(&self) -> bool {
        self.annotations.len() < MAX_ANNOTATIONS
    }

    /// Commit an annotation box. Returns `None` (and leaves the scene
    /// untouched) when the cap is reached or the box is under the minimum
    /// committed size.
    pub fn add_annotation(
        &mut self,
        shape: AnnotationShape,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Option<Uuid> {
        if !self.can_annotate() {
            return None;
        }
        if width <= MIN_ANNOTATION_SIZE || height <= MIN_ANNOTATION_SIZE {
            return None;
        }
        let ann = Annotation {
            id: Uuid::new_v4(),
            shape,
            x,
            y,
            width,
            height,
            label: format!("Box {}", self.annotations.len() + 1),
            note: String::new(),
        };
        let id = ann.id;
        self.annotations.push(ann);
        Some(id)
    }

    pub fn annotation_mut(&mut self, id: Uuid) -> Option<&mut Annotation> {
        self.annotations.iter_mut().find(|a| a.id == id)
    }

    pub fn remove_annotation(&mut self, id: Uuid) {
        self.annotations.retain(|a| a.id != id);
    }

    pub fn set_annotation_note(&mut self, id: Uuid, note: String) {
        if let Some(a) = self.annotation_mut(id) {
            a.note = note;
        }
    }

    // ---- selection ---------------------------------------------------------

    pub fn select_layer(&mut self, id: Uuid) {
        self.selection = Some(Selection::Layer(id));
    }

    pub fn select_stroke(&mut self, id: Uuid) {
        self.selection = Some(Selection::Stroke(id));
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        match self.selection {
            Some(Selection::Layer(id)) => self.layer(id),
            _ => None,
        }
    }

    /// Remove whatever is selected (layer or stroke). Annotations are
    /// deleted from their panel, not via selection.
    pub fn delete_selected(&mut self) {
        match self.selection {
            Some(Selection::Layer(id)) => self.remove_layer(id),
            Some(Selection::Stroke(id)) => self.remove_stroke(id),
            None => {}
        }
    }

    // ---- bulk --------------------------------------------------------------

    /// The single destructive bulk operation: empties all collections and
    /// the selection. The shell gates this behind a confirmation dialog.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.strokes.clear();
        self.annotations.clear();
        self.selection = None;
        self.epoch += 1;
    }
}

// ============================================================================
// TESTS
// ============================================================================
