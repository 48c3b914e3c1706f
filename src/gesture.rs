// ============================================================================
// INTERACTION CONTROLLER — pointer-driven gesture state machine
// ============================================================================
//
// Raw pointer events come in from the shell; this module interprets them
// against the scene, delegates geometry to the transform engine, and writes
// accepted results back. The whole transient state of the current gesture
// lives in one `ActiveGesture` value that is replaced wholesale on every
// transition — nothing from a previous gesture can leak into the next one.

use egui::Pos2;
use uuid::Uuid;

use crate::canvas::{SceneState, Selection, Stroke, Tool};
use crate::ops::transform::{
    self, CropHandle, RectBox, ResizeHandle,
};

/// Pick radius for resize/rotate/crop handles, in scene units.
pub const HANDLE_HIT_RADIUS: f32 = 8.0;

/// Distance of the rotation handle above the selected box's top-center.
pub const ROTATE_HANDLE_OFFSET: f32 = 26.0;

/// Pick radius for selecting a stroke under the select tool.
pub const STROKE_HIT_RADIUS: f32 = 6.0;

/// The one active gesture. `Idle` between gestures; every pointer-down
/// replaces the previous value outright.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActiveGesture {
    Idle,
    DragLayer {
        id: Uuid,
        grab_dx: f32,
        grab_dy: f32,
    },
    DragStroke {
        id: Uuid,
        last: Pos2,
    },
    Resize {
        id: Uuid,
        handle: ResizeHandle,
        start: RectBox,
        start_pointer: Pos2,
    },
    Rotate {
        id: Uuid,
        cx: f32,
        cy: f32,
        start_pointer: Pos2,
        start_rotation: f32,
        snapped: bool,
    },
    Crop {
        handle: CropHandle,
        start: RectBox,
        start_pointer: Pos2,
    },
    Draw {
        id: Uuid,
    },
    Annotate {
        anchor: Pos2,
        current: Pos2,
    },
}

/// Transient crop state for the selected layer. Independent of the layer
/// until confirmed; cancel throws it away without touching the scene.
#[derive(Clone, Copy, Debug)]
pub struct CropSession {
    pub layer_id: Uuid,
    pub rect: RectBox,
}

pub struct InteractionController {
    pub gesture: ActiveGesture,
    pub crop: Option<CropSession>,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionController {
    pub fn new() -> Self {
        Self {
            gesture: ActiveGesture::Idle,
            crop: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == ActiveGesture::Idle
    }

    /// Drop any in-progress gesture. Called on generate-start and before
    /// every pointer-down: if a pointer-up was lost (focus change mid-drag),
    /// the stale gesture must not bleed into the next interaction.
    pub fn reset_gesture(&mut self) {
        self.gesture = ActiveGesture::Idle;
    }

    /// True while the rotate gesture sits on a snapped multiple of 90°,
    /// for handle highlighting.
    pub fn rotation_snapped(&self) -> bool {
        matches!(self.gesture, ActiveGesture::Rotate { snapped: true, .. })
    }

    /// Candidate annotation box while an annotate drag is in progress.
    pub fn annotate_preview(&self) -> Option<RectBox> {
        match self.gesture {
            ActiveGesture::Annotate { anchor, current } => {
                Some(normalized_box(anchor, current))
            }
            _ => None,
        }
    }

    // ---- crop session ------------------------------------------------------

    /// Enter crop mode for the selected layer, seeding the transient box
    /// with the layer's full display bounds.
    pub fn begin_crop(&mut self, scene: &SceneState) {
        self.reset_gesture();
        if let Some(layer) = scene.selected_layer() {
            self.crop = Some(CropSession {
                layer_id: layer.id,
                rect: RectBox::of_layer(layer),
            });
        }
    }

    pub fn cancel_crop(&mut self) {
        self.reset_gesture();
        self.crop = None;
    }

    /// Confirm the crop: re-sample the source at native resolution and
    /// collapse the layer onto the crop box.
    pub fn confirm_crop(&mut self, scene: &mut SceneState) {
        self.reset_gesture();
        if let Some(session) = self.crop.take() {
            if let Some(layer) = scene.layer_mut(session.layer_id) {
                transform::apply_crop(layer, &session.rect);
            }
        }
    }

    // ---- pointer events ----------------------------------------------------

    pub fn pointer_down(&mut self, scene: &mut SceneState, pos: Pos2) {
        // Replace whatever was left over, then dispatch fresh.
        self.reset_gesture();

        // An active crop session captures the pointer before the tools do.
        if let Some(session) = self.crop {
            if scene.layer(session.layer_id).is_some() {
                if let Some(handle) = crop_handle_at(&session.rect, pos) {
                    self.gesture = ActiveGesture::Crop {
                        handle,
                        start: session.rect,
                        start_pointer: pos,
                    };
                }
                return;
            }
            // Layer vanished under the session (deleted); drop it.
            self.crop = None;
        }

        match scene.tool {
            Tool::Select => self.pointer_down_select(scene, pos),
            Tool::Draw => {
                let brush = scene.brush;
                let id = scene.add_stroke(Stroke::begin(pos, &brush));
                self.gesture = ActiveGesture::Draw { id };
            }
            Tool::Annotate => {
                if scene.can_annotate() {
                    self.gesture = ActiveGesture::Annotate {
                        anchor: pos,
                        current: pos,
                    };
                }
            }
        }
    }

    fn pointer_down_select(&mut self, scene: &mut SceneState, pos: Pos2) {
        // Handles of the current selection take priority over re-selection.
        if let Some(layer) = scene.selected_layer() {
            let b = RectBox::of_layer(layer);
            let id = layer.id;

            if pos.distance(rotate_handle_pos(&b)) <= HANDLE_HIT_RADIUS {
                let c = layer.center();
                self.gesture = ActiveGesture::Rotate {
                    id,
                    cx: c.x,
                    cy: c.y,
                    start_pointer: pos,
                    start_rotation: layer.rotation,
                    snapped: false,
                };
                return;
            }

            if let Some(handle) = resize_handle_at(&b, pos) {
                self.gesture = ActiveGesture::Resize {
                    id,
                    handle,
                    start: b,
                    start_pointer: pos,
                };
                return;
            }
        }

        if let Some(layer) = scene.layer_at(pos) {
            let id = layer.id;
            let grab = (pos.x - layer.x, pos.y - layer.y);
            scene.select_layer(id);
            self.gesture = ActiveGesture::DragLayer {
                id,
                grab_dx: grab.0,
                grab_dy: grab.1,
            };
            return;
        }

        if let Some(stroke) = scene.stroke_near(pos, STROKE_HIT_RADIUS) {
            let id = stroke.id;
            scene.select_stroke(id);
            self.gesture = ActiveGesture::DragStroke { id, last: pos };
            return;
        }

        scene.clear_selection();
    }

    pub fn pointer_move(&mut self, scene: &mut SceneState, pos: Pos2) {
        match self.gesture {
            ActiveGesture::Idle => {}

            ActiveGesture::DragLayer { id, grab_dx, grab_dy } => {
                if let Some(layer) = scene.layer_mut(id) {
                    let (x, y) = transform::drag_position(pos, grab_dx, grab_dy);
                    layer.x = x;
                    layer.y = y;
                }
            }

            ActiveGesture::DragStroke { id, last } => {
                if let Some(stroke) = scene.stroke_mut(id) {
                    stroke.translate(pos.x - last.x, pos.y - last.y);
                }
                self.gesture = ActiveGesture::DragStroke { id, last: pos };
            }

            ActiveGesture::Resize { id, handle, start, start_pointer } => {
                let dx = pos.x - start_pointer.x;
                let dy = pos.y - start_pointer.y;
                // A frame that violates the minimum size is dropped; the
                // gesture itself stays live so the user can drag back out.
                if let Some(out) = transform::resize_box(&start, handle, dx, dy) {
                    if let Some(layer) = scene.layer_mut(id) {
                        layer.x = out.x;
                        layer.y = out.y;
                        layer.width = out.w;
                        layer.height = out.h;
                    }
                }
            }

            ActiveGesture::Rotate { id, cx, cy, start_pointer, start_rotation, .. } => {
                let (angle, snapped) =
                    transform::rotate_angle(start_rotation, cx, cy, start_pointer, pos);
                if let Some(layer) = scene.layer_mut(id) {
                    layer.rotation = angle;
                }
                self.gesture = ActiveGesture::Rotate {
                    id,
                    cx,
                    cy,
                    start_pointer,
                    start_rotation,
                    snapped,
                };
            }

            ActiveGesture::Crop { handle, start, start_pointer } => {
                if let Some(session) = &mut self.crop {
                    if let Some(layer) = scene.layer(session.layer_id) {
                        let bounds = RectBox::of_layer(layer);
                        session.rect = transform::crop_adjust(
                            &start,
                            handle,
                            pos.x - start_pointer.x,
                            pos.y - start_pointer.y,
                            &bounds,
                        );
                    }
                }
            }

            ActiveGesture::Draw { id } => {
                if let Some(stroke) = scene.stroke_mut(id) {
                    if stroke.points.last() != Some(&pos) {
                        stroke.points.push(pos);
                    }
                }
            }

            ActiveGesture::Annotate { anchor, .. } => {
                self.gesture = ActiveGesture::Annotate { anchor, current: pos };
            }
        }
    }

    /// Pointer-up or pointer-leave: commit or discard the gesture and
    /// return to idle.
    pub fn pointer_up(&mut self, scene: &mut SceneState) {
        if let ActiveGesture::Annotate { anchor, current } = self.gesture {
            let b = normalized_box(anchor, current);
            // Undersized candidates are discarded inside add_annotation.
            let _ = scene.add_annotation(scene.annotation_shape, b.x, b.y, b.w, b.h);
        }
        self.gesture = ActiveGesture::Idle;
    }

    // ---- keyboard ----------------------------------------------------------

    /// Delete/Backspace: remove the selected layer or stroke. The shell is
    /// responsible for suppressing this while a text field has focus.
    pub fn key_delete(&mut self, scene: &mut SceneState) {
        if let Some(Selection::Layer(id)) = scene.selection {
            if self.crop.map(|c| c.layer_id) == Some(id) {
                self.crop = None;
            }
        }
        scene.delete_selected();
    }

    /// Platform-modifier + Z: undo the most recent stroke. Layers and
    /// annotations have no undo.
    pub fn key_undo(&mut self, scene: &mut SceneState) {
        scene.pop_last_stroke();
    }
}

// ============================================================================
// HIT TESTING
// ============================================================================

fn normalized_box(a: Pos2, b: Pos2) -> RectBox {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    RectBox::new(x, y, (a.x - b.x).abs(), (a.y - b.y).abs())
}

/// Rotation handle floats above the top-center of the selection box.
pub fn rotate_handle_pos(b: &RectBox) -> Pos2 {
    Pos2::new(b.x + b.w * 0.5, b.y - ROTATE_HANDLE_OFFSET)
}

/// Which corner resize handle (if any) sits under `pos`.
pub fn resize_handle_at(b: &RectBox, pos: Pos2) -> Option<ResizeHandle> {
    ResizeHandle::all()
        .iter()
        .copied()
        .find(|h| pos.distance(h.anchor_on(b)) <= HANDLE_HIT_RADIUS)
}

/// Which crop handle sits under `pos`: corners and edges first, then the
/// interior as a whole-box move. Outside the box hits nothing.
pub fn crop_handle_at(b: &RectBox, pos: Pos2) -> Option<CropHandle> {
    if let Some(h) = CropHandle::edges()
        .iter()
        .copied()
        .find(|h| pos.distance(h.anchor_on(b)) <= HANDLE_HIT_RADIUS)
    {
        return Some(h);
    }
    if pos.x >= b.x && pos.x <= b.right() && pos.y >= b.y && pos.y <= b.bottom() {
        return Some(CropHandle::Move);
    }
    None
}

// ============================================================================
// TESTS
// ============================================================================
