// ============================================================================
// TRANSFORM ENGINE — pure move/resize/rotate/crop math for scene layers
// ============================================================================
//
// Every function here is pure: it maps a gesture's start state plus the
// current pointer position to a new geometry, or rejects the frame. The
// interaction controller owns the gesture bookkeeping and writes accepted
// results back into the scene.

use std::sync::Arc;
use egui::Pos2;
use image::imageops;

use crate::canvas::{Layer, MIN_LAYER_SIZE};

/// Axis-aligned box in scene (display) coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl RectBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn of_layer(layer: &Layer) -> Self {
        Self {
            x: layer.x,
            y: layer.y,
            w: layer.width,
            h: layer.height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn contains_box(&self, other: &RectBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

// ============================================================================
// MOVE
// ============================================================================

/// New origin for a dragged element: pointer position minus the offset
/// captured at pointer-down. No clamping — elements may be dragged partly
/// or fully outside the visible scene.
pub fn drag_position(pointer: Pos2, grab_dx: f32, grab_dy: f32) -> (f32, f32) {
    (pointer.x - grab_dx, pointer.y - grab_dy)
}

// ============================================================================
// RESIZE
// ============================================================================

/// Corner handles for aspect-locked layer resize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeHandle {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ResizeHandle {
    pub fn is_left(&self) -> bool {
        matches!(self, ResizeHandle::TopLeft | ResizeHandle::BottomLeft)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, ResizeHandle::TopLeft | ResizeHandle::TopRight)
    }

    pub fn all() -> &'static [ResizeHandle] {
        &[
            ResizeHandle::TopLeft,
            ResizeHandle::TopRight,
            ResizeHandle::BottomLeft,
            ResizeHandle::BottomRight,
        ]
    }

    /// Position of this handle on a display box.
    pub fn anchor_on(&self, b: &RectBox) -> Pos2 {
        match self {
            ResizeHandle::TopLeft => Pos2::new(b.x, b.y),
            ResizeHandle::TopRight => Pos2::new(b.right(), b.y),
            ResizeHandle::BottomLeft => Pos2::new(b.x, b.bottom()),
            ResizeHandle::BottomRight => Pos2::new(b.right(), b.bottom()),
        }
    }
}

/// Aspect-locked resize. The aspect ratio is fixed at the gesture's start;
/// the dominant drag axis (larger of |dx|, |dy|) decides whether width or
/// height is computed from the delta and the other dimension follows. The
/// corner opposite the handle stays fixed.
///
/// Returns `None` when the result would fall at or under the minimum layer
/// size — the caller leaves the scene unchanged for that frame.
pub fn resize_box(start: &RectBox, handle: ResizeHandle, dx: f32, dy: f32) -> Option<RectBox> {
    if start.h <= 0.0 {
        return None;
    }
    let aspect = start.w / start.h;

    // Deltas are measured from gesture start; a left/top handle grows the
    // box when dragged outward (negative delta).
    let wx = if handle.is_left() { start.w - dx } else { start.w + dx };
    let hy = if handle.is_top() { start.h - dy } else { start.h + dy };

    let (new_w, new_h) = if dx.abs() >= dy.abs() {
        (wx, wx / aspect)
    } else {
        (hy * aspect, hy)
    };

    if new_w <= MIN_LAYER_SIZE || new_h <= MIN_LAYER_SIZE {
        return None;
    }

    let x = if handle.is_left() { start.x + (start.w - new_w) } else { start.x };
    let y = if handle.is_top() { start.y + (start.h - new_h) } else { start.y };

    Some(RectBox::new(x, y, new_w, new_h))
}

// ============================================================================
// ROTATE
// ============================================================================

/// Snap window around each 90° step, in degrees.
pub const ROTATION_SNAP_THRESHOLD: f32 = 4.0;

/// Angle of `p` about `(cx, cy)` in degrees.
fn pointer_angle(cx: f32, cy: f32, p: Pos2) -> f32 {
    (p.y - cy).atan2(p.x - cx).to_degrees()
}

/// Rotation gesture: the delta between the current and start pointer
/// angles about the layer center, added to the rotation at gesture start.
/// Snaps exactly onto any multiple of 90° within ±360° when inside the
/// snap window; the returned flag drives the handle's visual feedback.
pub fn rotate_angle(
    start_rotation: f32,
    cx: f32,
    cy: f32,
    start_pointer: Pos2,
    pointer: Pos2,
) -> (f32, bool) {
    let delta = pointer_angle(cx, cy, pointer) - pointer_angle(cx, cy, start_pointer);
    let angle = start_rotation + delta;

    let mut m = -360.0f32;
    while m <= 360.0 {
        if (angle - m).abs() <= ROTATION_SNAP_THRESHOLD {
            return (m, true);
        }
        m += 90.0;
    }
    (angle, false)
}

// ============================================================================
// CROP
// ============================================================================

/// Handles for the transient crop box: four corners, four edges, and a
/// whole-box move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropHandle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
    Move,
}

impl CropHandle {
    pub fn edges() -> &'static [CropHandle] {
        &[
            CropHandle::TopLeft,
            CropHandle::Top,
            CropHandle::TopRight,
            CropHandle::Right,
            CropHandle::BottomRight,
            CropHandle::Bottom,
            CropHandle::BottomLeft,
            CropHandle::Left,
        ]
    }

    fn moves_left_edge(&self) -> bool {
        matches!(self, CropHandle::TopLeft | CropHandle::Left | CropHandle::BottomLeft)
    }

    fn moves_right_edge(&self) -> bool {
        matches!(self, CropHandle::TopRight | CropHandle::Right | CropHandle::BottomRight)
    }

    fn moves_top_edge(&self) -> bool {
        matches!(self, CropHandle::TopLeft | CropHandle::Top | CropHandle::TopRight)
    }

    fn moves_bottom_edge(&self) -> bool {
        matches!(self, CropHandle::BottomLeft | CropHandle::Bottom | CropHandle::BottomRight)
    }

    /// Position of this handle on a crop box (`Move` maps to the center).
    pub fn anchor_on(&self, b: &RectBox) -> Pos2 {
        let cx = b.x + b.w * 0.5;
        let cy = b.y + b.h * 0.5;
        match self {
            CropHandle::TopLeft => Pos2::new(b.x, b.y),
            CropHandle::Top => Pos2::new(cx, b.y),
            CropHandle::TopRight => Pos2::new(b.right(), b.y),
            CropHandle::Right => Pos2::new(b.right(), cy),
            CropHandle::BottomRight => Pos2::new(b.right(), b.bottom()),
            CropHandle::Bottom => Pos2::new(cx, b.bottom()),
            CropHandle::BottomLeft => Pos2::new(b.x, b.bottom()),
            CropHandle::Left => Pos2::new(b.x, cy),
            CropHandle::Move => Pos2::new(cx, cy),
        }
    }
}

/// Floor for the transient crop box, so a confirmed crop can never drop
/// the layer below its minimum display size.
const MIN_CROP_SIZE: f32 = MIN_LAYER_SIZE;

/// Adjust the transient crop box by the pointer delta from gesture start.
/// The result never exceeds `bounds` (the layer's display box) and never
/// shrinks under `MIN_CROP_SIZE`.
pub fn crop_adjust(
    start: &RectBox,
    handle: CropHandle,
    dx: f32,
    dy: f32,
    bounds: &RectBox,
) -> RectBox {
    if handle == CropHandle::Move {
        let x = (start.x + dx).clamp(bounds.x, (bounds.right() - start.w).max(bounds.x));
        let y = (start.y + dy).clamp(bounds.y, (bounds.bottom() - start.h).max(bounds.y));
        return RectBox::new(x, y, start.w, start.h);
    }

    let mut left = start.x;
    let mut right = start.right();
    let mut top = start.y;
    let mut bottom = start.bottom();

    if handle.moves_left_edge() {
        left = (start.x + dx).clamp(bounds.x, right - MIN_CROP_SIZE);
    }
    if handle.moves_right_edge() {
        right = (start.right() + dx).clamp(left + MIN_CROP_SIZE, bounds.right());
    }
    if handle.moves_top_edge() {
        top = (start.y + dy).clamp(bounds.y, bottom - MIN_CROP_SIZE);
    }
    if handle.moves_bottom_edge() {
        bottom = (start.bottom() + dy).clamp(top + MIN_CROP_SIZE, bounds.bottom());
    }

    RectBox::new(left, top, right - left, bottom - top)
}

/// Confirm a crop: re-sample the layer's *native* pixels (not the display
/// scale) under the crop box and make the result the layer's new source.
/// The layer's position and display size become the crop box.
///
/// The box is expected to lie inside the layer's display bounds (the
/// adjust step guarantees it); out-of-range fragments are clamped away
/// rather than wrapped.
pub fn apply_crop(layer: &mut Layer, crop: &RectBox) {
    let (native_w, native_h) = layer.native_size();
    if layer.width <= 0.0 || layer.height <= 0.0 || native_w == 0 || native_h == 0 {
        return;
    }

    // Display → native ratio per axis.
    let scale_x = native_w as f32 / layer.width;
    let scale_y = native_h as f32 / layer.height;

    let src_x = ((crop.x - layer.x) * scale_x).floor().max(0.0) as u32;
    let src_y = ((crop.y - layer.y) * scale_y).floor().max(0.0) as u32;
    let src_w = ((crop.w * scale_x).round() as u32)
        .min(native_w.saturating_sub(src_x))
        .max(1);
    let src_h = ((crop.h * scale_y).round() as u32)
        .min(native_h.saturating_sub(src_y))
        .max(1);

    let cropped = imageops::crop_imm(layer.image.as_ref(), src_x, src_y, src_w, src_h).to_image();
    layer.replace_image(Arc::new(cropped));
    layer.x = crop.x;
    layer.y = crop.y;
    layer.width = crop.w;
    layer.height = crop.h;
}

// ============================================================================
// TESTS
// ============================================================================
