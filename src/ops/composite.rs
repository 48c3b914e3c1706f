// ============================================================================
// COMPOSITE RASTERIZER — flattens the scene into the generation input
// ============================================================================
//
// Two rasterization paths:
//
//  * Full-canvas capture (no layers): background fill plus strokes, sized
//    to the visible canvas.
//  * Layer-anchored composite (>= 1 layer): the bottom layer is the base
//    and fixes the output at its NATIVE pixel size. Everything else is
//    re-projected from display coordinates through `native / display`.
//
// Annotations are rasterized as dashed outlines with their labels — they
// must stay visible so the generation service can act on the instruction;
// the instruction text is what asks the service to remove them again.
//
// A broken element (zero-sized image, degenerate box) is skipped, never
// fatal: one bad overlay must not block generation.

use std::sync::OnceLock;

use ab_glyph::{Font, FontArc, ScaleFont};
use egui::Pos2;
use image::{imageops, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{Annotation, AnnotationShape, Layer, SceneState, Stroke};
use crate::log_warn;

/// Background fill for the full-canvas capture path.
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Outline + label color for rasterized annotations.
const ANNOTATION_COLOR: Rgba<u8> = Rgba([235, 87, 50, 255]);

/// Dash pattern for annotation outlines, in display units (scaled on
/// projection like everything else).
const DASH_LEN: f32 = 6.0;
const GAP_LEN: f32 = 4.0;
const OUTLINE_WIDTH: f32 = 2.0;

/// Label font size in display units.
const LABEL_SIZE: f32 = 14.0;

// ============================================================================
// ENTRY POINT
// ============================================================================

/// Flatten the scene deterministically. `canvas_w`/`canvas_h` are the
/// visible canvas dimensions, used only when no layers are present.
pub fn rasterize(scene: &SceneState, canvas_w: u32, canvas_h: u32) -> RgbaImage {
    match scene.layers.first() {
        Some(base) if base.image.width() > 0 && base.image.height() > 0 && base.width > 0.0 && base.height > 0.0 => {
            layer_anchored(scene, base)
        }
        Some(_) => {
            log_warn!("composite: base layer has degenerate pixels, falling back to canvas capture");
            full_canvas(scene, canvas_w, canvas_h)
        }
        None => full_canvas(scene, canvas_w, canvas_h),
    }
}

/// Canvas capture: background fill, then strokes and annotations in order,
/// all at display coordinates (scale 1).
fn full_canvas(scene: &SceneState, canvas_w: u32, canvas_h: u32) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(canvas_w.max(1), canvas_h.max(1), BACKGROUND);
    for stroke in &scene.strokes {
        draw_stroke(&mut out, stroke, Pos2::ZERO, 1.0, 1.0);
    }
    for ann in &scene.annotations {
        draw_annotation(&mut out, ann, Pos2::ZERO, 1.0, 1.0);
    }
    out
}

/// Layer-anchored composite at the base layer's native resolution.
fn layer_anchored(scene: &SceneState, base: &Layer) -> RgbaImage {
    let (native_w, native_h) = base.native_size();
    let scale_x = native_w as f32 / base.width;
    let scale_y = native_h as f32 / base.height;
    let origin = Pos2::new(base.x, base.y);

    // Base pixels form the bottom of the stack at their native size.
    let mut out = base.image.as_ref().clone();

    for layer in scene.layers.iter().skip(1) {
        draw_overlay_layer(&mut out, layer, origin, scale_x, scale_y);
    }
    for stroke in &scene.strokes {
        draw_stroke(&mut out, stroke, origin, scale_x, scale_y);
    }
    for ann in &scene.annotations {
        draw_annotation(&mut out, ann, origin, scale_x, scale_y);
    }
    out
}

// ============================================================================
// OVERLAY LAYERS
// ============================================================================

fn draw_overlay_layer(out: &mut RgbaImage, layer: &Layer, origin: Pos2, scale_x: f32, scale_y: f32) {
    if layer.image.width() == 0 || layer.image.height() == 0 {
        log_warn!("composite: skipping overlay with empty pixels");
        return;
    }
    let dst_w = (layer.width * scale_x).round() as i64;
    let dst_h = (layer.height * scale_y).round() as i64;
    if dst_w < 1 || dst_h < 1 {
        log_warn!("composite: skipping overlay projected to zero size");
        return;
    }

    let resized = imageops::resize(
        layer.image.as_ref(),
        dst_w as u32,
        dst_h as u32,
        imageops::FilterType::CatmullRom,
    );

    let dst_x = (layer.x - origin.x) * scale_x;
    let dst_y = (layer.y - origin.y) * scale_y;

    if layer.rotation % 360.0 == 0.0 {
        imageops::overlay(out, &resized, dst_x.round() as i64, dst_y.round() as i64);
    } else {
        let cx = dst_x + dst_w as f32 * 0.5;
        let cy = dst_y + dst_h as f32 * 0.5;
        overlay_rotated(out, &resized, cx, cy, layer.rotation);
    }
}

/// Composite `src` onto `dst` rotated by `angle_deg` about `(cx, cy)`
/// (the placement center, in dst coordinates). Inverse-mapped bilinear
/// sampling, row-parallel.
fn overlay_rotated(dst: &mut RgbaImage, src: &RgbaImage, cx: f32, cy: f32, angle_deg: f32) {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let src_w = src.width() as f32;
    let src_h = src.height() as f32;

    // Bounding box of the rotated source in dst space.
    let half_w = src_w * 0.5;
    let half_h = src_h * 0.5;
    let ext_x = (half_w * cos).abs() + (half_h * sin).abs();
    let ext_y = (half_w * sin).abs() + (half_h * cos).abs();
    let y0 = ((cy - ext_y).floor().max(0.0)) as usize;
    let y1 = ((cy + ext_y).ceil().min(dst.height() as f32)) as usize;
    let x0 = ((cx - ext_x).floor().max(0.0)) as usize;
    let x1 = ((cx + ext_x).ceil().min(dst.width() as f32)) as usize;
    if y0 >= y1 || x0 >= x1 {
        return;
    }

    let dst_w = dst.width() as usize;
    let row_bytes = dst_w * 4;
    let src_raw = src.as_raw();
    let src_stride = src.width() as usize * 4;

    dst.as_mut()
        .par_chunks_mut(row_bytes)
        .enumerate()
        .skip(y0)
        .take(y1 - y0)
        .for_each(|(dy, row)| {
            let ry = dy as f32 + 0.5 - cy;
            for dx in x0..x1 {
                let rx = dx as f32 + 0.5 - cx;
                // Inverse rotation back into source space.
                let sx = rx * cos + ry * sin + half_w - 0.5;
                let sy = -rx * sin + ry * cos + half_h - 0.5;

                let fx0 = sx.floor();
                let fy0 = sy.floor();
                let ix = fx0 as i64;
                let iy = fy0 as i64;
                if ix < -1 || iy < -1 || ix >= src_w as i64 || iy >= src_h as i64 {
                    continue;
                }

                let tx = sx - fx0;
                let ty = sy - fy0;
                let mut acc = [0.0f32; 4];
                let mut weight_sum = 0.0f32;
                for (ox, oy, w) in [
                    (0i64, 0i64, (1.0 - tx) * (1.0 - ty)),
                    (1, 0, tx * (1.0 - ty)),
                    (0, 1, (1.0 - tx) * ty),
                    (1, 1, tx * ty),
                ] {
                    let px = ix + ox;
                    let py = iy + oy;
                    if px < 0 || py < 0 || px >= src_w as i64 || py >= src_h as i64 {
                        continue;
                    }
                    let off = py as usize * src_stride + px as usize * 4;
                    acc[0] += src_raw[off] as f32 * w;
                    acc[1] += src_raw[off + 1] as f32 * w;
                    acc[2] += src_raw[off + 2] as f32 * w;
                    acc[3] += src_raw[off + 3] as f32 * w;
                    weight_sum += w;
                }
                if weight_sum <= 0.0 {
                    continue;
                }
                let color = Rgba([
                    (acc[0] / weight_sum) as u8,
                    (acc[1] / weight_sum) as u8,
                    (acc[2] / weight_sum) as u8,
                    // Alpha keeps its edge falloff: out-of-bounds taps count
                    // as transparent, which anti-aliases the rotated border.
                    acc[3] as u8,
                ]);
                blend_into_row(row, dx, color);
            }
        });
}

// ============================================================================
// STROKES
// ============================================================================

fn draw_stroke(out: &mut RgbaImage, stroke: &Stroke, origin: Pos2, scale_x: f32, scale_y: f32) {
    if stroke.points.is_empty() {
        return;
    }
    let scale_avg = (scale_x + scale_y) * 0.5;
    let radius = (stroke.width * scale_avg * 0.5).max(0.5);
    let color = Rgba(stroke.color.to_array());

    let project = |p: &Pos2| Pos2::new((p.x - origin.x) * scale_x, (p.y - origin.y) * scale_y);

    let first = project(&stroke.points[0]);
    fill_disc(out, first.x, first.y, radius, color);
    for pair in stroke.points.windows(2) {
        let a = project(&pair[0]);
        let b = project(&pair[1]);
        stamp_segment(out, a, b, radius, color);
    }
}

/// Stamp discs along a segment at half-radius spacing — dense enough that
/// the dots fuse into a solid line at any width.
fn stamp_segment(out: &mut RgbaImage, a: Pos2, b: Pos2, radius: f32, color: Rgba<u8>) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-3 {
        fill_disc(out, b.x, b.y, radius, color);
        return;
    }
    let step = (radius * 0.5).max(0.5);
    let count = (len / step).ceil() as u32;
    for i in 0..=count {
        let t = i as f32 / count as f32;
        fill_disc(out, a.x + dx * t, a.y + dy * t, radius, color);
    }
}

fn fill_disc(out: &mut RgbaImage, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
    let r2 = radius * radius;
    let min_x = (cx - radius).floor().max(0.0) as u32;
    let max_x = ((cx + radius).ceil() as i64).min(out.width() as i64 - 1);
    let min_y = (cy - radius).floor().max(0.0) as u32;
    let max_y = ((cy + radius).ceil() as i64).min(out.height() as i64 - 1);
    if max_x < 0 || max_y < 0 {
        return;
    }
    for y in min_y..=max_y as u32 {
        for x in min_x..=max_x as u32 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                blend_pixel(out, x, y, color);
            }
        }
    }
}

// ============================================================================
// ANNOTATIONS
// ============================================================================

fn draw_annotation(out: &mut RgbaImage, ann: &Annotation, origin: Pos2, scale_x: f32, scale_y: f32) {
    if ann.width <= 0.0 || ann.height <= 0.0 {
        return;
    }
    let scale_avg = (scale_x + scale_y) * 0.5;
    let x = (ann.x - origin.x) * scale_x;
    let y = (ann.y - origin.y) * scale_y;
    let w = ann.width * scale_x;
    let h = ann.height * scale_y;

    let dash = DASH_LEN * scale_avg;
    let gap = GAP_LEN * scale_avg;
    let thickness = (OUTLINE_WIDTH * scale_avg).max(1.0);

    match ann.shape {
        AnnotationShape::Rectangle => {
            let corners = [
                (Pos2::new(x, y), Pos2::new(x + w, y)),
                (Pos2::new(x + w, y), Pos2::new(x + w, y + h)),
                (Pos2::new(x + w, y + h), Pos2::new(x, y + h)),
                (Pos2::new(x, y + h), Pos2::new(x, y)),
            ];
            for (a, b) in corners {
                dashed_segment(out, a, b, dash, gap, thickness, ANNOTATION_COLOR);
            }
        }
        AnnotationShape::Ellipse => {
            // Walk the perimeter as a 64-gon and dash each edge.
            let cx = x + w * 0.5;
            let cy = y + h * 0.5;
            let rx = w * 0.5;
            let ry = h * 0.5;
            let segments = 64;
            let mut prev = Pos2::new(cx + rx, cy);
            for i in 1..=segments {
                let angle = 2.0 * std::f32::consts::PI * (i as f32) / (segments as f32);
                let p = Pos2::new(cx + rx * angle.cos(), cy + ry * angle.sin());
                dashed_segment(out, prev, p, dash, gap, thickness, ANNOTATION_COLOR);
                prev = p;
            }
        }
    }

    draw_label(
        out,
        &ann.label,
        x + 4.0 * scale_avg,
        y + 4.0 * scale_avg,
        LABEL_SIZE * scale_avg,
        ANNOTATION_COLOR,
    );
}

/// Dash a line segment: alternating drawn/skipped runs along its length.
fn dashed_segment(
    out: &mut RgbaImage,
    a: Pos2,
    b: Pos2,
    dash: f32,
    gap: f32,
    thickness: f32,
    color: Rgba<u8>,
) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let total = (dx * dx + dy * dy).sqrt();
    if total < 0.1 {
        return;
    }
    let ux = dx / total;
    let uy = dy / total;
    let pattern = dash + gap;
    let radius = thickness * 0.5;

    let mut t = 0.0;
    while t < total {
        let seg_start = t;
        let seg_end = (t + dash).min(total);
        stamp_segment(
            out,
            Pos2::new(a.x + ux * seg_start, a.y + uy * seg_start),
            Pos2::new(a.x + ux * seg_end, a.y + uy * seg_end),
            radius,
            color,
        );
        t += pattern;
    }
}

// ============================================================================
// LABEL TEXT
// ============================================================================

static LABEL_FONT: OnceLock<Option<FontArc>> = OnceLock::new();

/// Resolve a sans-serif system font once per process. `None` when the host
/// has no usable font — labels are then skipped, never fatal.
fn label_font() -> Option<&'static FontArc> {
    LABEL_FONT
        .get_or_init(|| {
            let result = font_kit::source::SystemSource::new()
                .select_best_match(
                    &[font_kit::family_name::FamilyName::SansSerif],
                    &font_kit::properties::Properties::new(),
                )
                .ok()
                .and_then(|handle| handle.load().ok())
                .and_then(|font| font.copy_font_data())
                .and_then(|data| FontArc::try_from_vec(data.as_ref().clone()).ok());
            if result.is_none() {
                log_warn!("composite: no system font found, annotation labels will be omitted");
            }
            result
        })
        .as_ref()
}

/// Rasterize a single-line label at `(x, y)` (top-left of the text box).
fn draw_label(out: &mut RgbaImage, text: &str, x: f32, y: f32, size: f32, color: Rgba<u8>) {
    let Some(font) = label_font() else {
        return;
    };
    let scaled = font.as_scaled(size);
    let ascent = scaled.ascent();

    let mut cursor_x = x;
    let mut last_glyph = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(size, ab_glyph::point(cursor_x, y + ascent));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i64 + gx as i64;
                let py = bounds.min.y as i64 + gy as i64;
                if px < 0 || py < 0 || px >= out.width() as i64 || py >= out.height() as i64 {
                    return;
                }
                let mut c = color;
                c.0[3] = (color.0[3] as f32 * coverage) as u8;
                blend_pixel(out, px as u32, py as u32, c);
            });
        }
        cursor_x += scaled.h_advance(id);
        last_glyph = Some(id);
    }
}

// ============================================================================
// PIXEL BLENDING
// ============================================================================

/// Source-over blend of one pixel, bounds already checked by callers.
fn blend_pixel(out: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    let dst = out.get_pixel_mut(x, y);
    *dst = blend(*dst, color);
}

fn blend_into_row(row: &mut [u8], x: usize, color: Rgba<u8>) {
    let off = x * 4;
    let dst = Rgba([row[off], row[off + 1], row[off + 2], row[off + 3]]);
    let res = blend(dst, color);
    row[off..off + 4].copy_from_slice(&res.0);
}

fn blend(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src.0[3] as f32 / 255.0;
    if sa <= 0.0 {
        return dst;
    }
    if sa >= 1.0 {
        return src;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let mut out = [0u8; 4];
    for i in 0..3 {
        let s = src.0[i] as f32;
        let d = dst.0[i] as f32;
        out[i] = ((s * sa + d * da * (1.0 - sa)) / out_a).round() as u8;
    }
    out[3] = (out_a * 255.0).round() as u8;
    Rgba(out)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{BrushSettings, Layer, SceneState};
    use egui::Color32;
    use std::sync::Arc;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(w, h, Rgba(rgba)))
    }

    fn place(img: Arc<RgbaImage>, x: f32, y: f32, w: f32, h: f32) -> Layer {
        let mut layer = Layer::from_image(img, x, y, f32::MAX);
        layer.width = w;
        layer.height = h;
        layer
    }

    #[test]
    fn output_resolution_is_base_native_size() {
        let mut scene = SceneState::new();
        scene.add_layer(place(solid(800, 600, [10, 10, 10, 255]), 0.0, 0.0, 400.0, 300.0));
        let out = rasterize(&scene, 1024, 768);
        assert_eq!((out.width(), out.height()), (800, 600));
    }

    #[test]
    fn overlay_projects_display_offset_to_native() {
        // Base 800×600 native shown at 400×300; overlay at display (50,50)
        // sized 100×100 must land at native (100,100) sized 200×200.
        let mut scene = SceneState::new();
        scene.add_layer(place(solid(800, 600, [10, 10, 10, 255]), 0.0, 0.0, 400.0, 300.0));
        scene.add_layer(place(solid(100, 100, [0, 255, 0, 255]), 50.0, 50.0, 100.0, 100.0));
        let out = rasterize(&scene, 1024, 768);

        // Well inside the projected overlay box (resampling may wobble a
        // channel by one step, so compare with a tolerance).
        for (x, y) in [(200, 200), (110, 110), (290, 290)] {
            let p = out.get_pixel(x, y).0;
            assert!(p[0] <= 4 && p[1] >= 250 && p[2] <= 4, "not overlay green at ({x}, {y}): {p:?}");
        }
        // Outside it: base pixels.
        assert_eq!(out.get_pixel(80, 80).0, [10, 10, 10, 255]);
        assert_eq!(out.get_pixel(320, 320).0, [10, 10, 10, 255]);
    }

    #[test]
    fn full_canvas_capture_without_layers() {
        let mut scene = SceneState::new();
        let brush = BrushSettings {
            color: Color32::from_rgb(200, 0, 0),
            width: 6.0,
        };
        let mut stroke = Stroke::begin(Pos2::new(10.0, 50.0), &brush);
        stroke.points.push(Pos2::new(90.0, 50.0));
        scene.add_stroke(stroke);

        let out = rasterize(&scene, 300, 200);
        assert_eq!((out.width(), out.height()), (300, 200));
        assert_eq!(out.get_pixel(150, 150).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(50, 50).0, [200, 0, 0, 255]);
    }

    #[test]
    fn stroke_width_scales_with_projection() {
        // 2× native scale: a 4-unit brush becomes an 8-px line.
        let mut scene = SceneState::new();
        scene.add_layer(place(solid(800, 600, [0, 0, 0, 255]), 0.0, 0.0, 400.0, 300.0));
        let brush = BrushSettings {
            color: Color32::from_rgb(0, 0, 250),
            width: 4.0,
        };
        let mut stroke = Stroke::begin(Pos2::new(50.0, 100.0), &brush);
        stroke.points.push(Pos2::new(150.0, 100.0));
        scene.add_stroke(stroke);

        let out = rasterize(&scene, 400, 300);
        // Center of the projected line: display y=100 → native y=200.
        assert_eq!(out.get_pixel(200, 200).0, [0, 0, 250, 255]);
        // 3 px off-axis still inside a 4-px-radius line.
        assert_eq!(out.get_pixel(200, 203).0, [0, 0, 250, 255]);
        assert_eq!(out.get_pixel(200, 197).0, [0, 0, 250, 255]);
        // 6 px off-axis is outside.
        assert_eq!(out.get_pixel(200, 206).0, [0, 0, 0, 255]);
    }

    #[test]
    fn annotation_outline_is_rasterized() {
        let mut scene = SceneState::new();
        scene.add_layer(place(solid(400, 300, [0, 0, 0, 255]), 0.0, 0.0, 400.0, 300.0));
        let _ = scene.add_annotation(AnnotationShape::Rectangle, 100.0, 100.0, 120.0, 80.0);

        let out = rasterize(&scene, 400, 300);
        // The top edge must contain annotation-colored dashes somewhere.
        let mut found = 0;
        for x in 100..220 {
            for y in 98..103 {
                if out.get_pixel(x, y).0 == [235, 87, 50, 255] {
                    found += 1;
                }
            }
        }
        assert!(found > 0, "no dash pixels found on the annotation's top edge");
        // Interior stays untouched (outline only).
        assert_eq!(out.get_pixel(160, 140).0, [0, 0, 0, 255]);
    }

    #[test]
    fn degenerate_overlay_is_skipped() {
        let mut scene = SceneState::new();
        scene.add_layer(place(solid(200, 200, [5, 5, 5, 255]), 0.0, 0.0, 200.0, 200.0));
        scene.add_layer(place(solid(0, 0, [0, 0, 0, 0]), 20.0, 20.0, 50.0, 50.0));
        let out = rasterize(&scene, 400, 300);
        assert_eq!((out.width(), out.height()), (200, 200));
        assert_eq!(out.get_pixel(40, 40).0, [5, 5, 5, 255]);
    }

    #[test]
    fn rotated_overlay_lands_rotated() {
        // A wide red bar rotated 90° must cover vertically, not
        // horizontally, around its center.
        let mut scene = SceneState::new();
        scene.add_layer(place(solid(400, 400, [0, 0, 0, 255]), 0.0, 0.0, 400.0, 400.0));
        let mut bar = place(solid(200, 20, [255, 0, 0, 255]), 100.0, 190.0, 200.0, 20.0);
        bar.rotation = 90.0;
        scene.add_layer(bar);

        let out = rasterize(&scene, 400, 400);
        // Center of the bar (200, 200) is covered either way.
        assert_eq!(out.get_pixel(200, 200).0, [255, 0, 0, 255]);
        // 80 px above/below center: covered only because of the rotation.
        assert_eq!(out.get_pixel(200, 120).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(200, 280).0, [255, 0, 0, 255]);
        // 80 px left of center would be bar territory when unrotated.
        assert_eq!(out.get_pixel(120, 200).0, [0, 0, 0, 255]);
    }

    #[test]
    fn strokes_draw_over_overlays_under_annotations() {
        // Z-order within the composite: base, overlays, strokes,
        // annotations. A stroke crossing an overlay must win.
        let mut scene = SceneState::new();
        scene.add_layer(place(solid(200, 200, [0, 0, 0, 255]), 0.0, 0.0, 200.0, 200.0));
        scene.add_layer(place(solid(100, 100, [0, 255, 0, 255]), 50.0, 50.0, 100.0, 100.0));
        let brush = BrushSettings {
            color: Color32::from_rgb(250, 250, 0),
            width: 4.0,
        };
        let mut stroke = Stroke::begin(Pos2::new(0.0, 100.0), &brush);
        stroke.points.push(Pos2::new(200.0, 100.0));
        scene.add_stroke(stroke);

        let out = rasterize(&scene, 200, 200);
        assert_eq!(out.get_pixel(100, 100).0, [250, 250, 0, 255]);
        assert_eq!(out.get_pixel(100, 60).0, [0, 255, 0, 255]);
    }
}
