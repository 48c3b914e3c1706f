// ============================================================================
// INSTRUCTION BUILDING — annotation translation + generation framing
// ============================================================================

use crate::canvas::{Annotation, SceneState};

/// Join every annotation that carries a non-empty note into a single
/// instruction: `"Box 1: red sofa, Box 3: blue rug"`. Returns `None` when
/// no annotation has text, in which case the manually typed instruction
/// stays in charge. While this returns `Some`, the derived string replaces
/// the manual instruction and the instruction editor is read-only.
pub fn derive_instruction(annotations: &[Annotation]) -> Option<String> {
    let parts: Vec<String> = annotations
        .iter()
        .filter(|a| !a.note.trim().is_empty())
        .map(|a| format!("{}: {}", a.label, a.note.trim()))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// The instruction actually in effect for the scene: derived from
/// annotations when any carry text, the manual instruction otherwise.
pub fn effective_instruction(scene: &SceneState, manual: &str) -> String {
    derive_instruction(&scene.annotations).unwrap_or_else(|| manual.trim().to_string())
}

/// Wrap the user instruction in the framing the generation service needs
/// for the scene's shape:
///
///  * base layer plus guide elements (overlays or strokes) — integrate the
///    guides as real scene content, never render them literally;
///  * a single layer on its own — direct transformation of that image;
///  * no layers — generation from the sketch/drawing.
///
/// When annotations exist the composite still shows their markers, so the
/// framing also orders the service to strip them from the output.
pub fn frame_instruction(scene: &SceneState, instruction: &str) -> String {
    let has_overlays = scene.layers.len() > 1;
    let has_strokes = !scene.strokes.is_empty();

    let mut framed = if scene.layers.is_empty() {
        format!(
            "Generate a photorealistic interior scene from this rough sketch. {}",
            instruction
        )
    } else if has_overlays || has_strokes {
        format!(
            "The first image is the base scene with guide elements arranged on top of it \
             (overlaid images and hand-drawn strokes). Seamlessly integrate these guide \
             elements into the scene as real objects; do not render them literally. {}",
            instruction
        )
    } else {
        format!("Transform the provided interior image as follows: {}", instruction)
    };

    if !scene.annotations.is_empty() {
        framed.push_str(
            " The image contains dashed region markers labeled \"Box N\". Apply each \
             region's instruction to the area it marks, and remove all annotation \
             markings (dashed outlines and labels) from the final output.",
        );
    }
    framed
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{AnnotationShape, Layer, SceneState, Stroke, BrushSettings};
    use egui::Pos2;
    use image::RgbaImage;
    use std::sync::Arc;

    fn annotated_scene(notes: &[&str]) -> SceneState {
        let mut scene = SceneState::new();
        for note in notes {
            let id = scene
                .add_annotation(AnnotationShape::Rectangle, 0.0, 0.0, 50.0, 50.0)
                .unwrap();
            scene.set_annotation_note(id, note.to_string());
        }
        scene
    }

    #[test]
    fn empty_notes_are_excluded_from_translation() {
        let scene = annotated_scene(&["red sofa", "", "blue rug"]);
        assert_eq!(
            derive_instruction(&scene.annotations).as_deref(),
            Some("Box 1: red sofa, Box 3: blue rug")
        );
    }

    #[test]
    fn no_notes_means_no_derived_instruction() {
        let scene = annotated_scene(&["", "  "]);
        assert_eq!(derive_instruction(&scene.annotations), None);
    }

    #[test]
    fn derived_instruction_overrides_manual() {
        let scene = annotated_scene(&["green curtains"]);
        assert_eq!(
            effective_instruction(&scene, "ignored manual text"),
            "Box 1: green curtains"
        );
    }

    #[test]
    fn manual_instruction_used_without_notes() {
        let scene = SceneState::new();
        assert_eq!(effective_instruction(&scene, "  add a lamp "), "add a lamp");
    }

    #[test]
    fn framing_matches_scene_shape() {
        let mut scene = SceneState::new();
        let sketch = frame_instruction(&scene, "add a lamp");
        assert!(sketch.contains("sketch"));

        scene.add_layer(Layer::from_image(Arc::new(RgbaImage::new(8, 8)), 0.0, 0.0, 100.0));
        let direct = frame_instruction(&scene, "add a lamp");
        assert!(direct.starts_with("Transform the provided interior image"));

        scene.add_stroke(Stroke::begin(Pos2::new(0.0, 0.0), &BrushSettings::default()));
        let guided = frame_instruction(&scene, "add a lamp");
        assert!(guided.contains("do not render them literally"));
        assert!(guided.contains("add a lamp"));
    }

    #[test]
    fn annotation_removal_clause_appended_when_annotations_exist() {
        let mut scene = annotated_scene(&["red sofa"]);
        scene.add_layer(Layer::from_image(Arc::new(RgbaImage::new(8, 8)), 0.0, 0.0, 100.0));
        let framed = frame_instruction(&scene, "Box 1: red sofa");
        assert!(framed.contains("remove all annotation markings"));

        let plain = frame_instruction(&SceneState::new(), "add a lamp");
        assert!(!plain.contains("remove all annotation markings"));
    }
}
