//! End-to-end editor scenarios: scene editing through the interaction
//! controller, compositing, and the full generate round trip against
//! stub collaborators.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use egui::Pos2;
use image::{Rgba, RgbaImage};

use stagefe::canvas::{AnnotationShape, BrushSettings, Layer, SceneState, Stroke, Tool};
use stagefe::gesture::InteractionController;
use stagefe::io;
use stagefe::ops::generate::{
    EditorAccess, GenerationRecord, GenerationService, HistoryStore, Orchestrator, ServiceError,
    User,
};

// ---------------------------------------------------------------------------
// Stub collaborators
// ---------------------------------------------------------------------------

struct AllowAll;

impl EditorAccess for AllowAll {
    fn can_use_editor(&self, _user: &User) -> bool {
        true
    }
    fn has_sufficient_balance(&self, _user: &User, _cost: u32) -> bool {
        true
    }
}

struct FixedService(&'static str);

impl GenerationService for FixedService {
    fn generate(&self, _instruction: &str, _images: &[String]) -> Result<String, ServiceError> {
        Ok(self.0.to_string())
    }
}

#[derive(Default)]
struct RecordingHistory {
    records: Mutex<Vec<GenerationRecord>>,
}

impl HistoryStore for RecordingHistory {
    fn append(&self, record: GenerationRecord) {
        self.records.lock().unwrap().push(record);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn solid_layer(w: u32, h: u32, rgba: [u8; 4], x: f32, y: f32, dw: f32, dh: f32) -> Layer {
    let img = RgbaImage::from_pixel(w, h, Rgba(rgba));
    let mut layer = Layer::from_image(Arc::new(img), x, y, f32::MAX);
    layer.width = dw;
    layer.height = dh;
    layer
}

fn wait_for_generation(
    orch: &mut Orchestrator,
    scene: &SceneState,
) -> Result<stagefe::ops::generate::GenerationOutcome, stagefe::ops::generate::GenerateError> {
    for _ in 0..200 {
        if let Some(outcome) = orch.poll(scene) {
            return outcome;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("generation never completed");
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn generate_projects_scene_into_base_resolution() {
    // Base 800×600 native shown at 400×300, one overlay at display
    // (50, 50) sized 100×100, one stroke, instruction "add a lamp".
    let mut scene = SceneState::new();
    scene.add_layer(solid_layer(800, 600, [10, 10, 10, 255], 0.0, 0.0, 400.0, 300.0));
    scene.add_layer(solid_layer(100, 100, [0, 255, 0, 255], 50.0, 50.0, 100.0, 100.0));
    let mut stroke = Stroke::begin(Pos2::new(300.0, 60.0), &BrushSettings::default());
    stroke.points.push(Pos2::new(360.0, 60.0));
    scene.add_stroke(stroke);

    let history = Arc::new(RecordingHistory::default());
    let mut orch = Orchestrator::new(
        Arc::new(AllowAll),
        Arc::new(FixedService("GENERATED")),
        history.clone(),
    );
    let user = User { id: "u".to_string() };

    orch.start(&scene, &user, "add a lamp", 960, 640).unwrap();
    let outcome = wait_for_generation(&mut orch, &scene).unwrap();
    assert_eq!(outcome.result_image, "GENERATED");

    let records = history.records.lock().unwrap();
    assert_eq!(records.len(), 1);

    // The submitted composite is the base layer's native resolution, with
    // the overlay re-projected from display into native coordinates.
    let composite = io::decode_base64_image(&records[0].source_composite).unwrap();
    assert_eq!(composite.dimensions(), (800, 600));
    let p = composite.get_pixel(200, 200).0;
    assert!(p[1] >= 250 && p[0] <= 4, "overlay missing at native (200, 200): {p:?}");
    assert_eq!(composite.get_pixel(80, 80).0, [10, 10, 10, 255]);
    // The stroke projected to native coordinates too (display y=60 → 120),
    // in the default brush color.
    assert_eq!(composite.get_pixel(660, 120).0, [220, 50, 50, 255]);

    // Guide framing, because overlays and strokes sit on the base.
    assert!(records[0].instruction.contains("add a lamp"));
    assert!(records[0].instruction.contains("do not render them literally"));
}

#[test]
fn resize_gesture_end_to_end() {
    // 200×100 layer, bottom-right handle dragged 50 to the right:
    // 250×125, origin unchanged.
    let mut scene = SceneState::new();
    scene.add_layer(solid_layer(200, 100, [1, 2, 3, 255], 20.0, 30.0, 200.0, 100.0));
    let id = scene.layers[0].id;
    scene.select_layer(id);
    let mut ctl = InteractionController::new();

    ctl.pointer_down(&mut scene, Pos2::new(220.0, 130.0));
    ctl.pointer_move(&mut scene, Pos2::new(270.0, 130.0));
    ctl.pointer_up(&mut scene);

    let layer = scene.layer(id).unwrap();
    let aspect = layer.width / layer.height;
    assert!((layer.width - 250.0).abs() < 1e-3);
    assert!((layer.height - 125.0).abs() < 1e-3);
    assert!((aspect - 2.0).abs() < 1e-4);
    assert_eq!((layer.x, layer.y), (20.0, 30.0));
}

#[test]
fn annotation_notes_become_the_instruction() {
    let mut scene = SceneState::new();
    scene.add_layer(solid_layer(64, 64, [0, 0, 0, 255], 0.0, 0.0, 64.0, 64.0));
    let a = scene.add_annotation(AnnotationShape::Rectangle, 5.0, 5.0, 20.0, 20.0).unwrap();
    let _b = scene.add_annotation(AnnotationShape::Rectangle, 30.0, 5.0, 20.0, 20.0).unwrap();
    let c = scene.add_annotation(AnnotationShape::Ellipse, 5.0, 30.0, 20.0, 20.0).unwrap();
    scene.set_annotation_note(a, "red sofa".to_string());
    scene.set_annotation_note(c, "blue rug".to_string());

    let history = Arc::new(RecordingHistory::default());
    let mut orch = Orchestrator::new(
        Arc::new(AllowAll),
        Arc::new(FixedService("OUT")),
        history.clone(),
    );
    let user = User { id: "u".to_string() };

    // The manual instruction is overridden by the region notes.
    orch.start(&scene, &user, "manual text", 640, 480).unwrap();
    wait_for_generation(&mut orch, &scene).unwrap();

    let records = history.records.lock().unwrap();
    assert!(records[0].instruction.contains("Box 1: red sofa, Box 3: blue rug"));
    assert!(!records[0].instruction.contains("manual text"));
    assert!(records[0].instruction.contains("remove all annotation markings"));
}

#[test]
fn annotation_cap_holds_through_gestures() {
    let mut scene = SceneState::new();
    scene.tool = Tool::Annotate;
    let mut ctl = InteractionController::new();

    for i in 0..12 {
        let x = 10.0 + (i as f32) * 5.0;
        ctl.pointer_down(&mut scene, Pos2::new(x, 10.0));
        ctl.pointer_move(&mut scene, Pos2::new(x + 40.0, 60.0));
        ctl.pointer_up(&mut scene);
    }

    assert_eq!(scene.annotations.len(), 9);
    let labels: Vec<&str> = scene.annotations.iter().map(|a| a.label.as_str()).collect();
    assert_eq!(labels[0], "Box 1");
    assert_eq!(labels[8], "Box 9");
}

#[test]
fn draw_undo_and_delete_flow() {
    let mut scene = SceneState::new();
    let mut ctl = InteractionController::new();

    // Draw two strokes.
    scene.tool = Tool::Draw;
    ctl.pointer_down(&mut scene, Pos2::new(10.0, 10.0));
    ctl.pointer_move(&mut scene, Pos2::new(40.0, 40.0));
    ctl.pointer_up(&mut scene);
    ctl.pointer_down(&mut scene, Pos2::new(100.0, 10.0));
    ctl.pointer_move(&mut scene, Pos2::new(120.0, 30.0));
    ctl.pointer_up(&mut scene);
    assert_eq!(scene.strokes.len(), 2);

    // Undo removes only the newest stroke.
    ctl.key_undo(&mut scene);
    assert_eq!(scene.strokes.len(), 1);
    assert_eq!(scene.strokes[0].points[0], Pos2::new(10.0, 10.0));

    // Select the remaining stroke and delete it.
    scene.tool = Tool::Select;
    ctl.pointer_down(&mut scene, Pos2::new(10.0, 10.0));
    ctl.pointer_up(&mut scene);
    ctl.key_delete(&mut scene);
    assert!(scene.strokes.is_empty());
    assert_eq!(scene.selection, None);
}

#[test]
fn single_layer_scene_uses_direct_transform_framing() {
    let mut scene = SceneState::new();
    scene.add_layer(solid_layer(32, 32, [7, 7, 7, 255], 0.0, 0.0, 32.0, 32.0));

    let history = Arc::new(RecordingHistory::default());
    let mut orch = Orchestrator::new(
        Arc::new(AllowAll),
        Arc::new(FixedService("OUT")),
        history.clone(),
    );
    let user = User { id: "u".to_string() };
    orch.start(&scene, &user, "make it a loft", 640, 480).unwrap();
    wait_for_generation(&mut orch, &scene).unwrap();

    let records = history.records.lock().unwrap();
    assert!(records[0]
        .instruction
        .starts_with("Transform the provided interior image"));
    assert!(!records[0].instruction.contains("do not render them literally"));
}
