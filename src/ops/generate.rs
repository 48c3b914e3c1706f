// ============================================================================
// GENERATION ORCHESTRATOR — rasterize → frame instruction → call service
// ============================================================================
//
// The generation service, the identity/billing check, and the history
// store are external collaborators behind traits; the orchestrator owns
// the sequencing and the single-in-flight invariant. The service call runs
// on a worker thread and reports through an mpsc channel the shell drains
// once per frame.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::canvas::SceneState;
use crate::ops::composite;
use crate::ops::instruction;
use crate::{io, log_err, log_info, log_warn};

/// Credits consumed by one generation call.
pub const GENERATION_COST: u32 = 1;

// ============================================================================
// COLLABORATOR TRAITS
// ============================================================================

/// Opaque handle for the signed-in user, owned by the identity
/// collaborator. The canvas core never inspects it beyond passing it back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
}

/// Identity/billing collaborator: entitlement and balance checks.
pub trait EditorAccess: Send + Sync {
    fn can_use_editor(&self, user: &User) -> bool;
    fn has_sufficient_balance(&self, user: &User, cost: u32) -> bool;
}

/// Error returned by the generation service; `code` is one of the
/// service's categorized strings (`auth`, `insufficient_balance`,
/// `session_expired`, anything else).
#[derive(Clone, Debug)]
pub struct ServiceError {
    pub code: String,
    pub message: String,
}

/// The external generative-image service, treated as an opaque function:
/// instruction + base64 PNG images in, base64 raster out.
pub trait GenerationService: Send + Sync {
    fn generate(&self, instruction: &str, images: &[String]) -> Result<String, ServiceError>;
}

/// One completed generation, as appended to the external history store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub source_composite: String,
    pub instruction: String,
    pub result_image: String,
    pub timestamp: u64,
}

/// Append-only history collaborator. The core never reads it back.
pub trait HistoryStore: Send + Sync {
    fn append(&self, record: GenerationRecord);
}

// ============================================================================
// ERRORS
// ============================================================================

/// Everything that can stop a generation, each with one user-facing
/// message. The first three wrap the service's categorized failures; the
/// rest are local precondition rejections.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerateError {
    NotAuthenticated,
    InsufficientBalance,
    SessionExpired,
    Service(String),
    NothingToGenerate,
    MissingInstruction,
    RequestInFlight,
}

impl std::fmt::Display for GenerateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerateError::NotAuthenticated => {
                write!(f, "Please sign in to use the editor.")
            }
            GenerateError::InsufficientBalance => {
                write!(f, "Not enough credits — top up to keep generating.")
            }
            GenerateError::SessionExpired => {
                write!(f, "Your session expired. Please sign in again.")
            }
            GenerateError::Service(msg) => {
                write!(f, "Generation failed: {}", msg)
            }
            GenerateError::NothingToGenerate => {
                write!(f, "Place an image or draw something first.")
            }
            GenerateError::MissingInstruction => {
                write!(f, "Describe what to generate first.")
            }
            GenerateError::RequestInFlight => {
                write!(f, "A generation is already running.")
            }
        }
    }
}

/// Map a service error code onto the user-facing categories. Unknown
/// codes collapse into the generic bucket.
pub fn classify_service_error(err: &ServiceError) -> GenerateError {
    match err.code.as_str() {
        "auth" => GenerateError::NotAuthenticated,
        "insufficient_balance" => GenerateError::InsufficientBalance,
        "session_expired" => GenerateError::SessionExpired,
        _ => GenerateError::Service(err.message.clone()),
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// A finished generation, delivered back to the shell.
#[derive(Clone, Debug)]
pub struct GenerationOutcome {
    /// Base64 raster returned by the service.
    pub result_image: String,
    /// Scene epoch captured at submit time; lets the drain path flag
    /// results that arrive after a scene clear.
    pub epoch: u64,
}

type GenerationMessage = (u64, Result<String, GenerateError>);

pub struct Orchestrator {
    access: Arc<dyn EditorAccess>,
    service: Arc<dyn GenerationService>,
    history: Arc<dyn HistoryStore>,
    sender: mpsc::Sender<GenerationMessage>,
    receiver: mpsc::Receiver<GenerationMessage>,
    in_flight: bool,
}

impl Orchestrator {
    pub fn new(
        access: Arc<dyn EditorAccess>,
        service: Arc<dyn GenerationService>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            access,
            service,
            history,
            sender,
            receiver,
            in_flight: false,
        }
    }

    /// True while a request is outstanding; the shell disables the
    /// generate action and shows the blocking overlay.
    pub fn is_generating(&self) -> bool {
        self.in_flight
    }

    /// Kick off one generation. Checks preconditions synchronously, then
    /// rasterizes the scene and hands the service call to a worker thread.
    /// Exactly one request can be in flight.
    pub fn start(
        &mut self,
        scene: &SceneState,
        user: &User,
        manual_instruction: &str,
        canvas_w: u32,
        canvas_h: u32,
    ) -> Result<(), GenerateError> {
        if self.in_flight {
            return Err(GenerateError::RequestInFlight);
        }
        if !self.access.can_use_editor(user) {
            return Err(GenerateError::NotAuthenticated);
        }
        if !self.access.has_sufficient_balance(user, GENERATION_COST) {
            return Err(GenerateError::InsufficientBalance);
        }
        if scene.layers.is_empty() && scene.strokes.is_empty() {
            return Err(GenerateError::NothingToGenerate);
        }
        let instruction = instruction::effective_instruction(scene, manual_instruction);
        if instruction.is_empty() {
            return Err(GenerateError::MissingInstruction);
        }

        let raster = composite::rasterize(scene, canvas_w, canvas_h);
        let composite_b64 = io::encode_png_base64(&raster).map_err(GenerateError::Service)?;
        let framed = instruction::frame_instruction(scene, &instruction);
        log_info!(
            "generation submitted: {}x{} composite, {} layers, {} strokes, {} annotations",
            raster.width(),
            raster.height(),
            scene.layers.len(),
            scene.strokes.len(),
            scene.annotations.len()
        );

        self.in_flight = true;
        let epoch = scene.epoch;
        let service = Arc::clone(&self.service);
        let history = Arc::clone(&self.history);
        let sender = self.sender.clone();

        std::thread::spawn(move || {
            let outcome = match service.generate(&framed, &[composite_b64.clone()]) {
                Ok(result_image) => {
                    // One record per successful call, appended before the
                    // shell ever sees the result — success and history are
                    // atomic from the caller's point of view.
                    history.append(GenerationRecord {
                        source_composite: composite_b64,
                        instruction: framed,
                        result_image: result_image.clone(),
                        timestamp: unix_timestamp(),
                    });
                    Ok(result_image)
                }
                Err(err) => {
                    log_err!("generation service error [{}]: {}", err.code, err.message);
                    Err(classify_service_error(&err))
                }
            };
            // Receiver gone means the app is shutting down; nothing to do.
            let _ = sender.send((epoch, outcome));
        });
        Ok(())
    }

    /// Drain the worker channel. Returns at most one finished generation
    /// per call; the shell invokes this every frame.
    pub fn poll(&mut self, scene: &SceneState) -> Option<Result<GenerationOutcome, GenerateError>> {
        match self.receiver.try_recv() {
            Ok((epoch, outcome)) => {
                self.in_flight = false;
                if epoch != scene.epoch {
                    // No cancellation exists, so a result can outlive the
                    // scene it was made from. It is already in history;
                    // surface the mismatch in the log.
                    log_warn!(
                        "generation result arrived for a cleared scene (epoch {} != {})",
                        epoch,
                        scene.epoch
                    );
                }
                Some(outcome.map(|result_image| GenerationOutcome { result_image, epoch }))
            }
            Err(_) => None,
        }
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{AnnotationShape, BrushSettings, Layer, Stroke};
    use egui::Pos2;
    use image::RgbaImage;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StubAccess {
        entitled: bool,
        balance: bool,
    }

    impl EditorAccess for StubAccess {
        fn can_use_editor(&self, _user: &User) -> bool {
            self.entitled
        }
        fn has_sufficient_balance(&self, _user: &User, _cost: u32) -> bool {
            self.balance
        }
    }

    struct StubService {
        response: Result<String, ServiceError>,
        delay: Duration,
        calls: Mutex<Vec<String>>,
    }

    impl StubService {
        fn ok(result: &str) -> Self {
            Self {
                response: Ok(result.to_string()),
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(code: &str) -> Self {
            Self {
                response: Err(ServiceError {
                    code: code.to_string(),
                    message: "upstream rejected the request".to_string(),
                }),
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl GenerationService for StubService {
        fn generate(&self, instruction: &str, _images: &[String]) -> Result<String, ServiceError> {
            self.calls.lock().unwrap().push(instruction.to_string());
            std::thread::sleep(self.delay);
            self.response.clone()
        }
    }

    #[derive(Default)]
    struct MemoryHistory {
        records: Mutex<Vec<GenerationRecord>>,
    }

    impl HistoryStore for MemoryHistory {
        fn append(&self, record: GenerationRecord) {
            self.records.lock().unwrap().push(record);
        }
    }

    fn user() -> User {
        User { id: "user-1".to_string() }
    }

    fn scene_with_layer() -> SceneState {
        let mut scene = SceneState::new();
        scene.add_layer(Layer::from_image(
            Arc::new(RgbaImage::new(16, 16)),
            0.0,
            0.0,
            100.0,
        ));
        scene
    }

    /// Poll until the worker reports, with a hard timeout.
    fn wait_for(
        orch: &mut Orchestrator,
        scene: &SceneState,
    ) -> Result<GenerationOutcome, GenerateError> {
        for _ in 0..200 {
            if let Some(outcome) = orch.poll(scene) {
                return outcome;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("generation never completed");
    }

    #[test]
    fn successful_generation_appends_one_record() {
        let history = Arc::new(MemoryHistory::default());
        let mut orch = Orchestrator::new(
            Arc::new(StubAccess { entitled: true, balance: true }),
            Arc::new(StubService::ok("RESULT_B64")),
            history.clone(),
        );
        let scene = scene_with_layer();

        orch.start(&scene, &user(), "add a lamp", 400, 300).unwrap();
        assert!(orch.is_generating());

        let outcome = wait_for(&mut orch, &scene).unwrap();
        assert_eq!(outcome.result_image, "RESULT_B64");
        assert!(!orch.is_generating());

        let records = history.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].result_image, "RESULT_B64");
        assert!(records[0].instruction.contains("add a lamp"));
        assert!(!records[0].source_composite.is_empty());
    }

    #[test]
    fn failed_generation_appends_nothing() {
        let history = Arc::new(MemoryHistory::default());
        let mut orch = Orchestrator::new(
            Arc::new(StubAccess { entitled: true, balance: true }),
            Arc::new(StubService::failing("session_expired")),
            history.clone(),
        );
        let scene = scene_with_layer();

        orch.start(&scene, &user(), "add a lamp", 400, 300).unwrap();
        let err = wait_for(&mut orch, &scene).unwrap_err();
        assert_eq!(err, GenerateError::SessionExpired);
        assert!(history.records.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_error_code_maps_to_generic_message() {
        let err = classify_service_error(&ServiceError {
            code: "quota_exceeded".to_string(),
            message: "quota exceeded".to_string(),
        });
        assert_eq!(err, GenerateError::Service("quota exceeded".to_string()));
        assert!(err.to_string().contains("Generation failed"));
    }

    #[test]
    fn preconditions_are_checked_before_the_call() {
        let service = Arc::new(StubService::ok("X"));
        let mut orch = Orchestrator::new(
            Arc::new(StubAccess { entitled: false, balance: true }),
            service.clone(),
            Arc::new(MemoryHistory::default()),
        );
        let scene = scene_with_layer();
        assert_eq!(
            orch.start(&scene, &user(), "add a lamp", 400, 300),
            Err(GenerateError::NotAuthenticated)
        );

        let mut orch = Orchestrator::new(
            Arc::new(StubAccess { entitled: true, balance: false }),
            service.clone(),
            Arc::new(MemoryHistory::default()),
        );
        assert_eq!(
            orch.start(&scene, &user(), "add a lamp", 400, 300),
            Err(GenerateError::InsufficientBalance)
        );

        let mut orch = Orchestrator::new(
            Arc::new(StubAccess { entitled: true, balance: true }),
            service.clone(),
            Arc::new(MemoryHistory::default()),
        );
        let empty = SceneState::new();
        assert_eq!(
            orch.start(&empty, &user(), "add a lamp", 400, 300),
            Err(GenerateError::NothingToGenerate)
        );
        assert_eq!(
            orch.start(&scene, &user(), "   ", 400, 300),
            Err(GenerateError::MissingInstruction)
        );

        // None of the rejected starts reached the service.
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn second_start_while_in_flight_is_rejected() {
        let mut orch = Orchestrator::new(
            Arc::new(StubAccess { entitled: true, balance: true }),
            Arc::new(StubService {
                response: Ok("X".to_string()),
                delay: Duration::from_millis(150),
                calls: Mutex::new(Vec::new()),
            }),
            Arc::new(MemoryHistory::default()),
        );
        let scene = scene_with_layer();

        orch.start(&scene, &user(), "add a lamp", 400, 300).unwrap();
        assert_eq!(
            orch.start(&scene, &user(), "again", 400, 300),
            Err(GenerateError::RequestInFlight)
        );
        wait_for(&mut orch, &scene).unwrap();
        // Idle again: a new request may start.
        assert!(orch.start(&scene, &user(), "again", 400, 300).is_ok());
        wait_for(&mut orch, &scene).unwrap();
    }

    #[test]
    fn strokes_only_scene_generates_from_canvas_capture() {
        let history = Arc::new(MemoryHistory::default());
        let mut orch = Orchestrator::new(
            Arc::new(StubAccess { entitled: true, balance: true }),
            Arc::new(StubService::ok("OUT")),
            history.clone(),
        );
        let mut scene = SceneState::new();
        scene.add_stroke(Stroke::begin(Pos2::new(5.0, 5.0), &BrushSettings::default()));

        orch.start(&scene, &user(), "a cozy reading nook", 320, 240).unwrap();
        let outcome = wait_for(&mut orch, &scene);
        assert!(outcome.is_ok());
        let records = history.records.lock().unwrap();
        let raster = crate::io::decode_base64_image(&records[0].source_composite).unwrap();
        assert_eq!(raster.dimensions(), (320, 240));
        assert!(records[0].instruction.contains("sketch"));
    }

    #[test]
    fn annotation_notes_override_manual_instruction() {
        let history = Arc::new(MemoryHistory::default());
        let mut orch = Orchestrator::new(
            Arc::new(StubAccess { entitled: true, balance: true }),
            Arc::new(StubService::ok("OUT")),
            history.clone(),
        );
        let mut scene = scene_with_layer();
        let id = scene
            .add_annotation(AnnotationShape::Rectangle, 10.0, 10.0, 40.0, 40.0)
            .unwrap();
        scene.set_annotation_note(id, "red sofa".to_string());

        orch.start(&scene, &user(), "typed by hand", 400, 300).unwrap();
        wait_for(&mut orch, &scene).unwrap();
        let records = history.records.lock().unwrap();
        assert!(records[0].instruction.contains("Box 1: red sofa"));
        assert!(!records[0].instruction.contains("typed by hand"));
        assert!(records[0].instruction.contains("remove all annotation markings"));
    }

    #[test]
    fn stale_result_after_clear_is_still_appended() {
        let history = Arc::new(MemoryHistory::default());
        let mut orch = Orchestrator::new(
            Arc::new(StubAccess { entitled: true, balance: true }),
            Arc::new(StubService {
                response: Ok("LATE".to_string()),
                delay: Duration::from_millis(60),
                calls: Mutex::new(Vec::new()),
            }),
            history.clone(),
        );
        let mut scene = scene_with_layer();

        orch.start(&scene, &user(), "add a lamp", 400, 300).unwrap();
        scene.clear();

        let outcome = wait_for(&mut orch, &scene).unwrap();
        assert_ne!(outcome.epoch, scene.epoch);
        assert_eq!(history.records.lock().unwrap().len(), 1);
    }
}
