#![windows_subsystem = "windows"]

use eframe::egui;
use stagefe::logger;
use stagefe::StageFEApp;

fn main() -> Result<(), eframe::Error> {
    // Session log (overwrites the previous session's file).
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_title("StageFE"),
        ..Default::default()
    };

    eframe::run_native(
        "StageFE",
        options,
        Box::new(|cc| Box::new(StageFEApp::new(cc))),
    )
}
