#![allow(dead_code)]

use std::cell::RefCell;
use std::sync::Once;
use log::{Level, LevelFilter, Log, Metadata, Record};

use chocobar::loader::{AssetEvent, GltfSummary, LoadedModel};
use three_d::CpuModel;


thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
}

/// Keeps records per test thread so tests can run in parallel
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|r| r.borrow_mut().push((record.level(), record.args().to_string())));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();


pub fn capture_logs() {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|r| r.borrow_mut().clear());
}

pub fn take_logs() -> Vec<(Level, String)> {
    RECORDS.with(|r| std::mem::take(&mut *r.borrow_mut()))
}

pub fn logged(level: Level, needle: &str) -> bool {
    RECORDS.with(|r| r.borrow().iter().any(|(l, m)| *l == level && m.contains(needle)))
}


/// Block glyphs for a handful of characters; everything else falls back to '?'
pub const FONT: &str = include_str!("../fixtures/blocks.typeface.json");


/// Absolute path of a file under tests/fixtures
pub fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}


pub fn model_loaded(path: &str) -> AssetEvent {
    AssetEvent::Model {
        path: path.to_string(),
        result: Ok(LoadedModel {
            model: CpuModel {
                name: "chocolateBar".to_string(),
                geometries: Vec::new(),
                materials: Vec::new(),
            },
            summary: GltfSummary {
                version: "2.0".to_string(),
                meshes: 1,
                nodes: 1,
                extensions_used: vec!["KHR_materials_unlit".to_string()],
                requires_draco: false,
            },
        }),
    }
}
