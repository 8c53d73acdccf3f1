#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;

use anyhow::{Context, Result};
use replay_core::{load_inspector_config_from_env, InspectorConfig, ReplayPaths};
use telemetry_proto::{encode_tracker_stream, Side, TrackerRecord};

static INIT: Once = Once::new();
static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

pub const EPSILON: f64 = 1e-12;

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_inspector_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test inspector config at {}",
            config_path.display()
        );

        std::env::set_var("INSPECTOR_CONFIG_PATH", &config_path);
    });
}

/// Fixture config: 4x4 board, no reply delay.
pub fn test_config() -> InspectorConfig {
    ensure_test_config();
    load_inspector_config_from_env()
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// JSON for one frame with a turn index and score.
pub fn frame_json(turn: u32, blue: i32, red: i32) -> String {
    format!(r#"{{"step": [{turn}], "match_step": {turn}, "points": [{blue}, {red}]}}"#)
}

pub fn replay_document(frames: &[String]) -> String {
    format!(r#"{{"data": [{}]}}"#, frames.join(","))
}

/// Scratch directory holding one replay's files; removed on drop.
pub struct ReplayDir {
    root: PathBuf,
    base: String,
}

impl ReplayDir {
    pub fn new(name: &str) -> Result<Self> {
        let root = std::env::temp_dir().join(format!(
            "match_inspector_{}_{}_{}",
            name,
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create {}", root.display()))?;
        Ok(Self {
            root,
            base: name.to_string(),
        })
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(format!("{}.json", self.base))
    }

    pub fn write_state(&self, frames: &[String]) -> Result<PathBuf> {
        let path = self.state_path();
        fs::write(&path, replay_document(frames))
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn write_tracker(&self, side: Side, records: &[TrackerRecord]) -> Result<PathBuf> {
        let path = ReplayPaths::tracker_path(&self.state_path(), side);
        fs::write(&path, encode_tracker_stream(records))
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for ReplayDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}
