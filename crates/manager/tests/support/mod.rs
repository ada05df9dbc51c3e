#![allow(dead_code)]

use async_trait::async_trait;
use chunkcache_analysis::{
    Analyzer, AnalyzerError, ManuscriptIntelligence, SceneInfo, StructuralStats,
};
use chunkcache_manager::{ChunkEvent, ManagerConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

/// Text that makes [`ScriptedAnalyzer`] fail
pub const POISON: &str = "FAIL";

pub const TWO_SCENES: &str = "Alpha walked here.\n***\nBeta waited there.\n";

/// Counts calls, fails on [`POISON`] (or always when `fail_all` is set)
/// and optionally sleeps to simulate a slow collaborator.
#[derive(Default)]
pub struct ScriptedAnalyzer {
    pub calls: AtomicUsize,
    pub fail_all: AtomicBool,
    pub delay: Duration,
}

impl ScriptedAnalyzer {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(&self, text: &str) -> chunkcache_analysis::Result<ManuscriptIntelligence> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_all.load(Ordering::SeqCst) || text.contains(POISON) {
            return Err(AnalyzerError::failed("refused"));
        }

        let mut raw = ManuscriptIntelligence::default();
        raw.structural.stats = StructuralStats {
            word_count: text.split_whitespace().count(),
            sentence_count: text.matches('.').count(),
            dialogue_ratio: if text.contains('"') { 0.5 } else { 0.0 },
            avg_sentence_length: 12.0,
        };
        raw.structural.scenes.push(SceneInfo {
            tension: 0.25,
            time_marker: None,
        });
        Ok(raw)
    }
}

pub fn quick_config() -> ManagerConfig {
    ManagerConfig {
        edit_debounce_ms: 100,
        processing_interval_ms: 60_000,
        idle_threshold_ms: 50_000,
        max_concurrent_analyses: 2,
    }
}

pub fn drain(rx: &mut Receiver<ChunkEvent>) -> Vec<ChunkEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}
