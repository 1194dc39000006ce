use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[ts(export, export_to = "performance.ts")]
pub struct BroadcastStats {
    pub active_clients: usize,
    #[ts(type = "number")]
    pub total_frames: u64,
    #[ts(type = "number")]
    pub emissions_sent: u64,
    #[ts(type = "number")]
    pub emissions_skipped: u64,
    /// Share of frames not pushed, in percent.
    pub efficiency_percent: f64,
    pub led_count: usize,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[ts(export, export_to = "performance.ts")]
pub struct FrameTiming {
    #[ts(type = "number")]
    pub frames_rendered: u64,
    #[ts(type = "number")]
    pub window_frames: u64,
    pub average_frame_ms: f64,
    pub max_frame_ms: f64,
    pub fps: f64,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "performance.ts")]
pub struct PerformanceResponse {
    pub websocket: BroadcastStats,
    pub render: FrameTiming,
}
