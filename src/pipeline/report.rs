/// 分析报告 (JSON)
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::inference::{GatewayStats, Strategy};
use crate::kinematics::{KinematicSample, StrideSummary, TrackQuality};
use crate::tracking::TrackSample;

#[derive(Debug, Clone, Serialize)]
pub struct StrideReport {
    pub video: String,
    pub frame_rate: f64,
    pub sampling_step: usize,
    pub strategy: Strategy,
    pub history: Vec<TrackSample>,
    pub samples: Vec<KinematicSample>,
    pub summary: StrideSummary,
    pub quality: TrackQuality,
    pub gateway: GatewayStats,
}

impl StrideReport {
    /// 写入 `<dir>/stride_report_<时间>.json`, 返回文件路径
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("stride_report_{}.json", crate::gen_time_string("")));
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        log::info!("💾 报告已保存: {}", path.display());
        Ok(path)
    }
}
