pub mod config; // 流水线配置参数
pub mod detection; // 检测数据与缓存
pub mod error; // 错误类型
pub mod inference; // 推理网关与检测后端
pub mod input; // 视频帧来源
pub mod kinematics; // 步幅 / 速度指标
pub mod pipeline; // 步幅分析流水线
pub mod tracking; // 单目标跟踪

pub use crate::config::PipelineConfig;
pub use crate::detection::{BBox, Detection, DetectionCache, Point2};
pub use crate::error::{PipelineError, Result, TrackError};
pub use crate::inference::{DetectionBackend, InferenceGateway, Strategy};
pub use crate::input::{Frame, FrameSource};
pub use crate::kinematics::{KinematicSample, StrideSummary, TrackQuality};
pub use crate::pipeline::{StridePipeline, StrideReport};
pub use crate::tracking::{TargetTracker, TrackSample, TrackStatus};

/// 本地时间字符串, 字段之间用 `delimiter` 分隔 (用于文件名)
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_time_string() {
        let plain = gen_time_string("");
        assert!(plain.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(gen_time_string("-").matches('-').count(), 6);
    }
}
