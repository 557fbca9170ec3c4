/// 检测后端统一接口
///
/// 检测模型本身在流水线之外, 这里只约定请求 / 响应:
/// 请求 = 一帧图像 (或整段视频), 响应 = 零个或多个 [`Detection`]。
///
/// ## 核心流程
/// ```text
/// Frame ──detect_frame──▶ Vec<Detection>          (逐帧, 同步)
/// FrameSource ──detect_video──▶ Vec<Detection>    (批量, 可选)
/// ```
use anyhow::Result;

use crate::detection::Detection;
use crate::input::{Frame, FrameSource};

pub trait DetectionBackend: Send + Sync {
    /// 后端名称 (日志用)
    fn name(&self) -> &str;

    /// 单帧检测
    fn detect_frame(&self, frame: &Frame) -> Result<Vec<Detection>>;

    /// 是否支持整段视频的批量检测
    fn supports_batch(&self) -> bool {
        false
    }

    /// 批量检测整段视频, 按 `max_rate` 采样
    ///
    /// 默认实现返回错误, 网关据此回退到逐帧检测。
    fn detect_video(&self, source: &dyn FrameSource, max_rate: f64) -> Result<Vec<Detection>> {
        let _ = (source, max_rate);
        anyhow::bail!("{} does not support batch video inference", self.name())
    }
}
