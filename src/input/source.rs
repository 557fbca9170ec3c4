//! 视频帧来源 (Frame source contract)
//! 解码由外部媒体组件完成, 流水线只按帧号读取已解码的帧。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use image::RgbImage;

use crate::error::Result;

/// 已解码帧
#[derive(Clone)]
pub struct Frame {
    pub index: usize,
    /// 秒 (index / fps)
    pub timestamp: f64,
    pub image: Arc<RgbImage>, // 使用Arc共享像素数据,避免复制
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("timestamp", &self.timestamp)
            .field("size", &format_args!("{}x{}", self.width(), self.height()))
            .finish()
    }
}

impl Frame {
    pub fn new(index: usize, frame_rate: f64, image: Arc<RgbImage>) -> Self {
        let timestamp = if frame_rate > 0.0 {
            index as f64 / frame_rate
        } else {
            0.0
        };
        Self {
            index,
            timestamp,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 帧指纹: 帧号 + 尺寸 + 像素
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.index.hash(&mut hasher);
        self.image.width().hash(&mut hasher);
        self.image.height().hash(&mut hasher);
        self.image.as_raw().hash(&mut hasher);
        hasher.finish()
    }

    /// 缓存键
    pub fn cache_key(&self) -> String {
        format!("frame_{:016x}", self.fingerprint())
    }
}

/// 外部媒体组件的帧读取接口
///
/// `read_frame` 失败时返回 `PipelineError::DecodeFailure`, 这会终止本次分析。
pub trait FrameSource: Send + Sync {
    /// 视频标识 (用于缓存键)
    fn identifier(&self) -> &str;

    fn frame_rate(&self) -> f64;

    fn frame_count(&self) -> usize;

    /// (width, height)
    fn dimensions(&self) -> (u32, u32);

    fn read_frame(&self, index: usize) -> Result<Frame>;
}

/// 采样步长: max(1, floor(fps / max_rate))
pub fn sampling_step(frame_rate: f64, max_rate: f64) -> usize {
    if frame_rate <= 0.0 || max_rate <= 0.0 || !frame_rate.is_finite() {
        return 1;
    }
    ((frame_rate / max_rate).floor() as usize).max(1)
}

/// 采样帧号: 0, step, 2·step, ...
pub fn sampled_indices(frame_count: usize, step: usize) -> impl Iterator<Item = usize> {
    (0..frame_count).step_by(step.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_step() {
        assert_eq!(sampling_step(30.0, 30.0), 1);
        assert_eq!(sampling_step(60.0, 30.0), 2);
        assert_eq!(sampling_step(30.0, 10.0), 3);
        assert_eq!(sampling_step(25.0, 30.0), 1);
        assert_eq!(sampling_step(59.94, 30.0), 1);
        assert_eq!(sampling_step(30.0, 0.0), 1);
    }

    #[test]
    fn test_sampled_indices() {
        let idx: Vec<_> = sampled_indices(10, 3).collect();
        assert_eq!(idx, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_fingerprint_distinguishes_frames() {
        let image = Arc::new(RgbImage::new(4, 4));
        let a = Frame::new(0, 30.0, image.clone());
        let b = Frame::new(1, 30.0, image.clone());
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), Frame::new(0, 30.0, image).cache_key());
        assert!((b.timestamp - 1.0 / 30.0).abs() < 1e-9);
    }
}
