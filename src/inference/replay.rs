/// 回放后端: 读取录制的检测服务返回 (JSON)
///
/// 批量调用返回整段视频的检测, 逐帧调用返回对应帧的切片。
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use super::backend::DetectionBackend;
use crate::detection::{parse_detections, ClassFilter, Detection, FrameContext};
use crate::input::{sampled_indices, sampling_step, Frame, FrameSource};

pub struct ReplayBackend {
    detections: Vec<Detection>,
}

impl ReplayBackend {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    /// 从已解析的服务返回构造, 时间戳按 `frame_rate` 换算帧号
    pub fn from_value(payload: &Value, frame_rate: f64) -> Self {
        let detections =
            parse_detections(payload, FrameContext::video(frame_rate), &ClassFilter::allow_all());
        log::info!("📂 回放检测: {} 条", detections.len());
        Self::new(detections)
    }

    pub fn from_file<P: AsRef<Path>>(path: P, frame_rate: f64) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read detections from {}", path.display()))?;
        let payload: Value = serde_json::from_str(&text)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        Ok(Self::from_value(&payload, frame_rate))
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

impl DetectionBackend for ReplayBackend {
    fn name(&self) -> &str {
        "replay"
    }

    fn detect_frame(&self, frame: &Frame) -> Result<Vec<Detection>> {
        Ok(self
            .detections
            .iter()
            .filter(|d| d.frame_index() == frame.index)
            .cloned()
            .collect())
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn detect_video(&self, source: &dyn FrameSource, max_rate: f64) -> Result<Vec<Detection>> {
        let step = sampling_step(source.frame_rate(), max_rate);
        let last = sampled_indices(source.frame_count(), step).last();
        Ok(match last {
            // 超出视频范围的帧不返回
            Some(last) => self
                .detections
                .iter()
                .filter(|d| d.frame_index() < last + step)
                .cloned()
                .collect(),
            None => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::BlankVideo;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "predictions": [
                {"class": "player", "x": 100.0, "y": 100.0, "width": 40.0, "height": 80.0, "frame": 0},
                {"class": "player", "x": 105.0, "y": 100.0, "width": 40.0, "height": 80.0, "frame": 1},
                {"class": "referee", "x": 300.0, "y": 100.0, "width": 40.0, "height": 80.0, "frame": 1},
                {"class": "player", "x": 110.0, "y": 100.0, "width": 40.0, "height": 80.0, "frame": 9}
            ]
        })
    }

    #[test]
    fn test_frame_slice() {
        let backend = ReplayBackend::from_value(&payload(), 30.0);
        assert_eq!(backend.len(), 4);

        let video = BlankVideo::new("clip", 30.0, 5, 8, 8);
        let frame = video.read_frame(1).unwrap();
        let found = backend.detect_frame(&frame).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|d| d.frame_index() == 1));
    }

    #[test]
    fn test_video_drops_frames_past_end() {
        let backend = ReplayBackend::from_value(&payload(), 30.0);
        let video = BlankVideo::new("clip", 30.0, 5, 8, 8);
        assert!(backend.supports_batch());
        let all = backend.detect_video(&video, 30.0).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response.json");
        std::fs::write(&path, payload().to_string()).unwrap();
        let backend = ReplayBackend::from_file(&path, 30.0).unwrap();
        assert_eq!(backend.len(), 4);

        assert!(ReplayBackend::from_file(dir.path().join("missing.json"), 30.0).is_err());
    }
}
