/// 空白帧来源 (用于回放 / 仿真后端, 检测结果与像素无关)
use std::sync::Arc;

use image::RgbImage;

use super::source::{Frame, FrameSource};
use crate::error::{PipelineError, Result};

pub struct BlankVideo {
    identifier: String,
    frame_rate: f64,
    frame_count: usize,
    blank: Arc<RgbImage>,
}

impl BlankVideo {
    pub fn new<S: Into<String>>(
        identifier: S,
        frame_rate: f64,
        frame_count: usize,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            frame_rate,
            frame_count,
            blank: Arc::new(RgbImage::new(width, height)),
        }
    }
}

impl FrameSource for BlankVideo {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn dimensions(&self) -> (u32, u32) {
        self.blank.dimensions()
    }

    fn read_frame(&self, index: usize) -> Result<Frame> {
        if index >= self.frame_count {
            return Err(PipelineError::decode(index, "frame index out of range"));
        }
        Ok(Frame::new(index, self.frame_rate, self.blank.clone()))
    }
}
