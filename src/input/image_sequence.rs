/// 图片序列帧来源 (Directory of pre-decoded still frames)
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::source::{Frame, FrameSource};
use crate::error::{PipelineError, Result};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// 目录中的帧按文件名排序, 文件名顺序即帧号顺序
pub struct ImageSequence {
    identifier: String,
    frame_rate: f64,
    paths: Vec<PathBuf>,
    dimensions: (u32, u32),
}

impl ImageSequence {
    pub fn open<P: AsRef<Path>>(dir: P, frame_rate: f64) -> Result<Self> {
        let dir = dir.as_ref();
        if frame_rate <= 0.0 {
            return Err(PipelineError::config(format!(
                "frame rate must be positive, got {}",
                frame_rate
            )));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let first = paths.first().ok_or_else(|| {
            PipelineError::config(format!("no image frames found in {}", dir.display()))
        })?;
        let dimensions =
            image::image_dimensions(first).map_err(|e| PipelineError::decode(0, e.to_string()))?;

        log::info!(
            "📹 图片序列: {} 帧, {}x{}, {:.1} FPS ({})",
            paths.len(),
            dimensions.0,
            dimensions.1,
            frame_rate,
            dir.display()
        );

        Ok(Self {
            identifier: dir.display().to_string(),
            frame_rate,
            paths,
            dimensions,
        })
    }
}

impl FrameSource for ImageSequence {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_count(&self) -> usize {
        self.paths.len()
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn read_frame(&self, index: usize) -> Result<Frame> {
        let path = self
            .paths
            .get(index)
            .ok_or_else(|| PipelineError::decode(index, "frame index out of range"))?;
        let image = image::open(path)
            .map_err(|e| PipelineError::decode(index, format!("{}: {}", path.display(), e)))?;
        Ok(Frame::new(index, self.frame_rate, Arc::new(image.to_rgb8())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_open_sorted_frames() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["frame_002.png", "frame_000.png", "frame_001.png"] {
            RgbImage::new(8, 6).save(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let seq = ImageSequence::open(dir.path(), 30.0).unwrap();
        assert_eq!(seq.frame_count(), 3);
        assert_eq!(seq.dimensions(), (8, 6));

        let frame = seq.read_frame(2).unwrap();
        assert_eq!(frame.index, 2);
        assert_eq!(frame.width(), 8);
    }

    #[test]
    fn test_corrupt_frame_is_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(4, 4).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("b.png"), b"garbage").unwrap();

        let seq = ImageSequence::open(dir.path(), 30.0).unwrap();
        let err = seq.read_frame(1).unwrap_err();
        assert!(matches!(err, PipelineError::DecodeFailure { index: 1, .. }));
        assert!(err.is_fatal());
        assert!(matches!(
            seq.read_frame(5),
            Err(PipelineError::DecodeFailure { index: 5, .. })
        ));
    }

    #[test]
    fn test_empty_dir_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequence::open(dir.path(), 30.0),
            Err(PipelineError::Config(_))
        ));
    }
}
