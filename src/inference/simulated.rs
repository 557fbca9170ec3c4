/// 仿真后端: 固定种子生成匀速滑行的球员 + 干扰目标
///
/// 每帧的随机数由 (seed, frame_index) 决定, 同一帧多次检测结果一致。
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::backend::DetectionBackend;
use crate::detection::{BBox, Detection, Point2};
use crate::input::{sampled_indices, sampling_step, Frame, FrameSource};

/// 仿真场景参数
#[derive(Debug, Clone)]
pub struct SimulatedScene {
    /// 第 0 帧时球员框
    pub start: BBox,
    /// 每帧位移 (px)
    pub velocity: Point2,
    /// 中心点抖动幅度 (px)
    pub jitter: f32,
    /// 漏检概率
    pub dropout: f64,
    /// 是否生成裁判 (非球员类别) 与远处球员
    pub distractors: bool,
    pub seed: u64,
}

impl Default for SimulatedScene {
    fn default() -> Self {
        Self {
            start: BBox::new(100.0, 300.0, 40.0, 80.0),
            velocity: Point2::new(25.0, 0.0),
            jitter: 1.5,
            dropout: 0.0,
            distractors: true,
            seed: 42,
        }
    }
}

pub struct SimulatedBackend {
    scene: SimulatedScene,
    batch_delay: Option<Duration>,
}

impl SimulatedBackend {
    pub fn new(scene: SimulatedScene) -> Self {
        Self {
            scene,
            batch_delay: None,
        }
    }

    /// 批量检测前的人为延迟
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = Some(delay);
        self
    }

    pub fn scene(&self) -> &SimulatedScene {
        &self.scene
    }

    /// 第 `index` 帧的理想球员框 (无抖动)
    pub fn expected_bbox(&self, index: usize) -> BBox {
        let s = &self.scene;
        let t = index as f32;
        BBox::new(
            s.start.x + s.velocity.x * t,
            s.start.y + s.velocity.y * t,
            s.start.width,
            s.start.height,
        )
    }

    fn detections_at(&self, index: usize) -> Vec<Detection> {
        let s = &self.scene;
        let mut rng = StdRng::seed_from_u64(s.seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let mut out = Vec::new();

        let skater = self.expected_bbox(index);
        let jitter = s.jitter.max(0.0);
        if !rng.gen_bool(s.dropout.clamp(0.0, 1.0)) {
            let (dx, dy) = if jitter > 0.0 {
                (rng.gen_range(-jitter..=jitter), rng.gen_range(-jitter..=jitter))
            } else {
                (0.0, 0.0)
            };
            let center = skater.center();
            out.push(
                Detection::new(
                    index,
                    Point2::new(center.x + dx, center.y + dy),
                    skater.width,
                    skater.height,
                    rng.gen_range(0.75..0.95),
                )
                .with_label("player"),
            );
        }

        if s.distractors {
            // 裁判紧跟球员, 被类别过滤器剔除
            let center = skater.center();
            out.push(
                Detection::new(
                    index,
                    Point2::new(center.x + 15.0, center.y),
                    skater.width,
                    skater.height,
                    0.9,
                )
                .with_label("referee"),
            );
            // 远处的另一名球员
            out.push(
                Detection::new(
                    index,
                    Point2::new(center.x, center.y + 400.0),
                    skater.width * 1.2,
                    skater.height * 1.2,
                    rng.gen_range(0.6..0.9),
                )
                .with_label("player"),
            );
        }
        out
    }
}

impl DetectionBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn detect_frame(&self, frame: &Frame) -> Result<Vec<Detection>> {
        Ok(self.detections_at(frame.index))
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn detect_video(&self, source: &dyn FrameSource, max_rate: f64) -> Result<Vec<Detection>> {
        if let Some(delay) = self.batch_delay {
            thread::sleep(delay);
        }
        let step = sampling_step(source.frame_rate(), max_rate);
        Ok(sampled_indices(source.frame_count(), step)
            .flat_map(|i| self.detections_at(i))
            .collect())
    }
}
