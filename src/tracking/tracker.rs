//! 单目标跟踪器 (Single-target tracker)
//!
//! 状态机: Uninitialized → Active (initialize) → Finalized (finalize)
//!
//! 每次 `update` 恰好追加一个 [`TrackSample`]:
//! - Matched:     最佳候选得分 ≥ τ, 目标跟随候选移动
//! - Held:        有候选但都低于 τ, 目标保持不动
//! - NoDetection: 本帧没有候选, 目标保持不动
//!
//! 匹配只依赖之前的目标状态与当前帧的候选, 帧号必须严格递增。

use serde::{Deserialize, Serialize};

use super::matcher::SimilarityMatcher;
use crate::config::MatcherConfig;
use crate::detection::{BBox, Detection, Point2};
use crate::error::TrackError;

// ========== 数据结构 ==========

/// 样本状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackStatus {
    Matched,
    Held,
    NoDetection,
}

/// 轨迹样本 (追加后不再修改)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSample {
    pub frame_index: usize,
    pub timestamp: f64,
    pub bbox: BBox,
    pub confidence: f32,
    pub status: TrackStatus,
    /// 匹配得分 (仅 Matched / Held 有值; Held 时为未达阈值的最佳分)
    pub score: Option<f32>,
}

/// 目标状态
#[derive(Debug, Clone)]
pub struct TargetState {
    pub bbox: BBox,
    pub center: Point2,
    /// 最近一次 Matched 的帧号
    pub last_good_frame: Option<usize>,
    pub history: Vec<TrackSample>,
}

impl TargetState {
    fn new(bbox: BBox) -> Self {
        Self {
            bbox,
            center: bbox.center(),
            last_good_frame: None,
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Uninitialized,
    Active,
    Finalized,
}

// ========== 跟踪器 ==========

pub struct TargetTracker {
    matcher: SimilarityMatcher,
    frame_rate: f64,
    state: TrackerState,
    target: Option<TargetState>,
}

impl TargetTracker {
    /// `frame_rate` 用于把帧号换算成时间戳
    pub fn new(config: MatcherConfig, frame_rate: f64) -> Self {
        Self {
            matcher: SimilarityMatcher::new(config),
            frame_rate,
            state: TrackerState::Uninitialized,
            target: None,
        }
    }

    pub fn initialize(&mut self, initial_bbox: BBox) -> Result<(), TrackError> {
        match self.state {
            TrackerState::Uninitialized => {
                let center = initial_bbox.center();
                log::info!(
                    "🎯 目标初始化: center=({:.0}, {:.0}), size={:.0}x{:.0}",
                    center.x,
                    center.y,
                    initial_bbox.width,
                    initial_bbox.height
                );
                self.target = Some(TargetState::new(initial_bbox));
                self.state = TrackerState::Active;
                Ok(())
            }
            TrackerState::Active => Err(TrackError::AlreadyInitialized),
            TrackerState::Finalized => Err(TrackError::Finalized),
        }
    }

    /// 处理一帧的候选检测, 返回本帧追加的样本
    pub fn update(
        &mut self,
        frame_index: usize,
        candidates: &[Detection],
    ) -> Result<&TrackSample, TrackError> {
        let target = match self.state {
            TrackerState::Active => self.target.as_mut().ok_or(TrackError::NotInitialized)?,
            TrackerState::Uninitialized => return Err(TrackError::NotInitialized),
            TrackerState::Finalized => return Err(TrackError::Finalized),
        };

        if let Some(last) = target.history.last() {
            if frame_index <= last.frame_index {
                return Err(TrackError::OutOfOrder {
                    previous: last.frame_index,
                    got: frame_index,
                });
            }
        }

        let timestamp = if self.frame_rate > 0.0 {
            frame_index as f64 / self.frame_rate
        } else {
            0.0
        };
        let config = self.matcher.config();
        let best = self.matcher.best_match(&target.bbox, candidates);

        let sample = match best {
            Some(best) if self.matcher.accepts(&best.score) => {
                let matched = &candidates[best.index];
                let bbox = matched.bbox();
                target.bbox = bbox;
                target.center = matched.center();
                target.last_good_frame = Some(frame_index);
                TrackSample {
                    frame_index,
                    timestamp,
                    bbox,
                    confidence: matched.confidence(),
                    status: TrackStatus::Matched,
                    score: Some(best.score.combined),
                }
            }
            Some(best) => TrackSample {
                frame_index,
                timestamp,
                bbox: target.bbox,
                confidence: config.held_confidence,
                status: TrackStatus::Held,
                score: Some(best.score.combined),
            },
            None => TrackSample {
                frame_index,
                timestamp,
                bbox: target.bbox,
                confidence: config.lost_confidence,
                status: TrackStatus::NoDetection,
                score: None,
            },
        };

        if target.history.len() % 30 == 0 {
            log::debug!(
                "   Frame {}: {:?} ({} 候选, score={:?})",
                frame_index,
                sample.status,
                candidates.len(),
                sample.score
            );
        }

        target.history.push(sample);
        let last = target.history.len() - 1;
        Ok(&target.history[last])
    }

    /// 视频结束, 之后不再接受 `update`
    pub fn finalize(&mut self) -> Result<&[TrackSample], TrackError> {
        match self.state {
            TrackerState::Uninitialized => Err(TrackError::NotInitialized),
            TrackerState::Finalized => Err(TrackError::Finalized),
            TrackerState::Active => {
                self.state = TrackerState::Finalized;
                let history = self.history();
                log::info!("✅ 跟踪结束: {} 帧", history.len());
                Ok(history)
            }
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn target(&self) -> Option<&TargetState> {
        self.target.as_ref()
    }

    pub fn history(&self) -> &[TrackSample] {
        self.target
            .as_ref()
            .map(|t| t.history.as_slice())
            .unwrap_or(&[])
    }

    pub fn frames_processed(&self) -> usize {
        self.history().len()
    }

    pub fn into_history(self) -> Vec<TrackSample> {
        self.target.map(|t| t.history).unwrap_or_default()
    }
}
