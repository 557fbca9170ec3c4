//! 目标相似度匹配 (Re-identification scoring)
//!
//! combined = w_pos · position + w_size · size + w_conf · confidence
//! - position   = max(0, 1 − distance / D_max)
//! - size       = max(0, 1 − (|Δw| + |Δh|) / S_max)
//! - confidence = candidate.confidence

use crate::config::MatcherConfig;
use crate::detection::{BBox, Detection};

/// 单个候选的分项得分
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchScore {
    pub position: f32,
    pub size: f32,
    pub confidence: f32,
    pub combined: f32,
}

/// 最佳候选
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch {
    /// 在候选列表中的下标
    pub index: usize,
    pub score: MatchScore,
}

#[derive(Debug, Clone)]
pub struct SimilarityMatcher {
    config: MatcherConfig,
}

impl SimilarityMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn score(&self, target: &BBox, candidate: &Detection) -> MatchScore {
        let c = &self.config;

        let distance = candidate.center().distance(&target.center());
        let position = (1.0 - distance / c.max_displacement).max(0.0);

        let size_delta =
            (candidate.width() - target.width).abs() + (candidate.height() - target.height).abs();
        let size = (1.0 - size_delta / c.max_size_delta).max(0.0);

        let confidence = candidate.confidence();

        MatchScore {
            position,
            size,
            confidence,
            combined: c.position_weight * position
                + c.size_weight * size
                + c.confidence_weight * confidence,
        }
    }

    /// 最高分候选; 同分时取先出现者
    pub fn best_match(&self, target: &BBox, candidates: &[Detection]) -> Option<BestMatch> {
        let mut best: Option<BestMatch> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let score = self.score(target, candidate);
            match best {
                Some(ref b) if score.combined <= b.score.combined => {}
                _ => best = Some(BestMatch { index, score }),
            }
        }
        best
    }

    pub fn accepts(&self, score: &MatchScore) -> bool {
        score.combined >= self.config.accept_threshold
    }
}
