/// 目标跟踪 (Target tracking)
///
/// 只跟踪操作者选定的一个目标, 贪心选取最佳候选, 无匹配时保持上一位置
/// - matcher: 位置 / 尺寸 / 置信度加权相似度
/// - tracker: 状态机 + 逐帧轨迹样本
pub mod matcher;
pub mod tracker;

pub use matcher::{BestMatch, MatchScore, SimilarityMatcher};
pub use tracker::{TargetState, TargetTracker, TrackSample, TrackStatus, TrackerState};
