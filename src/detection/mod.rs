/// 检测数据层 (Detection layer)
///
/// - types:   强类型检测结果 / 几何类型
/// - adapter: 检测服务返回 → Detection 的一次性转换
/// - cache:   TTL + 容量淘汰的检测结果缓存
pub mod adapter;
pub mod cache;
pub mod types;

pub use adapter::{parse_detections, ClassFilter, FrameContext, DEFAULT_PLAYER_CLASSES};
pub use cache::{CacheEntry, DetectionCache};
pub use types::{BBox, Detection, Keypoint, Point2};
