//! 推理结果适配器 (Payload adapter)
//! One-time conversion of a detection-service reply into typed [`Detection`]s.
//!
//! 支持的返回格式:
//! - `{"predictions": [...]}` / `{"data": [...]}`
//! - 裸数组 `[...]`
//! - 单个预测对象 `{...}`
//! - 预测对象外层包裹 `{"json_prediction": {...}}`
//!
//! 坐标约定: `x, y` 为框中心, `width, height` 为框尺寸。

use serde::Deserialize;
use serde_json::Value;

use super::types::{Detection, Keypoint, Point2};

/// 默认球员类别
pub const DEFAULT_PLAYER_CLASSES: &[&str] =
    &["player", "person", "hockey_player", "goalkeeper", "skater"];

const DEFAULT_CONFIDENCE: f32 = 0.5;

// ========== 类别过滤 ==========

/// 类别过滤器 (大小写不敏感; 空列表表示不过滤; 无标签的检测总是通过)
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFilter {
    classes: Vec<String>,
}

impl Default for ClassFilter {
    fn default() -> Self {
        Self::new(DEFAULT_PLAYER_CLASSES.iter().copied())
    }
}

impl ClassFilter {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            classes: classes
                .into_iter()
                .map(|c| c.as_ref().trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    pub fn allow_all() -> Self {
        Self {
            classes: Vec::new(),
        }
    }

    pub fn accepts(&self, label: Option<&str>) -> bool {
        match label {
            None => true,
            Some(_) if self.classes.is_empty() => true,
            Some(label) => {
                let label = label.to_lowercase();
                self.classes.iter().any(|c| *c == label)
            }
        }
    }
}

// ========== 原始格式 ==========

#[derive(Debug, Deserialize)]
struct RawKeypoint {
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    #[serde(alias = "class_name")]
    class: Option<String>,
    x: Option<f32>,
    y: Option<f32>,
    width: Option<f32>,
    height: Option<f32>,
    confidence: Option<f32>,
    frame: Option<usize>,
    timestamp: Option<f64>,
    keypoints: Option<Vec<RawKeypoint>>,
    json_prediction: Option<Box<RawPrediction>>,
}

/// 帧号推断上下文
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// 预测中没有帧号 / 时间戳时使用的帧号
    pub default_frame: usize,
    /// 用于将时间戳换算成帧号
    pub frame_rate: Option<f64>,
}

impl FrameContext {
    pub fn single(frame_index: usize) -> Self {
        Self {
            default_frame: frame_index,
            frame_rate: None,
        }
    }

    pub fn video(frame_rate: f64) -> Self {
        Self {
            default_frame: 0,
            frame_rate: Some(frame_rate),
        }
    }
}

// ========== 转换 ==========

/// 从服务返回中取出预测列表
fn prediction_list(payload: &Value) -> Vec<&Value> {
    match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("predictions") {
                items.iter().collect()
            } else if let Some(Value::Array(items)) = map.get("data") {
                items.iter().collect()
            } else {
                vec![payload]
            }
        }
        _ => Vec::new(),
    }
}

fn resolve_frame(raw: &RawPrediction, ctx: FrameContext) -> usize {
    if let Some(frame) = raw.frame {
        return frame;
    }
    match (raw.timestamp, ctx.frame_rate) {
        (Some(ts), Some(fps)) if ts > 0.0 && fps > 0.0 => (ts * fps) as usize,
        _ => ctx.default_frame,
    }
}

fn convert(raw: RawPrediction, ctx: FrameContext) -> Option<Detection> {
    // 外层包裹: 帧号/时间戳可能在外层
    if let Some(inner) = raw.json_prediction {
        let mut inner = *inner;
        inner.frame = inner.frame.or(raw.frame);
        inner.timestamp = inner.timestamp.or(raw.timestamp);
        return convert(inner, ctx);
    }

    let (x, y, width, height) = match (raw.x, raw.y, raw.width, raw.height) {
        (Some(x), Some(y), Some(w), Some(h)) if w > 0.0 && h > 0.0 => (x, y, w, h),
        _ => return None,
    };

    let frame_index = resolve_frame(&raw, ctx);
    let mut detection = Detection::new(
        frame_index,
        Point2::new(x, y),
        width,
        height,
        raw.confidence.unwrap_or(DEFAULT_CONFIDENCE),
    );
    if let Some(label) = raw.class {
        detection = detection.with_label(label);
    }
    if let Some(kpts) = raw.keypoints {
        detection = detection.with_keypoints(
            kpts.into_iter()
                .map(|k| Keypoint {
                    x: k.x,
                    y: k.y,
                    confidence: k.confidence.unwrap_or(DEFAULT_CONFIDENCE),
                })
                .collect(),
        );
    }
    Some(detection)
}

/// 将检测服务的返回转换为 [`Detection`] 列表
///
/// 格式不完整的条目被跳过 (debug 日志), 不会导致整体失败。
pub fn parse_detections(payload: &Value, ctx: FrameContext, filter: &ClassFilter) -> Vec<Detection> {
    let mut detections = Vec::new();
    let mut skipped = 0usize;

    for item in prediction_list(payload) {
        let raw = match RawPrediction::deserialize(item) {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("⚠️ 无法解析预测条目: {}", e);
                skipped += 1;
                continue;
            }
        };
        match convert(raw, ctx) {
            Some(det) if filter.accepts(det.class_label()) => detections.push(det),
            Some(_) => {}
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        log::debug!("⚠️ 跳过 {} 个不完整的预测条目", skipped);
    }
    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_predictions_object() {
        let payload = json!({
            "predictions": [
                {"class": "player", "x": 100.0, "y": 50.0, "width": 20.0, "height": 40.0, "confidence": 0.9},
                {"class": "puck", "x": 10.0, "y": 10.0, "width": 4.0, "height": 4.0, "confidence": 0.8}
            ],
            "image": {"width": 640, "height": 480}
        });
        let dets = parse_detections(&payload, FrameContext::single(7), &ClassFilter::default());

        assert_eq!(dets.len(), 1);
        let d = &dets[0];
        assert_eq!(d.frame_index(), 7);
        assert_eq!(d.class_label(), Some("player"));
        assert_eq!(d.bbox().x, 90.0);
        assert_eq!(d.bbox().y, 30.0);
        assert!((d.confidence() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_data_array_and_nested_prediction() {
        let payload = json!({
            "data": [
                {"frame": 12, "json_prediction": {"class_name": "Skater", "x": 5.0, "y": 5.0, "width": 2.0, "height": 2.0}},
                {"class": "goalkeeper", "x": 1.0, "y": 1.0, "width": 2.0, "height": 2.0, "frame": 3}
            ]
        });
        let dets = parse_detections(&payload, FrameContext::video(30.0), &ClassFilter::default());

        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].frame_index(), 12);
        assert_eq!(dets[0].class_label(), Some("Skater"));
        assert!((dets[0].confidence() - DEFAULT_CONFIDENCE).abs() < 1e-6);
        assert_eq!(dets[1].frame_index(), 3);
    }

    #[test]
    fn test_frame_from_timestamp() {
        let payload = json!([
            {"class": "player", "x": 1.0, "y": 1.0, "width": 2.0, "height": 2.0, "timestamp": 0.5},
            {"class": "player", "x": 1.0, "y": 1.0, "width": 2.0, "height": 2.0}
        ]);
        let dets = parse_detections(&payload, FrameContext::video(30.0), &ClassFilter::default());
        assert_eq!(dets[0].frame_index(), 15);
        assert_eq!(dets[1].frame_index(), 0);
    }

    #[test]
    fn test_single_object_with_keypoints() {
        let payload = json!({
            "x": 50.0, "y": 60.0, "width": 10.0, "height": 30.0, "confidence": 0.7,
            "keypoints": [{"x": 48.0, "y": 70.0, "confidence": 0.9}, {"x": 52.0, "y": 72.0}]
        });
        let dets = parse_detections(&payload, FrameContext::single(0), &ClassFilter::default());

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_label(), None);
        let kpts = dets[0].keypoints().unwrap();
        assert_eq!(kpts.len(), 2);
        assert!((kpts[1].confidence - DEFAULT_CONFIDENCE).abs() < 1e-6);
    }

    #[test]
    fn test_incomplete_entries_are_skipped() {
        let payload = json!({"predictions": [
            {"class": "player", "x": 1.0, "width": 2.0, "height": 2.0},
            {"class": "player", "x": 1.0, "y": 1.0, "width": 0.0, "height": 2.0},
            {"class": "player", "x": "oops", "y": 1.0, "width": 2.0, "height": 2.0},
            {"class": "player", "x": 1.0, "y": 1.0, "width": 2.0, "height": 2.0}
        ]});
        let dets = parse_detections(&payload, FrameContext::single(0), &ClassFilter::default());
        assert_eq!(dets.len(), 1);
    }

    #[test]
    fn test_class_filter() {
        let filter = ClassFilter::new(["Player", " referee "]);
        assert!(filter.accepts(Some("PLAYER")));
        assert!(filter.accepts(Some("referee")));
        assert!(!filter.accepts(Some("puck")));
        assert!(filter.accepts(None));
        assert!(ClassFilter::allow_all().accepts(Some("puck")));
    }
}
