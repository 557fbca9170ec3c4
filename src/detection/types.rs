/// 检测数据结构定义
/// Data structures shared by the gateway, tracker and metrics engine
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ========== 几何类型 ==========

/// 二维点 (像素坐标)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 欧氏距离
    pub fn distance(&self, other: &Point2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// 姿态关键点 (x, y, confidence)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// 边界框 (左上角 + 宽高)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_center(center: Point2, width: f32, height: f32) -> Self {
        Self {
            x: center.x - width / 2.0,
            y: center.y - height / 2.0,
            width,
            height,
        }
    }

    pub fn xmax(&self) -> f32 {
        self.x + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point2 {
        Point2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// 底边中点 (脚部位置代理)
    pub fn bottom_center(&self) -> Point2 {
        Point2::new(self.x + self.width / 2.0, self.ymax())
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// 解析 "x,y,w,h" (命令行参数)
impl FromStr for BBox {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid bbox '{}': {}", s, e))?;

        match parts.as_slice() {
            [x, y, w, h] if *w > 0.0 && *h > 0.0 => Ok(BBox::new(*x, *y, *w, *h)),
            [_, _, _, _] => Err(format!("bbox '{}' must have positive width and height", s)),
            _ => Err(format!("bbox '{}' must be x,y,w,h", s)),
        }
    }
}

// ========== 检测结果 ==========

/// 单帧中的一个候选目标 (Detection)
///
/// 由推理网关创建后不再修改; 需要改写帧号时通过 [`Detection::at_frame`]
/// 得到一份新的副本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    frame_index: usize,
    class_label: Option<String>,
    center: Point2,
    width: f32,
    height: f32,
    confidence: f32,
    keypoints: Option<Vec<Keypoint>>,
}

impl Detection {
    pub fn new(frame_index: usize, center: Point2, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            frame_index,
            class_label: None,
            center,
            width,
            height,
            confidence: confidence.clamp(0.0, 1.0),
            keypoints: None,
        }
    }

    pub fn from_bbox(frame_index: usize, bbox: &BBox, confidence: f32) -> Self {
        Self::new(frame_index, bbox.center(), bbox.width, bbox.height, confidence)
    }

    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.class_label = Some(label.into());
        self
    }

    pub fn with_keypoints(mut self, keypoints: Vec<Keypoint>) -> Self {
        self.keypoints = Some(keypoints);
        self
    }

    /// 相同检测内容, 换一个帧号
    pub fn at_frame(&self, frame_index: usize) -> Self {
        Self {
            frame_index,
            ..self.clone()
        }
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn class_label(&self) -> Option<&str> {
        self.class_label.as_deref()
    }

    pub fn center(&self) -> Point2 {
        self.center
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn keypoints(&self) -> Option<&[Keypoint]> {
        self.keypoints.as_deref()
    }

    pub fn bbox(&self) -> BBox {
        BBox::from_center(self.center, self.width, self.height)
    }
}
