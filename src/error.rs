//! 错误类型 (Error types)
//!
//! 只有 `InferenceUnavailable` 与 `DecodeFailure` 会终止一次分析,
//! 其余情况都被吸收进轨迹样本的 `status` 字段。

use thiserror::Error;

/// Result type alias for the stride pipeline
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline errors; `is_fatal` tells which ones end a run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Inference backend unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("Detection failed on frame {index}: {reason}")]
    Inference { index: usize, reason: String },

    #[error("Frame {index} could not be decoded: {reason}")]
    DecodeFailure { index: usize, reason: String },

    #[error("Tracker error: {0}")]
    Track(#[from] TrackError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl PipelineError {
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::InferenceUnavailable(msg.into())
    }

    pub fn decode<S: Into<String>>(index: usize, reason: S) -> Self {
        Self::DecodeFailure {
            index,
            reason: reason.into(),
        }
    }

    pub fn inference<S: Into<String>>(index: usize, reason: S) -> Self {
        Self::Inference {
            index,
            reason: reason.into(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// 是否为终止性错误 (run-terminating)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InferenceUnavailable(_) | Self::DecodeFailure { .. }
        )
    }
}

/// 跟踪器状态机违规 (causality / lifecycle violations)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("tracker has not been initialized with a target")]
    NotInitialized,

    #[error("tracker is already tracking a target")]
    AlreadyInitialized,

    #[error("tracker has been finalized")]
    Finalized,

    #[error("frame {got} is not after previously processed frame {previous}")]
    OutOfOrder { previous: usize, got: usize },
}
