//! 流水线配置 - 通过JSON文件调整参数
//! Pipeline configuration, loadable from / savable to JSON.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::{ClassFilter, DEFAULT_PLAYER_CLASSES};
use crate::error::{PipelineError, Result};

/// 非法值 (负数 / NaN) 视为 0, 由 `validate` 负责报告
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// 检测缓存参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize, // 最大条目数
    pub ttl_secs: f64,   // 过期时间(秒)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            ttl_secs: 30.0,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        secs(self.ttl_secs)
    }
}

/// 推理网关参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub batch_timeout_secs: f64, // 批量推理时间预算 B
    pub ready_timeout_secs: f64, // 后端就绪等待上限 W
    pub max_rate: f64,           // 最大采样帧率
    pub fallback_on_empty: bool, // 批量结果为空时也回退到逐帧
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            batch_timeout_secs: 120.0,
            ready_timeout_secs: 30.0,
            max_rate: 30.0,
            fallback_on_empty: true,
        }
    }
}

impl GatewayConfig {
    pub fn batch_timeout(&self) -> Duration {
        secs(self.batch_timeout_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        secs(self.ready_timeout_secs)
    }
}

/// 目标匹配参数 (权重与阈值为经验值)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub max_displacement: f32,  // D_max: 帧间最大位移(像素)
    pub max_size_delta: f32,    // S_max: |Δw|+|Δh| 归一化上限
    pub position_weight: f32,   // 位置权重
    pub size_weight: f32,       // 尺寸权重
    pub confidence_weight: f32, // 置信度权重
    pub accept_threshold: f32,  // τ: 接受阈值
    pub held_confidence: f32,   // 有候选但无匹配时保持位置的置信度
    pub lost_confidence: f32,   // 无候选时保持位置的置信度
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_displacement: 100.0,
            max_size_delta: 100.0,
            position_weight: 0.7,
            size_weight: 0.2,
            confidence_weight: 0.1,
            accept_threshold: 0.5,
            held_confidence: 0.3,
            lost_confidence: 0.2,
        }
    }
}

/// 运动学指标参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub stride_threshold: f32, // 步幅判定位移阈值(像素)
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            stride_threshold: 20.0,
        }
    }
}

/// 完整流水线配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cache: CacheConfig,
    pub gateway: GatewayConfig,
    pub matcher: MatcherConfig,
    pub metrics: MetricsConfig,
    pub player_classes: Vec<String>, // 球员类别 (空 = 不过滤)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            gateway: GatewayConfig::default(),
            matcher: MatcherConfig::default(),
            metrics: MetricsConfig::default(),
            player_classes: DEFAULT_PLAYER_CLASSES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置
    ///
    /// 文件不存在时写入默认配置; 解析失败时使用默认值。
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    log::info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    log::error!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        log::info!("💾 配置已保存到 {}", path.as_ref().display());
        Ok(())
    }

    pub fn class_filter(&self) -> ClassFilter {
        ClassFilter::new(&self.player_classes)
    }

    /// 参数合法性检查
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("cache.ttl_secs", self.cache.ttl_secs),
            ("gateway.batch_timeout_secs", self.gateway.batch_timeout_secs),
            ("gateway.ready_timeout_secs", self.gateway.ready_timeout_secs),
            ("gateway.max_rate", self.gateway.max_rate),
            ("matcher.max_displacement", self.matcher.max_displacement as f64),
            ("matcher.max_size_delta", self.matcher.max_size_delta as f64),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PipelineError::config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        let m = &self.matcher;
        let finite = [
            ("matcher.position_weight", m.position_weight),
            ("matcher.size_weight", m.size_weight),
            ("matcher.confidence_weight", m.confidence_weight),
            ("matcher.accept_threshold", m.accept_threshold),
            ("matcher.held_confidence", m.held_confidence),
            ("matcher.lost_confidence", m.lost_confidence),
            ("metrics.stride_threshold", self.metrics.stride_threshold),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(PipelineError::config(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }

        let weights = [m.position_weight, m.size_weight, m.confidence_weight];
        if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f32>() <= 0.0 {
            return Err(PipelineError::config(
                "matcher weights must be non-negative with a positive sum",
            ));
        }
        if self.metrics.stride_threshold < 0.0 {
            return Err(PipelineError::config("metrics.stride_threshold must be >= 0"));
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        log::info!("🎛️  当前流水线配置:");
        log::info!(
            "  缓存: {} 条 / TTL {:.0}s",
            self.cache.capacity,
            self.cache.ttl_secs
        );
        log::info!(
            "  批量推理预算: {:.0}s | 就绪等待: {:.0}s | 最大采样: {:.0} FPS",
            self.gateway.batch_timeout_secs,
            self.gateway.ready_timeout_secs,
            self.gateway.max_rate
        );
        log::info!(
            "  匹配权重: 位置{:.2} 尺寸{:.2} 置信度{:.2} | 阈值 {:.2}",
            self.matcher.position_weight,
            self.matcher.size_weight,
            self.matcher.confidence_weight,
            self.matcher.accept_threshold
        );
        log::info!("  步幅阈值: {:.1}px", self.metrics.stride_threshold);
    }
}
