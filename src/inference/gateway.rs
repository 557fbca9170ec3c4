//! 推理网关 (Inference Gateway)
//!
//! - 后端在独立线程中异步初始化; 调用在就绪前最多阻塞 W, 超时报 `InferenceUnavailable`
//! - 批量策略在时间预算 B 内运行, 超时 / 出错 / 结果为空 → 通知调用方回退
//! - 逐帧策略按采样率逐帧调用后端, 单帧失败只记日志
//! - 成功结果写入检测缓存
//!
//! 超时后放弃的批量任务不会被合并, 逐帧策略从第 0 帧重新开始。

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use super::backend::DetectionBackend;
use crate::config::{GatewayConfig, PipelineConfig};
use crate::detection::{ClassFilter, Detection, DetectionCache};
use crate::error::{PipelineError, Result};
use crate::input::{sampled_indices, sampling_step, Frame, FrameSource};

// ========== 公共类型 ==========

/// 检测策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Batch,
    Sequential,
}

/// 批量策略放弃的原因
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// 超出时间预算 (InferenceTimeout)
    Timeout(Duration),
    /// 后端报错或不支持批量
    Failed(String),
    /// 完成但没有任何检测
    Empty,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout(budget) => write!(f, "batch inference exceeded {:.1}s", budget.as_secs_f64()),
            Self::Failed(reason) => write!(f, "batch inference failed: {}", reason),
            Self::Empty => write!(f, "batch inference returned no detections"),
        }
    }
}

#[derive(Debug)]
pub enum BatchOutcome {
    Completed(Vec<Detection>),
    Fallback(FallbackReason),
}

/// 网关统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayStats {
    pub backend_ready: bool,
    pub cache_len: usize,
    pub last_detection_ms: Option<f64>,
}

type BackendSlot = Arc<OnceCell<std::result::Result<Arc<dyn DetectionBackend>, String>>>;

// ========== 网关 ==========

pub struct InferenceGateway {
    config: GatewayConfig,
    cache: DetectionCache,
    filter: ClassFilter,
    slot: BackendSlot,
    ready_rx: Receiver<()>,
    last_detection_ms: Option<f64>,
}

impl InferenceGateway {
    /// 在后台线程中构造后端, 立即返回
    pub fn spawn<F>(factory: F, config: GatewayConfig, cache: DetectionCache) -> Self
    where
        F: FnOnce() -> anyhow::Result<Arc<dyn DetectionBackend>> + Send + 'static,
    {
        let slot: BackendSlot = Arc::new(OnceCell::new());
        let (ready_tx, ready_rx) = bounded::<()>(1);

        let worker_slot = slot.clone();
        let spawned = thread::Builder::new()
            .name("backend-init".to_string())
            .spawn(move || {
                log::info!("🚀 初始化检测后端...");
                let start = Instant::now();
                let result = factory().map_err(|e| format!("{:#}", e));
                match &result {
                    Ok(backend) => log::info!(
                        "✅ 检测后端就绪: {} ({:.1}s)",
                        backend.name(),
                        start.elapsed().as_secs_f64()
                    ),
                    Err(e) => log::error!("❌ 检测后端初始化失败: {}", e),
                }
                let _ = worker_slot.set(result);
                let _ = ready_tx.send(());
            });

        if let Err(e) = spawned {
            let _ = slot.set(Err(format!("failed to start backend-init thread: {}", e)));
        }

        Self {
            config,
            cache,
            filter: ClassFilter::allow_all(),
            slot,
            ready_rx,
            last_detection_ms: None,
        }
    }

    /// 按完整配置构造 (缓存参数 + 类别过滤)
    pub fn from_config<F>(factory: F, config: &PipelineConfig) -> Self
    where
        F: FnOnce() -> anyhow::Result<Arc<dyn DetectionBackend>> + Send + 'static,
    {
        let cache = DetectionCache::new(config.cache.capacity, config.cache.ttl());
        Self::spawn(factory, config.gateway.clone(), cache).with_class_filter(config.class_filter())
    }

    /// 已构造好的后端, 立即就绪
    pub fn with_backend(
        backend: Arc<dyn DetectionBackend>,
        config: GatewayConfig,
        cache: DetectionCache,
    ) -> Self {
        let slot: BackendSlot = Arc::new(OnceCell::new());
        let _ = slot.set(Ok(backend));
        let (_, ready_rx) = bounded::<()>(1);
        Self {
            config,
            cache,
            filter: ClassFilter::allow_all(),
            slot,
            ready_rx,
            last_detection_ms: None,
        }
    }

    pub fn with_class_filter(mut self, filter: ClassFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn cache(&self) -> &DetectionCache {
        &self.cache
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.slot.get(), Some(Ok(_)))
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            backend_ready: self.is_ready(),
            cache_len: self.cache.len(),
            last_detection_ms: self.last_detection_ms,
        }
    }

    /// 等待后端就绪 (最多 W)
    fn backend(&self) -> Result<Arc<dyn DetectionBackend>> {
        if self.slot.get().is_none() {
            let wait = self.config.ready_timeout();
            log::info!("⏳ 等待检测后端就绪 (最多 {:.0}s)...", wait.as_secs_f64());
            match self.ready_rx.recv_timeout(wait) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
                Err(RecvTimeoutError::Timeout) => {
                    return Err(PipelineError::unavailable(format!(
                        "backend not ready after {:.1}s",
                        wait.as_secs_f64()
                    )));
                }
            }
        }

        match self.slot.get() {
            Some(Ok(backend)) => Ok(backend.clone()),
            Some(Err(reason)) => Err(PipelineError::unavailable(reason.clone())),
            None => Err(PipelineError::unavailable("backend initialization aborted")),
        }
    }

    fn keep_players(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections
            .into_iter()
            .filter(|d| self.filter.accepts(d.class_label()))
            .collect()
    }

    fn video_key(source: &dyn FrameSource, max_rate: f64) -> String {
        format!("video_{}_{}", source.identifier(), max_rate)
    }

    // ========== 单帧 ==========

    /// 单帧同步检测 (先查缓存)
    pub fn detect_frame(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let key = frame.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let backend = self.backend()?;
        let start = Instant::now();
        let detections = backend
            .detect_frame(frame)
            .map_err(|e| PipelineError::inference(frame.index, format!("{:#}", e)))?;
        self.last_detection_ms = Some(start.elapsed().as_secs_f64() * 1000.0);

        let detections: Vec<Detection> = self
            .keep_players(detections)
            .iter()
            .map(|d| d.at_frame(frame.index))
            .collect();
        self.cache.put(key, detections.clone());
        Ok(detections)
    }

    // ========== 批量 ==========

    /// 批量检测整段视频, 最多运行 B
    ///
    /// 返回 `Fallback` 时调用方应改用 [`detect_sequential`](Self::detect_sequential)。
    /// 只有后端不可用会作为错误返回。
    pub fn detect_video(
        &mut self,
        source: Arc<dyn FrameSource>,
        max_rate: f64,
    ) -> Result<BatchOutcome> {
        let key = Self::video_key(source.as_ref(), max_rate);
        if let Some(hit) = self.cache.get(&key) {
            log::info!("⚡ 批量检测命中缓存: {} 个检测", hit.len());
            return Ok(BatchOutcome::Completed(hit));
        }

        let backend = self.backend()?;
        if !backend.supports_batch() {
            return Ok(BatchOutcome::Fallback(FallbackReason::Failed(format!(
                "{} does not support batch inference",
                backend.name()
            ))));
        }

        let budget = self.config.batch_timeout();
        log::info!("⏱️  批量视频检测 (时间预算: {:.0}s)...", budget.as_secs_f64());

        let (tx, rx) = bounded(1);
        let worker_source = source.clone();
        let spawned = thread::Builder::new()
            .name("batch-inference".to_string())
            .spawn(move || {
                let result = backend.detect_video(worker_source.as_ref(), max_rate);
                // 超时后接收端已丢弃, 结果直接丢弃
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            return Ok(BatchOutcome::Fallback(FallbackReason::Failed(e.to_string())));
        }

        let start = Instant::now();
        let outcome = match rx.recv_timeout(budget) {
            Ok(Ok(detections)) => {
                let detections = self.keep_players(detections);
                self.last_detection_ms = Some(start.elapsed().as_secs_f64() * 1000.0);
                if detections.is_empty() && self.config.fallback_on_empty {
                    BatchOutcome::Fallback(FallbackReason::Empty)
                } else {
                    log::info!(
                        "⚡ 批量检测完成: {:.2}s, {} 个检测",
                        start.elapsed().as_secs_f64(),
                        detections.len()
                    );
                    self.cache.put(key, detections.clone());
                    BatchOutcome::Completed(detections)
                }
            }
            Ok(Err(e)) => BatchOutcome::Fallback(FallbackReason::Failed(format!("{:#}", e))),
            Err(RecvTimeoutError::Timeout) => BatchOutcome::Fallback(FallbackReason::Timeout(budget)),
            Err(RecvTimeoutError::Disconnected) => BatchOutcome::Fallback(FallbackReason::Failed(
                "batch worker exited without a result".to_string(),
            )),
        };

        if let BatchOutcome::Fallback(reason) = &outcome {
            log::warn!("⚠️  {}, 回退到逐帧检测", reason);
        }
        Ok(outcome)
    }

    // ========== 逐帧 ==========

    /// 按 `max_rate` 采样逐帧检测, 从第 0 帧开始
    ///
    /// 单帧检测失败时该帧没有检测结果; 解码失败与后端不可用会终止。
    pub fn detect_sequential(
        &mut self,
        source: &dyn FrameSource,
        max_rate: f64,
    ) -> Result<Vec<Detection>> {
        let step = sampling_step(source.frame_rate(), max_rate);
        let total = source.frame_count();
        log::info!("🎬 逐帧检测: {} 帧, 每 {} 帧采样一次", total, step);

        let mut detections = Vec::new();
        let mut failed = 0usize;
        for (processed, index) in sampled_indices(total, step).enumerate() {
            let frame = source.read_frame(index)?;
            match self.detect_frame(&frame) {
                Ok(found) => detections.extend(found),
                Err(PipelineError::Inference { index, reason }) => {
                    failed += 1;
                    if failed == 1 || processed % 30 == 0 {
                        log::warn!("⚠️  Frame {}: 检测失败: {}", index, reason);
                    }
                }
                Err(e) => return Err(e),
            }

            if (processed + 1) % 30 == 0 {
                log::info!(
                    "📊 已处理 {}/{} 帧 ({:.1}%)",
                    index + 1,
                    total,
                    (index + 1) as f64 / total as f64 * 100.0
                );
            }
        }

        log::info!(
            "✅ 逐帧检测完成: {} 个检测, {} 帧失败",
            detections.len(),
            failed
        );
        Ok(detections)
    }

    /// 先批量, 需要时回退逐帧
    pub fn detect(
        &mut self,
        source: Arc<dyn FrameSource>,
        max_rate: f64,
    ) -> Result<(Strategy, Vec<Detection>)> {
        match self.detect_video(source.clone(), max_rate)? {
            BatchOutcome::Completed(detections) => Ok((Strategy::Batch, detections)),
            BatchOutcome::Fallback(_) => {
                let detections = self.detect_sequential(source.as_ref(), max_rate)?;
                Ok((Strategy::Sequential, detections))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Point2;
    use crate::input::BlankVideo;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 可控的测试后端
    struct StubBackend {
        batch: Option<Vec<Detection>>,
        batch_delay: Duration,
        fail_frames: Vec<usize>,
        calls: AtomicUsize,
        batch_calls: AtomicUsize,
    }

    impl StubBackend {
        fn new() -> Self {
            Self {
                batch: None,
                batch_delay: Duration::ZERO,
                fail_frames: Vec::new(),
                calls: AtomicUsize::new(0),
                batch_calls: AtomicUsize::new(0),
            }
        }
    }

    impl DetectionBackend for StubBackend {
        fn name(&self) -> &str {
            "stub"
        }

        fn detect_frame(&self, frame: &Frame) -> anyhow::Result<Vec<Detection>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_frames.contains(&frame.index) {
                anyhow::bail!("service error");
            }
            // 后端返回的帧号不可信, 网关负责改写
            Ok(vec![
                Detection::new(999, Point2::new(50.0, 50.0), 20.0, 40.0, 0.9).with_label("player"),
                Detection::new(999, Point2::new(90.0, 50.0), 20.0, 40.0, 0.9).with_label("referee"),
            ])
        }

        fn supports_batch(&self) -> bool {
            self.batch.is_some()
        }

        fn detect_video(&self, _: &dyn FrameSource, _: f64) -> anyhow::Result<Vec<Detection>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.batch_delay);
            match &self.batch {
                Some(dets) => Ok(dets.clone()),
                None => anyhow::bail!("unsupported"),
            }
        }
    }

    fn fast_config() -> GatewayConfig {
        GatewayConfig {
            batch_timeout_secs: 0.2,
            ready_timeout_secs: 0.2,
            ..GatewayConfig::default()
        }
    }

    fn gateway(backend: StubBackend) -> InferenceGateway {
        InferenceGateway::with_backend(Arc::new(backend), fast_config(), DetectionCache::default())
    }

    fn video(frames: usize) -> Arc<dyn FrameSource> {
        Arc::new(BlankVideo::new("clip", 30.0, frames, 16, 16))
    }

    #[test]
    fn test_unavailable_after_ready_timeout() {
        let mut gw = InferenceGateway::spawn(
            || {
                thread::sleep(Duration::from_secs(2));
                Ok(Arc::new(StubBackend::new()) as Arc<dyn DetectionBackend>)
            },
            fast_config(),
            DetectionCache::default(),
        );
        let frame = video(1).read_frame(0).unwrap();
        let start = Instant::now();
        let err = gw.detect_frame(&frame).unwrap_err();
        assert!(matches!(err, PipelineError::InferenceUnavailable(_)));
        assert!(err.is_fatal());
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!gw.stats().backend_ready);
    }

    #[test]
    fn test_waits_for_slow_init() {
        let mut gw = InferenceGateway::spawn(
            || {
                thread::sleep(Duration::from_millis(50));
                Ok(Arc::new(StubBackend::new()) as Arc<dyn DetectionBackend>)
            },
            GatewayConfig::default(),
            DetectionCache::default(),
        );
        let frame = video(1).read_frame(0).unwrap();
        assert!(gw.detect_frame(&frame).is_ok());
        assert!(gw.is_ready());
    }

    #[test]
    fn test_factory_failure_is_unavailable() {
        let mut gw = InferenceGateway::spawn(
            || Err(anyhow::anyhow!("model file missing")),
            GatewayConfig::default(),
            DetectionCache::default(),
        );
        let frame = video(1).read_frame(0).unwrap();
        match gw.detect_frame(&frame) {
            Err(PipelineError::InferenceUnavailable(reason)) => {
                assert!(reason.contains("model file missing"))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_frame_results_restamped_filtered_and_cached() {
        let backend = Arc::new(StubBackend::new());
        let mut gw = InferenceGateway::with_backend(
            backend.clone(),
            fast_config(),
            DetectionCache::default(),
        )
        .with_class_filter(ClassFilter::default());

        let frame = video(5).read_frame(3).unwrap();
        let first = gw.detect_frame(&frame).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].frame_index(), 3);

        let second = gw.detect_frame(&frame).unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let stats = gw.stats();
        assert!(stats.backend_ready);
        assert_eq!(stats.cache_len, 1);
        assert!(stats.last_detection_ms.is_some());
    }

    #[test]
    fn test_batch_timeout_falls_back() {
        let mut stub = StubBackend::new();
        stub.batch = Some(vec![Detection::new(0, Point2::new(1.0, 1.0), 2.0, 2.0, 0.9)]);
        stub.batch_delay = Duration::from_secs(1);
        let mut gw = gateway(stub);

        let start = Instant::now();
        let outcome = gw.detect_video(video(4), 30.0).unwrap();
        assert!(start.elapsed() < Duration::from_millis(900));
        match outcome {
            BatchOutcome::Fallback(FallbackReason::Timeout(budget)) => {
                assert_eq!(budget, Duration::from_millis(200))
            }
            other => panic!("unexpected: {:?}", other),
        }

        let (strategy, dets) = gw.detect(video(4), 30.0).unwrap();
        assert_eq!(strategy, Strategy::Sequential);
        assert_eq!(dets.len(), 8);
        // 放弃的批量结果不进缓存
        assert!(!gw.cache().contains("video_clip_30"));
    }

    #[test]
    fn test_empty_batch_falls_back() {
        let mut stub = StubBackend::new();
        stub.batch = Some(Vec::new());
        let mut gw = gateway(stub);
        let outcome = gw.detect_video(video(3), 30.0).unwrap();
        assert!(matches!(outcome, BatchOutcome::Fallback(FallbackReason::Empty)));
    }

    #[test]
    fn test_unsupported_batch_falls_back() {
        let mut gw = gateway(StubBackend::new());
        let outcome = gw.detect_video(video(3), 30.0).unwrap();
        assert!(matches!(outcome, BatchOutcome::Fallback(FallbackReason::Failed(_))));
    }

    #[test]
    fn test_batch_completes_and_is_cached() {
        let mut stub = StubBackend::new();
        stub.batch = Some(vec![Detection::new(0, Point2::new(1.0, 1.0), 2.0, 2.0, 0.9)]);
        let backend = Arc::new(stub);
        let mut gw = InferenceGateway::with_backend(
            backend.clone(),
            fast_config(),
            DetectionCache::default(),
        );
        let (strategy, dets) = gw.detect(video(3), 30.0).unwrap();
        assert_eq!(strategy, Strategy::Batch);
        assert_eq!(dets.len(), 1);
        assert!(gw.cache().contains("video_clip_30"));

        // 第二次命中缓存, 不再调用后端
        let (strategy, cached) = gw.detect(video(3), 30.0).unwrap();
        assert_eq!(strategy, Strategy::Batch);
        assert_eq!(cached, dets);
        assert_eq!(backend.batch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sequential_tolerates_frame_failures() {
        let mut stub = StubBackend::new();
        stub.fail_frames = vec![1, 2];
        let mut gw = gateway(stub);
        let dets = gw.detect_sequential(video(5).as_ref(), 30.0).unwrap();
        let frames: Vec<usize> = dets.iter().map(|d| d.frame_index()).collect();
        assert_eq!(frames, vec![0, 0, 3, 3, 4, 4]);
    }
}
