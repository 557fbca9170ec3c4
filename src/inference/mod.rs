/// 推理层 (Inference)
///
/// - backend:   检测后端统一接口
/// - gateway:   异步就绪等待 + 批量 / 逐帧策略 + 缓存
/// - replay:    录制的服务返回
/// - hosted:    HTTP 检测服务
/// - simulated: 固定种子的仿真场景
pub mod backend;
pub mod gateway;
pub mod hosted;
pub mod replay;
pub mod simulated;

pub use backend::DetectionBackend;
pub use gateway::{BatchOutcome, FallbackReason, GatewayStats, InferenceGateway, Strategy};
pub use hosted::HostedBackend;
pub use replay::ReplayBackend;
pub use simulated::{SimulatedBackend, SimulatedScene};
