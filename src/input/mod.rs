/// 视频输入 (Video Input)
///
/// 解码属于外部媒体组件; 这里只定义按帧号读取的接口与两个实现
/// - FrameSource:   帧读取接口
/// - ImageSequence: 目录中的图片序列
/// - BlankVideo:    空白帧 (回放 / 仿真)
pub mod blank;
pub mod image_sequence;
pub mod source;

pub use blank::BlankVideo;
pub use image_sequence::ImageSequence;
pub use source::{sampled_indices, sampling_step, Frame, FrameSource};
