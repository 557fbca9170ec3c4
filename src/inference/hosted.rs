/// 托管检测服务后端 (HTTP)
///
/// 每帧编码为 JPEG 后 POST 到服务地址, 返回 JSON 经适配器转换。
/// 服务没有整段视频接口, 网关会直接走逐帧策略。
use std::time::Duration;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use serde_json::Value;

use super::backend::DetectionBackend;
use crate::detection::{parse_detections, ClassFilter, Detection, FrameContext};
use crate::input::Frame;

const JPEG_QUALITY: u8 = 85;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HostedBackend {
    endpoint: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl HostedBackend {
    pub fn new<S: Into<String>>(endpoint: S, api_key: Option<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            anyhow::bail!("endpoint must be an http(s) URL, got {}", endpoint);
        }
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Ok(Self {
            endpoint,
            api_key,
            agent,
        })
    }

    fn encode(frame: &Frame) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
            .encode_image(frame.image.as_ref())
            .with_context(|| format!("failed to encode frame {}", frame.index))?;
        Ok(buf)
    }
}

impl DetectionBackend for HostedBackend {
    fn name(&self) -> &str {
        "hosted"
    }

    fn detect_frame(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let body = Self::encode(frame)?;

        let mut request = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "image/jpeg");
        if let Some(key) = &self.api_key {
            request = request.query("api_key", key);
        }

        let response = request
            .send_bytes(&body)
            .with_context(|| format!("request to {} failed", self.endpoint))?;
        let text = response
            .into_string()
            .context("failed to read detection response")?;
        let payload: Value =
            serde_json::from_str(&text).context("detection response is not valid JSON")?;

        Ok(parse_detections(
            &payload,
            FrameContext::single(frame.index),
            &ClassFilter::allow_all(),
        ))
    }
}
