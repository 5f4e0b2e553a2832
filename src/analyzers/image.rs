// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Image analyzer using a local vision model for object detection and OCR

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{clean_label, truncate_chars, ContentAnalyzer};
use crate::config::PromptConfig;
use crate::model::{AiInsights, FileRecord};
use crate::ollama::OllamaClient;
use crate::Result;

/// Longest side sent to the vision model
const MAX_DIMENSION: u32 = 1024;

/// Characters of OCR output kept in the insights
const MAX_DETECTED_TEXT: usize = 500;

/// Reply shape requested by the detection prompt
#[derive(Debug, Default, Deserialize)]
struct VisionReply {
    #[serde(default)]
    primary_object: Option<String>,
    #[serde(default)]
    scene: Option<String>,
    #[serde(default)]
    has_text: bool,
}

/// Analyzer for image files
pub struct ImageAnalyzer {
    client: Arc<OllamaClient>,
    model: String,
    detect_prompt: String,
    ocr_prompt: String,
}

impl ImageAnalyzer {
    pub fn new(client: Arc<OllamaClient>, model: &str, prompts: &PromptConfig) -> Self {
        Self {
            client,
            model: model.to_string(),
            detect_prompt: prompts.image.clone(),
            ocr_prompt: prompts.ocr.clone(),
        }
    }

    /// Downsize to the model's working size and re-encode as JPEG
    fn prepare_image(path: &Path) -> Result<Vec<u8>> {
        let img = image::open(path)?;

        let img = if img.width() > MAX_DIMENSION || img.height() > MAX_DIMENSION {
            img.resize(MAX_DIMENSION, MAX_DIMENSION, image::imageops::FilterType::Triangle)
        } else {
            img
        };

        // JPEG has no alpha channel
        let img = image::DynamicImage::ImageRgb8(img.to_rgb8());

        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        img.write_to(&mut cursor, image::ImageFormat::Jpeg)?;

        Ok(buffer)
    }

    /// Encoded payload, falling back to the raw bytes for formats the decoder lacks
    fn encode_image(path: &Path) -> Result<String> {
        match Self::prepare_image(path) {
            Ok(data) => Ok(general_purpose::STANDARD.encode(data)),
            Err(e) => {
                debug!("Could not resize {:?} ({}), sending raw bytes", path, e);
                let data = std::fs::read(path)?;
                Ok(general_purpose::STANDARD.encode(data))
            }
        }
    }
}

/// Parse the detection reply, accepting prose around the JSON object or a bare label
fn parse_reply(response: &str) -> VisionReply {
    let json = match (response.find('{'), response.rfind('}')) {
        (Some(start), Some(end)) if start < end => &response[start..=end],
        _ => "",
    };

    if let Ok(reply) = serde_json::from_str::<VisionReply>(json) {
        return reply;
    }

    let label = clean_label(response);
    let first = label.split('-').next().unwrap_or_default();
    VisionReply {
        primary_object: (!first.is_empty()).then(|| first.to_string()),
        ..Default::default()
    }
}

#[async_trait]
impl ContentAnalyzer for ImageAnalyzer {
    fn name(&self) -> &'static str {
        "image"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif", "heic", "heif", "avif"]
    }

    fn priority(&self) -> u8 {
        100
    }

    async fn analyze(&self, record: &FileRecord) -> Result<AiInsights> {
        info!("Analyzing image: {:?}", record.path);

        let payload = Self::encode_image(&record.path)?;
        let response = self
            .client
            .generate_with_image(&self.model, &self.detect_prompt, &payload)
            .await?;
        let reply = parse_reply(&response);

        let mut insights = AiInsights {
            primary_object: reply.primary_object.map(|o| clean_label(&o)).filter(|o| !o.is_empty()),
            scene: reply.scene.map(|s| clean_label(&s)).filter(|s| !s.is_empty()),
            analyzer: self.name().to_string(),
            ..Default::default()
        };

        if reply.has_text {
            match self
                .client
                .generate_with_image(&self.model, &self.ocr_prompt, &payload)
                .await
            {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        insights.detected_text = Some(truncate_chars(text, MAX_DETECTED_TEXT));
                    }
                }
                Err(e) => warn!("OCR failed for {}: {}", record.name, e),
            }
        }

        Ok(insights)
    }
}
