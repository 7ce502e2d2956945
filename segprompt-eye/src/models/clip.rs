//! CLIP image/text encoders on ONNX Runtime

use crate::error::VisionError;
use crate::models::RegionEmbedder;
use crate::utils::normalize;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::Tensor;
use segprompt_core::Device;
use std::path::Path;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

/// Input resolution of the CLIP vision tower.
pub const CLIP_INPUT_SIZE: u32 = 224;

/// Token context length of the CLIP text tower.
pub const CLIP_CONTEXT_LENGTH: usize = 77;

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

const IMAGE_INPUT: &str = "pixel_values";
const TEXT_INPUT: &str = "input_ids";

/// CLIP loaded from a directory holding `image_encoder.onnx`,
/// `text_encoder.onnx` and `tokenizer.json`.
pub struct ClipEmbedder {
    image_session: Session,
    text_session: Session,
    tokenizer: Tokenizer,
}

impl ClipEmbedder {
    pub fn load(model_dir: &Path, device: Device) -> Result<Self, VisionError> {
        let image_path = model_dir.join("image_encoder.onnx");
        let text_path = model_dir.join("text_encoder.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        for path in [&image_path, &text_path, &tokenizer_path] {
            if !path.exists() {
                return Err(VisionError::Embedding(format!(
                    "{} not found in {:?}",
                    path.file_name().and_then(|n| n.to_str()).unwrap_or("model file"),
                    model_dir
                )));
            }
        }

        let image_session = build_session(&image_path, device)?;
        let text_session = build_session(&text_path, device)?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| VisionError::Embedding(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: CLIP_CONTEXT_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| VisionError::Embedding(format!("Failed to set truncation: {}", e)))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(CLIP_CONTEXT_LENGTH),
            pad_id: 0,
            ..Default::default()
        }));

        info!("CLIP model loaded from {:?} on {}", model_dir, device);
        Ok(Self {
            image_session,
            text_session,
            tokenizer,
        })
    }

    /// Token ids for `text`, exactly `CLIP_CONTEXT_LENGTH` long.
    pub fn tokenize(&self, text: &str) -> Result<Vec<i64>, VisionError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| VisionError::Embedding(format!("Failed to tokenize {:?}: {}", text, e)))?;
        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        ids.resize(CLIP_CONTEXT_LENGTH, 0);
        Ok(ids)
    }
}

fn build_session(path: &Path, device: Device) -> Result<Session, VisionError> {
    let mut builder = Session::builder()?;
    if device == Device::Accelerator {
        builder = builder.with_execution_providers([CUDAExecutionProvider::default().build()])?;
    }
    builder
        .commit_from_file(path)
        .map_err(|e| VisionError::Ort(format!("Failed to load {:?}: {}", path, e)))
}

/// Shorter side to 224 (bicubic), center crop, CHW with CLIP mean/std.
fn preprocess(image: &RgbImage, out: &mut Vec<f32>) {
    let (w, h) = image.dimensions();
    let scale = CLIP_INPUT_SIZE as f32 / w.min(h).max(1) as f32;
    let rw = ((w as f32 * scale).round() as u32).max(CLIP_INPUT_SIZE);
    let rh = ((h as f32 * scale).round() as u32).max(CLIP_INPUT_SIZE);
    let resized = imageops::resize(image, rw, rh, FilterType::CatmullRom);
    let left = (rw - CLIP_INPUT_SIZE) / 2;
    let top = (rh - CLIP_INPUT_SIZE) / 2;
    let cropped = imageops::crop_imm(&resized, left, top, CLIP_INPUT_SIZE, CLIP_INPUT_SIZE).to_image();

    for c in 0..3 {
        for pixel in cropped.pixels() {
            let v = pixel.0[c] as f32 / 255.0;
            out.push((v - CLIP_MEAN[c]) / CLIP_STD[c]);
        }
    }
}

fn rows(data: &[f32], count: usize) -> Result<Vec<Vec<f32>>, VisionError> {
    if count == 0 || data.len() % count != 0 {
        return Err(VisionError::Embedding(format!(
            "cannot split {} values into {} embeddings",
            data.len(),
            count
        )));
    }
    let dim = data.len() / count;
    Ok(data
        .chunks_exact(dim)
        .map(|chunk| {
            let mut v = chunk.to_vec();
            normalize(&mut v);
            v
        })
        .collect())
}

impl RegionEmbedder for ClipEmbedder {
    fn encode_images(&mut self, images: &[RgbImage]) -> Result<Vec<Vec<f32>>, VisionError> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        let side = CLIP_INPUT_SIZE as usize;
        let mut batch = Vec::with_capacity(images.len() * 3 * side * side);
        for image in images {
            preprocess(image, &mut batch);
        }

        let shape = [images.len() as i64, 3, side as i64, side as i64];
        let tensor = Tensor::from_array((shape, batch.into_boxed_slice()))?;
        let outputs = self.image_session.run(ort::inputs![IMAGE_INPUT => tensor])?;
        let (_, data) = outputs[0].try_extract_tensor::<f32>()?;
        debug!("Encoded {} crops", images.len());
        rows(data, images.len())
    }

    fn encode_text(&mut self, text: &str) -> Result<Vec<f32>, VisionError> {
        let ids = self.tokenize(text)?;
        let tensor = Tensor::from_array(([1i64, CLIP_CONTEXT_LENGTH as i64], ids.into_boxed_slice()))?;
        let outputs = self.text_session.run(ort::inputs![TEXT_INPUT => tensor])?;
        let (_, data) = outputs[0].try_extract_tensor::<f32>()?;
        let mut embedding = rows(data, 1)?;
        embedding
            .pop()
            .ok_or_else(|| VisionError::Embedding("text encoder returned nothing".to_string()))
    }
}
