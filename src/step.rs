//! Pipeline steps (spec.md §4.C).
//!
//! A step is a polymorphic value implementing `do(ctx) -> ctx'` and
//! `children() -> [Automation]`. Variants are fixed by the spec, so a
//! tagged-union (`StepKind`) with one `children` list per step is the
//! straightforward representation — the same shape the teacher uses for its
//! transform pipeline variants (`ccs/convert/`'s `Converter` enum) and its
//! `ChunkFetcher` trait object for the single method that varies (`fetch`).

use crate::automation::Automation;
use crate::error::{Error, Result};
use crate::naming::Namer;
use crate::storage::{ObjectStore, Size};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, warn};

/// The `{ name, body }` value threaded through a pipeline. `body` is
/// `None` for a rename-only automation whose source step was skipped.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub name: String,
    pub body: Option<Vec<u8>>,
}

impl PipelineContext {
    pub fn new(name: impl Into<String>, body: Vec<u8>) -> Self {
        Self { name: name.into(), body: Some(body) }
    }
}

/// Out-of-band handle a step needs to reach its owning folder's storage —
/// the `Source` step reads from it, the `Sinker` step writes to it.
#[derive(Clone)]
pub struct RunContext {
    pub storage: Arc<dyn ObjectStore>,
    pub dir: String,
}

/// Compositing offset for the watermarker (spec.md Open Question 2: made a
/// config field rather than hard-coded at (0, 0)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Offset {
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkConfig {
    pub path: String,
    #[serde(default)]
    pub offset: Offset,
}

/// One node of an automation's step chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepKind {
    /// Sets `ctx.body` by loading the current `ctx.name` from the owning
    /// folder's primary storage. Used as the first step when re-running an
    /// automation against an existing source (synchronizer, apply-to-existing).
    Source,
    /// Sets `ctx.name = namer.name(ctx.name)`. Always the first step inside
    /// an automation (spec.md §4.D step 1).
    Namer(Namer),
    /// Decodes JPEG, resizes preserving aspect ratio, re-encodes JPEG.
    Resizer { size: Size, #[serde(default)] children: Vec<Automation> },
    /// Decodes JPEG, composites a PNG watermark over it, re-encodes JPEG.
    Watermarker { #[serde(flatten)] config: WatermarkConfig, #[serde(default)] children: Vec<Automation> },
    /// Identity on JPEG input; otherwise decodes and re-encodes as JPEG.
    JpegConverter,
    /// Identity. Reserved for metadata injection.
    Tagger,
    /// Writes `(ctx.name, ctx.body)` into the owning folder's storage.
    /// Always the last step executed. No-op if `ctx.body` is absent/empty.
    Sinker,
}

impl StepKind {
    /// Child automations declared by this step, run after it completes
    /// (spec.md §4.D step 4). Only `Resizer` and `Watermarker` carry
    /// children in the current config schema.
    pub fn children(&self) -> &[Automation] {
        match self {
            StepKind::Resizer { children, .. } => children,
            StepKind::Watermarker { children, .. } => children,
            _ => &[],
        }
    }

    /// Mutable access to this step's children, for post-load fixups
    /// (`Automation::assign_default_names`).
    pub fn children_mut(&mut self) -> &mut [Automation] {
        match self {
            StepKind::Resizer { children, .. } => children,
            StepKind::Watermarker { children, .. } => children,
            _ => &mut [],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Source => "source",
            StepKind::Namer(_) => "namer",
            StepKind::Resizer { .. } => "resizer",
            StepKind::Watermarker { .. } => "watermarker",
            StepKind::JpegConverter => "jpeg-converter",
            StepKind::Tagger => "tagger",
            StepKind::Sinker => "sinker",
        }
    }

    /// Runs this step's transform, producing the next context. Children are
    /// driven by the caller (`Automation::run`), not here, since each child
    /// must see a *copy* of the post-step context (spec.md §4.D step 4).
    pub async fn execute(&self, ctx: PipelineContext, rctx: &RunContext) -> Result<PipelineContext> {
        match self {
            StepKind::Source => {
                let bytes = rctx.storage.get(&rctx.dir, &ctx.name).await?;
                Ok(PipelineContext { body: Some(bytes), ..ctx })
            }
            StepKind::Namer(namer) => {
                let name = namer.name(&ctx.name);
                Ok(PipelineContext { name, ..ctx })
            }
            // Decode/resize/encode and decode/composite/encode are CPU-bound;
            // run them on the blocking pool rather than a tokio worker
            // thread (spec.md §5, §9), matching the teacher's own
            // `spawn_blocking`-wrapped handler bodies (e.g.
            // `daemon/routes.rs`'s `list_transactions_handler`).
            StepKind::Resizer { size, .. } => {
                let size = *size;
                tokio::task::spawn_blocking(move || resize(ctx, size))
                    .await
                    .map_err(|e| Error::Transient(format!("resizer task join error: {e}")))?
            }
            StepKind::Watermarker { config, .. } => {
                let config = config.clone();
                tokio::task::spawn_blocking(move || watermark(ctx, &config))
                    .await
                    .map_err(|e| Error::Transient(format!("watermarker task join error: {e}")))?
            }
            StepKind::JpegConverter => {
                tokio::task::spawn_blocking(move || jpeg_convert(ctx))
                    .await
                    .map_err(|e| Error::Transient(format!("jpeg-converter task join error: {e}")))?
            }
            StepKind::Tagger => Ok(ctx),
            StepKind::Sinker => {
                match &ctx.body {
                    Some(bytes) if !bytes.is_empty() => {
                        rctx.storage
                            .put(&rctx.dir, &ctx.name, bytes.clone(), None)
                            .await?;
                        debug!(name = %ctx.name, dir = %rctx.dir, "sinker wrote derivative");
                    }
                    _ => debug!(name = %ctx.name, "sinker no-op: empty body"),
                }
                Ok(ctx)
            }
        }
    }
}

fn require_body(ctx: &PipelineContext) -> Result<&[u8]> {
    ctx.body
        .as_deref()
        .filter(|b| !b.is_empty())
        .ok_or_else(|| Error::InvalidInput(format!("step requires a body for {}", ctx.name)))
}

fn decode_jpeg(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(|e| Error::DecodeError(e.to_string()))
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .map_err(|e| Error::DecodeError(e.to_string()))?;
    Ok(buf)
}

/// Computes the output size that fits `input` inside `target` preserving
/// aspect ratio (spec.md §4.C aspect rule).
pub fn clip_to_box(input: Size, target: Size) -> Size {
    if input.width < input.height {
        let out_h = target.height;
        let out_w = (target.height as f64 * input.width as f64 / input.height as f64).round() as i32;
        Size::new(out_w, out_h)
    } else {
        let out_w = target.width;
        let out_h = (target.width as f64 * input.height as f64 / input.width as f64).round() as i32;
        Size::new(out_w, out_h)
    }
}

fn resize(ctx: PipelineContext, target: Size) -> Result<PipelineContext> {
    if !target.is_valid() {
        return Err(Error::config(format!(
            "resizer target dimensions must be > 0, got {}x{}",
            target.width, target.height
        )));
    }
    let bytes = require_body(&ctx)?;
    let img = decode_jpeg(bytes)?;
    let input = Size::new(img.width() as i32, img.height() as i32);
    let out = clip_to_box(input, target);
    let resized = img.resize_exact(out.width as u32, out.height as u32, image::imageops::FilterType::Nearest);
    let body = encode_jpeg(&resized)?;
    Ok(PipelineContext { body: Some(body), ..ctx })
}

fn watermark(ctx: PipelineContext, config: &WatermarkConfig) -> Result<PipelineContext> {
    let bytes = require_body(&ctx)?;
    let mut base = decode_jpeg(bytes)?.to_rgba8();

    let wm_bytes = std::fs::read(&config.path)
        .map_err(|e| Error::DecodeError(format!("watermark {}: {}", config.path, e)))?;
    let watermark = image::load_from_memory_with_format(&wm_bytes, ImageFormat::Png)
        .map_err(|e| Error::DecodeError(e.to_string()))?
        .to_rgba8();

    image::imageops::overlay(&mut base, &watermark, config.offset.x, config.offset.y);

    let composited = DynamicImage::ImageRgba8(base).to_rgb8();
    let body = encode_jpeg(&DynamicImage::ImageRgb8(composited))?;
    Ok(PipelineContext { body: Some(body), ..ctx })
}

fn jpeg_convert(ctx: PipelineContext) -> Result<PipelineContext> {
    let bytes = require_body(&ctx)?;
    if bytes.starts_with(&[0xFF, 0xD8]) {
        return Ok(ctx);
    }
    warn!(name = %ctx.name, "jpeg-converter: non-JPEG input, re-encoding");
    let img = image::load_from_memory(bytes).map_err(|e| Error::DecodeError(e.to_string()))?;
    let body = encode_jpeg(&img)?;
    Ok(PipelineContext { body: Some(body), ..ctx })
}
