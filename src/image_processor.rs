//! # Image Processing Module
//!
//! Questo modulo implementa la policy di trasformazione delle immagini: decide
//! *quali* richieste fare all'`ImageEngine`, in che ordine e con quale qualità.
//!
//! ## Pipeline di Conversione
//!
//! 1. **Validazione**: path non vuoti, sorgente esistente, directory di output creata
//! 2. **Caricamento**: buffer, dimensioni in pixel e orientamento EXIF
//! 3. **Orientamento**: con tag 5-8 (famiglia ruotata di 90°) larghezza e altezza
//!    vengono scambiate prima di qualsiasi calcolo di geometria
//! 4. **Crop plan**: rettangolo centrato con l'aspect ratio del target
//! 5. **Crop + encode**: WebP, qualità iniziale 90
//! 6. **Resize**: se il crop non ha già le dimensioni target, resize forzato
//! 7. **Budget**: finché il buffer supera `image_size_kb`, qualità −5 e
//!    re-encode dal rettangolo di crop originale, fino al minimo di 20
//! 8. **Salvataggio**: `<output_dir>/<nome_output_dir>_<NNNN>.webp`
//!
//! ## Esempio di crop
//!
//! ```text
//! Sorgente: 4000x3000   Target: 1080x1920 (ratio 0.5625)
//! 4000/3000 = 1.333 > 0.5625  →  crop in altezza
//! crop = 1687x3000, left = 1156, top = 0
//! ```
//!
//! ## Memoria
//!
//! Il buffer sorgente e quelli codificati vivono solo per la durata del task e
//! vengono rilasciati deterministicamente all'uscita di `process`; il picco di
//! memoria è limitato dal numero di worker.

use crate::converter::IndexSequence;
use crate::engine::{
    CropPlan, Gravity, ImageEngine, ImageSize, OutputCodec, ProcessRequest,
};
use crate::error::{ConvertError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Quality of the first encode
pub const INITIAL_QUALITY: u8 = 90;
/// The reduction loop never goes below this
pub const MIN_QUALITY: u8 = 20;
/// Quality decrement per reduction step
pub const QUALITY_STEP: u8 = 5;

const OUTPUT_CODEC: OutputCodec = OutputCodec::Webp;

/// Descending quality values tried by the size-budget loop: 90, 85, ..., 20
#[derive(Debug, Clone)]
pub struct QualitySchedule {
    next: Option<u8>,
}

impl QualitySchedule {
    pub fn new() -> Self {
        Self {
            next: Some(INITIAL_QUALITY),
        }
    }
}

impl Default for QualitySchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for QualitySchedule {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let current = self.next?;
        self.next = (current > MIN_QUALITY).then(|| current.saturating_sub(QUALITY_STEP).max(MIN_QUALITY));
        Some(current)
    }
}

/// Size used for geometry, after applying the EXIF orientation
pub fn effective_size(size: ImageSize, orientation: Option<u8>) -> ImageSize {
    match orientation {
        Some(5..=8) => ImageSize::new(size.height, size.width),
        _ => size,
    }
}

/// Centered crop rectangle matching the target aspect ratio
pub fn plan_crop(source: ImageSize, target: ImageSize) -> Result<CropPlan> {
    let invalid = |crop_width: u32, crop_height: u32, left: u32, top: u32| ConvertError::InvalidCrop {
        source_width: source.width,
        source_height: source.height,
        left,
        top,
        crop_width,
        crop_height,
    };

    if source.width == 0 || source.height == 0 || target.width == 0 || target.height == 0 {
        return Err(invalid(0, 0, 0, 0));
    }

    let target_ratio = target.width as f64 / target.height as f64;
    let source_ratio = source.width as f64 / source.height as f64;

    let (crop_width, crop_height) = if source_ratio > target_ratio {
        // Wider than the target: keep the full height
        let crop_height = source.height;
        ((crop_height as f64 * target_ratio).floor() as u32, crop_height)
    } else {
        let crop_width = source.width;
        (crop_width, (crop_width as f64 / target_ratio).floor() as u32)
    };

    let crop_width = crop_width.min(source.width);
    let crop_height = crop_height.min(source.height);

    let left = (source.width - crop_width) / 2;
    let top = (source.height - crop_height) / 2;

    if crop_width == 0
        || crop_height == 0
        || left + crop_width > source.width
        || top + crop_height > source.height
    {
        return Err(invalid(crop_width, crop_height, left, top));
    }

    Ok(CropPlan {
        crop_width,
        crop_height,
        left,
        top,
    })
}

/// `<dir>/<dir basename>_<NNNN>.webp`
pub fn image_output_path(output_dir: &Path, index: u64) -> PathBuf {
    let folder_name = output_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    output_dir.join(format!(
        "{}_{:04}.{}",
        folder_name,
        index,
        OUTPUT_CODEC.extension()
    ))
}

/// Applies the crop → resize → quality-reduction policy through an `ImageEngine`
pub struct ImageProcessor {
    engine: Arc<dyn ImageEngine>,
    target: ImageSize,
    budget_bytes: usize,
}

impl ImageProcessor {
    pub fn new(engine: Arc<dyn ImageEngine>, target: ImageSize, budget_bytes: usize) -> Self {
        Self {
            engine,
            target,
            budget_bytes,
        }
    }

    /// Convert one image into `output_dir`, returning the written path
    pub async fn process(
        &self,
        input_path: &Path,
        output_dir: &Path,
        index: &IndexSequence,
    ) -> Result<PathBuf> {
        Self::validate(input_path, output_dir).await?;

        let buffer = self.engine.read(input_path).await?;
        if buffer.is_empty() {
            return Err(ConvertError::Read {
                path: input_path.to_path_buf(),
                reason: "empty image buffer".to_string(),
            });
        }

        let raw_size = self.engine.size(&buffer).await?;
        let metadata = self.engine.metadata(&buffer).await?;
        let source = effective_size(raw_size, metadata.orientation);
        let rect = plan_crop(source, self.target)?;

        info!(
            "Image size: {}x{}, Crop area: {},{} {}x{}",
            source.width, source.height, rect.left, rect.top, rect.crop_width, rect.crop_height
        );

        let mut schedule = QualitySchedule::new();
        let mut quality = schedule.next().unwrap_or(INITIAL_QUALITY);
        let mut encoded = self.encode(&buffer, rect, quality).await?;

        while encoded.len() > self.budget_bytes {
            let Some(lower) = schedule.next() else {
                warn!(
                    "{} still {} bytes at quality {}, above budget of {} bytes",
                    input_path.display(),
                    encoded.len(),
                    quality,
                    self.budget_bytes
                );
                break;
            };
            quality = lower;
            debug!("Re-encoding {} at quality {}", input_path.display(), quality);
            encoded = self.encode(&buffer, rect, quality).await?;
        }
        drop(buffer);

        let output_file = image_output_path(output_dir, index.next());
        self.engine.write(&output_file, &encoded).await?;

        info!(
            "Successfully processed image: {} -> {} ({} bytes, quality {})",
            input_path.display(),
            output_file.display(),
            encoded.len(),
            quality
        );
        Ok(output_file)
    }

    async fn validate(input_path: &Path, output_dir: &Path) -> Result<()> {
        if input_path.as_os_str().is_empty() || output_dir.as_os_str().is_empty() {
            return Err(ConvertError::Validation(
                "input path and output path cannot be empty".into(),
            ));
        }
        if !tokio::fs::try_exists(input_path).await.unwrap_or(false) {
            return Err(ConvertError::Validation(format!(
                "input file does not exist: {}",
                input_path.display()
            )));
        }
        tokio::fs::create_dir_all(output_dir).await?;
        Ok(())
    }

    /// Crop from the original buffer, then correct the size if rounding left a mismatch
    async fn encode(&self, source: &[u8], rect: CropPlan, quality: u8) -> Result<Vec<u8>> {
        let crop = ProcessRequest::Crop {
            rect,
            gravity: Gravity::Center,
            quality,
            codec: OUTPUT_CODEC,
        };
        let cropped = self.engine.process(source, &crop).await?;

        if rect.crop_width == self.target.width && rect.crop_height == self.target.height {
            return Ok(cropped);
        }

        let resize = ProcessRequest::Resize {
            width: self.target.width,
            height: self.target.height,
            quality,
            codec: OUTPUT_CODEC,
        };
        self.engine.process(&cropped, &resize).await
    }
}
