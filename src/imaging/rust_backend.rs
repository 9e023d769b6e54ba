//! Production image processing backend.
//!
//! Everything is statically linked into the binary (libwebp is vendored by
//! `libwebp-sys`).
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image` crate (pure Rust decoders) |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → WebP | `webp::Encoder` (lossy libwebp at the configured quality) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! Encoded bytes are written to a temporary file next to the target and
//! renamed into place, so an interrupted run never leaves a truncated
//! derivative under the final name.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{ConvertParams, OutputFormat};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Write;
use std::path::Path;

/// Source extensions the pipeline picks up. Matched case-insensitively.
const SOURCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Returns the raster extensions treated as conversion sources.
pub fn supported_input_extensions() -> &'static [&'static str] {
    SOURCE_EXTENSIONS
}

/// Backend built on the `image` and `webp` crates.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk, sniffing the format from content.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Both encoders only take 8-bit RGB(A); 16-bit PNGs and grayscale sources
/// are normalised here.
fn to_rgb8_family(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img,
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

fn encode_image(
    img: &DynamicImage,
    format: OutputFormat,
    quality: u32,
) -> Result<Vec<u8>, BackendError> {
    match format {
        OutputFormat::WebP => encode_webp(img, quality),
        OutputFormat::Avif => encode_avif(img, quality),
    }
}

/// Lossy WebP via libwebp.
fn encode_webp(img: &DynamicImage, quality: u32) -> Result<Vec<u8>, BackendError> {
    let encoder = webp::Encoder::from_image(img)
        .map_err(|e| BackendError::ProcessingFailed(format!("WebP encode failed: {}", e)))?;
    let encoded = encoder
        .encode_simple(false, quality as f32)
        .map_err(|e| BackendError::ProcessingFailed(format!("WebP encode failed: {:?}", e)))?;
    Ok(encoded.to_vec())
}

/// Encode as AVIF using rav1e (speed=6 for reasonable throughput).
fn encode_avif(img: &DynamicImage, quality: u32) -> Result<Vec<u8>, BackendError> {
    let mut bytes = Vec::new();
    let encoder =
        image::codecs::avif::AvifEncoder::new_with_speed_quality(&mut bytes, 6, quality as u8);
    img.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("AVIF encode failed: {}", e)))?;
    Ok(bytes)
}

/// Write `bytes` to `path` through a temporary file in the same directory.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| BackendError::Io(e.error))?;
    Ok(())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::open(path)
            .map_err(BackendError::Io)?
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .into_dimensions()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!(
                    "Failed to read dimensions of {}: {}",
                    path.display(),
                    e
                ))
            })?;
        Ok(Dimensions { width, height })
    }

    fn convert(&self, params: &ConvertParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let img = if img.width() != params.width || img.height() != params.height {
            img.resize_exact(params.width, params.height, FilterType::Lanczos3)
        } else {
            img
        };
        let bytes = encode_image(&to_rgb8_family(img), params.format, params.quality.value())?;
        write_atomically(&params.output, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use image::{ImageEncoder, RgbImage, RgbaImage};
    use std::io::BufWriter;

    /// Create a small valid JPEG file with the given dimensions.
    fn create_test_jpeg(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let file = std::fs::File::create(path).unwrap();
        image::codecs::jpeg::JpegEncoder::new(BufWriter::new(file))
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
    }

    /// Create a small valid PNG with an alpha channel.
    fn create_test_png(path: &Path, width: u32, height: u32) {
        RgbaImage::from_fn(width, height, |x, _| image::Rgba([200, (x % 256) as u8, 10, 180]))
            .save(path)
            .unwrap();
    }

    fn params(source: &Path, output: &Path, width: u32, height: u32) -> ConvertParams {
        ConvertParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            width,
            height,
            quality: Quality::new(80),
            format: OutputFormat::WebP,
        }
    }

    #[test]
    fn supported_extensions_are_png_and_jpeg() {
        assert_eq!(supported_input_extensions(), &["png", "jpg", "jpeg"]);
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let result = RustBackend::new().identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn identify_garbage_bytes_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("corrupt.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        assert!(RustBackend::new().identify(&path).is_err());
    }

    #[test]
    fn convert_jpeg_to_webp_with_resize() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 400, 300);

        let output = tmp.path().join("resized.webp");
        RustBackend::new()
            .convert(&params(&source, &output, 200, 150))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (200, 150));
    }

    #[test]
    fn convert_png_with_alpha_keeps_dimensions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("logo.png");
        create_test_png(&source, 64, 32);

        let output = tmp.path().join("logo.webp");
        RustBackend::new()
            .convert(&params(&source, &output, 64, 32))
            .unwrap();

        let decoded = image::open(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 32));
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn convert_png_with_jpeg_extension_is_sniffed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("mislabeled.jpg");
        RgbImage::from_pixel(16, 16, image::Rgb([1, 2, 3]))
            .save_with_format(&source, image::ImageFormat::Png)
            .unwrap();

        let output = tmp.path().join("mislabeled.webp");
        RustBackend::new()
            .convert(&params(&source, &output, 16, 16))
            .unwrap();
        assert!(output.exists());
    }

    #[test]
    fn convert_to_avif() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 64, 48);

        let output = tmp.path().join("out.avif");
        RustBackend::new()
            .convert(&ConvertParams {
                format: OutputFormat::Avif,
                ..params(&source, &output, 32, 24)
            })
            .unwrap();

        assert!(output.exists());
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }

    /// Photographic-ish content: high-frequency noise that lossy encoders
    /// have to spend bits on.
    fn create_noisy_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_fn(width, height, |x, y| {
            let n = x.wrapping_mul(2_654_435_761).wrapping_add(y.wrapping_mul(40_503)) ^ (x * y);
            image::Rgb([(n % 256) as u8, ((n >> 8) % 256) as u8, ((n >> 16) % 256) as u8])
        })
        .save(path)
        .unwrap();
    }

    #[test]
    fn webp_quality_controls_size() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("noisy.png");
        create_noisy_png(&source, 200, 150);

        let low = tmp.path().join("low.webp");
        let high = tmp.path().join("high.webp");
        RustBackend::new()
            .convert(&ConvertParams {
                quality: Quality::new(10),
                ..params(&source, &low, 200, 150)
            })
            .unwrap();
        RustBackend::new()
            .convert(&ConvertParams {
                quality: Quality::new(90),
                ..params(&source, &high, 200, 150)
            })
            .unwrap();

        let low_size = std::fs::metadata(&low).unwrap().len();
        let high_size = std::fs::metadata(&high).unwrap().len();
        assert!(
            low_size < high_size,
            "q10 = {low_size} B, q90 = {high_size} B"
        );
        assert_eq!(image::image_dimensions(&low).unwrap(), (200, 150));
    }

    #[test]
    fn convert_replaces_existing_output_without_leftovers() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 40, 30);
        let out_dir = tmp.path().join("out");
        std::fs::create_dir_all(&out_dir).unwrap();
        let output = out_dir.join("source.webp");
        std::fs::write(&output, b"truncated").unwrap();

        RustBackend::new()
            .convert(&params(&source, &output, 40, 30))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (40, 30));
        let names: Vec<_> = std::fs::read_dir(&out_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("source.webp")]);
    }

    #[test]
    fn failed_convert_leaves_no_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.png");
        std::fs::write(&source, b"\x89PNG\r\n\x1a\n garbage").unwrap();
        let output = tmp.path().join("broken.webp");

        let result = RustBackend::new().convert(&params(&source, &output, 8, 8));

        assert!(result.is_err());
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn convert_corrupt_source_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        std::fs::write(&source, b"\xFF\xD8\xFF truncated").unwrap();

        let output = tmp.path().join("broken.webp");
        let result = RustBackend::new().convert(&params(&source, &output, 10, 10));
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }
}
