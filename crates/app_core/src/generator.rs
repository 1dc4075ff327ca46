//! Thumbnail generation for a single source file

use crate::resolver::{ArtifactFormat, CachePathResolver};
use crate::store::CacheStore;
use crate::AppError;
use app_fs::{classify, extension_of, MediaKind, SourcePath};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, RgbaImage};
use resvg::{tiny_skia, usvg};
use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of generating one thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    Ready(PathBuf),
    Error(String),
    Unsupported,
}

/// Produces a representative frame for a video file.
///
/// No extractor ships with the engine; without one every video is
/// `Unsupported`.
pub trait FrameExtractor: Send + Sync {
    fn extract_frame(&self, path: &Path) -> Result<DynamicImage, AppError>;
}

/// Thumbnail generator: decode, downscale, encode, persist
pub struct ThumbnailGenerator {
    store: Arc<dyn CacheStore>,
    resolver: CachePathResolver,
    jpeg_quality: u8,
    frames: Option<Arc<dyn FrameExtractor>>,
}

impl ThumbnailGenerator {
    pub fn new(store: Arc<dyn CacheStore>, resolver: CachePathResolver, jpeg_quality: u8) -> Self {
        Self {
            store,
            resolver,
            jpeg_quality: jpeg_quality.clamp(1, 100),
            frames: None,
        }
    }

    /// Route video files through `extractor` instead of reporting them unsupported
    pub fn with_frame_extractor(mut self, extractor: Arc<dyn FrameExtractor>) -> Self {
        self.frames = Some(extractor);
        self
    }

    pub fn resolver(&self) -> &CachePathResolver {
        &self.resolver
    }

    /// Can this kind of media reach `Ready` at all?
    pub fn supports(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Image => true,
            MediaKind::Video => self.frames.is_some(),
        }
    }

    /// Generate the thumbnail for one source file.
    ///
    /// Never panics and never fails the caller: every problem becomes
    /// `GenerateOutcome::Error`.
    pub fn generate(&self, source: &SourcePath) -> GenerateOutcome {
        let kind = match classify(source.as_path()) {
            Some(kind) if self.supports(kind) => kind,
            _ => return GenerateOutcome::Unsupported,
        };

        let result = catch_unwind(AssertUnwindSafe(|| self.try_generate(source, kind)))
            .unwrap_or_else(|_| Err(AppError::ImageDecode("decoder panicked".into())));

        match result {
            Ok(path) => GenerateOutcome::Ready(path),
            Err(AppError::UnsupportedFormat(_)) => GenerateOutcome::Unsupported,
            Err(e) => {
                tracing::warn!("Thumbnail error for {}: {}", source, e);
                GenerateOutcome::Error(e.user_message())
            }
        }
    }

    fn try_generate(&self, source: &SourcePath, kind: MediaKind) -> Result<PathBuf, AppError> {
        tracing::debug!("Generating thumbnail: {} ({:?})", source, kind);

        let location = self.resolver.resolve(source);
        let max = self.resolver.size();

        let img = match kind {
            MediaKind::Image => decode_image(source.as_path(), max)?,
            MediaKind::Video => match &self.frames {
                Some(frames) => frames.extract_frame(source.as_path())?,
                None => return Err(AppError::UnsupportedFormat(source.to_string())),
            },
        };

        let thumb = downscale(img, max);
        let bytes = encode(&thumb, location.format, self.jpeg_quality)?;
        self.store.write(&location, &bytes)
    }
}

/// Decode an image file; SVG is rasterized at `max` pixels on its long edge
pub fn decode_image(path: &Path, max: u32) -> Result<DynamicImage, AppError> {
    let data = std::fs::read(path).map_err(|e| map_read_error(e, path))?;

    if extension_of(path).as_deref() == Some("svg") {
        return render_svg(&data, max);
    }

    let mut reader = ImageReader::new(Cursor::new(&data))
        .with_guessed_format()
        .map_err(|e| AppError::ImageDecode(e.to_string()))?;

    // Unrecognized content is decoded as whatever the extension claims
    if reader.format().is_none() {
        if let Some(format) = extension_of(path).and_then(ImageFormat::from_extension) {
            reader.set_format(format);
        }
    }

    if let Some(format) = reader.format().filter(|f| !f.reading_enabled()) {
        return Err(AppError::UnsupportedFormat(format!("no {:?} decoder", format)));
    }

    Ok(reader.decode()?)
}

fn map_read_error(e: std::io::Error, path: &Path) -> AppError {
    match e.kind() {
        std::io::ErrorKind::NotFound => AppError::FileNotFound(path.display().to_string()),
        std::io::ErrorKind::PermissionDenied => AppError::AccessDenied(path.display().to_string()),
        _ => AppError::Io(e),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn render_svg(data: &[u8], max: u32) -> Result<DynamicImage, AppError> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default())?;

    let size = tree.size();
    let scale = max as f32 / size.width().max(size.height());
    let width = ((size.width() * scale).round() as u32).max(1);
    let height = ((size.height() * scale).round() as u32).max(1);

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| AppError::ImageDecode("cannot allocate SVG canvas".into()))?;

    resvg::render(&tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    RgbaImage::from_raw(width, height, pixmap.take())
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| AppError::ImageDecode("SVG canvas has an invalid length".into()))
}

/// Fit within `max`x`max`, preserving aspect ratio; never upscales
pub fn downscale(img: DynamicImage, max: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w > max || h > max {
        img.thumbnail(max, max)
    } else {
        img
    }
}

/// Encode a thumbnail for storage
pub fn encode(img: &DynamicImage, format: ArtifactFormat, jpeg_quality: u8) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();

    match format {
        ArtifactFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, jpeg_quality).encode_image(&rgb)?;
        }
        ArtifactFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), format.image_format())?;
        }
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCacheStore;
    use image::{ImageBuffer, Rgb, Rgba};
    use std::fs;

    fn generator() -> (Arc<MemoryCacheStore>, ThumbnailGenerator) {
        let store = Arc::new(MemoryCacheStore::new("/mem"));
        let resolver = CachePathResolver::new("/mem", 64);
        let generator = ThumbnailGenerator::new(store.clone(), resolver, 85);
        (store, generator)
    }

    fn write_jpeg(path: &Path, w: u32, h: u32) {
        let img = ImageBuffer::from_fn(w, h, |x, y| Rgb([(x % 255) as u8, (y % 255) as u8, 128]));
        img.save(path).unwrap();
    }

    fn write_png(path: &Path, w: u32, h: u32) {
        let img = ImageBuffer::from_fn(w, h, |x, _| Rgba([255, 0, 0, (x % 255) as u8]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_generate_jpeg_is_downscaled() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("wide.jpg");
        write_jpeg(&path, 400, 200);

        let (store, generator) = generator();
        let source = SourcePath::new(&path);
        let outcome = generator.generate(&source);

        let location = generator.resolver().resolve(&source);
        assert_eq!(outcome, GenerateOutcome::Ready(location.path.clone()));

        let bytes = store.bytes(&location.relative).unwrap();
        let thumb = image::load_from_memory(&bytes).unwrap();
        assert_eq!(thumb.dimensions(), (64, 32));
    }

    #[test]
    fn test_small_png_is_not_upscaled_and_keeps_alpha() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("small.png");
        write_png(&path, 10, 20);

        let (store, generator) = generator();
        let source = SourcePath::new(&path);
        assert!(matches!(generator.generate(&source), GenerateOutcome::Ready(_)));

        let location = generator.resolver().resolve(&source);
        let bytes = store.bytes(&location.relative).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);
        let thumb = image::load_from_memory(&bytes).unwrap();
        assert_eq!(thumb.dimensions(), (10, 20));
        assert!(thumb.color().has_alpha());
    }

    #[test]
    fn test_svg_is_rasterized() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("icon.svg");
        fs::write(
            &path,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10"><rect width="20" height="10" fill="blue"/></svg>"#,
        )
        .unwrap();

        let (store, generator) = generator();
        let source = SourcePath::new(&path);
        assert!(matches!(generator.generate(&source), GenerateOutcome::Ready(_)));

        let location = generator.resolver().resolve(&source);
        let thumb = image::load_from_memory(&store.bytes(&location.relative).unwrap()).unwrap();
        assert_eq!(thumb.dimensions(), (64, 32));
    }

    #[test]
    fn test_corrupt_image_is_error_without_write() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.jpg");
        fs::write(&path, b"\xFF\xD8\xFF\xE0 definitely not a jpeg").unwrap();

        let (store, generator) = generator();
        assert!(matches!(
            generator.generate(&SourcePath::new(&path)),
            GenerateOutcome::Error(_)
        ));
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_format_without_decoder_is_unsupported() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("photo.avif");
        fs::write(&path, b"\0\0\0\x1cftypavif\0\0\0\0avifmif1miaf").unwrap();

        let (store, generator) = generator();
        assert_eq!(generator.generate(&SourcePath::new(&path)), GenerateOutcome::Unsupported);
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_garbage_with_known_extension_is_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.png");
        fs::write(&path, b"garbage").unwrap();

        let (store, generator) = generator();
        assert!(matches!(
            generator.generate(&SourcePath::new(&path)),
            GenerateOutcome::Error(_)
        ));
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_missing_file_is_error() {
        let temp = tempfile::tempdir().unwrap();
        let (_store, generator) = generator();
        let outcome = generator.generate(&SourcePath::new(temp.path().join("gone.png")));
        assert!(matches!(outcome, GenerateOutcome::Error(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_unsupported_without_touching_filesystem() {
        let (store, generator) = generator();
        // None of these exist; classification alone decides
        for name in ["/nowhere/notes.txt", "/nowhere/clip.mp4", "/nowhere/photo.heic", "/nowhere/README"] {
            assert_eq!(
                generator.generate(&SourcePath::new(name)),
                GenerateOutcome::Unsupported,
                "{}",
                name
            );
        }
        assert_eq!(store.writes(), 0);
    }

    struct SolidFrame;

    impl FrameExtractor for SolidFrame {
        fn extract_frame(&self, _path: &Path) -> Result<DynamicImage, AppError> {
            Ok(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(320, 180, Rgb([0, 200, 0]))))
        }
    }

    #[test]
    fn test_video_with_frame_extractor() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("clip.mp4");
        fs::write(&path, b"not decoded by the fake").unwrap();

        let store = Arc::new(MemoryCacheStore::new("/mem"));
        let generator = ThumbnailGenerator::new(store.clone(), CachePathResolver::new("/mem", 64), 85)
            .with_frame_extractor(Arc::new(SolidFrame));

        assert!(generator.supports(MediaKind::Video));
        assert!(matches!(
            generator.generate(&SourcePath::new(&path)),
            GenerateOutcome::Ready(_)
        ));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_encode_jpeg_drops_alpha() {
        let img = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(4, 4, Rgba([1, 2, 3, 4])));
        let bytes = encode(&img, ArtifactFormat::Jpeg, 90).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
    }
}
