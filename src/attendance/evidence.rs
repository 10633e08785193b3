//! Evidence photos: validate, decode, burn in the audit band, re-encode and
//! hand the result to an [`EvidenceStore`].

use std::{
    future::Future,
    io::Cursor,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use ab_glyph::FontArc;
use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use image::{DynamicImage, ImageFormat, codecs::jpeg::JpegEncoder};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{
    error::EvidenceError,
    geofence::GeoCoordinate,
    overlay::{OverlayInfo, burn_in},
};

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceFormat {
    Jpeg,
    Png,
}

impl EvidenceFormat {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" => Some(EvidenceFormat::Jpeg),
            "image/png" => Some(EvidenceFormat::Png),
            _ => None,
        }
    }

    /// Detects the format from the leading bytes.
    pub fn sniff(bytes: &[u8]) -> Result<Self, EvidenceError> {
        match image::guess_format(bytes).map_err(|e| EvidenceError::Decode(e.to_string()))? {
            ImageFormat::Png => Ok(EvidenceFormat::Png),
            ImageFormat::Jpeg => Ok(EvidenceFormat::Jpeg),
            other => Err(EvidenceError::Decode(format!(
                "unsupported image format {other:?}"
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            EvidenceFormat::Jpeg => "jpg",
            EvidenceFormat::Png => "png",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            EvidenceFormat::Jpeg => ImageFormat::Jpeg,
            EvidenceFormat::Png => ImageFormat::Png,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    CheckIn,
    CheckOut,
}

impl CaptureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureKind::CheckIn => "checkin",
            CaptureKind::CheckOut => "checkout",
        }
    }
}

/// Raw image as submitted by the client.
#[derive(Debug, Clone)]
pub struct EvidenceUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: Option<String>,
}

/// Who, when and where the photo was taken; drives the overlay and the key.
#[derive(Debug, Clone)]
pub struct CaptureContext {
    pub employee_name: String,
    pub timestamp: NaiveDateTime,
    pub coordinate: GeoCoordinate,
    pub address: Option<String>,
    pub device: String,
    pub kind: CaptureKind,
}

/// Durable home for processed evidence.
///
/// `store` must either persist all of `bytes` under `key` and return a URL
/// that resolves to them, or fail without leaving a readable partial object.
pub trait EvidenceStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn store(
        &self,
        bytes: Vec<u8>,
        key: &str,
        format: EvidenceFormat,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

/// Writes evidence under a local directory that the HTTP server exposes at
/// `/uploads`.
#[derive(Debug, Clone)]
pub struct LocalEvidenceStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalEvidenceStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl EvidenceStore for LocalEvidenceStore {
    type Error = std::io::Error;

    async fn store(
        &self,
        bytes: Vec<u8>,
        key: &str,
        format: EvidenceFormat,
    ) -> Result<String, Self::Error> {
        let relative = format!("{key}.{}", format.extension());
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // write aside, then rename into place so readers never see a partial file
        let partial = path.with_extension(format!("{}.part", format.extension()));
        let written = async {
            let mut file = tokio::fs::File::create(&partial).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            tokio::fs::rename(&partial, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        Ok(format!("{}/uploads/{}", self.public_base_url, relative))
    }
}

pub fn load_font(path: &Path) -> anyhow::Result<FontArc> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read overlay font {}", path.display()))?;
    FontArc::try_from_vec(data)
        .with_context(|| format!("{} is not a usable font", path.display()))
}

pub struct EvidencePipeline<E> {
    store: E,
    max_bytes: usize,
    overlay_font: Option<FontArc>,
}

impl<E: EvidenceStore> EvidencePipeline<E> {
    pub fn new(store: E, max_bytes: usize) -> Self {
        Self {
            store,
            max_bytes,
            overlay_font: None,
        }
    }

    /// Burn the audit band into every photo using `font`.
    pub fn with_overlay_font(mut self, font: FontArc) -> Self {
        self.overlay_font = Some(font);
        self
    }

    /// Runs the whole pipeline. The store is called at most once, and only
    /// after the image has been validated, decoded and re-encoded.
    pub async fn process(
        &self,
        upload: EvidenceUpload,
        ctx: &CaptureContext,
        deadline: Duration,
    ) -> Result<String, EvidenceError> {
        let Some(declared) = EvidenceFormat::from_content_type(&upload.content_type) else {
            return Err(EvidenceError::Validation(
                "Only JPEG and PNG images are allowed".to_string(),
            ));
        };
        if upload.bytes.is_empty() {
            return Err(EvidenceError::Validation("Image is required".to_string()));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(EvidenceError::Validation(format!(
                "Image size too large (max {} bytes)",
                self.max_bytes
            )));
        }
        let format = EvidenceFormat::sniff(&upload.bytes)?;
        if format != declared {
            return Err(EvidenceError::Validation(format!(
                "Image content is {}, not the declared {}",
                format.extension(),
                upload.content_type
            )));
        }

        let key = evidence_key(
            ctx.kind,
            ctx.timestamp.date(),
            upload.file_name.as_deref(),
            next_uniquifier(),
        );

        let font = self.overlay_font.clone();
        let ctx_owned = ctx.clone();
        let bytes = upload.bytes;
        let encoded =
            tokio::task::spawn_blocking(move || render(&bytes, format, font.as_ref(), &ctx_owned))
                .await
                .map_err(|e| EvidenceError::Encode(format!("render task failed: {e}")))??;

        debug!(%key, size = encoded.len(), "Evidence rendered");

        match tokio::time::timeout(deadline, self.store.store(encoded, &key, format)).await {
            Ok(Ok(url)) => {
                info!(%key, "Evidence stored");
                Ok(url)
            }
            Ok(Err(e)) => {
                warn!(error = %e, %key, "Evidence store failed");
                Err(EvidenceError::StoreUnavailable(e.to_string()))
            }
            Err(_) => {
                warn!(%key, ?deadline, "Evidence store timed out");
                Err(EvidenceError::StoreUnavailable(format!(
                    "evidence store did not respond within {deadline:?}"
                )))
            }
        }
    }
}

/// Decode, optionally overlay, and re-encode in the same format family.
fn render(
    bytes: &[u8],
    format: EvidenceFormat,
    font: Option<&FontArc>,
    ctx: &CaptureContext,
) -> Result<Vec<u8>, EvidenceError> {
    let mut image = image::load_from_memory_with_format(bytes, format.image_format())
        .map_err(|e| EvidenceError::Decode(e.to_string()))?;

    if let Some(font) = font {
        let mut canvas = image.to_rgba8();
        burn_in(
            &mut canvas,
            font,
            &OverlayInfo {
                employee_name: &ctx.employee_name,
                timestamp: ctx.timestamp,
                latitude: ctx.coordinate.latitude,
                longitude: ctx.coordinate.longitude,
                address: ctx.address.as_deref(),
                device: &ctx.device,
            },
        );
        image = DynamicImage::ImageRgba8(canvas);
    }

    let mut out = Cursor::new(Vec::new());
    match format {
        EvidenceFormat::Png => image.write_to(&mut out, ImageFormat::Png),
        EvidenceFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)),
    }
    .map_err(|e| EvidenceError::Encode(e.to_string()))?;

    Ok(out.into_inner())
}

/// `attendance/{checkin|checkout}/{YYYY-MM-DD}/{stem}_{uniquifier}`
pub fn evidence_key(
    kind: CaptureKind,
    day: NaiveDate,
    file_name: Option<&str>,
    uniquifier: u64,
) -> String {
    format!(
        "attendance/{}/{}/{}_{}",
        kind.as_str(),
        day.format("%Y-%m-%d"),
        clean_stem(file_name),
        uniquifier
    )
}

fn clean_stem(file_name: Option<&str>) -> String {
    let stem: String = file_name
        .map(Path::new)
        .and_then(Path::file_stem)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .take(64)
        .collect();

    if stem.is_empty() {
        "evidence".to_string()
    } else {
        stem
    }
}

static LAST_UNIQUIFIER: AtomicU64 = AtomicU64::new(0);

/// Wall-clock nanoseconds, bumped so that successive values strictly increase.
pub fn next_uniquifier() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let previous = LAST_UNIQUIFIER
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(previous + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::testing::{RecordingEvidenceStore, jpeg_bytes, png_bytes, sample_context};

    fn upload(bytes: Vec<u8>, content_type: &str) -> EvidenceUpload {
        EvidenceUpload {
            bytes,
            content_type: content_type.to_string(),
            file_name: Some("selfie.png".to_string()),
        }
    }

    const DEADLINE: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn png_is_stored_as_png_under_namespaced_key() {
        let store = RecordingEvidenceStore::default();
        let pipeline = EvidencePipeline::new(store.clone(), 10 * 1024 * 1024);

        let url = pipeline
            .process(upload(png_bytes(32, 24), "image/png"), &sample_context(), DEADLINE)
            .await
            .unwrap();

        let calls = store.calls();
        assert_eq!(calls.len(), 1);
        let (key, format, bytes) = &calls[0];
        assert!(key.starts_with("attendance/checkin/2026-01-05/selfie_"), "{key}");
        assert_eq!(*format, EvidenceFormat::Png);
        assert_eq!(image::guess_format(bytes).unwrap(), ImageFormat::Png);
        assert_eq!(url, format!("memory://{key}.png"));
    }

    #[tokio::test]
    async fn jpeg_stays_jpeg() {
        let store = RecordingEvidenceStore::default();
        let pipeline = EvidencePipeline::new(store.clone(), 10 * 1024 * 1024);

        pipeline
            .process(upload(jpeg_bytes(40, 30), "image/jpeg"), &sample_context(), DEADLINE)
            .await
            .unwrap();

        let (_, format, bytes) = &store.calls()[0];
        assert_eq!(*format, EvidenceFormat::Jpeg);
        let decoded = image::load_from_memory(bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[tokio::test]
    async fn unsupported_content_type_is_rejected_before_decoding() {
        let store = RecordingEvidenceStore::default();
        let pipeline = EvidencePipeline::new(store.clone(), 10 * 1024 * 1024);

        let err = pipeline
            .process(upload(png_bytes(4, 4), "image/gif"), &sample_context(), DEADLINE)
            .await
            .unwrap_err();

        assert!(matches!(err, EvidenceError::Validation(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn jpeg_bytes_declared_as_png_are_rejected() {
        let store = RecordingEvidenceStore::default();
        let pipeline = EvidencePipeline::new(store.clone(), 10 * 1024 * 1024);

        let err = pipeline
            .process(upload(jpeg_bytes(8, 8), "image/png"), &sample_context(), DEADLINE)
            .await
            .unwrap_err();

        assert!(matches!(err, EvidenceError::Validation(_)), "{err:?}");
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let store = RecordingEvidenceStore::default();
        let pipeline = EvidencePipeline::new(store.clone(), 16);

        let err = pipeline
            .process(upload(png_bytes(8, 8), "image/png"), &sample_context(), DEADLINE)
            .await
            .unwrap_err();

        assert!(matches!(err, EvidenceError::Validation(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn garbage_bytes_fail_to_decode() {
        let store = RecordingEvidenceStore::default();
        let pipeline = EvidencePipeline::new(store.clone(), 1024);

        let err = pipeline
            .process(upload(b"definitely not a photo".to_vec(), "image/jpeg"), &sample_context(), DEADLINE)
            .await
            .unwrap_err();

        assert!(matches!(err, EvidenceError::Decode(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_store_unavailable() {
        let store = RecordingEvidenceStore::failing();
        let pipeline = EvidencePipeline::new(store.clone(), 10 * 1024 * 1024);

        let err = pipeline
            .process(upload(png_bytes(4, 4), "image/png"), &sample_context(), DEADLINE)
            .await
            .unwrap_err();

        assert!(matches!(err, EvidenceError::StoreUnavailable(_)));
        assert_eq!(store.calls().len(), 1);
    }

    #[tokio::test]
    async fn slow_store_hits_the_deadline() {
        let store = RecordingEvidenceStore::slow(Duration::from_secs(30));
        let pipeline = EvidencePipeline::new(store, 10 * 1024 * 1024);

        let err = pipeline
            .process(
                upload(png_bytes(4, 4), "image/png"),
                &sample_context(),
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EvidenceError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn local_store_writes_whole_file_and_returns_public_url() {
        let root = std::env::temp_dir().join(format!("attendance-hub-{}", uuid::Uuid::new_v4()));
        let store = LocalEvidenceStore::new(&root, "http://localhost:8001/");

        let url = store
            .store(vec![1, 2, 3], "attendance/checkout/2026-01-05/cam_7", EvidenceFormat::Jpeg)
            .await
            .unwrap();

        assert_eq!(
            url,
            "http://localhost:8001/uploads/attendance/checkout/2026-01-05/cam_7.jpg"
        );
        let written = root.join("attendance/checkout/2026-01-05/cam_7.jpg");
        assert_eq!(std::fs::read(&written).unwrap(), vec![1, 2, 3]);
        assert!(!root.join("attendance/checkout/2026-01-05/cam_7.jpg.part").exists());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn key_uses_sanitized_stem() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(
            evidence_key(CaptureKind::CheckOut, day, Some("../my photo!.jpeg"), 42),
            "attendance/checkout/2026-01-05/myphoto_42"
        );
        assert_eq!(
            evidence_key(CaptureKind::CheckIn, day, None, 1),
            "attendance/checkin/2026-01-05/evidence_1"
        );
    }

    #[test]
    fn uniquifier_strictly_increases() {
        let mut last = next_uniquifier();
        for _ in 0..1000 {
            let next = next_uniquifier();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn content_type_parsing_is_strict() {
        assert_eq!(EvidenceFormat::from_content_type("image/jpeg"), Some(EvidenceFormat::Jpeg));
        assert_eq!(EvidenceFormat::from_content_type("IMAGE/PNG"), Some(EvidenceFormat::Png));
        assert_eq!(EvidenceFormat::from_content_type("image/webp"), None);
        assert_eq!(EvidenceFormat::from_content_type("image/jpg"), None);
    }
}
