//! Acquiring a photo for an entry.
//!
//! The platform provides a [`Picker`] (and, where access is gated, a
//! [`PermissionGate`]); [`Capturer`] owns the policy of turning whatever the
//! picker hands back into a small JPEG data URI suitable for storing inline.

mod resize;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CaptureError, ValidationError};

pub use resize::{JPEG_MIME, decode_data_uri, downsample_to_data_uri, fit_within};
#[cfg(test)]
pub(crate) use resize::png_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    Camera,
    Gallery,
    /// Let the platform decide how to ask for an image.
    Prompt,
}

impl CaptureSource {
    pub const ALL: [CaptureSource; 3] = [
        CaptureSource::Camera,
        CaptureSource::Gallery,
        CaptureSource::Prompt,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureSource::Camera => "camera",
            CaptureSource::Gallery => "gallery",
            CaptureSource::Prompt => "prompt",
        }
    }

    fn needs_permission(self) -> bool {
        matches!(self, CaptureSource::Camera | CaptureSource::Gallery)
    }
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "camera" => Ok(CaptureSource::Camera),
            "gallery" | "photos" => Ok(CaptureSource::Gallery),
            "prompt" => Ok(CaptureSource::Prompt),
            other => Err(ValidationError(format!(
                "Unknown photo source '{other}' (expected camera, gallery or prompt)"
            ))),
        }
    }
}

/// Size and quality limits applied to every captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePolicy {
    /// Longest edge for camera and gallery images.
    pub native_max_edge: u32,
    /// Longest edge for images from the generic file prompt.
    pub prompt_max_edge: u32,
    pub jpeg_quality: u8,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            native_max_edge: 800,
            prompt_max_edge: 600,
            jpeg_quality: 70,
        }
    }
}

impl CapturePolicy {
    #[must_use]
    pub fn max_edge(&self, source: CaptureSource) -> u32 {
        match source {
            CaptureSource::Camera | CaptureSource::Gallery => self.native_max_edge,
            CaptureSource::Prompt => self.prompt_max_edge,
        }
    }
}

/// Platform hook that hands back raw image bytes.
#[async_trait]
pub trait Picker: Send + Sync {
    /// `Ok(None)` means the user backed out.
    async fn pick(&self, source: CaptureSource) -> Result<Option<Vec<u8>>, CaptureError>;

    /// Asked before a [`CaptureSource::Prompt`] capture. Platforms that can
    /// offer camera and gallery separately return the user's choice here;
    /// `Ok(None)` cancels the capture.
    async fn choose_source(&self) -> Result<Option<CaptureSource>, CaptureError> {
        Ok(Some(CaptureSource::Prompt))
    }
}

/// Platform hook for camera and photo library access.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn check(&self, source: CaptureSource) -> Result<bool, CaptureError>;

    async fn request(&self, source: CaptureSource) -> Result<bool, CaptureError>;
}

pub struct Capturer {
    picker: Box<dyn Picker>,
    gate: Option<Box<dyn PermissionGate>>,
    policy: CapturePolicy,
    camera_granted: AtomicBool,
    gallery_granted: AtomicBool,
}

impl Capturer {
    pub fn new(picker: impl Picker + 'static) -> Self {
        Self {
            picker: Box::new(picker),
            gate: None,
            policy: CapturePolicy::default(),
            camera_granted: AtomicBool::new(false),
            gallery_granted: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_permission_gate(mut self, gate: impl PermissionGate + 'static) -> Self {
        self.gate = Some(Box::new(gate));
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CapturePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> CapturePolicy {
        self.policy
    }

    /// Acquire an image and return it as a JPEG data URI, or an empty string
    /// when the user cancelled.
    pub async fn capture(&self, source: CaptureSource) -> Result<String, CaptureError> {
        let source = if source == CaptureSource::Prompt {
            match self.picker.choose_source().await? {
                Some(chosen) => chosen,
                None => {
                    debug!("Photo source chooser dismissed");
                    return Ok(String::new());
                }
            }
        } else {
            source
        };

        if source.needs_permission() {
            self.ensure_permission(source).await?;
        }

        let Some(bytes) = self.picker.pick(source).await? else {
            debug!(%source, "Photo capture cancelled");
            return Ok(String::new());
        };
        if bytes.is_empty() {
            return Ok(String::new());
        }

        let max_edge = self.policy.max_edge(source);
        let quality = self.policy.jpeg_quality;
        let original = bytes.len();
        let uri = tokio::task::spawn_blocking(move || {
            downsample_to_data_uri(&bytes, max_edge, quality)
        })
        .await
        .map_err(|e| CaptureError::Device(e.to_string()))??;

        info!(%source, original, encoded = uri.len(), "Captured photo");
        Ok(uri)
    }

    fn granted_flag(&self, source: CaptureSource) -> &AtomicBool {
        match source {
            CaptureSource::Camera => &self.camera_granted,
            CaptureSource::Gallery | CaptureSource::Prompt => &self.gallery_granted,
        }
    }

    async fn ensure_permission(&self, source: CaptureSource) -> Result<(), CaptureError> {
        let Some(gate) = &self.gate else {
            return Ok(());
        };
        let flag = self.granted_flag(source);
        if flag.load(Ordering::Acquire) {
            return Ok(());
        }

        let granted = gate.check(source).await? || gate.request(source).await?;
        if !granted {
            warn!(%source, "Photo access denied");
            return Err(CaptureError::PermissionDenied(denial_message(source)));
        }
        flag.store(true, Ordering::Release);
        Ok(())
    }
}

fn denial_message(source: CaptureSource) -> String {
    match source {
        CaptureSource::Camera => {
            "Camera access was denied. Allow camera access to take a photo of this entry."
                .to_string()
        }
        _ => "Photo library access was denied. Allow access to your photos to attach one to this entry."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Hands back a fixed image, or nothing, and records what it was asked for.
    struct FakePicker {
        image: Option<Vec<u8>>,
        chooser: Option<Option<CaptureSource>>,
        asked: Arc<Mutex<Vec<CaptureSource>>>,
    }

    impl FakePicker {
        fn returning(image: Option<Vec<u8>>) -> (Self, Arc<Mutex<Vec<CaptureSource>>>) {
            let asked = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    image,
                    chooser: None,
                    asked: asked.clone(),
                },
                asked,
            )
        }
    }

    #[async_trait]
    impl Picker for FakePicker {
        async fn pick(&self, source: CaptureSource) -> Result<Option<Vec<u8>>, CaptureError> {
            self.asked.lock().unwrap().push(source);
            Ok(self.image.clone())
        }

        async fn choose_source(&self) -> Result<Option<CaptureSource>, CaptureError> {
            Ok(self.chooser.unwrap_or(Some(CaptureSource::Prompt)))
        }
    }

    struct BrokenCamera;

    #[async_trait]
    impl Picker for BrokenCamera {
        async fn pick(&self, _source: CaptureSource) -> Result<Option<Vec<u8>>, CaptureError> {
            Err(CaptureError::Unavailable("no camera on this device".to_string()))
        }
    }

    struct Gate {
        already: bool,
        answer: bool,
        requests: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PermissionGate for Gate {
        async fn check(&self, _source: CaptureSource) -> Result<bool, CaptureError> {
            Ok(self.already)
        }

        async fn request(&self, _source: CaptureSource) -> Result<bool, CaptureError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }
    }

    fn dimensions(uri: &str) -> (u32, u32) {
        let (mime, bytes) = decode_data_uri(uri).unwrap();
        assert_eq!(mime, JPEG_MIME);
        let img = image::load_from_memory(&bytes).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!("Camera".parse::<CaptureSource>().unwrap(), CaptureSource::Camera);
        assert_eq!("photos".parse::<CaptureSource>().unwrap(), CaptureSource::Gallery);
        assert!("scanner".parse::<CaptureSource>().is_err());
    }

    #[test]
    fn test_default_policy() {
        let policy = CapturePolicy::default();
        assert_eq!(policy.max_edge(CaptureSource::Camera), 800);
        assert_eq!(policy.max_edge(CaptureSource::Gallery), 800);
        assert_eq!(policy.max_edge(CaptureSource::Prompt), 600);
        assert_eq!(policy.jpeg_quality, 70);
    }

    #[tokio::test]
    async fn test_prompt_capture_downsamples_to_600() {
        let (picker, _) = FakePicker::returning(Some(resize::png_bytes(1200, 800)));
        let capturer = Capturer::new(picker);
        let uri = capturer.capture(CaptureSource::Prompt).await.unwrap();
        assert_eq!(dimensions(&uri), (600, 400));
    }

    #[tokio::test]
    async fn test_camera_capture_downsamples_to_800() {
        let (picker, _) = FakePicker::returning(Some(resize::png_bytes(1600, 1200)));
        let capturer = Capturer::new(picker);
        let uri = capturer.capture(CaptureSource::Camera).await.unwrap();
        assert_eq!(dimensions(&uri), (800, 600));
    }

    #[tokio::test]
    async fn test_cancel_yields_empty_string() {
        let (picker, _) = FakePicker::returning(None);
        let capturer = Capturer::new(picker);
        assert_eq!(capturer.capture(CaptureSource::Gallery).await.unwrap(), "");
        assert_eq!(capturer.capture(CaptureSource::Prompt).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_chooser_routes_prompt_to_camera() {
        let (mut picker, asked) = FakePicker::returning(Some(resize::png_bytes(1600, 1200)));
        picker.chooser = Some(Some(CaptureSource::Camera));
        let capturer = Capturer::new(picker);
        let uri = capturer.capture(CaptureSource::Prompt).await.unwrap();
        assert_eq!(dimensions(&uri), (800, 600));
        assert_eq!(*asked.lock().unwrap(), vec![CaptureSource::Camera]);
    }

    #[tokio::test]
    async fn test_chooser_cancel_never_picks() {
        let (mut picker, asked) = FakePicker::returning(Some(resize::png_bytes(10, 10)));
        picker.chooser = Some(None);
        let capturer = Capturer::new(picker);
        assert_eq!(capturer.capture(CaptureSource::Prompt).await.unwrap(), "");
        assert!(asked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permission_denied_is_explained() {
        let (picker, asked) = FakePicker::returning(Some(resize::png_bytes(10, 10)));
        let capturer = Capturer::new(picker).with_permission_gate(Gate {
            already: false,
            answer: false,
            requests: Arc::new(AtomicUsize::new(0)),
        });
        let err = capturer.capture(CaptureSource::Camera).await.unwrap_err();
        match err {
            CaptureError::PermissionDenied(msg) => assert!(msg.contains("Camera access")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(asked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permission_requested_once() {
        let (picker, _) = FakePicker::returning(Some(resize::png_bytes(10, 10)));
        let requests = Arc::new(AtomicUsize::new(0));
        let capturer = Capturer::new(picker).with_permission_gate(Gate {
            already: false,
            answer: true,
            requests: requests.clone(),
        });
        capturer.capture(CaptureSource::Gallery).await.unwrap();
        capturer.capture(CaptureSource::Gallery).await.unwrap();
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prompt_skips_permission_gate() {
        let (picker, _) = FakePicker::returning(Some(resize::png_bytes(10, 10)));
        let capturer = Capturer::new(picker).with_permission_gate(Gate {
            already: false,
            answer: false,
            requests: Arc::new(AtomicUsize::new(0)),
        });
        assert!(capturer.capture(CaptureSource::Prompt).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_camera_is_unavailable() {
        let capturer = Capturer::new(BrokenCamera);
        assert!(matches!(
            capturer.capture(CaptureSource::Camera).await,
            Err(CaptureError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_garbage_bytes_are_an_image_error() {
        let (picker, _) = FakePicker::returning(Some(b"not a photo".to_vec()));
        let capturer = Capturer::new(picker);
        assert!(matches!(
            capturer.capture(CaptureSource::Gallery).await,
            Err(CaptureError::Image(_))
        ));
    }
}
