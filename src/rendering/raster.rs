//! Rasterization: the capture engine boundary and the adapter that drives it.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use tiny_skia::{Paint, Pixmap, Rect, Transform};

use crate::language::HighlightResult;
use crate::rendering::layout::PreviewSurface;
use crate::rendering::paint::{paint_surface, PaintCommand, Rgba};
use crate::rendering::{Bitmap, RenderArtifact};
use crate::state::RunPhase;
use crate::{Error, Result};

/// Options handed to a [`CaptureEngine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    /// Device pixel ratio of the capture
    pub scale: f32,
    /// Start from a transparent canvas so only the container's own
    /// background shows
    pub transparent_background: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            transparent_background: true,
        }
    }
}

/// External element-to-bitmap engine.
pub trait CaptureEngine: Send + Sync {
    /// Capture the container of `surface` as a PNG bitmap
    fn capture(&self, surface: &PreviewSurface, options: &CaptureOptions) -> Result<Bitmap>;
}

/// Built-in capture engine drawing the container with tiny-skia.
///
/// Text is drawn as one filled cell per character in its theme colour; it
/// does not shape fonts.
#[derive(Debug, Default, Clone, Copy)]
pub struct PixmapCapture;

impl CaptureEngine for PixmapCapture {
    fn capture(&self, surface: &PreviewSurface, options: &CaptureOptions) -> Result<Bitmap> {
        if !(options.scale.is_finite() && options.scale > 0.0) {
            return Err(Error::CaptureError(format!("invalid scale {}", options.scale)));
        }
        let layout = surface.layout();
        let width = ((layout.width * options.scale).ceil() as u32).max(1);
        let height = ((layout.height * options.scale).ceil() as u32).max(1);

        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| Error::CaptureError(format!("cannot allocate {}x{} canvas", width, height)))?;
        if !options.transparent_background {
            pixmap.fill(tiny_skia::Color::WHITE);
        }

        let transform = Transform::from_scale(options.scale, options.scale);
        for cmd in paint_surface(surface) {
            let (x, y, w, h, rgba) = match cmd {
                PaintCommand::SolidRect { x, y, width, height, rgba } => (x, y, width, height, rgba),
                PaintCommand::Glyph { x, y, width, height, rgba, .. } => (x, y, width, height, rgba),
            };
            fill(&mut pixmap, x, y, w, h, rgba, transform);
        }

        let png = pixmap
            .encode_png()
            .map_err(|e| Error::CaptureError(format!("PNG encoding failed: {}", e)))?;
        Ok(Bitmap { width, height, png })
    }
}

fn fill(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, rgba: Rgba, transform: Transform) {
    let Some(rect) = Rect::from_xywh(x, y, w, h) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba.r, rgba.g, rgba.b, rgba.a);
    paint.anti_alias = false;
    pixmap.fill_rect(rect, &paint, transform, None);
}

/// Drives a [`CaptureEngine`]: apply markup, let the surface settle, capture.
#[derive(Clone)]
pub struct Rasterizer {
    engine: Arc<dyn CaptureEngine>,
    settle: Duration,
    options: CaptureOptions,
}

impl Rasterizer {
    pub fn new(engine: Arc<dyn CaptureEngine>, settle: Duration, scale: f32) -> Self {
        Self {
            engine,
            settle,
            options: CaptureOptions {
                scale,
                transparent_background: true,
            },
        }
    }

    pub fn options(&self) -> CaptureOptions {
        self.options
    }

    /// Apply `result` to `surface`, wait for the settle delay, then capture.
    ///
    /// Engine failures are logged and reported as `Err` with the message; they
    /// never panic or leave a partial artifact behind.
    pub async fn capture<F>(
        &self,
        surface: &mut PreviewSurface,
        result: &HighlightResult,
        generation: u64,
        mut on_phase: F,
    ) -> std::result::Result<RenderArtifact, String>
    where
        F: FnMut(RunPhase),
    {
        surface.apply_markup(result);

        on_phase(RunPhase::Settling);
        tokio::time::sleep(self.settle).await;

        on_phase(RunPhase::Capturing);
        match self.engine.capture(surface, &self.options) {
            Ok(bitmap) => {
                debug!(
                    "captured generation {} at {}x{} ({} bytes)",
                    generation,
                    bitmap.width,
                    bitmap.height,
                    bitmap.png.len()
                );
                Ok(RenderArtifact::from_bitmap(generation, bitmap))
            }
            Err(e) => {
                error!("Error generating code image: {}", e);
                Err(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Resolution;
    use crate::rendering::layout::ContainerStyle;
    use crate::rendering::theme::ThemeCatalog;

    fn surface(background: Option<Rgba>) -> PreviewSurface {
        let style = ContainerStyle {
            background,
            padding: 4.0,
            font_size: 10.0,
            ..ContainerStyle::default()
        };
        let mut s = PreviewSurface::new(style, ThemeCatalog::load().resolve("base16-ocean.dark"));
        s.apply_markup(&HighlightResult {
            markup: "<span class=\"text plain\">ab\n</span>".into(),
            resolved_language: "plaintext".into(),
            resolution: Resolution::Forced,
        });
        s
    }

    #[test]
    fn capture_is_scaled_png() {
        let bitmap = PixmapCapture
            .capture(&surface(Some(Rgba::new(10, 20, 30, 255))), &CaptureOptions::default())
            .unwrap();
        // (2 cols * 6px + 8px) x (14px + 8px), doubled
        assert_eq!((bitmap.width, bitmap.height), (40, 44));
        assert_eq!(&bitmap.png[0..8], b"\x89PNG\r\n\x1a\n");

        let decoded = Pixmap::decode_png(&bitmap.png).unwrap();
        let corner = decoded.pixel(0, 0).unwrap().demultiply();
        assert_eq!((corner.red(), corner.green(), corner.blue(), corner.alpha()), (10, 20, 30, 255));
    }

    #[test]
    fn transparent_container_leaves_corners_clear() {
        let bitmap = PixmapCapture
            .capture(&surface(None), &CaptureOptions::default())
            .unwrap();
        let decoded = Pixmap::decode_png(&bitmap.png).unwrap();
        assert_eq!(decoded.pixel(0, 0).unwrap().alpha(), 0);
        // somewhere in the first glyph cell there is ink
        let ink = decoded.pixel(10, 20).unwrap();
        assert_eq!(ink.alpha(), 255);
    }

    #[test]
    fn capture_is_deterministic() {
        let s = surface(Some(Rgba::WHITE));
        let a = PixmapCapture.capture(&s, &CaptureOptions::default()).unwrap();
        let b = PixmapCapture.capture(&s, &CaptureOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    struct FamilyRecorder(std::sync::Mutex<Vec<String>>);

    impl CaptureEngine for FamilyRecorder {
        fn capture(&self, surface: &PreviewSurface, options: &CaptureOptions) -> Result<Bitmap> {
            self.0.lock().unwrap().push(surface.style().font_family.clone());
            PixmapCapture.capture(surface, options)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn engines_see_the_font_family() {
        let recorder = Arc::new(FamilyRecorder(Default::default()));
        let rasterizer = Rasterizer::new(recorder.clone(), Duration::from_millis(10), 1.0);
        let mut s = surface(None);
        s.set_style(ContainerStyle {
            font_family: "'JetBrains Mono', monospace".into(),
            ..s.style().clone()
        });
        let result = HighlightResult {
            markup: "<span class=\"text plain\">x\n</span>".into(),
            resolved_language: "plaintext".into(),
            resolution: Resolution::Forced,
        };
        rasterizer.capture(&mut s, &result, 1, |_| {}).await.unwrap();
        assert_eq!(*recorder.0.lock().unwrap(), vec!["'JetBrains Mono', monospace".to_string()]);
    }

    #[test]
    fn pixmap_capture_ignores_the_font_family() {
        let plain = surface(Some(Rgba::WHITE));
        let mut styled = surface(Some(Rgba::WHITE));
        styled.set_style(ContainerStyle {
            font_family: "serif".into(),
            ..plain.style().clone()
        });
        let a = PixmapCapture.capture(&plain, &CaptureOptions::default()).unwrap();
        let b = PixmapCapture.capture(&styled, &CaptureOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_scale() {
        let opts = CaptureOptions { scale: 0.0, transparent_background: true };
        assert!(PixmapCapture.capture(&surface(None), &opts).is_err());
    }
}
