use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::detection::Detection;
use crate::error::Result;
use crate::image_io;
use crate::renderer::{self, OverlayStyle, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading { generation: u64 },
    Ready { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Rendered,
    /// A newer image was submitted while this one was decoding.
    Stale,
    /// The image could not be decoded; nothing was drawn.
    DecodeFailed,
}

/// Image bytes waiting to be decoded for a given submission.
#[derive(Debug)]
pub struct PendingLoad {
    generation: u64,
    bytes: Vec<u8>,
}

impl PendingLoad {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn decode(self) -> LoadOutcome {
        LoadOutcome {
            generation: self.generation,
            image: image_io::decode_image_bytes(&self.bytes),
        }
    }
}

/// Result of decoding a [`PendingLoad`].
#[derive(Debug)]
pub struct LoadOutcome {
    generation: u64,
    image: Result<DynamicImage>,
}

impl LoadOutcome {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ok(&self) -> bool {
        self.image.is_ok()
    }
}

pub struct RenderSession<S: Surface> {
    surface: S,
    style: OverlayStyle,
    generation: u64,
    state: LoadState,
}

impl<S: Surface> RenderSession<S> {
    pub fn new(surface: S, style: OverlayStyle) -> Self {
        Self {
            surface,
            style,
            generation: 0,
            state: LoadState::Idle,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Start loading a new image. Any load still in flight becomes stale.
    pub fn submit(&mut self, bytes: Vec<u8>) -> PendingLoad {
        self.generation += 1;
        self.state = LoadState::Loading {
            generation: self.generation,
        };
        debug!(
            "Submitted image generation {} ({} bytes)",
            self.generation,
            bytes.len()
        );

        PendingLoad {
            generation: self.generation,
            bytes,
        }
    }

    /// Continue a finished load: draw `detections` over the decoded image if
    /// it still belongs to the latest submission.
    pub fn complete(&mut self, outcome: LoadOutcome, detections: &[Detection]) -> RenderStatus {
        if outcome.generation != self.generation {
            debug!(
                "Discarding stale image generation {} (current {})",
                outcome.generation, self.generation
            );
            return RenderStatus::Stale;
        }

        match outcome.image {
            Ok(image) => {
                renderer::render(&mut self.surface, &image, detections, &self.style);
                self.state = LoadState::Ready {
                    generation: outcome.generation,
                };
                info!(
                    "Rendered {} detections on {}x{} image",
                    detections.len(),
                    image.width(),
                    image.height()
                );
                RenderStatus::Rendered
            }
            Err(e) => {
                warn!("Image failed to load, skipping render: {}", e);
                self.state = LoadState::Idle;
                RenderStatus::DecodeFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::CenterBox;
    use crate::renderer::RasterSurface;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    fn faucet() -> Vec<Detection> {
        vec![Detection {
            geometry: Some(CenterBox {
                x: 20.0,
                y: 20.0,
                width: 10.0,
                height: 10.0,
            }),
            label: "faucet".to_string(),
            confidence: Some(0.9),
        }]
    }

    fn session() -> RenderSession<RasterSurface> {
        RenderSession::new(RasterSurface::new().unwrap(), OverlayStyle::default())
    }

    #[test]
    fn submit_then_complete_renders() {
        let mut session = session();
        assert_eq!(session.state(), LoadState::Idle);

        let pending = session.submit(png(64, 48));
        assert_eq!(session.state(), LoadState::Loading { generation: 1 });

        let status = session.complete(pending.decode(), &faucet());
        assert_eq!(status, RenderStatus::Rendered);
        assert_eq!(session.state(), LoadState::Ready { generation: 1 });
        assert_eq!(session.surface().image().dimensions(), (64, 48));
    }

    #[test]
    fn stale_decode_is_discarded() {
        let mut session = session();
        let first = session.submit(png(64, 48));
        let second = session.submit(png(32, 32));

        assert_eq!(
            session.complete(first.decode(), &faucet()),
            RenderStatus::Stale
        );
        assert_eq!(session.state(), LoadState::Loading { generation: 2 });
        assert_eq!(session.surface().image().dimensions(), (0, 0));

        assert_eq!(
            session.complete(second.decode(), &faucet()),
            RenderStatus::Rendered
        );
        assert_eq!(session.surface().image().dimensions(), (32, 32));
    }

    #[test]
    fn out_of_order_completion_keeps_latest_image() {
        let mut session = session();
        let first = session.submit(png(64, 48));
        let second = session.submit(png(32, 32));

        assert_eq!(
            session.complete(second.decode(), &faucet()),
            RenderStatus::Rendered
        );
        assert_eq!(
            session.complete(first.decode(), &faucet()),
            RenderStatus::Stale
        );
        assert_eq!(session.surface().image().dimensions(), (32, 32));
    }

    #[test]
    fn decode_failure_leaves_surface_untouched() {
        let mut session = session();
        let ok = session.submit(png(16, 16));
        session.complete(ok.decode(), &faucet());
        let before = session.surface().image().clone();

        let broken = session.submit(b"not an image".to_vec());
        let outcome = broken.decode();
        assert!(!outcome.is_ok());
        assert_eq!(outcome.generation(), 2);

        assert_eq!(
            session.complete(outcome, &faucet()),
            RenderStatus::DecodeFailed
        );
        assert_eq!(session.state(), LoadState::Idle);
        assert_eq!(session.surface().image(), &before);
    }
}
