//! Vello-based sink: rebuilds a scene each time the placement changes.

use jumbotron_core::projector::{Placement, RenderSink};
use kurbo::{Point, Rect, Size};
use peniko::{Color, Fill, ImageData};
use vello::Scene;

/// Holds the current image and the scene showing it.
pub struct VelloSink {
    /// The Vello scene being built.
    scene: Scene,
    /// Decoded image, if one has loaded.
    image: Option<ImageData>,
    /// Fill for parts of the surface the image does not cover.
    background: Color,
    /// Placement of the last applied frame.
    placement: Option<Placement>,
}

impl Default for VelloSink {
    fn default() -> Self {
        Self::new()
    }
}

impl VelloSink {
    /// Create a sink with a black background and no image.
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            image: None,
            background: Color::from_rgba8(0, 0, 0, 255),
            placement: None,
        }
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    /// Get the built scene for rendering.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Whether an image has been loaded.
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Placement of the most recent frame.
    pub fn placement(&self) -> Option<&Placement> {
        self.placement.as_ref()
    }

    fn build_scene(&mut self, placement: &Placement) {
        self.scene.reset();

        let crop = placement.crop.transform();
        let frame = Rect::from_origin_size(Point::ZERO, placement.crop.size);
        self.scene.fill(Fill::NonZero, crop, self.background, None, &frame);

        let Some(image) = &self.image else {
            return;
        };
        let natural = Size::new(image.width as f64, image.height as f64);
        if let Some(transform) = placement.image_transform(natural) {
            self.scene.draw_image(&image.clone().into(), transform);
        }
    }
}

impl RenderSink for VelloSink {
    type Content = ImageData;

    fn natural_size(&self) -> Option<Size> {
        self.image
            .as_ref()
            .map(|image| Size::new(image.width as f64, image.height as f64))
    }

    fn set_content(&mut self, content: ImageData) {
        self.image = Some(content);
    }

    fn apply(&mut self, placement: &Placement) {
        self.build_scene(placement);
        self.placement = Some(*placement);
    }
}
