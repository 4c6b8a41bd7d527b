//! Maps a viewport onto the display surface.
//!
//! The rendering model is two nested boxes. The outer *crop frame* has the
//! surface size (axes swapped when the viewport is sideways) and carries the
//! orientation correction; its pivot is the top-left corner, so each rotation
//! pairs with a translation that moves the rotated box back onto the
//! surface. The inner *image frame* is the whole image, scaled so that the
//! viewport fills the crop frame, and pushed up/left by margins so the
//! viewport's top-left corner lands on the frame's top-left corner.

use kurbo::{Affine, Point, Size, Vec2};

use crate::viewport::{Rotation, Viewport};

/// Orientation correction applied to the crop frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// Rotation this entry corrects for.
    pub rotation: Rotation,
    /// Shift applied before rotating, as a fraction of the crop frame size.
    pub shift: Vec2,
}

const ORIENTATIONS: [Orientation; 4] = [
    Orientation {
        rotation: Rotation::Deg0,
        shift: Vec2::new(0.0, 0.0),
    },
    Orientation {
        rotation: Rotation::Deg90,
        shift: Vec2::new(0.0, -1.0),
    },
    Orientation {
        rotation: Rotation::Deg180,
        shift: Vec2::new(-1.0, -1.0),
    },
    Orientation {
        rotation: Rotation::Deg270,
        shift: Vec2::new(-1.0, 0.0),
    },
];

impl Orientation {
    /// Look up the correction for a rotation.
    pub fn for_rotation(rotation: Rotation) -> Self {
        ORIENTATIONS[usize::from(rotation.quarter_turns())]
    }

    /// Rotation angle in degrees.
    pub fn degrees(&self) -> f64 {
        self.rotation.degrees()
    }

    /// Affine transform for a crop frame of the given size.
    ///
    /// Maps crop-frame coordinates to surface coordinates.
    pub fn transform(&self, frame: Size) -> Affine {
        Affine::rotate(self.degrees().to_radians())
            * Affine::translate((self.shift.x * frame.width, self.shift.y * frame.height))
    }
}

/// The outer, orientation-corrected box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropFrame {
    /// Frame size in surface pixels (swapped when sideways).
    pub size: Size,
    /// Orientation correction.
    pub orientation: Orientation,
}

impl CropFrame {
    /// Transform from crop-frame coordinates to surface coordinates.
    pub fn transform(&self) -> Affine {
        self.orientation.transform(self.size)
    }
}

/// The scaled image inside the crop frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageFrame {
    /// Displayed image size, rounded to whole pixels.
    pub size: Size,
    /// Left/top margin, rounded to whole pixels.
    pub margin: Vec2,
}

impl ImageFrame {
    /// Top-left corner of the image inside the crop frame.
    pub fn origin(&self) -> Point {
        self.margin.to_point()
    }
}

/// Everything a render sink needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub crop: CropFrame,
    /// Surface pixels per image pixel, per axis.
    pub scale: Vec2,
    /// `None` until the natural image size is known.
    pub image: Option<ImageFrame>,
}

impl Placement {
    /// Full transform from image pixels to surface pixels.
    ///
    /// Uses the rounded image frame so the result matches what a sink
    /// sizing the image element would show.
    pub fn image_transform(&self, natural: Size) -> Option<Affine> {
        let image = self.image?;
        if natural.width <= 0.0 || natural.height <= 0.0 {
            return None;
        }
        Some(
            self.crop.transform()
                * Affine::translate(image.margin)
                * Affine::scale_non_uniform(
                    image.size.width / natural.width,
                    image.size.height / natural.height,
                ),
        )
    }
}

/// Consumer of placements: whatever actually draws the image.
///
/// A placement must be applied as a whole, within one render cycle.
pub trait RenderSink {
    /// Decoded image content the sink can display.
    type Content;

    /// Natural (unscaled) size of the current content, if any.
    fn natural_size(&self) -> Option<Size>;

    /// Replace the displayed content.
    fn set_content(&mut self, content: Self::Content);

    /// Show the content at `placement`.
    fn apply(&mut self, placement: &Placement);
}

/// Derives placements, caching the natural image size once it is known.
#[derive(Debug, Clone, Default)]
pub struct Projector {
    natural_size: Option<Size>,
}

impl Projector {
    /// Create a projector with no cached image size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached natural image size, if measured.
    pub fn natural_size(&self) -> Option<Size> {
        self.natural_size
    }

    /// Forget the cached image size (a new image is coming).
    pub fn reset(&mut self) {
        self.natural_size = None;
    }

    /// Compute the placement of `viewport` on a surface of `surface` pixels.
    ///
    /// `measure` is only consulted while the natural image size is unknown;
    /// the first usable answer is cached.
    pub fn project(
        &mut self,
        viewport: &Viewport,
        surface: Size,
        measure: impl FnOnce() -> Option<Size>,
    ) -> Placement {
        let frame = if viewport.is_sideways() {
            Size::new(surface.height, surface.width)
        } else {
            surface
        };

        let scale = Vec2::new(frame.width / viewport.width, frame.height / viewport.height);

        if self.natural_size.is_none() {
            self.natural_size = measure().filter(|s| s.width > 0.0 && s.height > 0.0);
        }

        let image = self.natural_size.map(|natural| ImageFrame {
            size: Size::new(
                (natural.width * scale.x).round(),
                (natural.height * scale.y).round(),
            ),
            margin: Vec2::new(
                (-viewport.x * scale.x).round(),
                (-viewport.y * scale.y).round(),
            ),
        });

        Placement {
            crop: CropFrame {
                size: frame,
                orientation: Orientation::for_rotation(viewport.rotation),
            },
            scale,
            image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-6 && (a.y - b.y).abs() < 1e-6
    }

    /// Project `vp` onto an 800x600 surface showing a 1200x900 image.
    fn project_landscape(projector: &mut Projector, vp: &Viewport) -> Placement {
        let natural = Size::new(1200.0, 900.0);
        projector.project(vp, Size::new(800.0, 600.0), || Some(natural))
    }

    #[test]
    fn test_upright_projection() {
        let mut projector = Projector::new();
        let vp = Viewport::new(0.0, 0.0, 400.0, 300.0, Rotation::Deg0);
        let placement = project_landscape(&mut projector, &vp);

        assert!((placement.scale.x - 2.0).abs() < EPS);
        assert!((placement.scale.y - 2.0).abs() < EPS);
        let image = placement.image.unwrap();
        assert_eq!(image.size, Size::new(2400.0, 1800.0));
        assert_eq!(image.margin, Vec2::ZERO);
        assert_eq!(placement.crop.size, Size::new(800.0, 600.0));
        assert_eq!(placement.crop.orientation.rotation, Rotation::Deg0);
    }

    #[test]
    fn test_sideways_projection_swaps_frame() {
        let mut projector = Projector::new();
        let vp = Viewport::new(0.0, 0.0, 400.0, 300.0, Rotation::Deg90);
        let placement = project_landscape(&mut projector, &vp);

        assert_eq!(placement.crop.size, Size::new(600.0, 800.0));
        assert!((placement.scale.x - 1.5).abs() < EPS);
        assert!((placement.scale.y - 800.0 / 300.0).abs() < EPS);
        let sideways = Orientation::for_rotation(Rotation::Deg90);
        assert_eq!(placement.crop.orientation, sideways);
        assert_eq!(placement.crop.orientation.shift, Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_margins_follow_offset() {
        let mut projector = Projector::new();
        let vp = Viewport::new(100.0, 50.0, 400.0, 300.0, Rotation::Deg0);
        let placement = project_landscape(&mut projector, &vp);
        assert_eq!(placement.image.unwrap().margin, Vec2::new(-200.0, -100.0));
    }

    #[test]
    fn test_rounding() {
        let mut projector = Projector::new();
        let vp = Viewport::new(0.3, 0.0, 300.0, 300.0, Rotation::Deg0);
        let natural = Size::new(101.0, 100.0);
        let placement = projector.project(&vp, Size::new(1000.0, 1000.0), || Some(natural));
        let image = placement.image.unwrap();
        // 101 * 3.333.. = 336.66..
        assert_eq!(image.size.width, 337.0);
        // -0.3 * 3.333.. = -1.0
        assert_eq!(image.margin.x, -1.0);
    }

    #[test]
    fn test_natural_size_measured_once() {
        let mut projector = Projector::new();
        let vp = Viewport::new(0.0, 0.0, 100.0, 100.0, Rotation::Deg0);
        let surface = Size::new(100.0, 100.0);

        let mut calls = 0;
        projector.project(&vp, surface, || {
            calls += 1;
            Some(Size::new(50.0, 40.0))
        });
        projector.project(&vp, surface, || {
            calls += 1;
            Some(Size::new(999.0, 999.0))
        });
        assert_eq!(calls, 1);
        assert_eq!(projector.natural_size(), Some(Size::new(50.0, 40.0)));

        projector.reset();
        assert_eq!(projector.natural_size(), None);
    }

    #[test]
    fn test_unknown_natural_size_leaves_image_unplaced() {
        let mut projector = Projector::new();
        let vp = Viewport::default();
        let placement = projector.project(&vp, Size::new(10.0, 10.0), || None);
        assert!(placement.image.is_none());
        let placement = projector.project(&vp, Size::new(10.0, 10.0), || Some(Size::ZERO));
        assert!(placement.image.is_none());
        assert_eq!(projector.natural_size(), None);
    }

    #[test]
    fn test_orientation_maps_frame_onto_surface() {
        // Surface 800x600; sideways frames are 600x800.
        let wide = Size::new(800.0, 600.0);
        let tall = Size::new(600.0, 800.0);
        let cases = [
            (Rotation::Deg0, wide, (0.0, 0.0), (800.0, 600.0)),
            (Rotation::Deg90, tall, (800.0, 0.0), (0.0, 600.0)),
            (Rotation::Deg180, wide, (800.0, 600.0), (0.0, 0.0)),
            (Rotation::Deg270, tall, (0.0, 600.0), (800.0, 0.0)),
        ];
        for (rotation, frame, origin_at, far_at) in cases {
            let t = Orientation::for_rotation(rotation).transform(frame);
            let origin = t * Point::ZERO;
            assert!(close(origin, origin_at.into()), "{:?}", rotation);
            let far = t * Point::new(frame.width, frame.height);
            assert!(close(far, far_at.into()), "{:?}", rotation);
        }
    }

    #[test]
    fn test_image_transform_places_viewport_corner_at_surface_corner() {
        let mut projector = Projector::new();
        let natural = Size::new(1200.0, 900.0);
        let vp = Viewport::new(100.0, 50.0, 400.0, 300.0, Rotation::Deg0);
        let placement = projector.project(&vp, Size::new(800.0, 600.0), || Some(natural));
        let t = placement.image_transform(natural).unwrap();
        assert!(close(t * Point::new(100.0, 50.0), Point::ZERO));
        let far = t * Point::new(500.0, 350.0);
        assert!(close(far, Point::new(800.0, 600.0)));
    }
}
