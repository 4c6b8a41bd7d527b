//! Getting the display scene onto the window surface.

use peniko::Color;
use thiserror::Error;
use vello::util::{DeviceHandle, RenderSurface};
use vello::wgpu;
use vello::{AaConfig, RenderParams, Renderer, RendererOptions, Scene};

#[derive(Debug, Error)]
pub enum PresentError {
    #[error("no surface frame: {0}")]
    Frame(#[from] wgpu::SurfaceError),
    #[error("render failed: {0}")]
    Render(#[from] vello::Error),
}

/// Rgba8Unorm texture Vello draws into. The surface format may differ and
/// usually lacks storage binding, so frames are copied over afterwards.
struct Target {
    extent: wgpu::Extent3d,
    view: wgpu::TextureView,
}

impl Target {
    fn new(device: &wgpu::Device, extent: wgpu::Extent3d) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("jumbotron frame"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { extent, view }
    }
}

/// Whether a target of size `current` can take a frame of size `wanted`.
fn reusable(current: Option<wgpu::Extent3d>, wanted: wgpu::Extent3d) -> bool {
    current == Some(wanted)
}

fn frame_extent(surface: &RenderSurface<'_>) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: surface.config.width,
        height: surface.config.height,
        depth_or_array_layers: 1,
    }
}

/// Renders scenes and copies them to the window.
///
/// The intermediate target is kept between frames and only reallocated
/// when the surface changes size.
pub struct Presenter {
    renderer: Renderer,
    blitter: wgpu::util::TextureBlitter,
    target: Option<Target>,
    background: Color,
}

impl Presenter {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        background: Color,
    ) -> Result<Self, vello::Error> {
        Ok(Self {
            renderer: Renderer::new(device, RendererOptions::default())?,
            blitter: wgpu::util::TextureBlitter::new(device, format),
            target: None,
            background,
        })
    }

    /// Draw `scene` and show it on `surface`.
    pub fn present(
        &mut self,
        handle: &DeviceHandle,
        surface: &RenderSurface<'_>,
        scene: &Scene,
    ) -> Result<(), PresentError> {
        let device = &handle.device;
        let size = frame_extent(surface);
        if !reusable(self.target.as_ref().map(|t| t.extent), size) {
            log::debug!("Allocating {}x{} frame target", size.width, size.height);
            self.target = None;
        }
        let target = self.target.get_or_insert_with(|| Target::new(device, size));

        let params = RenderParams {
            base_color: self.background,
            width: size.width,
            height: size.height,
            antialiasing_method: AaConfig::Area,
        };
        self.renderer
            .render_to_texture(device, &handle.queue, scene, &target.view, &params)?;

        let frame = surface.surface.get_current_texture()?;
        let frame_view = frame.texture.create_view(&Default::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("jumbotron present"),
        });
        self.blitter
            .copy(device, &mut encoder, &target.view, &frame_view);
        handle.queue.submit([encoder.finish()]);
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        }
    }

    #[test]
    fn test_target_reused_only_at_same_size() {
        assert!(!reusable(None, extent(800, 600)));
        assert!(reusable(Some(extent(800, 600)), extent(800, 600)));
        assert!(!reusable(Some(extent(800, 600)), extent(1024, 600)));
        assert!(!reusable(Some(extent(800, 600)), extent(800, 768)));
    }
}
