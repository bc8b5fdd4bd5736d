use wgpu::{
    Device, Extent3d, Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages,
    TextureView, TextureViewDescriptor,
};
use winit::dpi::PhysicalSize;

// shared by frame and accumulation so one can be copied into the other
pub const TARGET_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

pub struct RenderTarget {
    pub gpu_texture: Texture,
    pub view: TextureView,
    pub name: String,
    usage: TextureUsages,
}

impl RenderTarget {
    // zero-filled on creation
    pub fn new(device: &Device, size: PhysicalSize<u32>, usage: TextureUsages, label: &str) -> Self {
        let gpu_texture = device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TARGET_FORMAT,
            usage,
            view_formats: &[],
        });

        let view = gpu_texture.create_view(&TextureViewDescriptor {
            label: Some(&format!("{} view", label)),
            ..Default::default()
        });

        Self {
            gpu_texture,
            view,
            name: label.to_string(),
            usage,
        }
    }

    pub fn frame(device: &Device, size: PhysicalSize<u32>) -> Self {
        Self::new(
            device,
            size,
            TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
            "Lantern Frame",
        )
    }

    pub fn accumulation(device: &Device, size: PhysicalSize<u32>) -> Self {
        Self::new(
            device,
            size,
            TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            "Lantern Accumulation",
        )
    }

    pub fn resize(&mut self, device: &Device, new_size: PhysicalSize<u32>) {
        if self.size() != new_size {
            *self = Self::new(device, new_size, self.usage, &self.name);
        }
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.gpu_texture.width(), self.gpu_texture.height())
    }
}
