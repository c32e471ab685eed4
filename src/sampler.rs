//! Sampler descriptions and the `VkSampler` wrapper used for immutable samplers.

use anyhow::Result;
use ash::vk;

use crate::core::device::{DescriptorDevice, Device};
use crate::util::to_vk::{AsVulkanType, IntoVulkanType};
use crate::Error;

/// Texture filter used for minification, magnification and mip selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SamplerFilter {
    Nearest,
    #[default]
    Linear,
}

/// How texture coordinates outside of `[0, 1]` are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SamplerAddressMode {
    #[default]
    Repeat,
    Mirror,
    Clamp,
    Border,
    MirrorOnce,
}

/// Comparison function for depth comparison samplers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Backend-neutral sampler state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDescriptor {
    pub address_mode_u: SamplerAddressMode,
    pub address_mode_v: SamplerAddressMode,
    pub address_mode_w: SamplerAddressMode,
    pub min_filter: SamplerFilter,
    pub mag_filter: SamplerFilter,
    pub mip_map_filter: SamplerFilter,
    pub mip_map_enabled: bool,
    pub mip_map_lod_bias: f32,
    pub min_lod: f32,
    pub max_lod: f32,
    /// Values above one enable anisotropic filtering.
    pub max_anisotropy: u32,
    pub compare_enabled: bool,
    pub compare_op: CompareOp,
    /// RGBA border color. Vulkan only supports a few fixed border colors, so the closest one is picked.
    pub border_color: [f32; 4],
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            address_mode_u: SamplerAddressMode::Repeat,
            address_mode_v: SamplerAddressMode::Repeat,
            address_mode_w: SamplerAddressMode::Repeat,
            min_filter: SamplerFilter::Linear,
            mag_filter: SamplerFilter::Linear,
            mip_map_filter: SamplerFilter::Linear,
            mip_map_enabled: true,
            mip_map_lod_bias: 0.0,
            min_lod: 0.0,
            max_lod: 1000.0,
            max_anisotropy: 1,
            compare_enabled: false,
            compare_op: CompareOp::Less,
            border_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

impl IntoVulkanType for SamplerFilter {
    type Output = vk::Filter;

    fn into_vulkan(self) -> Self::Output {
        match self {
            SamplerFilter::Nearest => vk::Filter::NEAREST,
            SamplerFilter::Linear => vk::Filter::LINEAR,
        }
    }
}

impl IntoVulkanType for SamplerAddressMode {
    type Output = vk::SamplerAddressMode;

    fn into_vulkan(self) -> Self::Output {
        match self {
            SamplerAddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
            SamplerAddressMode::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
            SamplerAddressMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
            SamplerAddressMode::Border => vk::SamplerAddressMode::CLAMP_TO_BORDER,
            SamplerAddressMode::MirrorOnce => vk::SamplerAddressMode::MIRROR_CLAMP_TO_EDGE,
        }
    }
}

impl IntoVulkanType for CompareOp {
    type Output = vk::CompareOp;

    fn into_vulkan(self) -> Self::Output {
        match self {
            CompareOp::Never => vk::CompareOp::NEVER,
            CompareOp::Less => vk::CompareOp::LESS,
            CompareOp::Equal => vk::CompareOp::EQUAL,
            CompareOp::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
            CompareOp::Greater => vk::CompareOp::GREATER,
            CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
            CompareOp::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
            CompareOp::Always => vk::CompareOp::ALWAYS,
        }
    }
}

fn border_color(color: [f32; 4]) -> vk::BorderColor {
    if color[3] < 0.5 {
        vk::BorderColor::FLOAT_TRANSPARENT_BLACK
    } else if color[0] > 0.5 || color[1] > 0.5 || color[2] > 0.5 {
        vk::BorderColor::FLOAT_OPAQUE_WHITE
    } else {
        vk::BorderColor::FLOAT_OPAQUE_BLACK
    }
}

impl AsVulkanType for SamplerDescriptor {
    type Output = vk::SamplerCreateInfo;

    fn as_vulkan(&self) -> Self::Output {
        let (mipmap_mode, max_lod) = if self.mip_map_enabled {
            (
                match self.mip_map_filter {
                    SamplerFilter::Nearest => vk::SamplerMipmapMode::NEAREST,
                    SamplerFilter::Linear => vk::SamplerMipmapMode::LINEAR,
                },
                self.max_lod,
            )
        } else {
            // Clamping the LOD range to zero disables mipmapping.
            (vk::SamplerMipmapMode::NEAREST, 0.0)
        };
        vk::SamplerCreateInfo::builder()
            .mag_filter(self.mag_filter.into_vulkan())
            .min_filter(self.min_filter.into_vulkan())
            .mipmap_mode(mipmap_mode)
            .address_mode_u(self.address_mode_u.into_vulkan())
            .address_mode_v(self.address_mode_v.into_vulkan())
            .address_mode_w(self.address_mode_w.into_vulkan())
            .mip_lod_bias(self.mip_map_lod_bias)
            .anisotropy_enable(self.max_anisotropy > 1)
            .max_anisotropy(self.max_anisotropy as f32)
            .compare_enable(self.compare_enabled)
            .compare_op(self.compare_op.into_vulkan())
            .min_lod(self.min_lod.min(max_lod))
            .max_lod(max_lod)
            .border_color(border_color(self.border_color))
            .unnormalized_coordinates(false)
            .build()
    }
}

/// Represents a vulkan sampler object.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Sampler<D: DescriptorDevice = Device> {
    #[derivative(Debug = "ignore")]
    device: D,
    handle: vk::Sampler,
}

impl<D: DescriptorDevice> Sampler<D> {
    /// Create a new `VkSampler` object from a sampler description.
    pub fn new(device: D, desc: &SamplerDescriptor) -> Result<Self> {
        let info = desc.as_vulkan();
        let handle = unsafe { device.create_sampler(&info) }.map_err(Error::from)?;
        #[cfg(feature = "log-objects")]
        trace!("Created new VkSampler {handle:p}");
        Ok(Self {
            device,
            handle,
        })
    }

    /// Get unsafe access to the underlying `VkSampler` object.
    /// # Safety
    /// Destroying this sampler while the layout that references it is alive is undefined behaviour.
    pub unsafe fn handle(&self) -> vk::Sampler {
        self.handle
    }
}

impl<D: DescriptorDevice> Drop for Sampler<D> {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkSampler {:p}", self.handle);
        unsafe {
            self.device.destroy_sampler(self.handle);
        }
    }
}
