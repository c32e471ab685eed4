//! Wrapper around `VkDescriptorSetLayout` objects.

use anyhow::Result;
use ash::vk;

use crate::core::device::{DescriptorDevice, Device};
use crate::pipeline::create_info::{BindingSlot, StageFlags};
use crate::Error;

/// A binding as it ended up in a descriptor set layout. Used as the destination of descriptor writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutBinding {
    pub slot: BindingSlot,
    pub stage_flags: StageFlags,
    pub descriptor_type: vk::DescriptorType,
    pub descriptor_count: u32,
}

/// A fully built Vulkan descriptor set layout.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DescriptorSetLayout<D: DescriptorDevice = Device> {
    #[derivative(Debug = "ignore")]
    device: D,
    handle: vk::DescriptorSetLayout,
    num_bindings: u32,
}

impl<D: DescriptorDevice> DescriptorSetLayout<D> {
    /// Create a descriptor set layout from native bindings.
    /// # Safety
    /// Immutable sampler pointers inside `bindings` must be valid for the duration of this call, and the samplers
    /// they point to must outlive the layout.
    pub unsafe fn new(device: D, bindings: &[vk::DescriptorSetLayoutBinding]) -> Result<Self> {
        let handle = device.create_descriptor_set_layout(bindings).map_err(Error::from)?;
        #[cfg(feature = "log-objects")]
        trace!("Created new VkDescriptorSetLayout {handle:p}");
        Ok(Self {
            device,
            handle,
            num_bindings: bindings.len() as u32,
        })
    }

    /// Get unsafe access to the underlying `VkDescriptorSetLayout`.
    /// # Safety
    /// The handle must not be destroyed, and is only valid while `self` is alive.
    pub unsafe fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }

    pub fn num_bindings(&self) -> u32 {
        self.num_bindings
    }
}

impl<D: DescriptorDevice> Drop for DescriptorSetLayout<D> {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkDescriptorSetLayout {:p}", self.handle);
        unsafe {
            self.device.destroy_descriptor_set_layout(self.handle);
        }
    }
}
