//! Owned `VkDescriptorPool` with a fixed capacity.

use anyhow::Result;
use ash::prelude::VkResult;
use ash::vk;

use crate::core::device::{DescriptorDevice, Device};
use crate::descriptor::pool_size::DescriptorPoolSize;
use crate::Error;

/// Memory pool for descriptor sets. The capacity is fixed at creation.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct DescriptorPool<D: DescriptorDevice = Device> {
    #[derivative(Debug = "ignore")]
    device: D,
    handle: vk::DescriptorPool,
    max_sets: u32,
    size: DescriptorPoolSize,
}

impl<D: DescriptorDevice> DescriptorPool<D> {
    /// Create a new descriptor pool that holds up to `max_sets` sets and the descriptors given in `size`.
    pub fn new(device: D, max_sets: u32, size: DescriptorPoolSize) -> Result<Self> {
        let handle = unsafe { device.create_descriptor_pool(max_sets, size.as_slice()) }.map_err(Error::from)?;
        #[cfg(feature = "log-objects")]
        trace!("Created new VkDescriptorPool {handle:p}");

        Ok(Self {
            device,
            handle,
            max_sets,
            size,
        })
    }

    /// Get the raw Vulkan handle of this descriptor pool
    /// # Safety
    /// Destroying the pool through this handle is undefined behaviour.
    pub unsafe fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }

    /// Allocate a single descriptor set from this pool. The Vulkan error is returned unchanged so callers can
    /// detect an exhausted pool.
    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> VkResult<vk::DescriptorSet> {
        // SAFETY: The pool handle is owned by `self`, the layout is provided by the caller.
        unsafe { self.device.allocate_descriptor_set(self.handle, layout) }
    }

    /// Return all descriptor sets to the pool. Sets allocated from this pool must not be used afterwards.
    pub fn reset(&mut self) -> Result<()> {
        unsafe { self.device.reset_descriptor_pool(self.handle) }.map_err(Error::from)?;
        Ok(())
    }

    /// Maximum number of descriptor sets this pool can hold.
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    /// Get the size of the descriptor pool.
    pub fn size(&self) -> &DescriptorPoolSize {
        &self.size
    }
}

impl<D: DescriptorDevice> Drop for DescriptorPool<D> {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkDescriptorPool {:p}", self.handle);
        unsafe {
            self.device.destroy_descriptor_pool(self.handle);
        }
    }
}
