//! The native device interface used by every object in this crate.
//!
//! All Vulkan calls go through the [`DescriptorDevice`] trait. [`Device`] implements it on top of an
//! [`ash::Device`], but anything that can hand out handles and record calls can stand in for it.

use std::ops::Deref;
use std::sync::Arc;

use ash::prelude::VkResult;
use ash::vk;

/// The subset of the Vulkan device API needed to create binding objects and manage descriptor sets.
///
/// # Safety
/// All methods follow the valid usage rules of the Vulkan function they wrap. Handles passed in must
/// have been created by the same device and must not be in use by the device when destroyed.
pub trait DescriptorDevice: Clone + std::fmt::Debug {
    /// `vkCreateDescriptorSetLayout` with the given bindings and no flags.
    unsafe fn create_descriptor_set_layout(&self, bindings: &[vk::DescriptorSetLayoutBinding]) -> VkResult<vk::DescriptorSetLayout>;
    /// `vkDestroyDescriptorSetLayout`
    unsafe fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    /// `vkCreateSampler`
    unsafe fn create_sampler(&self, info: &vk::SamplerCreateInfo) -> VkResult<vk::Sampler>;
    /// `vkDestroySampler`
    unsafe fn destroy_sampler(&self, sampler: vk::Sampler);
    /// `vkCreateDescriptorPool` with the given set limit and pool sizes and no flags.
    unsafe fn create_descriptor_pool(&self, max_sets: u32, sizes: &[vk::DescriptorPoolSize]) -> VkResult<vk::DescriptorPool>;
    /// `vkResetDescriptorPool`, returning every set allocated from `pool` to it.
    unsafe fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VkResult<()>;
    /// `vkDestroyDescriptorPool`
    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    /// `vkAllocateDescriptorSets` for a single set.
    /// Returns `ERROR_OUT_OF_POOL_MEMORY` or `ERROR_FRAGMENTED_POOL` if the pool cannot hold the set.
    unsafe fn allocate_descriptor_set(&self, pool: vk::DescriptorPool, layout: vk::DescriptorSetLayout) -> VkResult<vk::DescriptorSet>;
    /// `vkUpdateDescriptorSets`. Writes are applied before copies.
    unsafe fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet], copies: &[vk::CopyDescriptorSet]);
    /// `vkCreatePipelineLayout`
    unsafe fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VkResult<vk::PipelineLayout>;
    /// `vkDestroyPipelineLayout`
    unsafe fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    /// `vkCmdBindDescriptorSets` without dynamic offsets.
    unsafe fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    );
}

#[derive(Derivative)]
#[derivative(Debug)]
struct DeviceInner {
    #[derivative(Debug = "ignore")]
    handle: ash::Device,
}

/// Wrapper around a `VkDevice`. Internal state is wrapped in an `Arc<DeviceInner>`, so this is safe
/// to clone. The device is destroyed when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

assert_impl_all!(Device: Send, Sync);

impl Device {
    /// Take ownership of an already created `ash::Device`.
    /// # Safety
    /// * `handle` must be a valid device that is not destroyed by anyone else.
    pub unsafe fn new(handle: ash::Device) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                handle,
            }),
        }
    }

    /// Get unsafe access to the underlying VkDevice handle
    /// # Safety
    /// * The caller should not call `vkDestroyDevice` on this.
    /// * This handle is valid as long as there is a copy of `self` alive.
    pub unsafe fn handle(&self) -> ash::Device {
        self.inner.handle.clone()
    }
}

impl Deref for Device {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.inner.handle
    }
}

impl DescriptorDevice for Device {
    unsafe fn create_descriptor_set_layout(&self, bindings: &[vk::DescriptorSetLayoutBinding]) -> VkResult<vk::DescriptorSetLayout> {
        let info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings).build();
        self.inner.handle.create_descriptor_set_layout(&info, None)
    }

    unsafe fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.inner.handle.destroy_descriptor_set_layout(layout, None);
    }

    unsafe fn create_sampler(&self, info: &vk::SamplerCreateInfo) -> VkResult<vk::Sampler> {
        self.inner.handle.create_sampler(info, None)
    }

    unsafe fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.inner.handle.destroy_sampler(sampler, None);
    }

    unsafe fn create_descriptor_pool(&self, max_sets: u32, sizes: &[vk::DescriptorPoolSize]) -> VkResult<vk::DescriptorPool> {
        let info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(sizes)
            .build();
        self.inner.handle.create_descriptor_pool(&info, None)
    }

    unsafe fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VkResult<()> {
        self.inner
            .handle
            .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
    }

    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.inner.handle.destroy_descriptor_pool(pool, None);
    }

    unsafe fn allocate_descriptor_set(&self, pool: vk::DescriptorPool, layout: vk::DescriptorSetLayout) -> VkResult<vk::DescriptorSet> {
        let layouts = [layout];
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts)
            .build();
        let sets = self.inner.handle.allocate_descriptor_sets(&info)?;
        sets.first().copied().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    unsafe fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet], copies: &[vk::CopyDescriptorSet]) {
        self.inner.handle.update_descriptor_sets(writes, copies);
    }

    unsafe fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VkResult<vk::PipelineLayout> {
        let info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges)
            .build();
        self.inner.handle.create_pipeline_layout(&info, None)
    }

    unsafe fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.inner.handle.destroy_pipeline_layout(layout, None);
    }

    unsafe fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        self.inner
            .handle
            .cmd_bind_descriptor_sets(cmd, bind_point, layout, first_set, sets, &[]);
    }
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        unsafe {
            self.handle.destroy_device(None);
        }
    }
}
