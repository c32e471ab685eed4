//! Vulkan resource binding on top of `ash`.
//!
//! vkbinding maps backend-neutral descriptions of shader resource bindings onto Vulkan descriptor set layouts,
//! pipeline layouts and descriptor sets. It takes care of the parts of resource binding that are tedious to get
//! right by hand:
//! - Building a [`PipelineLayout`](crate::PipelineLayout) with one descriptor set per binding tier (heap bindings,
//!   dynamic bindings and immutable samplers), including the samplers and descriptor pools it needs.
//! - Retargeting compiled SPIR-V to the descriptor set indices chosen by a pipeline layout, without recompiling it.
//!   See [`ShaderBindingLayout`](crate::ShaderBindingLayout).
//! - Per-draw descriptor sets through a [`DescriptorCache`](crate::DescriptorCache), backed by a
//!   [`StagingDescriptorSetPool`](crate::StagingDescriptorSetPool) that grows when it runs out of space.
//!
//! To get started, import the prelude
//! ```ignore
//! use vkbinding::prelude::*;
//! ```
//!
//! # Example
//!
//! vkbinding does not create Vulkan devices. Wrap an existing `ash::Device` instead:
//! ```ignore
//! use vkbinding::prelude::*;
//!
//! let device = unsafe { Device::new(ash_device) };
//! let info = PipelineLayoutCreateInfo::new()
//!     .with_binding(BindingDescriptor::new(
//!         ResourceType::Buffer,
//!         BindFlags::CONSTANT_BUFFER,
//!         StageFlags::VERTEX,
//!         BindingSlot::new(0, 0),
//!     ));
//! let mut layout = PipelineLayout::new(device.clone(), &info)?;
//! let mut staging = StagingDescriptorSetPool::new(device.clone());
//!
//! let cache = layout.descriptor_cache_mut()?;
//! let mut writer = cache.create_writer();
//! cache.emplace_descriptor(0, 0, DescriptorContents::Buffer { buffer, offset: 0, range: vk::WHOLE_SIZE }, &mut writer)?;
//! let set = cache.flush_descriptor_set(&mut staging, &mut writer)?;
//! layout.bind_dynamic_descriptor_set(cmd, vk::PipelineBindPoint::GRAPHICS, set);
//! ```
//! For further example code, check out the following modules
//! - [`pipeline`] for pipeline layouts and shader retargeting.
//! - [`descriptor`] for descriptor set management.
//!
//! All Vulkan calls go through the [`DescriptorDevice`](crate::DescriptorDevice) trait, so every object in this
//! crate can also be used on top of a custom device implementation.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;
#[macro_use]
extern crate static_assertions;

pub mod prelude;
pub use crate::prelude::*;

pub mod core;
pub mod descriptor;
pub mod pipeline;
pub mod sampler;
pub mod util;
