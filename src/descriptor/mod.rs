//! This module handles everything related to descriptor sets.
//!
//! The dynamic binding tier of a [`PipelineLayout`](crate::PipelineLayout) is backed by a [`DescriptorCache`].
//! Resources are written into the cache through a [`DescriptorSetWriter`], and flushed into descriptor sets that are
//! allocated from a [`StagingDescriptorSetPool`]. The staging pool automatically grows as more descriptor sets are
//! allocated, removing the need to declare its size upfront.
//!
//! # Example
//!
//! ```ignore
//! use vkbinding::prelude::*;
//!
//! let mut staging = StagingDescriptorSetPool::new(device.clone());
//! let cache = layout.descriptor_cache_mut().unwrap();
//! let mut writer = cache.create_writer();
//! // In GLSL this would be a descriptor
//! // layout(set = X, binding = 0) uniform Camera { ... };
//! cache.emplace_descriptor(0, 0, DescriptorContents::Buffer { buffer, offset: 0, range: vk::WHOLE_SIZE }, &mut writer)?;
//! let set = cache.flush_descriptor_set(&mut staging, &mut writer)?;
//! layout.bind_dynamic_descriptor_set(cmd, vk::PipelineBindPoint::GRAPHICS, set);
//! ```
//!
//! Once the device is done with all command buffers that used staging sets, reset both the staging pool and the cache:
//!
//! ```ignore
//! staging.reset()?;
//! layout.descriptor_cache_mut().unwrap().reset();
//! ```

pub mod cache;
pub mod descriptor_pool;
pub mod pool_size;
pub mod staging_pool;
pub mod writer;
