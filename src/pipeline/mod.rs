//! The pipeline module exposes the [`PipelineLayout`](crate::PipelineLayout) struct, and everything needed to build one
//! and to retarget shaders to it.
//!
//! A pipeline layout is described with a [`PipelineLayoutCreateInfo`](crate::PipelineLayoutCreateInfo), listing
//! bindings per tier. Every tier that has bindings gets its own descriptor set, numbered in the order
//! heap bindings, dynamic bindings, static samplers. Shaders compiled against other set indices can be patched with
//! [`ShaderCreateInfo::bind_to_layout`](crate::ShaderCreateInfo::bind_to_layout).
//!
//! # Example
//! ```ignore
//! use vkbinding::prelude::*;
//!
//! let info = PipelineLayoutCreateInfo::new()
//!     // layout(set = 0, binding = 0) uniform Camera { ... };
//!     .with_binding(BindingDescriptor::new(
//!         ResourceType::Buffer,
//!         BindFlags::CONSTANT_BUFFER,
//!         StageFlags::VERTEX,
//!         BindingSlot::new(0, 0),
//!     ))
//!     // layout(set = 0, binding = 1) uniform sampler linear_sampler;
//!     .with_static_sampler(StaticSamplerDescriptor::new(
//!         StageFlags::FRAGMENT,
//!         BindingSlot::new(0, 1),
//!         SamplerDescriptor::default(),
//!     ))
//!     .with_push_constant(PushConstantRange {
//!         stage_flags: StageFlags::VERTEX,
//!         offset: 0,
//!         size: 64,
//!     });
//! let layout = PipelineLayout::new(device.clone(), &info)?;
//!
//! // Both bindings were declared in set 0, but the samplers live in set 1 now.
//! let mut fragment = ShaderCreateInfo::from_spirv(vk::ShaderStageFlags::FRAGMENT, frag_code);
//! fragment.bind_to_layout(&layout, false)?;
//! ```

pub mod binding_layout;
pub mod create_info;
pub mod pipeline_layout;
pub mod set_layout;
pub mod shader;
pub mod spirv;
