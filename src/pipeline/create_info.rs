//! Backend-neutral description of a pipeline layout.
//!
//! These types carry configuration only. [`PipelineLayout::new`](crate::PipelineLayout::new) converts them into
//! Vulkan objects.

use ash::vk;

use crate::sampler::SamplerDescriptor;
use crate::util::to_vk::{AsVulkanType, IntoVulkanType};

bitflags::bitflags! {
    /// Shader stages a binding is visible to.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct StageFlags: u32 {
        const VERTEX = 1 << 0;
        const TESS_CONTROL = 1 << 1;
        const TESS_EVALUATION = 1 << 2;
        const GEOMETRY = 1 << 3;
        const FRAGMENT = 1 << 4;
        const COMPUTE = 1 << 5;
        const ALL_TESS = Self::TESS_CONTROL.bits() | Self::TESS_EVALUATION.bits();
        const ALL_GRAPHICS = Self::VERTEX.bits()
            | Self::ALL_TESS.bits()
            | Self::GEOMETRY.bits()
            | Self::FRAGMENT.bits();
        const ALL = Self::ALL_GRAPHICS.bits() | Self::COMPUTE.bits();
    }
}

bitflags::bitflags! {
    /// How a resource is bound to the pipeline. Only a subset of these influence the descriptor type.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct BindFlags: u32 {
        const VERTEX_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const CONSTANT_BUFFER = 1 << 2;
        const STREAM_OUTPUT = 1 << 3;
        const INDIRECT_BUFFER = 1 << 4;
        /// Read-only access from a shader, as a texture or a read-only storage buffer.
        const SAMPLED = 1 << 5;
        /// Read-write access from a shader.
        const STORAGE = 1 << 6;
        const COLOR_ATTACHMENT = 1 << 7;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 8;
        const COPY_SRC = 1 << 9;
        const COPY_DST = 1 << 10;
    }
}

/// The kind of resource bound to a slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// No resource type. Always a configuration error when used in a layout.
    #[default]
    Undefined,
    Buffer,
    Texture,
    Sampler,
}

/// Logical address of a resource binding, equivalent to `layout(set = S, binding = B)` in GLSL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingSlot {
    /// Binding index within the set
    pub index: u32,
    /// Descriptor set index
    pub set: u32,
}

impl BindingSlot {
    pub fn new(set: u32, index: u32) -> Self {
        Self {
            index,
            set,
        }
    }
}

/// A single heap or dynamic resource binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BindingDescriptor {
    /// Optional name, only used for diagnostics.
    pub name: String,
    pub resource_type: ResourceType,
    pub bind_flags: BindFlags,
    pub stage_flags: StageFlags,
    pub slot: BindingSlot,
    /// Number of array elements. Zero and one both mean a single descriptor.
    pub array_size: u32,
}

impl BindingDescriptor {
    /// Create a non-array binding descriptor.
    pub fn new(resource_type: ResourceType, bind_flags: BindFlags, stage_flags: StageFlags, slot: BindingSlot) -> Self {
        Self {
            name: String::new(),
            resource_type,
            bind_flags,
            stage_flags,
            slot,
            array_size: 0,
        }
    }

    /// Set a name for this binding.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Turn this binding into an array binding.
    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }

    /// The number of descriptors this binding occupies.
    pub fn descriptor_count(&self) -> u32 {
        self.array_size.max(1)
    }
}

/// A sampler that is baked into the pipeline layout and never changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticSamplerDescriptor {
    pub name: String,
    pub stage_flags: StageFlags,
    pub slot: BindingSlot,
    pub sampler: SamplerDescriptor,
}

impl StaticSamplerDescriptor {
    pub fn new(stage_flags: StageFlags, slot: BindingSlot, sampler: SamplerDescriptor) -> Self {
        Self {
            name: String::new(),
            stage_flags,
            slot,
            sampler,
        }
    }
}

/// Defines a range of Vulkan push constants.
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantRange {
    /// Shader stages where this push constant range is used
    pub stage_flags: StageFlags,
    /// Offset into the global push constant block of this range
    pub offset: u32,
    /// Size of this push constant range
    pub size: u32,
}

/// Describes all resource bindings of a pipeline layout, grouped by how often they change.
///
/// Each non-empty group becomes its own descriptor set layout. Push constants do not occupy a descriptor set.
#[derive(Debug, Clone, Default)]
pub struct PipelineLayoutCreateInfo {
    /// Bindings whose descriptor sets are managed by the application.
    pub heap_bindings: Vec<BindingDescriptor>,
    /// Bindings that are written per draw through the descriptor cache.
    pub bindings: Vec<BindingDescriptor>,
    /// Samplers that are fixed at layout creation.
    pub static_samplers: Vec<StaticSamplerDescriptor>,
    /// Push constant ranges used in this pipeline.
    pub push_constants: Vec<PushConstantRange>,
}

impl PipelineLayoutCreateInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heap_binding(mut self, binding: BindingDescriptor) -> Self {
        self.heap_bindings.push(binding);
        self
    }

    pub fn with_binding(mut self, binding: BindingDescriptor) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn with_static_sampler(mut self, sampler: StaticSamplerDescriptor) -> Self {
        self.static_samplers.push(sampler);
        self
    }

    pub fn with_push_constant(mut self, range: PushConstantRange) -> Self {
        self.push_constants.push(range);
        self
    }

    /// Whether this layout needs a `VkPipelineLayout` object. Layouts with only push constants do not.
    pub fn has_descriptor_sets(&self) -> bool {
        !self.heap_bindings.is_empty() || !self.bindings.is_empty() || !self.static_samplers.is_empty()
    }
}

impl IntoVulkanType for StageFlags {
    type Output = vk::ShaderStageFlags;

    fn into_vulkan(self) -> Self::Output {
        const MAPPING: [(StageFlags, vk::ShaderStageFlags); 6] = [
            (StageFlags::VERTEX, vk::ShaderStageFlags::VERTEX),
            (StageFlags::TESS_CONTROL, vk::ShaderStageFlags::TESSELLATION_CONTROL),
            (StageFlags::TESS_EVALUATION, vk::ShaderStageFlags::TESSELLATION_EVALUATION),
            (StageFlags::GEOMETRY, vk::ShaderStageFlags::GEOMETRY),
            (StageFlags::FRAGMENT, vk::ShaderStageFlags::FRAGMENT),
            (StageFlags::COMPUTE, vk::ShaderStageFlags::COMPUTE),
        ];
        MAPPING
            .iter()
            .filter(|(stage, _)| self.contains(*stage))
            .fold(vk::ShaderStageFlags::empty(), |acc, (_, vk_stage)| acc | *vk_stage)
    }
}

impl AsVulkanType for PushConstantRange {
    type Output = vk::PushConstantRange;

    fn as_vulkan(&self) -> Self::Output {
        vk::PushConstantRange {
            stage_flags: self.stage_flags.into_vulkan(),
            offset: self.offset,
            size: self.size,
        }
    }
}
