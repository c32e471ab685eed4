//! Exposes the vkbinding error type

use ash::vk;
use thiserror::Error;

use crate::pipeline::create_info::{BindFlags, ResourceType};

/// Error type that vkbinding can return.
#[derive(Error, Debug)]
pub enum Error {
    /// Generic Vulkan error type.
    #[error("Vulkan error: `{0}`")]
    VkError(vk::Result),
    /// A binding descriptor does not map to any Vulkan descriptor type.
    #[error("Binding of type {resource:?} with bind flags {bind_flags:?} has no matching descriptor type.")]
    UnsupportedBindingType {
        /// Resource type of the offending binding
        resource: ResourceType,
        /// Bind flags of the offending binding
        bind_flags: BindFlags,
    },
    /// The shader binary could not be parsed as a SPIR-V module.
    #[error("Invalid SPIR-V module: {0}")]
    InvalidSpirv(&'static str),
    /// Binding index is not part of the descriptor set layout.
    #[error("Binding index {index} out of range, layout has {count} bindings.")]
    BindingOutOfRange {
        /// Requested binding index
        index: usize,
        /// Number of bindings in the layout
        count: usize,
    },
    /// Array element is past the descriptor count of its binding.
    #[error("Array element {element} out of range, binding has {count} descriptors.")]
    ArrayElementOutOfRange {
        /// Requested array element
        element: u32,
        /// Descriptor count of the binding
        count: u32,
    },
    /// Tried to write a resource into a binding of an incompatible descriptor type.
    #[error("Cannot write {contents} into a binding of type {ty:?}.")]
    DescriptorTypeMismatch {
        /// Kind of resource that was written
        contents: &'static str,
        /// Descriptor type of the binding
        ty: vk::DescriptorType,
    },
    /// The descriptor set writer ran out of scratch space. The writer was created with a
    /// resource view count that is too small.
    #[error("Descriptor set writer scratch space exhausted.")]
    WriterExhausted,
    /// Pipeline layout has no dynamic bindings, so it has no descriptor cache.
    #[error("Pipeline layout has no dynamic bindings.")]
    NoDynamicBindings,
}

impl From<vk::Result> for Error {
    fn from(value: vk::Result) -> Self {
        Error::VkError(value)
    }
}
