pub use ash::vk;

pub use crate::core::device::{DescriptorDevice, Device};
pub use crate::core::error::Error;

pub use crate::descriptor::cache::{DescriptorCache, DescriptorContents};
pub use crate::descriptor::descriptor_pool::DescriptorPool;
pub use crate::descriptor::pool_size::{DescriptorPoolSize, PoolSizeAccumulator};
pub use crate::descriptor::staging_pool::{StagingDescriptorPool, StagingDescriptorSetPool, StagingPoolConfig};
pub use crate::descriptor::writer::DescriptorSetWriter;

pub use crate::pipeline::binding_layout::{ModuleBinding, ShaderBindingLayout};
pub use crate::pipeline::create_info::*;
pub use crate::pipeline::pipeline_layout::{BindingTier, PipelineLayout};
pub use crate::pipeline::set_layout::{DescriptorSetLayout, LayoutBinding};
pub use crate::pipeline::shader::ShaderCreateInfo;
pub use crate::pipeline::spirv::Endianness;

pub use crate::sampler::*;

pub mod traits {
    pub use crate::core::device::DescriptorDevice;
    pub use crate::util::to_vk::{AsVulkanType, IntoVulkanType};
}
