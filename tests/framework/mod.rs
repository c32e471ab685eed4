#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use ash::prelude::VkResult;
use ash::vk;
use ash::vk::Handle;

use vkbinding::DescriptorDevice;

/// A descriptor set layout binding, as it was passed to the device.
#[derive(Debug, Clone)]
pub struct RecordedBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub descriptor_count: u32,
    pub stage_flags: vk::ShaderStageFlags,
    pub immutable_samplers: Vec<vk::Sampler>,
}

/// A descriptor write, with its buffer or image info resolved.
#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub dst_set: vk::DescriptorSet,
    pub dst_binding: u32,
    pub dst_array_element: u32,
    pub descriptor_type: vk::DescriptorType,
    pub buffer: Option<(vk::Buffer, vk::DeviceSize, vk::DeviceSize)>,
    pub image: Option<(vk::Sampler, vk::ImageView, vk::ImageLayout)>,
}

#[derive(Debug, Clone)]
pub struct RecordedCopy {
    pub src_set: vk::DescriptorSet,
    pub src_binding: u32,
    pub src_array_element: u32,
    pub dst_set: vk::DescriptorSet,
    pub dst_binding: u32,
    pub dst_array_element: u32,
    pub descriptor_count: u32,
}

/// Every native call made through a [`RecordingDevice`], in order.
#[derive(Debug, Clone)]
pub enum Call {
    CreateDescriptorSetLayout {
        handle: vk::DescriptorSetLayout,
        bindings: Vec<RecordedBinding>,
    },
    DestroyDescriptorSetLayout(vk::DescriptorSetLayout),
    CreateSampler(vk::Sampler),
    DestroySampler(vk::Sampler),
    CreateDescriptorPool {
        handle: vk::DescriptorPool,
        max_sets: u32,
        sizes: Vec<(vk::DescriptorType, u32)>,
    },
    ResetDescriptorPool(vk::DescriptorPool),
    DestroyDescriptorPool(vk::DescriptorPool),
    AllocateDescriptorSet {
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
        result: VkResult<vk::DescriptorSet>,
    },
    UpdateDescriptorSets {
        writes: Vec<RecordedWrite>,
        copies: Vec<RecordedCopy>,
    },
    CreatePipelineLayout {
        handle: vk::PipelineLayout,
        set_layouts: Vec<vk::DescriptorSetLayout>,
        push_constant_ranges: usize,
    },
    DestroyPipelineLayout(vk::PipelineLayout),
    BindDescriptorSets {
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: Vec<vk::DescriptorSet>,
    },
}

/// Device entry points that can be made to fail with [`RecordingDevice::fail_call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    CreateDescriptorSetLayout,
    CreateSampler,
    CreateDescriptorPool,
    AllocateDescriptorSet,
    CreatePipelineLayout,
}

#[derive(Debug, Default)]
struct PoolState {
    max_sets: u32,
    capacity: HashMap<vk::DescriptorType, u32>,
    num_sets: u32,
    used: HashMap<vk::DescriptorType, u32>,
}

#[derive(Debug, Default)]
struct State {
    next_handle: u64,
    calls: Vec<Call>,
    live: HashSet<u64>,
    layouts: HashMap<u64, Vec<(vk::DescriptorType, u32)>>,
    pools: HashMap<u64, PoolState>,
    entry_calls: HashMap<EntryPoint, usize>,
    failures: HashMap<EntryPoint, (usize, vk::Result)>,
}

impl State {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.live.insert(self.next_handle);
        self.next_handle
    }

    /// Count a call to `entry` and report the injected failure, if any. Failing calls create nothing.
    fn enter(&mut self, entry: EntryPoint) -> VkResult<()> {
        let calls = self.entry_calls.entry(entry).or_default();
        let index = *calls;
        *calls += 1;
        match self.failures.get(&entry) {
            Some((first_failing, error)) if index >= *first_failing => Err(*error),
            _ => Ok(()),
        }
    }

    fn destroy(&mut self, raw: u64) {
        assert!(self.live.remove(&raw), "test framework: destroyed handle {raw:#x} that is not alive");
    }
}

/// A device that hands out fake handles and records every call made to it.
///
/// Descriptor pools track their capacity like a driver would, and report `ERROR_OUT_OF_POOL_MEMORY` when a set
/// does not fit.
#[derive(Debug, Clone, Default)]
pub struct RecordingDevice {
    state: Arc<Mutex<State>>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of calls matching a predicate.
    pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Number of objects that were created but not destroyed yet. Descriptor sets are not objects.
    pub fn live_objects(&self) -> usize {
        self.state().live.len()
    }

    /// Make the call to `entry` with index `nth` (counting from 0, over the lifetime of the device) and every call
    /// after it fail with `error`.
    pub fn fail_call(&self, entry: EntryPoint, nth: usize, error: vk::Result) {
        self.state().failures.insert(entry, (nth, error));
    }

    pub fn set_layouts_created(&self) -> Vec<(vk::DescriptorSetLayout, Vec<RecordedBinding>)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::CreateDescriptorSetLayout {
                    handle,
                    bindings,
                } => Some((*handle, bindings.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn pools_created(&self) -> Vec<(vk::DescriptorPool, u32, Vec<(vk::DescriptorType, u32)>)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::CreateDescriptorPool {
                    handle,
                    max_sets,
                    sizes,
                } => Some((*handle, *max_sets, sizes.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<(Vec<RecordedWrite>, Vec<RecordedCopy>)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::UpdateDescriptorSets {
                    writes,
                    copies,
                } => Some((writes.clone(), copies.clone())),
                _ => None,
            })
            .collect()
    }
}

impl DescriptorDevice for RecordingDevice {
    unsafe fn create_descriptor_set_layout(&self, bindings: &[vk::DescriptorSetLayoutBinding]) -> VkResult<vk::DescriptorSetLayout> {
        let mut state = self.state();
        state.enter(EntryPoint::CreateDescriptorSetLayout)?;
        let handle = vk::DescriptorSetLayout::from_raw(state.next_handle());
        let bindings = bindings
            .iter()
            .map(|binding| RecordedBinding {
                binding: binding.binding,
                descriptor_type: binding.descriptor_type,
                descriptor_count: binding.descriptor_count,
                stage_flags: binding.stage_flags,
                immutable_samplers: if binding.p_immutable_samplers.is_null() {
                    vec![]
                } else {
                    std::slice::from_raw_parts(binding.p_immutable_samplers, binding.descriptor_count as usize).to_vec()
                },
            })
            .collect::<Vec<_>>();
        let counts = bindings
            .iter()
            .map(|binding| (binding.descriptor_type, binding.descriptor_count))
            .collect();
        state.layouts.insert(handle.as_raw(), counts);
        state.calls.push(Call::CreateDescriptorSetLayout {
            handle,
            bindings,
        });
        Ok(handle)
    }

    unsafe fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        let mut state = self.state();
        state.destroy(layout.as_raw());
        state.calls.push(Call::DestroyDescriptorSetLayout(layout));
    }

    unsafe fn create_sampler(&self, _info: &vk::SamplerCreateInfo) -> VkResult<vk::Sampler> {
        let mut state = self.state();
        state.enter(EntryPoint::CreateSampler)?;
        let handle = vk::Sampler::from_raw(state.next_handle());
        state.calls.push(Call::CreateSampler(handle));
        Ok(handle)
    }

    unsafe fn destroy_sampler(&self, sampler: vk::Sampler) {
        let mut state = self.state();
        state.destroy(sampler.as_raw());
        state.calls.push(Call::DestroySampler(sampler));
    }

    unsafe fn create_descriptor_pool(&self, max_sets: u32, sizes: &[vk::DescriptorPoolSize]) -> VkResult<vk::DescriptorPool> {
        let mut state = self.state();
        state.enter(EntryPoint::CreateDescriptorPool)?;
        let handle = vk::DescriptorPool::from_raw(state.next_handle());
        let sizes = sizes
            .iter()
            .map(|size| (size.ty, size.descriptor_count))
            .collect::<Vec<_>>();
        let mut pool = PoolState {
            max_sets,
            ..Default::default()
        };
        for (ty, count) in &sizes {
            *pool.capacity.entry(*ty).or_default() += *count;
        }
        state.pools.insert(handle.as_raw(), pool);
        state.calls.push(Call::CreateDescriptorPool {
            handle,
            max_sets,
            sizes,
        });
        Ok(handle)
    }

    unsafe fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VkResult<()> {
        let mut state = self.state();
        let pool_state = state.pools.get_mut(&pool.as_raw()).ok_or(vk::Result::ERROR_UNKNOWN)?;
        pool_state.num_sets = 0;
        pool_state.used.clear();
        state.calls.push(Call::ResetDescriptorPool(pool));
        Ok(())
    }

    unsafe fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let mut state = self.state();
        state.destroy(pool.as_raw());
        state.pools.remove(&pool.as_raw());
        state.calls.push(Call::DestroyDescriptorPool(pool));
    }

    unsafe fn allocate_descriptor_set(&self, pool: vk::DescriptorPool, layout: vk::DescriptorSetLayout) -> VkResult<vk::DescriptorSet> {
        let mut state = self.state();
        state.enter(EntryPoint::AllocateDescriptorSet)?;
        let counts = state.layouts.get(&layout.as_raw()).cloned().ok_or(vk::Result::ERROR_UNKNOWN)?;
        // Descriptor set handles share the counter, so no handle is ever handed out twice.
        state.next_handle += 1;
        let candidate = vk::DescriptorSet::from_raw(state.next_handle);
        let mut needed: HashMap<vk::DescriptorType, u32> = HashMap::new();
        for (ty, count) in &counts {
            *needed.entry(*ty).or_default() += *count;
        }
        let pool_state = state.pools.get_mut(&pool.as_raw()).ok_or(vk::Result::ERROR_UNKNOWN)?;
        let fits = pool_state.num_sets < pool_state.max_sets
            && needed.iter().all(|(ty, count)| {
                pool_state.used.get(ty).copied().unwrap_or(0) + count <= pool_state.capacity.get(ty).copied().unwrap_or(0)
            });
        let result = if fits {
            pool_state.num_sets += 1;
            for (ty, count) in needed {
                *pool_state.used.entry(ty).or_default() += count;
            }
            Ok(candidate)
        } else {
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY)
        };
        state.calls.push(Call::AllocateDescriptorSet {
            pool,
            layout,
            result,
        });
        result
    }

    unsafe fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet], copies: &[vk::CopyDescriptorSet]) {
        let writes = writes
            .iter()
            .map(|write| RecordedWrite {
                dst_set: write.dst_set,
                dst_binding: write.dst_binding,
                dst_array_element: write.dst_array_element,
                descriptor_type: write.descriptor_type,
                buffer: write
                    .p_buffer_info
                    .as_ref()
                    .map(|info| (info.buffer, info.offset, info.range)),
                image: write
                    .p_image_info
                    .as_ref()
                    .map(|info| (info.sampler, info.image_view, info.image_layout)),
            })
            .collect();
        let copies = copies
            .iter()
            .map(|copy| RecordedCopy {
                src_set: copy.src_set,
                src_binding: copy.src_binding,
                src_array_element: copy.src_array_element,
                dst_set: copy.dst_set,
                dst_binding: copy.dst_binding,
                dst_array_element: copy.dst_array_element,
                descriptor_count: copy.descriptor_count,
            })
            .collect();
        self.state().calls.push(Call::UpdateDescriptorSets {
            writes,
            copies,
        });
    }

    unsafe fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VkResult<vk::PipelineLayout> {
        let mut state = self.state();
        state.enter(EntryPoint::CreatePipelineLayout)?;
        let handle = vk::PipelineLayout::from_raw(state.next_handle());
        state.calls.push(Call::CreatePipelineLayout {
            handle,
            set_layouts: set_layouts.to_vec(),
            push_constant_ranges: push_constant_ranges.len(),
        });
        Ok(handle)
    }

    unsafe fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        let mut state = self.state();
        state.destroy(layout.as_raw());
        state.calls.push(Call::DestroyPipelineLayout(layout));
    }

    unsafe fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        self.state().calls.push(Call::BindDescriptorSets {
            cmd,
            bind_point,
            layout,
            first_set,
            sets: sets.to_vec(),
        });
    }
}

pub const SPIRV_MAGIC: u32 = 0x0723_0203;
const OP_DECORATE: u32 = 71;
const OP_FUNCTION: u32 = 54;
const OP_FUNCTION_END: u32 = 56;
pub const DECORATION_BINDING: u32 = 33;
pub const DECORATION_DESCRIPTOR_SET: u32 = 34;

/// Assembles small SPIR-V modules containing only the instructions binding layouts care about.
#[derive(Debug, Clone)]
pub struct SpirvBuilder {
    words: Vec<u32>,
}

impl SpirvBuilder {
    pub fn new() -> Self {
        Self {
            words: vec![SPIRV_MAGIC, 0x0001_0000, 0, 64, 0],
        }
    }

    /// `OpDecorate %id <decoration> <value>`
    pub fn decorate(mut self, id: u32, decoration: u32, value: u32) -> Self {
        self.words.extend_from_slice(&[(4 << 16) | OP_DECORATE, id, decoration, value]);
        self
    }

    /// `layout(set = set, binding = binding)` on variable `%id`.
    pub fn binding(self, id: u32, set: u32, binding: u32) -> Self {
        self.decorate(id, DECORATION_DESCRIPTOR_SET, set)
            .decorate(id, DECORATION_BINDING, binding)
    }

    /// An empty function. Everything after this is not scanned for decorations.
    pub fn function(mut self) -> Self {
        self.words.extend_from_slice(&[(5 << 16) | OP_FUNCTION, 1, 2, 0, 3, (1 << 16) | OP_FUNCTION_END]);
        self
    }

    pub fn words(&self) -> &[u32] {
        self.words.as_slice()
    }

    pub fn build(&self) -> Vec<u8> {
        self.words.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    pub fn build_big_endian(&self) -> Vec<u8> {
        self.words.iter().flat_map(|word| word.to_be_bytes()).collect()
    }
}

/// Decode a little endian module back into words.
pub fn words(code: &[u8]) -> Vec<u32> {
    code.chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

pub fn fake_buffer(raw: u64) -> vk::Buffer {
    vk::Buffer::from_raw(0xB000_0000 + raw)
}

pub fn fake_image_view(raw: u64) -> vk::ImageView {
    vk::ImageView::from_raw(0x1000_0000 + raw)
}

pub fn fake_command_buffer() -> vk::CommandBuffer {
    vk::CommandBuffer::from_raw(0xC0FF_EE00)
}

pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}
