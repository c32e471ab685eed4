//! Growable pools for short-lived descriptor sets.
//!
//! A [`StagingDescriptorSetPool`] is a list of fixed-capacity [`StagingDescriptorPool`] blocks. Sets are carved out
//! of the current block until it runs out of space, after which the next block is used, or a new block with a larger
//! capacity is created. Nothing is ever freed individually. Instead, [`StagingDescriptorSetPool::reset`] returns all
//! sets in all blocks at once, typically once per frame after the device finished using them.

use anyhow::Result;
use ash::prelude::VkResult;
use ash::vk;

use crate::core::device::{DescriptorDevice, Device};
use crate::descriptor::descriptor_pool::DescriptorPool;
use crate::descriptor::pool_size::{DescriptorPoolSize, PoolSizeAccumulator};

/// Descriptor types every staging block reserves space for.
const BLOCK_DESCRIPTOR_TYPES: [vk::DescriptorType; 11] = [
    vk::DescriptorType::SAMPLER,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    vk::DescriptorType::SAMPLED_IMAGE,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
    vk::DescriptorType::STORAGE_TEXEL_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
    vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
    vk::DescriptorType::INPUT_ATTACHMENT,
];

/// Controls the size of staging blocks. The block created at capacity level `n` holds
/// `initial_sets << (n * growth_shift)` sets and `initial_descriptors << (n * growth_shift)` descriptors of each type,
/// saturating at `u32::MAX`. Every block is larger than the one before it until that limit is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingPoolConfig {
    pub initial_sets: u32,
    pub initial_descriptors: u32,
    /// Must be at least 1, so every new block is larger than the previous one.
    pub growth_shift: u32,
}

impl StagingPoolConfig {
    /// Replace zero values, which would stop the pool from growing, with one.
    fn validated(self) -> Self {
        let validated = Self {
            initial_sets: self.initial_sets.max(1),
            initial_descriptors: self.initial_descriptors.max(1),
            growth_shift: self.growth_shift.max(1),
        };
        if validated != self {
            warn!("Staging pool config {self:?} has zero values, using {validated:?} instead");
        }
        validated
    }
}

/// Scale `initial` by `2^shift`, saturating at `u32::MAX`, and keep it above `previous` while possible.
fn grow_capacity(initial: u32, shift: u32, previous: u32) -> u32 {
    // `initial` fits in 32 bits, so shifting by at most 32 cannot overflow a u64.
    let scaled = u64::from(initial) << shift.min(32);
    u32::try_from(scaled)
        .unwrap_or(u32::MAX)
        .max(previous.saturating_add(1))
}

impl Default for StagingPoolConfig {
    fn default() -> Self {
        Self {
            initial_sets: 64,
            initial_descriptors: 256,
            growth_shift: 1,
        }
    }
}

/// A single fixed-capacity staging block.
#[derive(Debug)]
pub struct StagingDescriptorPool<D: DescriptorDevice = Device> {
    pool: DescriptorPool<D>,
    num_sets: u32,
    remaining: Vec<vk::DescriptorPoolSize>,
}

impl<D: DescriptorDevice> StagingDescriptorPool<D> {
    /// Create a block that holds `max_sets` sets and the given number of descriptors.
    pub fn new(device: D, max_sets: u32, size: DescriptorPoolSize) -> Result<Self> {
        let remaining = size.as_slice().to_vec();
        Ok(Self {
            pool: DescriptorPool::new(device, max_sets, size)?,
            num_sets: 0,
            remaining,
        })
    }

    /// Whether this block still has room for one set with the given descriptor counts.
    pub fn has_capacity(&self, sizes: &DescriptorPoolSize) -> bool {
        if self.num_sets >= self.pool.max_sets() {
            return false;
        }
        sizes.as_slice().iter().all(|size| {
            self.remaining
                .iter()
                .find(|remaining| remaining.ty == size.ty)
                .map_or(size.descriptor_count == 0, |remaining| remaining.descriptor_count >= size.descriptor_count)
        })
    }

    /// Get unsafe access to the underlying `VkDescriptorPool`.
    /// # Safety
    /// Destroying or resetting the pool through this handle is undefined behaviour.
    pub unsafe fn handle(&self) -> vk::DescriptorPool {
        self.pool.handle()
    }

    /// Allocate one set from this block. The native error is returned as-is so the caller can tell an
    /// exhausted block apart from a fatal failure.
    pub fn allocate_descriptor_set(&mut self, layout: vk::DescriptorSetLayout, sizes: &DescriptorPoolSize) -> VkResult<vk::DescriptorSet> {
        let set = self.pool.allocate(layout)?;
        self.num_sets += 1;
        for size in sizes.as_slice() {
            if let Some(remaining) = self.remaining.iter_mut().find(|remaining| remaining.ty == size.ty) {
                remaining.descriptor_count = remaining.descriptor_count.saturating_sub(size.descriptor_count);
            }
        }
        Ok(set)
    }

    /// Return every set allocated from this block.
    pub fn reset(&mut self) -> Result<()> {
        self.pool.reset()?;
        self.num_sets = 0;
        self.remaining = self.pool.size().as_slice().to_vec();
        Ok(())
    }

    /// Maximum number of sets in this block.
    pub fn max_sets(&self) -> u32 {
        self.pool.max_sets()
    }

    /// Number of sets currently allocated from this block.
    pub fn num_sets(&self) -> u32 {
        self.num_sets
    }

    /// Total capacity of this block.
    pub fn size(&self) -> &DescriptorPoolSize {
        self.pool.size()
    }
}

/// Pool of staging descriptor sets that grows when it runs out of space.
///
/// # Example
/// ```ignore
/// let mut staging = StagingDescriptorSetPool::new(device.clone());
/// let set = staging.allocate_descriptor_set(set_layout, &pool_size)?;
/// // ... record commands using `set` and wait for them to complete ...
/// staging.reset()?;
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct StagingDescriptorSetPool<D: DescriptorDevice = Device> {
    #[derivative(Debug = "ignore")]
    device: D,
    config: StagingPoolConfig,
    blocks: Vec<StagingDescriptorPool<D>>,
    current: usize,
    capacity_level: u32,
    last_max_sets: u32,
    last_descriptors: u32,
}

impl<D: DescriptorDevice> StagingDescriptorSetPool<D> {
    /// Create an empty staging pool with the default block sizes. No Vulkan objects are created until the first allocation.
    pub fn new(device: D) -> Self {
        Self::with_config(device, StagingPoolConfig::default())
    }

    /// Create an empty staging pool with custom block sizes. Zero values in `config` are replaced with one.
    pub fn with_config(device: D, config: StagingPoolConfig) -> Self {
        Self {
            device,
            config: config.validated(),
            blocks: vec![],
            current: 0,
            capacity_level: 0,
            last_max_sets: 0,
            last_descriptors: 0,
        }
    }

    /// The block size configuration in use.
    pub fn config(&self) -> &StagingPoolConfig {
        &self.config
    }

    /// Allocate a descriptor set with the given layout. `sizes` must describe the descriptors in `layout`.
    /// If no block has room left, a new, larger block is created.
    /// # Errors
    /// - Fails if creating a new block or allocating from a fresh block fails. This is not recoverable.
    pub fn allocate_descriptor_set(&mut self, layout: vk::DescriptorSetLayout, sizes: &DescriptorPoolSize) -> Result<vk::DescriptorSet> {
        while let Some(block) = self.blocks.get_mut(self.current) {
            if block.has_capacity(sizes) {
                match block.allocate_descriptor_set(layout, sizes) {
                    Ok(set) => return Ok(set),
                    // The tracked counts can be optimistic, e.g. when the pool is fragmented.
                    Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {}
                    Err(err) => return Err(crate::Error::from(err).into()),
                }
            }
            self.current += 1;
        }

        self.allocate_block(sizes)?;
        let block = &mut self.blocks[self.current];
        Ok(block
            .allocate_descriptor_set(layout, sizes)
            .map_err(crate::Error::from)?)
    }

    /// Returns all descriptor sets to the pool. Sets handed out before must not be used afterwards.
    pub fn reset(&mut self) -> Result<()> {
        for block in &mut self.blocks {
            block.reset()?;
        }
        self.current = 0;
        Ok(())
    }

    /// Number of blocks that were allocated so far.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Index of the block new sets are allocated from.
    pub fn current_block(&self) -> usize {
        self.current
    }

    /// Capacity level of the next block that will be created.
    pub fn capacity_level(&self) -> u32 {
        self.capacity_level
    }

    pub fn blocks(&self) -> &[StagingDescriptorPool<D>] {
        self.blocks.as_slice()
    }

    fn allocate_block(&mut self, request: &DescriptorPoolSize) -> Result<()> {
        let level = self.capacity_level;
        let shift = level.saturating_mul(self.config.growth_shift);
        let max_sets = grow_capacity(self.config.initial_sets, shift, self.last_max_sets);
        let descriptors = grow_capacity(self.config.initial_descriptors, shift, self.last_descriptors);

        let mut accum = PoolSizeAccumulator::new();
        for ty in BLOCK_DESCRIPTOR_TYPES {
            accum.accumulate(ty, descriptors.max(request.count(ty)));
        }
        for size in request.as_slice() {
            if !BLOCK_DESCRIPTOR_TYPES.contains(&size.ty) {
                accum.accumulate(size.ty, descriptors.max(size.descriptor_count));
            }
        }

        debug!(
            "Allocating staging descriptor block #{} (capacity level {level}, {max_sets} sets, {descriptors} descriptors per type)",
            self.blocks.len()
        );
        let block = StagingDescriptorPool::new(self.device.clone(), max_sets, accum.finalize())?;
        self.blocks.push(block);
        self.current = self.blocks.len() - 1;
        self.last_max_sets = max_sets;
        self.last_descriptors = descriptors;
        self.capacity_level += 1;
        Ok(())
    }
}
