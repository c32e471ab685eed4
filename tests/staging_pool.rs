use std::collections::HashSet;

use anyhow::Result;
use ash::vk;

use vkbinding::prelude::*;

use framework::{Call, RecordingDevice};

mod framework;

/// A set layout with a single uniform buffer, and the matching pool size.
fn uniform_set_layout(device: &RecordingDevice, count: u32) -> Result<(DescriptorSetLayout<RecordingDevice>, DescriptorPoolSize)> {
    let binding = vk::DescriptorSetLayoutBinding::builder()
        .binding(0)
        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
        .descriptor_count(count)
        .stage_flags(vk::ShaderStageFlags::VERTEX)
        .build();
    let layout = unsafe { DescriptorSetLayout::new(device.clone(), std::slice::from_ref(&binding))? };
    let mut accum = PoolSizeAccumulator::new();
    accum.accumulate(vk::DescriptorType::UNIFORM_BUFFER, count);
    Ok((layout, accum.finalize()))
}

fn small_config() -> StagingPoolConfig {
    StagingPoolConfig {
        initial_sets: 4,
        initial_descriptors: 4,
        growth_shift: 1,
    }
}

#[test]
pub fn grows_when_exhausted() -> Result<()> {
    framework::init_logger();
    let device = RecordingDevice::new();
    let (layout, size) = uniform_set_layout(&device, 2)?;
    let mut staging = StagingDescriptorSetPool::with_config(device.clone(), small_config());

    // The first block holds 4 sets but only 4 uniform buffers, so only 2 sets fit.
    let mut sets = HashSet::new();
    for _ in 0..16 {
        let set = staging.allocate_descriptor_set(unsafe { layout.handle() }, &size)?;
        assert_ne!(set, vk::DescriptorSet::null());
        assert!(sets.insert(set), "Every allocation should return a fresh set.");
    }
    assert!(staging.num_blocks() > 1, "Pool should have grown.");

    let pools = device.pools_created();
    for pair in pools.windows(2) {
        let (_, first_sets, first_sizes) = &pair[0];
        let (_, second_sets, second_sizes) = &pair[1];
        assert!(second_sets > first_sets, "Every new block should be larger than the previous one.");
        let count = |sizes: &Vec<(vk::DescriptorType, u32)>| {
            sizes
                .iter()
                .find(|(ty, _)| *ty == vk::DescriptorType::UNIFORM_BUFFER)
                .map(|(_, count)| *count)
                .unwrap_or(0)
        };
        assert!(count(second_sizes) > count(first_sizes));
    }
    assert_eq!(staging.capacity_level() as usize, staging.num_blocks());
    Ok(())
}

#[test]
pub fn large_requests_get_a_large_enough_block() -> Result<()> {
    let device = RecordingDevice::new();
    let (layout, size) = uniform_set_layout(&device, 100)?;
    let mut staging = StagingDescriptorSetPool::with_config(device.clone(), small_config());

    staging.allocate_descriptor_set(unsafe { layout.handle() }, &size)?;
    assert_eq!(staging.num_blocks(), 1);
    assert!(staging.blocks()[0].size().count(vk::DescriptorType::UNIFORM_BUFFER) >= 100);
    Ok(())
}

#[test]
pub fn reset_reuses_first_block() -> Result<()> {
    let device = RecordingDevice::new();
    let (layout, size) = uniform_set_layout(&device, 1)?;
    let mut staging = StagingDescriptorSetPool::with_config(device.clone(), small_config());

    let mut before = HashSet::new();
    for _ in 0..10 {
        before.insert(staging.allocate_descriptor_set(unsafe { layout.handle() }, &size)?);
    }
    let num_blocks = staging.num_blocks();
    assert!(num_blocks > 1);

    staging.reset()?;
    assert_eq!(staging.current_block(), 0);
    assert!(staging.blocks().iter().all(|block| block.num_sets() == 0));
    assert_eq!(
        device.count_calls(|call| matches!(call, Call::ResetDescriptorPool(_))),
        num_blocks,
        "Every block should be reset."
    );

    device.clear_calls();
    let set = staging.allocate_descriptor_set(unsafe { layout.handle() }, &size)?;
    assert!(!before.contains(&set), "Sets from before the reset should not be handed out again.");
    assert_eq!(staging.num_blocks(), num_blocks, "No new block should be needed after a reset.");
    assert_eq!(staging.current_block(), 0);
    let allocated_from = device.calls().into_iter().find_map(|call| match call {
        Call::AllocateDescriptorSet {
            pool,
            result: Ok(_),
            ..
        } => Some(pool),
        _ => None,
    });
    let first_pool = device.pools_created()[0].0;
    assert_eq!(allocated_from, Some(first_pool));
    Ok(())
}

#[test]
pub fn fragmented_block_is_skipped() -> Result<()> {
    let device = RecordingDevice::new();
    let (layout, size) = uniform_set_layout(&device, 1)?;
    let mut staging = StagingDescriptorSetPool::with_config(device.clone(), small_config());
    staging.allocate_descriptor_set(unsafe { layout.handle() }, &size)?;

    // Use up the rest of the first block behind the staging pool's back.
    let pool = unsafe { staging.blocks()[0].handle() };
    while unsafe { device.allocate_descriptor_set(pool, layout.handle()) }.is_ok() {}

    staging.allocate_descriptor_set(unsafe { layout.handle() }, &size)?;
    assert_eq!(staging.num_blocks(), 2);
    assert_eq!(staging.current_block(), 1);
    Ok(())
}

#[test]
pub fn drop_destroys_blocks() -> Result<()> {
    let device = RecordingDevice::new();
    let (layout, size) = uniform_set_layout(&device, 4)?;
    {
        let mut staging = StagingDescriptorSetPool::with_config(device.clone(), small_config());
        for _ in 0..4 {
            staging.allocate_descriptor_set(unsafe { layout.handle() }, &size)?;
        }
        assert_eq!(device.live_objects(), 1 + staging.num_blocks());
    }
    assert_eq!(device.live_objects(), 1);
    drop(layout);
    assert_eq!(device.live_objects(), 0);
    Ok(())
}

fn block_sizes(device: &RecordingDevice) -> Vec<(u32, u32)> {
    device
        .pools_created()
        .into_iter()
        .map(|(_, max_sets, sizes)| {
            let uniform_buffers = sizes
                .iter()
                .find(|(ty, _)| *ty == vk::DescriptorType::UNIFORM_BUFFER)
                .map(|(_, count)| *count)
                .unwrap_or(0);
            (max_sets, uniform_buffers)
        })
        .collect()
}

#[test]
pub fn huge_blocks_saturate() -> Result<()> {
    let device = RecordingDevice::new();
    let (layout, size) = uniform_set_layout(&device, 1)?;
    let config = StagingPoolConfig {
        initial_sets: 1 << 31,
        initial_descriptors: 1,
        growth_shift: 1,
    };
    let mut staging = StagingDescriptorSetPool::with_config(device.clone(), config);

    // The first block only holds one uniform buffer, so the second set needs a new block.
    staging.allocate_descriptor_set(unsafe { layout.handle() }, &size)?;
    staging.allocate_descriptor_set(unsafe { layout.handle() }, &size)?;
    assert_eq!(block_sizes(&device), vec![(1 << 31, 1), (u32::MAX, 2)]);
    Ok(())
}

#[test]
pub fn blocks_grow_past_large_shifts() -> Result<()> {
    let device = RecordingDevice::new();
    let (layout, size) = uniform_set_layout(&device, 1 << 15)?;
    let config = StagingPoolConfig {
        initial_sets: 1,
        initial_descriptors: 1,
        growth_shift: 16,
    };
    let mut staging = StagingDescriptorSetPool::with_config(device.clone(), config);

    // Block 0 fits one set, block 1 fits two, block 2 is needed for the fourth.
    for _ in 0..4 {
        staging.allocate_descriptor_set(unsafe { layout.handle() }, &size)?;
    }
    let sizes = block_sizes(&device);
    assert_eq!(sizes.len(), 3);
    for pair in sizes.windows(2) {
        assert!(pair[1].0 > pair[0].0, "Every new block should hold more sets: {sizes:?}");
        assert!(pair[1].1 > pair[0].1, "Every new block should hold more descriptors: {sizes:?}");
    }
    assert_eq!(sizes[2], (u32::MAX, u32::MAX));
    Ok(())
}

#[test]
pub fn zero_config_still_grows() -> Result<()> {
    let device = RecordingDevice::new();
    let (layout, size) = uniform_set_layout(&device, 1)?;
    let config = StagingPoolConfig {
        initial_sets: 0,
        initial_descriptors: 0,
        growth_shift: 0,
    };
    let mut staging = StagingDescriptorSetPool::with_config(device.clone(), config);
    assert_eq!(staging.config().growth_shift, 1);

    for _ in 0..4 {
        staging.allocate_descriptor_set(unsafe { layout.handle() }, &size)?;
    }
    assert_eq!(block_sizes(&device), vec![(1, 1), (2, 2), (4, 4)]);
    Ok(())
}
