//! Various utilities

pub mod to_vk;
