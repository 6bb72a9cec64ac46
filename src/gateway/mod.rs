//! Gateway module - Admission control and request orchestration

pub mod admission;
pub mod pipeline;
