//! Aurascope library - circular real-time audio spectrum visualizer

pub mod analyzer;
pub mod cli;
pub mod params;
pub mod rendering;
pub mod shading;
