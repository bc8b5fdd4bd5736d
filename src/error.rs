use thiserror::Error;

use crate::lantern::serialize::MAX_DECODE_DEPTH;

// fatal, run() logs them and exits
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no GPU adapter compatible with the surface")]
    NoAdapter,

    #[error("failed to acquire GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported texture formats")]
    NoSurfaceFormat,

    #[error("no element with id `lantern` to host the canvas")]
    NoCanvasHost,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of buffer at byte {offset}, needed {needed} more bytes")]
    UnexpectedEnd { offset: usize, needed: usize },

    #[error("unknown geometry tag {tag} at byte {offset}")]
    UnknownGeometryTag { tag: u32, offset: usize },

    #[error("unknown material tag {tag} at byte {offset}")]
    UnknownMaterialTag { tag: u32, offset: usize },

    #[error("entity at byte {offset} declares {declared} bytes but occupies {actual}")]
    SizeMismatch {
        offset: usize,
        declared: u32,
        actual: u32,
    },

    #[error("groups nested deeper than {} at byte {offset}", MAX_DECODE_DEPTH)]
    TooDeep { offset: usize },

    #[error("{0} trailing bytes after the root entity")]
    TrailingBytes(usize),
}
