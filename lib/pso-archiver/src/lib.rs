//! The write side (§4.8): a `SerializationDevice` façade for accumulating
//! shaders, render passes, and resource signatures, and an `ArchiveWriter`
//! that lays the accumulated objects out into a single archive byte buffer
//! `pso_archive::Archive::open` can read back.

pub mod device;
pub mod writer;

pub use device::{RenderPassHandle, SerializationDevice, ShaderHandle, SignatureHandle};
pub use writer::ArchiveWriter;
