//! Binary layout, cursor serializer and closed error taxonomy shared by the
//! archive writer and reader.
//!
//! This crate has no notion of a `Device` or a rendering backend beyond the
//! closed [`header::BackendTag`] enum — it is the wire format only.

pub mod alloc;
pub mod error;
pub mod header;
pub mod serializer;

pub use alloc::LinearAllocator;
pub use error::{ArchiveError, Result};
pub use header::{BackendTag, ChunkHeader, ChunkType, Header, MAGIC, NUM_BACKENDS, VERSION};
pub use serializer::Serializer;
