use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use strum::{EnumCount, EnumIter};

use crate::error::ArchiveError;
use crate::serializer::Serializer;

/// ASCII "GDIL" read little-endian, the archive's compile-time magic constant.
pub const MAGIC: u32 = 0x4C49_4447;

/// The exact archive format version this crate reads and writes.
///
/// Per spec this is an exact match, not a minimum: off-by-one in either
/// direction fails [`ArchiveError::UnsupportedVersion`].
pub const VERSION: u32 = 1;

/// One of the six supported graphics APIs. Closed set — an `Archive` is always
/// bound to exactly one tag at construction and only ever reads that tag's block.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, EnumCount, EnumIter,
)]
#[repr(u32)]
pub enum BackendTag {
    OpenGl = 0,
    Direct3D11 = 1,
    Direct3D12 = 2,
    Vulkan = 3,
    MetalIos = 4,
    MetalMacos = 5,
}

pub const NUM_BACKENDS: usize = BackendTag::COUNT;

impl BackendTag {
    pub fn from_u32(v: u32) -> Option<Self> {
        FromPrimitive::from_u32(v)
    }

    pub fn as_u32(self) -> u32 {
        ToPrimitive::to_u32(&self).expect("BackendTag always fits in u32")
    }
}

/// A tagged region of the archive body.
///
/// Invariant upheld by [`crate::header::Header::decode`]: at most one
/// chunk per [`ChunkType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ChunkType {
    ArchiveDebugInfo = 0,
    ResourceSignature = 1,
    GraphicsPipelineStates = 2,
    ComputePipelineStates = 3,
    RayTracingPipelineStates = 4,
    TilePipelineStates = 5,
    RenderPass = 6,
    Shaders = 7,
}

impl ChunkType {
    pub fn from_u32(v: u32) -> Result<Self, ArchiveError> {
        FromPrimitive::from_u32(v).ok_or(ArchiveError::UnknownChunkType(v))
    }

    pub fn as_u32(self) -> u32 {
        ToPrimitive::to_u32(&self).expect("ChunkType always fits in u32")
    }
}

/// `{ type, offset, size }`, read contiguously after the fixed [`Header`].
#[derive(Debug, Clone, Copy)]
pub struct ChunkHeader {
    pub ty: ChunkType,
    pub offset: u32,
    pub size: u32,
}

impl ChunkHeader {
    pub const ENCODED_SIZE: usize = 4 + 4 + 4;

    pub fn encode(&self, ser: &mut Serializer<'_>) -> Result<(), ArchiveError> {
        let mut ty = self.ty.as_u32();
        let mut offset = self.offset;
        let mut size = self.size;
        ser.u32(&mut ty)?;
        ser.u32(&mut size)?;
        ser.u32(&mut offset)?;
        Ok(())
    }

    pub fn decode(ser: &mut Serializer<'_>) -> Result<Self, ArchiveError> {
        let mut ty = 0u32;
        let mut size = 0u32;
        let mut offset = 0u32;
        ser.u32(&mut ty)?;
        ser.u32(&mut size)?;
        ser.u32(&mut offset)?;
        Ok(ChunkHeader {
            ty: ChunkType::from_u32(ty)?,
            offset,
            size,
        })
    }
}

/// The fixed header read at offset 0 of every archive file.
#[derive(Debug, Clone)]
pub struct Header {
    pub version: u32,
    pub num_chunks: u32,
    pub block_base_offsets: [u32; NUM_BACKENDS],
}

impl Header {
    pub const ENCODED_SIZE: usize = 4 + 4 + 4 + NUM_BACKENDS * 4;

    pub fn encode(&self, ser: &mut Serializer<'_>) -> Result<(), ArchiveError> {
        let mut magic = MAGIC;
        let mut version = self.version;
        let mut num_chunks = self.num_chunks;
        ser.u32(&mut magic)?;
        ser.u32(&mut version)?;
        ser.u32(&mut num_chunks)?;
        for off in self.block_base_offsets.iter() {
            let mut off = *off;
            ser.u32(&mut off)?;
        }
        Ok(())
    }

    /// Reads and validates the fixed header: fails [`ArchiveError::BadMagic`]
    /// if the magic doesn't match, [`ArchiveError::UnsupportedVersion`] if the
    /// version isn't an exact match (no partial acceptance either direction).
    pub fn decode(ser: &mut Serializer<'_>) -> Result<Self, ArchiveError> {
        let mut magic = 0u32;
        ser.u32(&mut magic)?;
        if magic != MAGIC {
            return Err(ArchiveError::BadMagic {
                found: magic,
                expected: MAGIC,
            });
        }

        let mut version = 0u32;
        ser.u32(&mut version)?;
        if version != VERSION {
            return Err(ArchiveError::UnsupportedVersion {
                found: version,
                expected: VERSION,
            });
        }

        let mut num_chunks = 0u32;
        ser.u32(&mut num_chunks)?;

        let mut block_base_offsets = [0u32; NUM_BACKENDS];
        for off in block_base_offsets.iter_mut() {
            ser.u32(off)?;
        }

        Ok(Header {
            version,
            num_chunks,
            block_base_offsets,
        })
    }
}
