use thiserror::Error;

/// The closed error taxonomy for the archive format and reader.
///
/// Construction errors ([`Self::BadMagic`], [`Self::UnsupportedVersion`],
/// [`Self::DuplicateChunk`], [`Self::UnknownChunkType`], [`Self::IoError`] raised while
/// building the archive) are fatal: no archive value is ever produced.
/// All other variants are per-entry and never invalidate an already-open archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("magic number {found:#010x} does not match the expected {expected:#010x}")]
    BadMagic { found: u32, expected: u32 },
    #[error("archive version {found} does not match the required version {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("chunk of type {0:?} appears more than once in the archive")]
    DuplicateChunk(String),
    #[error("chunk type tag {0} is not a recognized chunk type")]
    UnknownChunkType(u32),
    #[error("name {name:?} is already present in the {kind} directory")]
    DuplicateName { kind: String, name: String },
    #[error("{kind} {name:?} was not found in the archive")]
    NotFound { kind: String, name: String },
    #[error("entry is tagged {found:?} but {expected:?} was requested")]
    TypeMismatch { found: String, expected: String },
    #[error("decode ran past the end of the available bytes ({needed} needed, {remaining} left)")]
    DecodeUnderflow { needed: usize, remaining: usize },
    #[error("no data block for backend {0:?} in this entry")]
    MissingBackendData(String),
    #[error("mutation callback altered a field locked against modification: {0}")]
    IllegalModification(String),
    #[error("signature binding indices are not a dense range starting at 0: {0}")]
    InvalidSignatureLayout(String),
    #[error("device failed to construct the object: {0}")]
    DeviceConstructionFailed(anyhow::Error),
    #[error("I/O error reading the archive: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<anyhow::Error> for ArchiveError {
    fn from(err: anyhow::Error) -> Self {
        ArchiveError::DeviceConstructionFailed(err)
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
