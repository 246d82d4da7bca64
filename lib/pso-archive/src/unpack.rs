use archive_format::LinearAllocator;

/// Owns the [`LinearAllocator`] backing one `unpack_*` call's decoded
/// variable-length tails (§4.2) — constructed per call, dropped once the
/// `Device` call it feeds has returned.
pub struct Unpack {
    alloc: LinearAllocator,
}

impl Unpack {
    pub fn new() -> Self {
        Unpack {
            alloc: LinearAllocator::new(),
        }
    }

    pub fn copy_str(&self, s: &str) -> &str {
        self.alloc.copy_str(s)
    }

    pub fn copy_bytes(&self, b: &[u8]) -> &[u8] {
        self.alloc.copy_bytes(b)
    }
}

impl Default for Unpack {
    fn default() -> Self {
        Self::new()
    }
}
