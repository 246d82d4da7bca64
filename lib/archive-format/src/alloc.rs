use typed_arena::Arena;

/// A bump allocator that owns every transient string and decoded tail
/// produced while unpacking a single entry.
///
/// Individual allocations are never freed; the whole arena drops at once when
/// the owning [`LinearAllocator`] goes out of scope (ordinary Rust `Drop`,
/// replacing the C++ original's explicit arena-release call). Backed by
/// [`typed_arena::Arena`] rather than a hand-rolled page list — the same
/// crate `autograph-spirv` reaches for when decoding SPIR-V into
/// arena-owned structures.
#[derive(Default)]
pub struct LinearAllocator {
    bytes: Arena<u8>,
}

impl LinearAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies `bytes` into the arena and returns a slice with the arena's
    /// lifetime, so the decoded structure no longer aliases the source
    /// buffer the bytes came from.
    pub fn copy_bytes(&self, bytes: &[u8]) -> &[u8] {
        self.bytes.alloc_extend(bytes.iter().copied())
    }

    pub fn copy_str(&self, s: &str) -> &str {
        let bytes = self.copy_bytes(s.as_bytes());
        // Safety: `bytes` is a verbatim copy of a valid `&str`'s bytes.
        unsafe { std::str::from_utf8_unchecked(bytes) }
    }
}
