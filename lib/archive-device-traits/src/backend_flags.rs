use archive_format::header::{BackendTag, NUM_BACKENDS};
use bitflags::bitflags;

bitflags! {
    /// Which backends a [`crate::device::Device`] (or, on the write side, a
    /// `SerializationDevice`) is willing to construct objects for — gates
    /// `create_*` the same way the wire format's per-backend block table
    /// gates which blocks exist at all (§4.8).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BackendFlags: u32 {
        const OPEN_GL = 1 << 0;
        const DIRECT3D11 = 1 << 1;
        const DIRECT3D12 = 1 << 2;
        const VULKAN = 1 << 3;
        const METAL_IOS = 1 << 4;
        const METAL_MACOS = 1 << 5;
    }
}

impl BackendFlags {
    pub fn from_tag(tag: BackendTag) -> Self {
        BackendFlags::from_bits_truncate(1 << tag.as_u32())
    }

    pub fn contains_tag(self, tag: BackendTag) -> bool {
        self.contains(BackendFlags::from_tag(tag))
    }

    pub const ALL: BackendFlags = BackendFlags::from_bits_truncate((1u32 << NUM_BACKENDS) - 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tag_round_trips_membership() {
        let flags = BackendFlags::from_tag(BackendTag::Vulkan);
        assert!(flags.contains_tag(BackendTag::Vulkan));
        assert!(!flags.contains_tag(BackendTag::OpenGl));
    }

    #[test]
    fn all_contains_every_backend() {
        for tag in [
            BackendTag::OpenGl,
            BackendTag::Direct3D11,
            BackendTag::Direct3D12,
            BackendTag::Vulkan,
            BackendTag::MetalIos,
            BackendTag::MetalMacos,
        ] {
            assert!(BackendFlags::ALL.contains_tag(tag));
        }
    }
}
