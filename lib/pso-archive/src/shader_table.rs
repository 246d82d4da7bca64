use std::sync::Arc;

use archive_device_traits::DeviceObject;
use parking_lot::Mutex;

#[derive(Clone, Copy)]
struct ShaderSlot {
    offset: u32,
    size: u32,
}

/// The ordered shader table (§4.7): one entry per shader in the archive's
/// `Shaders` chunk, indexed positionally (ray-tracing shader lists and
/// graphics/compute PSOs both reference shaders by this index, not by
/// name).
///
/// A single mutex guards every cache cell — coarser than a lock per entry,
/// but simpler, and the lock is never held across a `Device` call or a
/// `ByteSource` read, so contention is limited to the cache-cell bookkeeping
/// itself.
pub struct ShaderTable {
    slots: Vec<ShaderSlot>,
    cache: Mutex<Vec<Option<DeviceObject>>>,
}

impl ShaderTable {
    pub fn new(slots: Vec<(u32, u32)>) -> Self {
        let cache = Mutex::new(vec![None; slots.len()]);
        ShaderTable {
            slots: slots.into_iter().map(|(offset, size)| ShaderSlot { offset, size }).collect(),
            cache,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn offset_and_size(&self, index: u32) -> Option<(u32, u32)> {
        self.slots.get(index as usize).map(|s| (s.offset, s.size))
    }

    /// Snapshot-then-release-then-install: returns `Ok(Some(cached))` if the
    /// slot is already populated, `Ok(None)` if the caller must construct it
    /// themselves and call [`ShaderTable::install`] afterward. Never blocks
    /// on construction — the lock is held only long enough to read or write
    /// one `Option`.
    pub fn get_cached(&self, index: u32) -> Option<DeviceObject> {
        self.cache.lock().get(index as usize).and_then(Clone::clone)
    }

    /// Installs a freshly constructed shader, unconditionally overwriting
    /// whatever another thread may have installed first (§4.7: "the later
    /// installation overwrites"). Both objects were built from the same
    /// bytes and are semantically interchangeable, so the earlier one is
    /// simply dropped — duplicate construction work is wasted, not
    /// incorrect (§8 law 5).
    pub fn install(&self, index: u32, value: DeviceObject) -> DeviceObject {
        let mut cache = self.cache.lock();
        if let Some(slot) = cache.get_mut(index as usize) {
            *slot = Some(value.clone());
        }
        value
    }

    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock();
        cache.iter_mut().for_each(|slot| *slot = None);
    }
}
