//! Slot+generation handle table for objects lent across the C boundary.
//!
//! Stale handles carry an old generation and resolve to `None` instead of
//! aliasing a newer object. Generations start at 1, so the value 0 is never
//! a live handle; the C API reserves it to mean "no object".

/// Handle encoding: upper 32 bits = slot index, lower 32 bits = generation.
fn encode(slot: u32, generation: u32) -> u64 {
    ((slot as u64) << 32) | (generation as u64)
}

fn decode(handle: u64) -> (u32, u32) {
    ((handle >> 32) as u32, handle as u32)
}

const FIRST_GENERATION: u32 = 1;

struct Slot<T> {
    generation: u32,
    data: Option<T>,
}

/// Maps `u64` handles to owned values, recycling slots through a free list.
pub(crate) struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
}

impl<T> HandleTable<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Insert a value and return its (non-zero) handle.
    pub fn insert(&mut self, value: T) -> u64 {
        if let Some(slot_idx) = self.free_list.pop() {
            let slot = &mut self.slots[slot_idx as usize];
            slot.data = Some(value);
            encode(slot_idx, slot.generation)
        } else {
            let slot_idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: FIRST_GENERATION,
                data: Some(value),
            });
            encode(slot_idx, FIRST_GENERATION)
        }
    }

    /// The value behind `handle`, or `None` if stale or never issued.
    pub fn get(&self, handle: u64) -> Option<&T> {
        let (slot_idx, generation) = decode(handle);
        let slot = self.slots.get(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.data.as_ref()
    }

    /// Remove and return the value behind `handle`.
    ///
    /// Bumps the slot's generation. A slot whose generation would wrap back
    /// to 0 is retired instead of recycled, so old handles can never
    /// resolve again. Removing twice returns `None`.
    pub fn remove(&mut self, handle: u64) -> Option<T> {
        let (slot_idx, generation) = decode(handle);
        let slot = self.slots.get_mut(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.data.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        if slot.generation != 0 {
            self.free_list.push(slot_idx);
        }
        Some(value)
    }

    /// Handle of the first live value matching `pred`.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<u64> {
        self.slots.iter().enumerate().find_map(|(idx, slot)| {
            let value = slot.data.as_ref()?;
            pred(value).then(|| encode(idx as u32, slot.generation))
        })
    }
}
