/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::collections::TryReserveError;
use std::io;

use crate::modules::persistent_storage::PersistentStorageModule;

/// One evicted anonymous page inside of the swap file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SwapSlot {
    /// page aligned address the content belongs to
    pub(crate) addr: usize,

    /// the page occupies `[offset, offset + page_size)` inside of the swap file
    pub(crate) offset: usize,
}

/// Page sized slots inside of a swap file: `[slot0][slot1]...`
///
/// An offset is only handed out if no live slot occupies it and a slot is removed only
/// after its content was copied back (or its allocation was released),
/// so a page that still depends on an offset is never overwritten.
/// Removed slots are not zeroed, their bytes are simply reused later.
pub(crate) struct SwapStore<S: PersistentStorageModule> {
    storage: S,
    slots: Vec<SwapSlot>,
    page_size: usize,
}

impl<S: PersistentStorageModule> SwapStore<S> {
    pub(crate) fn new(storage: S, page_size: usize) -> Self {
        Self {
            storage,
            slots: Vec::new(),
            page_size,
        }
    }

    pub(crate) fn find(&self, addr: usize) -> Option<&SwapSlot> {
        self.slots.iter().find(|slot| slot.addr == addr)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Makes sure that `total` slots can be tracked without reallocating
    pub(crate) fn try_reserve_total(&mut self, total: usize) -> Result<(), TryReserveError> {
        self.slots
            .try_reserve(total.saturating_sub(self.slots.len()))
    }

    pub(crate) fn storage(&self) -> &S {
        &self.storage
    }

    /// Lowest offset that is not used by any live slot
    fn lowest_free_offset(&self) -> usize {
        let mut offset = 0;
        while self.slots.iter().any(|slot| slot.offset == offset) {
            offset += self.page_size;
        }

        offset
    }

    /// Writes the content of the page at `addr` into a free slot and returns the slots offset.
    ///
    /// If writing fails, no slot will be recorded.
    pub(crate) fn persist(&mut self, addr: usize, src: &[u8]) -> io::Result<usize> {
        debug_assert_eq!(src.len(), self.page_size);

        if let Some(slot) = self.find(addr) {
            // a page is never resident while it has a slot, just overwrite the old copy
            let offset = slot.offset;
            self.storage.write(offset, src)?;
            return Ok(offset);
        }

        let offset = self.lowest_free_offset();
        self.storage.write(offset, src)?;
        self.slots.push(SwapSlot { addr, offset });

        Ok(offset)
    }

    /// Copies the content of the slot of `addr` into `dest` and removes the slot.
    ///
    /// Returns `None` if there is no slot for `addr`.
    /// The slot is consumed even if reading fails.
    pub(crate) fn take(&mut self, addr: usize, dest: &mut [u8]) -> Option<io::Result<()>> {
        debug_assert_eq!(dest.len(), self.page_size);

        let index = self.slots.iter().position(|slot| slot.addr == addr)?;
        let slot = self.slots.swap_remove(index);

        Some(self.storage.read(slot.offset, dest))
    }

    /// Removes all slots of pages inside of `[start, end)` without reading them.
    ///
    /// Returns how many slots were removed.
    pub(crate) fn discard_range(&mut self, start: usize, end: usize) -> usize {
        let before = self.slots.len();
        self.slots
            .retain(|slot| !(start <= slot.addr && slot.addr < end));

        before - self.slots.len()
    }
}

#[cfg(test)]
mod test {
    use super::SwapStore;
    use crate::modules::persistent_storage::test::get_test_swap_storage;

    const PAGE: usize = 4096;

    #[test]
    fn test_persist_and_take() {
        let mut store = SwapStore::new(get_test_swap_storage("test_swap_store_persist_and_take"), PAGE);

        assert_eq!(store.persist(0x1000, &[1u8; PAGE]).unwrap(), 0);
        assert_eq!(store.persist(0x5000, &[2u8; PAGE]).unwrap(), PAGE);
        assert_eq!(store.len(), 2);

        let mut buffer = [0u8; PAGE];
        store.take(0x5000, &mut buffer).unwrap().unwrap();
        assert_eq!(buffer, [2u8; PAGE]);

        // consumed
        assert!(store.find(0x5000).is_none());
        assert!(store.take(0x5000, &mut buffer).is_none());

        store.take(0x1000, &mut buffer).unwrap().unwrap();
        assert_eq!(buffer, [1u8; PAGE]);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_lowest_free_offset_is_reused() {
        let mut store = SwapStore::new(get_test_swap_storage("test_swap_store_lowest_free_offset"), PAGE);

        store.persist(0x1000, &[1u8; PAGE]).unwrap();
        store.persist(0x2000, &[2u8; PAGE]).unwrap();
        store.persist(0x3000, &[3u8; PAGE]).unwrap();

        let mut buffer = [0u8; PAGE];
        store.take(0x2000, &mut buffer).unwrap().unwrap();

        // the hole in the middle is used first
        assert_eq!(store.persist(0x4000, &[4u8; PAGE]).unwrap(), PAGE);
        assert_eq!(store.persist(0x5000, &[5u8; PAGE]).unwrap(), 3 * PAGE);
    }

    #[test]
    fn test_reused_offset_does_not_corrupt_live_slots() {
        let mut store = SwapStore::new(get_test_swap_storage("test_swap_store_reused_offset"), PAGE);

        // page a is swapped out, page b takes the next offset
        store.persist(0xa000, &[0xa; PAGE]).unwrap();
        store.persist(0xb000, &[0xb; PAGE]).unwrap();

        // b comes back, its offset is free now and will be reused by c
        let mut buffer = [0u8; PAGE];
        store.take(0xb000, &mut buffer).unwrap().unwrap();
        assert_eq!(buffer, [0xb; PAGE]);
        store.persist(0xc000, &[0xc; PAGE]).unwrap();

        // b is swapped out again and must not land on the offset of a or c
        store.persist(0xb000, &[0xbb; PAGE]).unwrap();

        for (addr, value) in [(0xa000usize, 0xau8), (0xb000, 0xbb), (0xc000, 0xc)] {
            store.take(addr, &mut buffer).unwrap().unwrap();
            assert_eq!(buffer, [value; PAGE], "invalid content for {:#x}", addr);
        }
    }

    #[test]
    fn test_discard_range() {
        let mut store = SwapStore::new(get_test_swap_storage("test_swap_store_discard_range"), PAGE);

        store.persist(0x1000, &[1u8; PAGE]).unwrap();
        store.persist(0x2000, &[2u8; PAGE]).unwrap();
        store.persist(0x9000, &[9u8; PAGE]).unwrap();

        assert_eq!(store.discard_range(0x1000, 0x3000), 2);
        assert!(store.find(0x1000).is_none());
        assert!(store.find(0x2000).is_none());

        let mut buffer = [0u8; PAGE];
        store.take(0x9000, &mut buffer).unwrap().unwrap();
        assert_eq!(buffer, [9u8; PAGE]);
    }
}
