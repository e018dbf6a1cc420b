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

use crate::modules::persistent_storage::FdStorageModule;

/// Stable handle of an allocation inside the `AllocationRegistry`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AllocationId(usize);

/// Where the content of an allocation comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AllocationBacking {
    /// Zero filled memory, dirty pages are evicted to the swap file
    Anonymous,

    /// Content of a file, dirty pages are written back to the file
    File(FdStorageModule),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Allocation {
    /// page aligned start address
    pub(crate) base: usize,

    /// size in bytes, always a multiple of the page size
    pub(crate) size: usize,

    pub(crate) backing: AllocationBacking,
}

impl Allocation {
    #[inline]
    pub(crate) fn end(&self) -> usize {
        self.base + self.size
    }

    #[inline]
    pub(crate) fn contains(&self, addr: usize) -> bool {
        self.base <= addr && addr < self.end()
    }

    #[inline]
    pub(crate) fn is_file_backed(&self) -> bool {
        matches!(self.backing, AllocationBacking::File(_))
    }

    /// Offset of `page_addr` inside of this allocation (and inside of the mapped file)
    #[inline]
    pub(crate) fn offset_of(&self, page_addr: usize) -> usize {
        debug_assert!(self.contains(page_addr));
        page_addr - self.base
    }
}

/// Keeps track of all reserved address ranges.
///
/// Allocations are stored in an arena so that resident pages can refer
/// to their owner with an `AllocationId` that stays valid until the owner is removed.
pub(crate) struct AllocationRegistry {
    entries: Vec<Option<Allocation>>,

    /// number of `Some` items in `entries`
    count: usize,
}

impl AllocationRegistry {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            count: 0,
        }
    }

    pub(crate) fn insert(&mut self, allocation: Allocation) -> AllocationId {
        debug_assert!(
            self.iter().all(|(_, other)| allocation.end() <= other.base
                || other.end() <= allocation.base),
            "allocations must never overlap"
        );

        self.count += 1;

        if let Some(index) = self.entries.iter().position(|x| x.is_none()) {
            self.entries[index] = Some(allocation);
            return AllocationId(index);
        }

        self.entries.push(Some(allocation));
        AllocationId(self.entries.len() - 1)
    }

    pub(crate) fn get(&self, id: AllocationId) -> Option<&Allocation> {
        self.entries.get(id.0).and_then(|x| x.as_ref())
    }

    /// Returns the allocation that contains `addr`.
    ///
    /// This is a linear search, as there are normally only a few allocations.
    pub(crate) fn find_owner(&self, addr: usize) -> Option<(AllocationId, &Allocation)> {
        self.iter().find(|(_, allocation)| allocation.contains(addr))
    }

    /// Returns the allocation that starts exactly at `base`
    pub(crate) fn find_by_base(&self, base: usize) -> Option<(AllocationId, &Allocation)> {
        self.iter().find(|(_, allocation)| allocation.base == base)
    }

    pub(crate) fn remove(&mut self, id: AllocationId) -> Option<Allocation> {
        let res = self.entries.get_mut(id.0).and_then(|x| x.take());
        if res.is_some() {
            self.count -= 1;
        }

        res
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (AllocationId, &Allocation)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, x)| x.as_ref().map(|allocation| (AllocationId(i), allocation)))
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// Total amount of pages over all allocations
    pub(crate) fn total_pages(&self, page_size: usize) -> usize {
        self.iter()
            .map(|(_, allocation)| allocation.size / page_size)
            .sum()
    }

    /// Amount of pages that can end up in the swap file
    pub(crate) fn anonymous_pages(&self, page_size: usize) -> usize {
        self.iter()
            .filter(|(_, allocation)| !allocation.is_file_backed())
            .map(|(_, allocation)| allocation.size / page_size)
            .sum()
    }
}
