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

use std::collections::{TryReserveError, VecDeque};

use crate::allocation_registry::AllocationId;

/// Where a resident page has to be written to once it is evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageBacking {
    Anonymous {
        /// The content was copied out of a (now consumed) swap slot.
        /// As there is no other copy left, the page has to be swapped out again even if clean.
        restored_from_swap: bool,
    },

    /// The file and the offset inside of it are taken from the owning allocation
    File,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ResidentPage {
    /// page aligned address
    pub(crate) addr: usize,

    /// is `true` iff the page is mapped read-write
    pub(crate) dirty: bool,

    pub(crate) owner: AllocationId,

    pub(crate) backing: PageBacking,
}

impl ResidentPage {
    pub(crate) fn new(addr: usize, owner: AllocationId, backing: PageBacking) -> Self {
        Self {
            addr,
            dirty: false,
            owner,
            backing,
        }
    }

    /// Does this page have to be written to its backing store when it is evicted?
    #[inline]
    pub(crate) fn needs_write_back(&self) -> bool {
        self.dirty
            || matches!(
                self.backing,
                PageBacking::Anonymous {
                    restored_from_swap: true
                }
            )
    }
}

/// All pages that currently hold a physical frame, ordered from oldest to newest.
///
/// Pages are admitted at the back and evicted from the front (FIFO).
pub(crate) struct ResidentSet {
    pages: VecDeque<ResidentPage>,

    /// how many pages are allowed to be resident at the same time
    budget_pages: usize,
}

impl ResidentSet {
    pub(crate) const fn new(budget_pages: usize) -> Self {
        Self {
            pages: VecDeque::new(),
            budget_pages,
        }
    }

    #[inline]
    pub(crate) fn budget_pages(&self) -> usize {
        self.budget_pages
    }

    /// Changes the budget. Call `pop_oldest` until `is_over_budget` returns `false` afterwards.
    #[inline]
    pub(crate) fn set_budget_pages(&mut self, budget_pages: usize) {
        self.budget_pages = budget_pages;
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    pub(crate) fn is_over_budget(&self) -> bool {
        self.pages.len() > self.budget_pages
    }

    /// Is there no room left to admit one more page?
    ///
    /// With a budget of zero, one page is still admitted once the set is empty,
    /// as the faulting access could never complete otherwise.
    #[inline]
    pub(crate) fn must_evict_before_admit(&self) -> bool {
        !self.pages.is_empty() && self.pages.len() >= self.budget_pages
    }

    /// Makes sure that the set can hold `total` pages without reallocating
    pub(crate) fn try_reserve_total(&mut self, total: usize) -> Result<(), TryReserveError> {
        self.pages
            .try_reserve(total.saturating_sub(self.pages.len()))
    }

    /// How many pages fit into the set without reallocating
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.pages.capacity()
    }

    pub(crate) fn find(&self, addr: usize) -> Option<&ResidentPage> {
        self.pages.iter().find(|page| page.addr == addr)
    }

    pub(crate) fn find_mut(&mut self, addr: usize) -> Option<&mut ResidentPage> {
        self.pages.iter_mut().find(|page| page.addr == addr)
    }

    /// Adds `page` as the newest resident page
    pub(crate) fn admit(&mut self, page: ResidentPage) {
        debug_assert!(self.find(page.addr).is_none(), "page is already resident");
        debug_assert!(
            self.pages.len() < self.budget_pages.max(1),
            "evict before admitting a new page"
        );

        self.pages.push_back(page);
    }

    /// Removes the page that was admitted first
    pub(crate) fn pop_oldest(&mut self) -> Option<ResidentPage> {
        self.pages.pop_front()
    }

    /// Removes all pages inside of `[start, end)` and returns them from oldest to newest
    pub(crate) fn remove_range(&mut self, start: usize, end: usize) -> Vec<ResidentPage> {
        let mut removed = Vec::new();
        self.pages.retain(|page| {
            if start <= page.addr && page.addr < end {
                removed.push(*page);
                false
            } else {
                true
            }
        });

        removed
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &ResidentPage> {
        self.pages.iter()
    }
}
