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

use crate::{
    allocation_registry::{AllocationBacking, AllocationId, AllocationRegistry},
    modules::persistent_storage::{FdStorageModule, PersistentStorageModule},
    resident_set::ResidentSet,
    swap_store::SwapStore,
    util::align_down,
};

/// Result of handling one fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOutcome {
    /// The access can be retried now
    Handled,

    /// The address does not belong to any allocation of this manager
    Untracked,
}

/// Where the content of a page that is brought in comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageSource {
    /// The page was swapped out, the slot reflects the last write
    SwapSlot { offset: usize },

    /// First touch of a file backed page
    File {
        storage: FdStorageModule,
        offset: usize,
    },

    /// First touch of an anonymous page
    ZeroFill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaultAction {
    /// Not our business, use the default fault handling
    Untracked,

    /// Write to a clean resident page: make it dirty and writable
    MarkDirty { page: usize },

    /// Page is not resident: make room and bring it in as clean page
    BringIn {
        page: usize,
        owner: AllocationId,
        source: PageSource,
    },
}

/// Decides what has to happen because of a fault at `fault_addr`.
///
/// Page states are: *Unmapped* (no access, not resident), *Resident-Clean* (read only)
/// and *Resident-Dirty* (read-write). Accessing a dirty page never faults, so a fault
/// on a resident page is always a write to a clean one.
///
/// This function does not change any state, the caller has to apply the returned action.
pub(crate) fn resolve_fault<S: PersistentStorageModule>(
    fault_addr: usize,
    page_size: usize,
    registry: &AllocationRegistry,
    resident_set: &ResidentSet,
    swap_store: &SwapStore<S>,
) -> FaultAction {
    let page = align_down(fault_addr, page_size);

    let (owner, allocation) = match registry.find_owner(page) {
        Some(x) => x,
        None => return FaultAction::Untracked,
    };

    if resident_set.find(page).is_some() {
        return FaultAction::MarkDirty { page };
    }

    // a swap slot holds the last dirty content and always wins over the file content
    let source = if let Some(slot) = swap_store.find(page) {
        PageSource::SwapSlot {
            offset: slot.offset,
        }
    } else if let AllocationBacking::File(storage) = allocation.backing {
        PageSource::File {
            storage,
            offset: allocation.offset_of(page),
        }
    } else {
        PageSource::ZeroFill
    };

    FaultAction::BringIn {
        page,
        owner,
        source,
    }
}
