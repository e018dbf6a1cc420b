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

use core::{marker::PhantomData, ptr::NonNull, slice};
use std::{io, os::fd::AsRawFd, path::Path};

use log::{debug, error, info, trace, warn};

use crate::{
    allocation_registry::{Allocation, AllocationBacking, AllocationId, AllocationRegistry},
    fault_access_point::{print_fault_error, FaultHandler, FAULT_ACCESS_POINT},
    modules::{
        memory_provider::{MMapMemoryProvider, MemoryProviderModule, PageProtection},
        persistent_storage::{FdStorageModule, PersistentStorageModule, SwapFileStorageModule},
    },
    page_fault::{resolve_fault, FaultAction, FaultOutcome, PageSource},
    resident_set::{PageBacking, ResidentPage, ResidentSet},
    swap_store::SwapStore,
    util::{align_down, div_ceil, round_up_to_nearest},
    UserSwapConfig, UserSwapError,
};

/// For test environment we want to wait until the fault handler can be installed again
#[cfg(test)]
static FAULT_HANDLER_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// A user space virtual memory manager.
///
/// Memory returned by `alloc` and `map_file` is not backed by physical memory until it is touched.
/// Every first access (and every first write) faults, the fault is resolved by bringing
/// the page in (or by marking it dirty). At most `budget_pages()` pages are resident at the same time,
/// older pages are evicted in FIFO order. Dirty anonymous pages are evicted into a swap file,
/// dirty file backed pages are written back to their file.
///
/// Faults are only resolved automatically after `install_fault_handler` was called.
/// Otherwise they have to be forwarded to `handle_fault` by hand.
pub struct UserSwap<M: MemoryProviderModule + 'static = MMapMemoryProvider> {
    /// Heap allocated, so that its address stays the same even if `UserSwap` is moved.
    /// The fault handler keeps a pointer to it.
    inner: NonNull<UserSwapInner<M>>,

    fault_handler_installed: bool,

    /// For test environment we want to wait until the fault handler can be installed again
    #[cfg(test)]
    _mutex_guard: Option<std::sync::MutexGuard<'static, ()>>,
}

impl UserSwap<MMapMemoryProvider> {
    /// Creates a new manager that reserves its memory with `mmap`
    pub fn new(config: UserSwapConfig) -> Result<Self, UserSwapError> {
        Self::with_memory_provider(config)
    }
}

impl<M: MemoryProviderModule + 'static> UserSwap<M> {
    pub fn with_memory_provider(config: UserSwapConfig) -> Result<Self, UserSwapError> {
        let page_size = M::min_size();
        let budget_pages = config.budget_pages(page_size);
        let swap_file = config.swap_file_path();

        info!(
            "Creating manager with page_size={}, budget={} pages, swap_file={}",
            page_size,
            budget_pages,
            swap_file.display()
        );

        let inner = Box::new(UserSwapInner::<M> {
            page_size,
            registry: AllocationRegistry::new(),
            resident_set: ResidentSet::new(budget_pages),
            swap_store: SwapStore::new(SwapFileStorageModule::new(swap_file), page_size),
            io_failures: 0,
            in_fault_handler: false,
            _memory_provider: PhantomData,
        });

        Ok(Self {
            inner: NonNull::from(Box::leak(inner)),
            fault_handler_installed: false,

            #[cfg(test)]
            _mutex_guard: None,
        })
    }

    /// Installs a `SIGSEGV` handler that forwards all faults to this manager.
    ///
    /// Only one manager per process can receive faults at the same time.
    /// The previous signal action is restored once this manager is dropped.
    /// Faults outside of managed memory restore the default action (the process terminates).
    pub fn install_fault_handler(&mut self) -> Result<(), UserSwapError> {
        if self.fault_handler_installed {
            return Ok(());
        }

        // for test environment wait until the previous manager uninstalled its handler
        #[cfg(test)]
        {
            self._mutex_guard = Some(
                FAULT_HANDLER_MUTEX
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            );
        }

        let handler: *mut dyn FaultHandler = self.inner.as_ptr();
        unsafe { FAULT_ACCESS_POINT.set(handler) }.map_err(|err| {
            error!("Could not install fault handler: {}", err);
            err
        })?;

        self.fault_handler_installed = true;
        debug!("Installed fault handler");

        Ok(())
    }

    /// Runs `f` while faults are kept away from this manager
    fn with_inner<R>(&mut self, f: impl FnOnce(&mut UserSwapInner<M>) -> R) -> R {
        let _blocker = if self.fault_handler_installed {
            FAULT_ACCESS_POINT.block_faults()
        } else {
            None
        };

        // faults can not access inner right now
        let inner = unsafe { self.inner.as_mut() };
        f(inner)
    }

    #[inline]
    fn inner(&self) -> &UserSwapInner<M> {
        unsafe { self.inner.as_ref() }
    }

    /// Sets how many bytes may be resident at the same time.
    ///
    /// `size` is rounded up to a multiple of the page size. If more pages are
    /// resident right now, the oldest ones are evicted immediately.
    pub fn set_budget(&mut self, size: usize) {
        self.with_inner(|inner| inner.set_budget(size));
    }

    /// Reserves `size` bytes (rounded up to a multiple of the page size) of anonymous memory.
    ///
    /// The memory reads as zeros until it is written.
    pub fn alloc(&mut self, size: usize) -> Result<*mut u8, UserSwapError> {
        self.with_inner(|inner| inner.reserve(size, None))
            .map(|base| base as *mut u8)
    }

    /// Maps the first `size` bytes (rounded up to a multiple of the page size) of `file`.
    ///
    /// If the file is shorter, it is extended with zeros. `file` has to be opened for reading
    /// and writing and remains owned by the caller, but it must stay open until `free` was called.
    /// Its read/write cursor is never moved.
    pub fn map_file<F: AsRawFd>(&mut self, file: &F, size: usize) -> Result<*mut u8, UserSwapError> {
        // the caller keeps the descriptor open until the allocation is freed
        let storage = unsafe { FdStorageModule::from_raw_fd(file.as_raw_fd()) };

        self.with_inner(|inner| inner.reserve(size, Some(storage)))
            .map(|base| base as *mut u8)
    }

    /// Releases an allocation that was returned by `alloc` or `map_file`.
    ///
    /// Dirty file backed pages are written back, swapped out pages are discarded.
    pub fn free(&mut self, ptr: *mut u8) -> Result<(), UserSwapError> {
        self.with_inner(|inner| inner.release(ptr as usize))
    }

    /// Resolves a fault at `addr` without a real trap.
    ///
    /// Returns `FaultOutcome::Untracked` if `addr` does not belong to this manager.
    pub fn handle_fault(&mut self, addr: *const u8) -> FaultOutcome {
        let outcome = self.with_inner(|inner| inner.process_fault(addr as usize));
        trace!("Fault at {:#x}: {:?}", addr as usize, outcome);

        outcome
    }

    pub fn page_size(&self) -> usize {
        self.inner().page_size
    }

    /// How many pages may be resident at the same time
    pub fn budget_pages(&self) -> usize {
        self.inner().resident_set.budget_pages()
    }

    pub fn resident_page_count(&self) -> usize {
        self.inner().resident_set.len()
    }

    pub fn swap_slot_count(&self) -> usize {
        self.inner().swap_store.len()
    }

    pub fn allocation_count(&self) -> usize {
        self.inner().registry.len()
    }

    /// Is the page containing `addr` resident?
    pub fn is_resident(&self, addr: *const u8) -> bool {
        let inner = self.inner();
        let page = align_down(addr as usize, inner.page_size);
        inner.resident_set.find(page).is_some()
    }

    /// Is the page containing `addr` resident and dirty?
    pub fn is_dirty(&self, addr: *const u8) -> bool {
        let inner = self.inner();
        let page = align_down(addr as usize, inner.page_size);
        inner
            .resident_set
            .find(page)
            .map(|page| page.dirty)
            .unwrap_or(false)
    }

    /// Is there a swap slot for the page containing `addr`?
    pub fn is_swapped_out(&self, addr: *const u8) -> bool {
        let inner = self.inner();
        let page = align_down(addr as usize, inner.page_size);
        inner.swap_store.find(page).is_some()
    }

    /// How many reads or writes of backing stores failed so far
    pub fn io_failure_count(&self) -> usize {
        self.inner().io_failures
    }

    pub fn swap_file_path(&self) -> &Path {
        self.inner().swap_store.storage().path()
    }
}

impl<M: MemoryProviderModule + 'static> Drop for UserSwap<M> {
    fn drop(&mut self) {
        if self.fault_handler_installed {
            let handler: *mut dyn FaultHandler = self.inner.as_ptr();
            if let Err(err) = FAULT_ACCESS_POINT.unset(handler) {
                error!("Could not uninstall fault handler: {}", err);
            }
            self.fault_handler_installed = false;
        }

        let inner = unsafe { self.inner.as_mut() };
        let bases: Vec<usize> = inner.registry.iter().map(|(_, x)| x.base).collect();
        for base in bases {
            if let Err(err) = inner.release(base) {
                warn!("Could not release allocation {:#x}: {}", base, err);
            }
        }

        // closes and removes the swap file
        drop(unsafe { Box::from_raw(self.inner.as_ptr()) });
    }
}

pub(crate) struct UserSwapInner<M: MemoryProviderModule> {
    page_size: usize,

    registry: AllocationRegistry,

    /// FIFO queue of pages that hold a physical frame
    resident_set: ResidentSet,

    swap_store: SwapStore<SwapFileStorageModule>,

    /// How many reads or writes of backing stores failed
    io_failures: usize,

    /// Is the `SIGSEGV` handler running right now?
    /// The logger must not be used in that case.
    in_fault_handler: bool,

    _memory_provider: PhantomData<M>,
}

impl<M: MemoryProviderModule> UserSwapInner<M> {
    fn set_budget(&mut self, size: usize) {
        let mut budget_pages = div_ceil(size, self.page_size);

        // the fault handler must not allocate, so make room for the whole budget
        let needed = budget_pages
            .max(1)
            .min(self.registry.total_pages(self.page_size));
        if let Err(err) = self.resident_set.try_reserve_total(needed) {
            warn!(
                "Can not track {} resident pages ({}), limiting budget to {} pages",
                needed,
                err,
                self.resident_set.capacity()
            );
            budget_pages = self.resident_set.capacity();
        }

        debug!(
            "Setting budget to {} pages ({} currently resident)",
            budget_pages,
            self.resident_set.len()
        );

        self.resident_set.set_budget_pages(budget_pages);
        while self.resident_set.is_over_budget() {
            self.evict_oldest();
        }
    }

    fn reserve(
        &mut self,
        size: usize,
        file: Option<FdStorageModule>,
    ) -> Result<usize, UserSwapError> {
        let size = round_up_to_nearest(size, self.page_size)
            .filter(|size| *size != 0)
            .ok_or_else(|| {
                warn!("Can not reserve {} bytes", size);
                UserSwapError::Reservation(io::Error::from(io::ErrorKind::InvalidInput))
            })?;

        let base = unsafe { M::reserve_block(size) }.map_err(|err| {
            warn!("Failed to reserve {} bytes: {}", size, err);
            UserSwapError::Reservation(err)
        })? as usize;

        let backing = match file {
            Some(storage) => {
                // reads behind the original end of the file should return zeros
                if let Err(err) = storage.ensure_len(size as u64) {
                    warn!("Failed to extend mapped file to {} bytes: {}", size, err);

                    if let Err(err) = unsafe { M::unmap_block(base as *mut u8, size) } {
                        warn!("Failed to unmap {:#x}: {}", base, err);
                    }
                    return Err(UserSwapError::FileResize(err));
                }

                AllocationBacking::File(storage)
            }
            None => AllocationBacking::Anonymous,
        };

        let allocation = Allocation {
            base,
            size,
            backing,
        };

        // the fault handler must not allocate, so make room for every page it could track
        let pages = size / self.page_size;
        let resident_pages = self
            .resident_set
            .budget_pages()
            .max(1)
            .min(self.registry.total_pages(self.page_size) + pages);
        let swapped_pages = self.registry.anonymous_pages(self.page_size)
            + if allocation.is_file_backed() { 0 } else { pages };

        let reserved = self
            .resident_set
            .try_reserve_total(resident_pages)
            .and_then(|_| self.swap_store.try_reserve_total(swapped_pages));
        if let Err(err) = reserved {
            warn!("Can not track the {} pages of {:#x}: {}", pages, base, err);

            if let Err(err) = unsafe { M::unmap_block(base as *mut u8, size) } {
                warn!("Failed to unmap {:#x}: {}", base, err);
            }
            return Err(UserSwapError::Reservation(io::Error::new(
                io::ErrorKind::OutOfMemory,
                err,
            )));
        }

        self.registry.insert(allocation);

        debug!(
            "Reserved {} bytes at {:#x} ({})",
            size,
            base,
            if allocation.is_file_backed() { "file" } else { "anonymous" }
        );

        Ok(base)
    }

    fn release(&mut self, base: usize) -> Result<(), UserSwapError> {
        let (id, allocation) = match self.registry.find_by_base(base) {
            Some((id, allocation)) => (id, *allocation),
            None => {
                error!("Tried to free unknown allocation {:#x}", base);
                return Err(UserSwapError::UnknownAllocation(base));
            }
        };

        let removed_pages = self.resident_set.remove_range(allocation.base, allocation.end());
        let resident_count = removed_pages.len();
        for page in removed_pages {
            if page.dirty && page.backing == PageBacking::File {
                self.write_back_to_file(&page);
            }
        }

        let swapped_count = self
            .swap_store
            .discard_range(allocation.base, allocation.end());

        if let Err(err) = unsafe { M::unmap_block(allocation.base as *mut u8, allocation.size) } {
            warn!("Failed to unmap {:#x}: {}", allocation.base, err);
        }

        self.registry.remove(id);

        debug!(
            "Released {:#x} ({} resident pages, {} swap slots)",
            base, resident_count, swapped_count
        );

        Ok(())
    }

    fn process_fault(&mut self, addr: usize) -> FaultOutcome {
        let action = resolve_fault(
            addr,
            self.page_size,
            &self.registry,
            &self.resident_set,
            &self.swap_store,
        );

        match action {
            FaultAction::Untracked => FaultOutcome::Untracked,
            FaultAction::MarkDirty { page } => {
                if let Some(resident_page) = self.resident_set.find_mut(page) {
                    resident_page.dirty = true;
                }

                self.protect(page, PageProtection::ReadWrite);
                FaultOutcome::Handled
            }
            FaultAction::BringIn {
                page,
                owner,
                source,
            } => {
                self.bring_in(page, owner, source);
                FaultOutcome::Handled
            }
        }
    }

    fn bring_in(&mut self, page: usize, owner: AllocationId, source: PageSource) {
        // make room before admitting
        while self.resident_set.must_evict_before_admit() {
            self.evict_oldest();
        }

        let backing = match self.registry.get(owner) {
            Some(allocation) if allocation.is_file_backed() => PageBacking::File,
            _ => PageBacking::Anonymous {
                restored_from_swap: matches!(source, PageSource::SwapSlot { .. }),
            },
        };

        match source {
            PageSource::ZeroFill => {
                // fresh anonymous memory is zero filled by the operating system
                self.protect(page, PageProtection::Read);
            }
            PageSource::SwapSlot { .. } | PageSource::File { .. } => {
                // temporarily make the page writable to copy the content in
                if self.protect(page, PageProtection::ReadWrite) {
                    let dest = unsafe { slice::from_raw_parts_mut(page as *mut u8, self.page_size) };

                    let res = match source {
                        PageSource::SwapSlot { .. } => {
                            self.swap_store.take(page, dest).unwrap_or(Ok(()))
                        }
                        PageSource::File {
                            mut storage,
                            offset,
                        } => storage.read(offset, dest),
                        PageSource::ZeroFill => Ok(()),
                    };

                    if let Err(err) = res {
                        self.report_io_failure("Failed to read page content", page, &err);
                    }
                }

                self.protect(page, PageProtection::Read);
            }
        }

        self.resident_set
            .admit(ResidentPage::new(page, owner, backing));
    }

    /// Evicts the oldest resident page. Returns `false` if no page is resident.
    fn evict_oldest(&mut self) -> bool {
        let page = match self.resident_set.pop_oldest() {
            Some(page) => page,
            None => return false,
        };

        if page.needs_write_back() {
            match page.backing {
                PageBacking::File => self.write_back_to_file(&page),
                PageBacking::Anonymous { .. } => {
                    let content = unsafe { slice::from_raw_parts(page.addr as *const u8, self.page_size) };
                    if let Err(err) = self.swap_store.persist(page.addr, content) {
                        self.report_io_failure("Failed to swap out page", page.addr, &err);
                    }
                }
            }
        }

        // drop the frame, the page is unmapped now
        self.protect(page.addr, PageProtection::None);
        if let Err(err) = unsafe { M::discard(page.addr as *mut u8, self.page_size) } {
            self.report_io_failure("Failed to discard page", page.addr, &err);
        }

        true
    }

    fn write_back_to_file(&mut self, page: &ResidentPage) {
        // the owner is removed only after all of its pages were written back
        let (mut storage, offset) = match self.registry.get(page.owner) {
            Some(allocation) => match allocation.backing {
                AllocationBacking::File(storage) => (storage, allocation.offset_of(page.addr)),
                AllocationBacking::Anonymous => return,
            },
            None => return,
        };

        let content = unsafe { slice::from_raw_parts(page.addr as *const u8, self.page_size) };
        if let Err(err) = storage.write(offset, content) {
            self.report_io_failure("Failed to write back page to file", page.addr, &err);
        }
    }

    /// Changes the protection of one page. Returns `false` if that failed.
    fn protect(&mut self, page: usize, protection: PageProtection) -> bool {
        match unsafe { M::protect(page as *mut u8, self.page_size, protection) } {
            Ok(()) => true,
            Err(err) => {
                self.report_io_failure("Failed to change page protection", page, &err);
                false
            }
        }
    }

    /// Backing store failures are not fatal, the data of that page may be lost or stale though
    fn report_io_failure(&mut self, text: &str, addr: usize, err: &io::Error) {
        self.io_failures += 1;

        if self.in_fault_handler {
            // logger is not signal safe
            print_fault_error(text);
            print_fault_error("\n");
        } else {
            warn!("{} (page {:#x}): {}", text, addr, err);
        }
    }
}

impl<M: MemoryProviderModule> FaultHandler for UserSwapInner<M> {
    fn handle_fault(&mut self, addr: usize) -> FaultOutcome {
        self.in_fault_handler = true;
        let outcome = self.process_fault(addr);
        self.in_fault_handler = false;

        outcome
    }
}
