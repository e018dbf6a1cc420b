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

use std::io;

mod mmap;

pub use mmap::MMapMemoryProvider;

/// Access rights of a reserved page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageProtection {
    /// Every access faults
    None,
    /// Reads are allowed, writes fault
    Read,
    /// Reads and writes are allowed
    ReadWrite,
}

/// A module that provides address space during runtime
/// (e.g. trough `mmap`) and controls the access rights of its pages.
///
/// All functions may be called from inside the fault handler,
/// so implementations must not allocate or block.
pub trait MemoryProviderModule {
    /// Reserves a new block with `size` bytes which can not be accessed at all.
    ///
    /// It is guaranteed that `size` is a multiple of `min_size()`.
    unsafe fn reserve_block(size: usize) -> io::Result<*mut u8>;

    /// Removes the memory block.
    ///
    /// It is guaranteed that `size` is a multiple of `min_size()`.
    unsafe fn unmap_block(ptr: *mut u8, size: usize) -> io::Result<()>;

    /// Changes the access rights of `[ptr, ptr + size)`.
    unsafe fn protect(ptr: *mut u8, size: usize, protection: PageProtection) -> io::Result<()>;

    /// Tells the operating system that the physical frames backing `[ptr, ptr + size)`
    /// can be dropped. The next access will see zero filled memory.
    unsafe fn discard(ptr: *mut u8, size: usize) -> io::Result<()>;

    /// Gets the minimum size of a memory block (the page size).
    /// This should be the same value on every call or things might break.
    fn min_size() -> usize;
}
