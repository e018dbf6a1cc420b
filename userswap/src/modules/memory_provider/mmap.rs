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

use std::{io, ptr::null_mut};

use libc::{
    c_void, madvise, mmap, mprotect, munmap, MADV_DONTNEED, MAP_ANONYMOUS, MAP_FAILED,
    MAP_PRIVATE, PROT_NONE, PROT_READ, PROT_WRITE,
};

use super::{MemoryProviderModule, PageProtection};
use crate::util::get_page_size;

pub struct MMapMemoryProvider;

impl MemoryProviderModule for MMapMemoryProvider {
    unsafe fn reserve_block(size: usize) -> io::Result<*mut u8> {
        let base_ptr = unsafe {
            mmap(
                null_mut(),
                size,
                PROT_NONE,
                MAP_PRIVATE | MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if base_ptr == MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        Ok(base_ptr as *mut u8)
    }

    unsafe fn unmap_block(ptr: *mut u8, size: usize) -> io::Result<()> {
        let code = unsafe { munmap(ptr as *mut c_void, size) };

        if code != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    unsafe fn protect(ptr: *mut u8, size: usize, protection: PageProtection) -> io::Result<()> {
        let prot = match protection {
            PageProtection::None => PROT_NONE,
            PageProtection::Read => PROT_READ,
            PageProtection::ReadWrite => PROT_READ | PROT_WRITE,
        };

        let code = unsafe { mprotect(ptr as *mut c_void, size, prot) };

        if code != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    unsafe fn discard(ptr: *mut u8, size: usize) -> io::Result<()> {
        let code = unsafe { madvise(ptr as *mut c_void, size, MADV_DONTNEED) };

        if code != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    fn min_size() -> usize {
        get_page_size()
    }
}
