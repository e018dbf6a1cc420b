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

use core::sync::atomic::{compiler_fence, Ordering};

use crate::{util::get_page_size, FaultOutcome, UserSwap, UserSwapConfig};

mod benchmarks;
mod eviction;
mod fault_trap;
mod io_failure;

pub(crate) fn get_test_userswap(test_name: &str, budget_pages: usize) -> UserSwap {
    UserSwap::new(UserSwapConfig {
        resident_budget: Some(budget_pages * get_page_size()),
        swap_file: Some(format!("/tmp/{}.swap", test_name).into()),
    })
    .unwrap()
}

/// Reads a byte the way the CPU would without an installed fault handler:
/// faults first if the page is not accessible
pub(crate) fn read_byte(swap: &mut UserSwap, ptr: *const u8) -> u8 {
    if !swap.is_resident(ptr) {
        assert_eq!(swap.handle_fault(ptr), FaultOutcome::Handled);
    }

    unsafe { ptr.read_volatile() }
}

/// Writes a byte the way the CPU would without an installed fault handler:
/// faults once for bringing the page in and once for the first write
pub(crate) fn write_byte(swap: &mut UserSwap, ptr: *mut u8, value: u8) {
    if !swap.is_resident(ptr) {
        assert_eq!(swap.handle_fault(ptr), FaultOutcome::Handled);
    }
    if !swap.is_dirty(ptr) {
        assert_eq!(swap.handle_fault(ptr), FaultOutcome::Handled);
    }

    unsafe { ptr.write_volatile(value) };
}

/// Accesses memory that may fault, so the compiler must not cache
/// anything the fault handler could change
pub(crate) fn trap_read(ptr: *const u8) -> u8 {
    compiler_fence(Ordering::SeqCst);
    let value = unsafe { ptr.read_volatile() };
    compiler_fence(Ordering::SeqCst);

    value
}

pub(crate) fn trap_write(ptr: *mut u8, value: u8) {
    compiler_fence(Ordering::SeqCst);
    unsafe { ptr.write_volatile(value) };
    compiler_fence(Ordering::SeqCst);
}
