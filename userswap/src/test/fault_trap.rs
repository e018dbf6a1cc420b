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

use std::{fs::File, io::Write, os::unix::fs::FileExt};

use super::{get_test_userswap, trap_read, trap_write};
use crate::FaultOutcome;

#[test]
fn test_trap_swap_round_trip() {
    let mut swap = get_test_userswap("test_trap_swap_round_trip", 1);
    swap.install_fault_handler().unwrap();
    let page_size = swap.page_size();

    let a0 = swap.alloc(2 * page_size).unwrap();
    let a1 = unsafe { a0.add(page_size) };

    trap_write(a0, 42);
    assert!(swap.is_dirty(a0));

    assert_eq!(trap_read(a1), 0);
    assert!(swap.is_swapped_out(a0));
    assert_eq!(swap.resident_page_count(), 1);

    assert_eq!(trap_read(a0), 42);
    assert_eq!(swap.swap_slot_count(), 0);

    // the second write to a resident page faults once only
    trap_write(unsafe { a0.add(1) }, 43);
    trap_write(unsafe { a0.add(2) }, 44);
    assert_eq!(trap_read(unsafe { a0.add(1) }), 43);
    assert_eq!(trap_read(unsafe { a0.add(2) }), 44);

    swap.free(a0).unwrap();
    assert_eq!(swap.io_failure_count(), 0);
}

#[test]
fn test_trap_many_pages_with_small_budget() {
    const PAGES: usize = 64;

    let mut swap = get_test_userswap("test_trap_many_pages_with_small_budget", 4);
    swap.install_fault_handler().unwrap();
    let page_size = swap.page_size();

    let base = swap.alloc(PAGES * page_size).unwrap();
    for i in 0..PAGES {
        trap_write(unsafe { base.add(i * page_size + i) }, i as u8);
        assert!(swap.resident_page_count() <= 4);
    }

    for i in (0..PAGES).rev() {
        assert_eq!(trap_read(unsafe { base.add(i * page_size + i) }), i as u8);
        if i != 0 {
            assert_eq!(trap_read(unsafe { base.add(i * page_size) }), 0);
        }
    }

    swap.free(base).unwrap();
}

#[test]
fn test_trap_file_mapping() {
    let mut swap = get_test_userswap("test_trap_file_mapping", 1);
    swap.install_fault_handler().unwrap();
    let page_size = swap.page_size();

    let mut file = File::options()
        .read(true)
        .write(true)
        .truncate(true)
        .create(true)
        .open("/tmp/test_trap_file_mapping.data")
        .unwrap();
    file.write_all(&vec![b'X'; page_size]).unwrap();
    file.write_all(&vec![b'Y'; page_size]).unwrap();

    let base = swap.map_file(&file, 2 * page_size).unwrap();
    let second_page = unsafe { base.add(page_size) };

    assert_eq!(trap_read(base), b'X');
    trap_write(second_page, b'A');

    // the first page was clean and is not written
    let mut buffer = [0u8; 1];
    file.read_exact_at(&mut buffer, page_size as u64).unwrap();
    assert_eq!(buffer[0], b'Y');

    swap.set_budget(0);
    file.read_exact_at(&mut buffer, page_size as u64).unwrap();
    assert_eq!(buffer[0], b'A');

    assert_eq!(trap_read(second_page), b'A');
    swap.free(base).unwrap();
}

#[test]
fn test_trap_handler_is_removed_on_drop() {
    let mut swap = get_test_userswap("test_trap_handler_is_removed_on_drop", 2);
    swap.install_fault_handler().unwrap();

    // installing twice is fine
    swap.install_fault_handler().unwrap();

    let base = swap.alloc(swap.page_size()).unwrap();
    trap_write(base, 1);
    drop(swap);

    // a second manager can receive faults afterwards
    let mut swap = get_test_userswap("test_trap_handler_is_removed_on_drop_2", 2);
    swap.install_fault_handler().unwrap();
    let base = swap.alloc(swap.page_size()).unwrap();
    assert_eq!(trap_read(base), 0);

    // manual forwarding still works while the handler is installed
    assert_eq!(swap.handle_fault(base), FaultOutcome::Handled);
    assert!(swap.is_dirty(base));
}
