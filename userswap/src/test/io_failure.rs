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

use super::{read_byte, write_byte};
use crate::{util::get_page_size, UserSwap, UserSwapConfig};

#[test]
fn test_swap_file_can_not_be_created() {
    let mut swap = UserSwap::new(UserSwapConfig {
        resident_budget: Some(get_page_size()),
        swap_file: Some("/nonexistent/test_swap_file_can_not_be_created.swap".into()),
    })
    .unwrap();
    let page_size = swap.page_size();

    let a0 = swap.alloc(2 * page_size).unwrap();
    let a1 = unsafe { a0.add(page_size) };

    write_byte(&mut swap, a0, 42);
    assert_eq!(read_byte(&mut swap, a1), 0);

    // the content of a0 is lost, but the manager keeps going
    assert_eq!(swap.io_failure_count(), 1);
    assert_eq!(swap.swap_slot_count(), 0);
    assert!(!swap.is_swapped_out(a0));
    assert!(!swap.swap_file_path().exists());

    assert_eq!(read_byte(&mut swap, a0), 0);
    assert_eq!(swap.io_failure_count(), 1);

    swap.free(a0).unwrap();
}

#[test]
fn test_mapped_file_write_back_fails() {
    let mut swap = UserSwap::new(UserSwapConfig {
        resident_budget: Some(4 * get_page_size()),
        swap_file: Some("/tmp/test_mapped_file_write_back_fails.swap".into()),
    })
    .unwrap();
    let page_size = swap.page_size();

    let path = "/tmp/test_mapped_file_write_back_fails.data";
    File::create(path)
        .unwrap()
        .write_all(&vec![b'X'; 2 * page_size])
        .unwrap();

    // long enough already, so mapping it read only works
    let read_only = File::open(path).unwrap();
    let base = swap.map_file(&read_only, 2 * page_size).unwrap();

    assert_eq!(read_byte(&mut swap, base), b'X');
    write_byte(&mut swap, base, b'A');

    swap.set_budget(0);
    assert_eq!(swap.resident_page_count(), 0);
    assert_eq!(swap.io_failure_count(), 1);

    // neither the file nor the swap file got the change
    let mut buffer = [0u8; 1];
    read_only.read_exact_at(&mut buffer, 0).unwrap();
    assert_eq!(buffer[0], b'X');
    assert_eq!(swap.swap_slot_count(), 0);
    assert_eq!(read_byte(&mut swap, base), b'X');

    // a clean page is not written back on free
    swap.free(base).unwrap();
    assert_eq!(swap.io_failure_count(), 1);
}
