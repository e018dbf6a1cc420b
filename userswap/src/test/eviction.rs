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

use rand::{rngs::SmallRng, RngCore, SeedableRng};

use super::{get_test_userswap, read_byte, write_byte};

#[test]
fn test_shrinking_budget_evicts_oldest_first() {
    let mut swap = get_test_userswap("test_shrinking_budget_evicts_oldest_first", 4);
    let page_size = swap.page_size();
    let base = swap.alloc(4 * page_size).unwrap();
    let page = |i: usize| unsafe { base.add(i * page_size) };

    // admission order: 2, 0, 3, 1
    for (value, i) in [2, 0, 3, 1].into_iter().enumerate() {
        write_byte(&mut swap, page(i), value as u8 + 1);
    }
    assert_eq!(swap.resident_page_count(), 4);

    swap.set_budget(2 * page_size);
    assert_eq!(swap.resident_page_count(), 2);
    assert!(!swap.is_resident(page(2)));
    assert!(!swap.is_resident(page(0)));
    assert!(swap.is_resident(page(3)));
    assert!(swap.is_resident(page(1)));
    assert_eq!(swap.swap_slot_count(), 2);

    // budget is rounded up to whole pages
    swap.set_budget(page_size + 1);
    assert_eq!(swap.budget_pages(), 2);
    assert_eq!(swap.resident_page_count(), 2);

    assert_eq!(read_byte(&mut swap, page(2)), 1);
    assert_eq!(read_byte(&mut swap, page(0)), 2);
    assert_eq!(read_byte(&mut swap, page(3)), 3);
    assert_eq!(read_byte(&mut swap, page(1)), 4);

    swap.free(base).unwrap();
}

#[test]
fn test_growing_budget_evicts_nothing() {
    let mut swap = get_test_userswap("test_growing_budget_evicts_nothing", 2);
    let page_size = swap.page_size();
    let base = swap.alloc(8 * page_size).unwrap();

    for i in 0..2 {
        write_byte(&mut swap, unsafe { base.add(i * page_size) }, 1);
    }

    swap.set_budget(8 * page_size);
    assert_eq!(swap.resident_page_count(), 2);
    assert_eq!(swap.swap_slot_count(), 0);

    for i in 2..8 {
        write_byte(&mut swap, unsafe { base.add(i * page_size) }, i as u8);
    }
    assert_eq!(swap.resident_page_count(), 8);
    assert_eq!(swap.swap_slot_count(), 0);
}

#[test]
fn test_resident_count_never_exceeds_budget() {
    const SEED: u64 = 7265124589415612376;
    const ALLOCATION_PAGES: [usize; 3] = [5, 1, 7];
    const ITERATIONS: usize = 3000;

    let mut swap = get_test_userswap("test_resident_count_never_exceeds_budget", 3);
    let page_size = swap.page_size();
    let mut rand = SmallRng::seed_from_u64(SEED);

    let mut allocations = vec![];
    let mut check_states = vec![];
    for pages in ALLOCATION_PAGES {
        allocations.push(swap.alloc(pages * page_size).unwrap());
        check_states.push(vec![0u8; pages * page_size]);
    }

    for iteration in 0..ITERATIONS {
        let test_type = rand.next_u32() % 20;
        let i = rand.next_u32() as usize % allocations.len();
        let offset = rand.next_u32() as usize % check_states[i].len();
        let ptr = unsafe { allocations[i].add(offset) };

        if test_type == 0 {
            let budget_pages = rand.next_u32() as usize % 6;
            swap.set_budget(budget_pages * page_size);
        } else if test_type < 8 {
            let value = rand.next_u32() as u8;
            write_byte(&mut swap, ptr, value);
            check_states[i][offset] = value;
        } else {
            assert_eq!(
                read_byte(&mut swap, ptr),
                check_states[i][offset],
                "Invalid data in iteration {}",
                iteration
            );
        }

        assert!(
            swap.resident_page_count() <= swap.budget_pages().max(1),
            "Budget exceeded in iteration {}",
            iteration
        );
    }

    // everything has to survive one final round of evictions
    swap.set_budget(0);
    assert_eq!(swap.resident_page_count(), 0);
    for (i, base) in allocations.iter().enumerate() {
        for (offset, expected) in check_states[i].iter().enumerate().step_by(97) {
            assert_eq!(read_byte(&mut swap, unsafe { base.add(offset) }), *expected);
        }
    }

    for base in allocations {
        swap.free(base).unwrap();
    }
    assert_eq!(swap.resident_page_count(), 0);
    assert_eq!(swap.swap_slot_count(), 0);
    assert_eq!(swap.io_failure_count(), 0);
}
