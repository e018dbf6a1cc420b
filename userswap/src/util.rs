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

use libc::{sysconf, _SC_PAGE_SIZE};

/// Size of a page of this machine in bytes
pub fn get_page_size() -> usize {
    let size = unsafe { sysconf(_SC_PAGE_SIZE) };
    if size <= 0 {
        // sysconf should never fail for this, fall back to the most common size
        return 4096;
    }

    size as usize
}

/// Calculates `ceil(num / div)` without overflowing for big values of `num`
#[inline]
pub(crate) const fn div_ceil(num: usize, div: usize) -> usize {
    num / div + (num % div != 0) as usize
}

/// Rounds `num` up to the next multiple of `multiple`.
///
/// Returns `None` if the result does not fit into an `usize`.
#[inline]
pub(crate) const fn round_up_to_nearest(num: usize, multiple: usize) -> Option<usize> {
    div_ceil(num, multiple).checked_mul(multiple)
}

/// Returns the start of the page that contains `addr`
#[inline]
pub(crate) const fn align_down(addr: usize, page_size: usize) -> usize {
    addr - (addr % page_size)
}

#[cfg(test)]
mod test {
    use super::{align_down, div_ceil, round_up_to_nearest};

    #[test]
    fn test_div_ceil() {
        // just test a bunch of different values
        for y in 1..100 {
            for x in 0..y * 3 {
                let expected_value = if x % y == 0 { x / y } else { (x / y) + 1 };

                assert_eq!(div_ceil(x, y), expected_value);
            }
        }

        // should not overflow
        assert_eq!(div_ceil(usize::MAX, 4096), usize::MAX / 4096 + 1);
    }

    #[test]
    fn test_round_up_to_nearest() {
        assert_eq!(round_up_to_nearest(0, 4096), Some(0));
        assert_eq!(round_up_to_nearest(1, 4096), Some(4096));
        assert_eq!(round_up_to_nearest(4096, 4096), Some(4096));
        assert_eq!(round_up_to_nearest(4097, 4096), Some(8192));
        assert_eq!(round_up_to_nearest(usize::MAX, 4096), None);
    }

    #[test]
    fn test_align_down() {
        assert_eq!(align_down(0x1000, 0x1000), 0x1000);
        assert_eq!(align_down(0x1fff, 0x1000), 0x1000);
        assert_eq!(align_down(0x2000, 0x1000), 0x2000);
        assert_eq!(align_down(0x2001, 0x1000), 0x2000);
    }
}
