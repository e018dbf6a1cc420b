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

use std::hint::black_box;

use super::{touch_read, touch_write, Benchmark, SwapBenchmarkOptions, Timer};
use crate::{UserSwap, UserSwapError};

/// Latency of reading a page that was swapped out before.
///
/// Expects a budget of a single page, so each fault evicts a clean page and reads one swap slot.
pub struct SwapInBenchmark<'a> {
    swap: &'a mut UserSwap,
    base: *mut u8,
    pairs: usize,
    next: usize,
}

impl<'a> SwapInBenchmark<'a> {
    pub fn new(swap: &'a mut UserSwap, executions: usize) -> Result<Self, UserSwapError> {
        swap.install_fault_handler()?;

        let pairs = executions.max(1);
        let page_size = swap.page_size();
        let base = swap.alloc(2 * pairs * page_size)?;

        Ok(Self {
            swap,
            base,
            pairs,
            next: 0,
        })
    }
}

impl<'a> Benchmark<SwapBenchmarkOptions> for SwapInBenchmark<'a> {
    fn get_name(&self) -> &'static str {
        "swap_in"
    }

    fn get_bench_options(&self) -> SwapBenchmarkOptions {
        SwapBenchmarkOptions::new(&*self.swap)
    }

    fn execute<T: Timer>(&mut self) -> u32 {
        let page_size = self.swap.page_size();
        let swapped = unsafe { self.base.add(2 * (self.next % self.pairs) * page_size) };
        let other = unsafe { swapped.add(page_size) };
        self.next += 1;

        // dirty page is swapped out as soon as the other page comes in
        touch_write(swapped, 1);
        touch_read(other);

        let timer = T::start();

        black_box(touch_read(swapped));

        timer.stop()
    }
}
