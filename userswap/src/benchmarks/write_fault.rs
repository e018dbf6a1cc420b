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

use super::{touch_read, touch_write, Benchmark, SwapBenchmarkOptions, Timer};
use crate::{UserSwap, UserSwapError};

/// Latency of the first write to a clean resident page
pub struct WriteFaultBenchmark<'a> {
    swap: &'a mut UserSwap,
    base: *mut u8,
    pages: usize,
    next: usize,
}

impl<'a> WriteFaultBenchmark<'a> {
    pub fn new(swap: &'a mut UserSwap, executions: usize) -> Result<Self, UserSwapError> {
        swap.install_fault_handler()?;

        let pages = executions.max(1);
        let page_size = swap.page_size();
        let base = swap.alloc(pages * page_size)?;

        Ok(Self {
            swap,
            base,
            pages,
            next: 0,
        })
    }
}

impl<'a> Benchmark<SwapBenchmarkOptions> for WriteFaultBenchmark<'a> {
    fn get_name(&self) -> &'static str {
        "write_fault"
    }

    fn get_bench_options(&self) -> SwapBenchmarkOptions {
        SwapBenchmarkOptions::new(&*self.swap)
    }

    fn execute<T: Timer>(&mut self) -> u32 {
        let page = unsafe { self.base.add((self.next % self.pages) * self.swap.page_size()) };
        self.next += 1;

        // bring the page in as clean page first
        touch_read(page);

        let timer = T::start();

        touch_write(page, 1);

        timer.stop()
    }
}
