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

use super::{touch_read, Benchmark, SwapBenchmarkOptions, Timer};
use crate::{UserSwap, UserSwapError};

/// Latency of the first read of an anonymous page while the budget is not exhausted
pub struct FaultInBenchmark<'a> {
    swap: &'a mut UserSwap,
    base: *mut u8,
    pages: usize,
    next: usize,
}

impl<'a> FaultInBenchmark<'a> {
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

impl<'a> Benchmark<SwapBenchmarkOptions> for FaultInBenchmark<'a> {
    fn get_name(&self) -> &'static str {
        "fault_in"
    }

    fn get_bench_options(&self) -> SwapBenchmarkOptions {
        SwapBenchmarkOptions::new(&*self.swap)
    }

    fn execute<T: Timer>(&mut self) -> u32 {
        let page = unsafe { self.base.add((self.next % self.pages) * self.swap.page_size()) };
        self.next += 1;

        let timer = T::start();

        black_box(touch_read(page));

        timer.stop()
    }
}

