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

use serde::Serialize;

use super::{touch_write, Benchmark, Timer};
use crate::{UserSwap, UserSwapError};

#[derive(Serialize)]
pub struct SwapOutBenchmarkOptions {
    page_size: usize,
    dirty_pages: usize,
}

/// Latency of `set_budget(0)` while `dirty_pages` dirty anonymous pages are resident
pub struct SwapOutBenchmark<'a> {
    swap: &'a mut UserSwap,
    base: *mut u8,
    dirty_pages: usize,
    executions: usize,
    next: usize,
}

impl<'a> SwapOutBenchmark<'a> {
    pub fn new(
        swap: &'a mut UserSwap,
        dirty_pages: usize,
        executions: usize,
    ) -> Result<Self, UserSwapError> {
        swap.install_fault_handler()?;

        let executions = executions.max(1);
        let page_size = swap.page_size();
        let base = swap.alloc(executions * dirty_pages * page_size)?;

        Ok(Self {
            swap,
            base,
            dirty_pages,
            executions,
            next: 0,
        })
    }
}

impl<'a> Benchmark<SwapOutBenchmarkOptions> for SwapOutBenchmark<'a> {
    fn get_name(&self) -> &'static str {
        "swap_out"
    }

    fn get_bench_options(&self) -> SwapOutBenchmarkOptions {
        SwapOutBenchmarkOptions {
            page_size: self.swap.page_size(),
            dirty_pages: self.dirty_pages,
        }
    }

    fn execute<T: Timer>(&mut self) -> u32 {
        let page_size = self.swap.page_size();
        let region = (self.next % self.executions) * self.dirty_pages;
        self.next += 1;

        self.swap.set_budget(self.dirty_pages * page_size);
        for i in 0..self.dirty_pages {
            touch_write(unsafe { self.base.add((region + i) * page_size) }, i as u8);
        }

        let timer = T::start();

        self.swap.set_budget(0);

        timer.stop()
    }
}
