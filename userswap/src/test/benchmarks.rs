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

use std::time::Instant;

use super::get_test_userswap;
use crate::{
    benchmarks::{run_all_benchmarks, BenchmarkRunOptions, RunAllBenchmarkOptions, Timer},
    modules::persistent_storage::SwapFileStorageModule,
    UserSwap,
};

#[test]
fn test_benchmarks() {
    run_all_benchmarks::<DesktopTimer, _, _, _>(
        BenchmarkRunOptions {
            cold_start: 1,
            machine_name: "desktop",
            repetitions: 10,
            result_buffer: &mut [0; 10],
        },
        RunAllBenchmarkOptions::all(),
        get_bench_swap,
        get_bench_storage,
    )
    .unwrap();
}

fn get_bench_swap(budget_pages: usize) -> UserSwap {
    get_test_userswap("test_benchmarks", budget_pages)
}

fn get_bench_storage() -> SwapFileStorageModule {
    SwapFileStorageModule::new("/tmp/test_benchmarks_storage.swap".into())
}

struct DesktopTimer {
    start_time: Instant,
}

impl Timer for DesktopTimer {
    fn get_ticks_per_ms() -> u32 {
        1000
    }

    #[inline]
    fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    #[inline]
    fn stop(self) -> u32 {
        (Instant::now() - self.start_time).subsec_micros()
    }
}
