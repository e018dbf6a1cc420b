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

use env_logger::{Builder, Env};
use userswap::{
    benchmarks::{run_all_benchmarks, BenchmarkRunOptions, RunAllBenchmarkOptions, Timer},
    get_page_size,
    modules::persistent_storage::SwapFileStorageModule,
    UserSwap, UserSwapConfig, UserSwapError,
};

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

fn main() -> Result<(), UserSwapError> {
    Builder::from_env(Env::default())
        .filter_level(log::LevelFilter::Warn)
        .format_module_path(false)
        .init();

    run_all_benchmarks::<DesktopTimer, _, _, _>(
        BenchmarkRunOptions {
            cold_start: 10,
            machine_name: "desktop",
            repetitions: 100,
            result_buffer: &mut [0; 100],
        },
        RunAllBenchmarkOptions::all(),
        get_swap,
        get_storage,
    )
}

fn get_swap(budget_pages: usize) -> UserSwap {
    let page_size = get_page_size();
    match UserSwap::new(UserSwapConfig {
        resident_budget: Some(budget_pages * page_size),
        swap_file: Some("bench.swap".into()),
    }) {
        Ok(swap) => swap,
        Err(err) => panic!("could not create manager: {}", err),
    }
}

fn get_storage() -> SwapFileStorageModule {
    SwapFileStorageModule::new("bench_storage.swap".into())
}
