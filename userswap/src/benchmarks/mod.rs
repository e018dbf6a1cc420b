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

use core::sync::atomic::{compiler_fence, Ordering};
use std::io::stdout;

use log::warn;
use serde::Serialize;

mod fault_in;
mod swap_in;
mod swap_out;
mod swap_storage_read;
mod swap_storage_write;
mod write_fault;

pub use fault_in::*;
pub use swap_in::*;
pub use swap_out::*;
pub use swap_storage_read::*;
pub use swap_storage_write::*;
pub use write_fault::*;

use crate::{modules::persistent_storage::PersistentStorageModule, UserSwap, UserSwapError};

/// Which groups of benchmarks `run_all_benchmarks` runs, nothing by default
#[derive(Default)]
pub struct RunAllBenchmarkOptions {
    /// first access and first write of a page
    pub run_fault_benchmarks: bool,

    /// faults that have to evict a page or copy one back from the swap file
    pub run_swap_benchmarks: bool,

    /// raw swap file reads and writes without any fault
    pub run_swap_storage_benchmarks: bool,
}

impl RunAllBenchmarkOptions {
    pub fn all() -> Self {
        Self {
            run_fault_benchmarks: true,
            run_swap_benchmarks: true,
            run_swap_storage_benchmarks: true,
        }
    }
}

/// Runs the selected benchmarks.
///
/// `get_bench_swap` receives the resident budget in pages and has to return a fresh manager,
/// the fault handler is installed by the benchmarks themselves.
pub fn run_all_benchmarks<
    TIMER: Timer,
    S: PersistentStorageModule,
    F: Fn(usize) -> UserSwap,
    G: Fn() -> S,
>(
    mut run_options: BenchmarkRunOptions,
    options: RunAllBenchmarkOptions,
    get_bench_swap: F,
    get_bench_storage: G,
) -> Result<(), UserSwapError> {
    const SWAP_OUT_PAGES: [usize; 3] = [1, 8, 64];

    let executions = (run_options.cold_start + run_options.repetitions) as usize;

    let mut curr_iteration = 0usize;
    let mut iteration_count = 0;

    if options.run_fault_benchmarks {
        iteration_count += 2;
    }
    if options.run_swap_benchmarks {
        iteration_count += 1 + SWAP_OUT_PAGES.len();
    }
    if options.run_swap_storage_benchmarks {
        iteration_count += 4;
    }

    fn handle_curr_iteration(curr_iteration: &mut usize, iteration_count: usize) {
        let percentage = (100 * *curr_iteration) / iteration_count;
        print!("[{}%] ", percentage);

        *curr_iteration += 1;
    }

    if options.run_fault_benchmarks {
        {
            handle_curr_iteration(&mut curr_iteration, iteration_count);
            let mut swap = get_bench_swap(executions);
            let bench = FaultInBenchmark::new(&mut swap, executions)?;
            bench.run_benchmark::<TIMER>(&mut run_options);
        }
        {
            handle_curr_iteration(&mut curr_iteration, iteration_count);
            let mut swap = get_bench_swap(executions);
            let bench = WriteFaultBenchmark::new(&mut swap, executions)?;
            bench.run_benchmark::<TIMER>(&mut run_options);
        }
    }

    if options.run_swap_benchmarks {
        {
            handle_curr_iteration(&mut curr_iteration, iteration_count);
            let mut swap = get_bench_swap(1);
            let bench = SwapInBenchmark::new(&mut swap, executions)?;
            bench.run_benchmark::<TIMER>(&mut run_options);
        }

        for pages in SWAP_OUT_PAGES {
            handle_curr_iteration(&mut curr_iteration, iteration_count);
            let mut swap = get_bench_swap(pages);
            let bench = SwapOutBenchmark::new(&mut swap, pages, executions)?;
            bench.run_benchmark::<TIMER>(&mut run_options);
        }
    }

    if options.run_swap_storage_benchmarks {
        const PAGE: usize = 4096;

        {
            handle_curr_iteration(&mut curr_iteration, iteration_count);
            let mut storage = get_bench_storage();
            let bench: SwapStorageWriteBenchmark<S, PAGE> = SwapStorageWriteBenchmark::new(&mut storage);
            bench.run_benchmark::<TIMER>(&mut run_options);
        }
        {
            handle_curr_iteration(&mut curr_iteration, iteration_count);
            let mut storage = get_bench_storage();
            let bench: SwapStorageWriteBenchmark<S, { 8 * PAGE }> =
                SwapStorageWriteBenchmark::new(&mut storage);
            bench.run_benchmark::<TIMER>(&mut run_options);
        }
        {
            handle_curr_iteration(&mut curr_iteration, iteration_count);
            let mut storage = get_bench_storage();
            let bench: SwapStorageReadBenchmark<S, PAGE> = SwapStorageReadBenchmark::new(&mut storage);
            bench.run_benchmark::<TIMER>(&mut run_options);
        }
        {
            handle_curr_iteration(&mut curr_iteration, iteration_count);
            let mut storage = get_bench_storage();
            let bench: SwapStorageReadBenchmark<S, { 8 * PAGE }> =
                SwapStorageReadBenchmark::new(&mut storage);
            bench.run_benchmark::<TIMER>(&mut run_options);
        }
    }

    Ok(())
}

pub trait Benchmark<O: Serialize> {
    fn get_name(&self) -> &'static str;

    fn get_bench_options(&self) -> O;

    fn execute<T: Timer>(&mut self) -> u32;

    #[inline(never)]
    fn run_benchmark<T: Timer>(mut self, options: &mut BenchmarkRunOptions) -> BenchmarkRunResult
    where
        Self: Sized,
    {
        assert_eq!(options.repetitions as usize, options.result_buffer.len());

        print!("Running Benchmark \"{}\" with options ", self.get_name());
        if let Err(err) = serde_json::to_writer(stdout(), &self.get_bench_options()) {
            warn!("Could not serialize benchmark options: {}", err);
        }
        println!();

        for _ in 0..options.cold_start {
            self.execute::<T>();
        }

        for i in 0..options.result_buffer.len() {
            options.result_buffer[i] = self.execute::<T>();
        }

        print!("[BENCH-INFO] ");
        let run_info = BenchmarkRunInfo {
            bench_name: self.get_name(),
            bench_options: &self.get_bench_options(),
            machine_name: options.machine_name,
            cold_start: options.cold_start,
            repetitions: options.repetitions,
            ticks_per_ms: T::get_ticks_per_ms(),
            data: &options.result_buffer,
        };
        if let Err(err) = serde_json::to_writer(stdout(), &run_info) {
            warn!("Could not serialize benchmark results: {}", err);
        }
        println!();

        let res = BenchmarkRunResult::from_buffer(&options.result_buffer);
        println!(
            "-> Finished {}: mean={}, median={}, min={}, max={}",
            self.get_name(),
            res.mean_latency,
            res.median_latency,
            res.min_latency,
            res.max_latency
        );
        println!();

        res
    }
}

pub struct BenchmarkRunOptions<'a> {
    pub repetitions: u32,
    pub result_buffer: &'a mut [u32],

    pub cold_start: u32,

    pub machine_name: &'static str,
}

#[derive(Serialize)]
pub struct BenchmarkRunInfo<'a, O: Serialize> {
    bench_name: &'static str,
    bench_options: &'a O,
    machine_name: &'static str,
    cold_start: u32,
    repetitions: u32,
    ticks_per_ms: u32,
    data: &'a [u32],
}

/// Latencies in timer ticks
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BenchmarkRunResult {
    pub mean_latency: u32,
    pub median_latency: u32,
    pub min_latency: u32,
    pub max_latency: u32,
}

impl BenchmarkRunResult {
    fn from_buffer(buffer: &[u32]) -> Self {
        let mut sorted = buffer.to_vec();
        sorted.sort_unstable();

        let (min_latency, max_latency) = match (sorted.first(), sorted.last()) {
            (Some(min), Some(max)) => (*min, *max),
            _ => return Self::default(),
        };

        let sum: u64 = sorted.iter().map(|x| *x as u64).sum();
        Self {
            mean_latency: (sum / sorted.len() as u64) as u32,
            median_latency: sorted[sorted.len() / 2],
            min_latency,
            max_latency,
        }
    }
}

pub trait Timer {
    fn get_ticks_per_ms() -> u32;

    fn start() -> Self;

    fn stop(self) -> u32;
}

/// Options that all benchmarks on top of a manager share
#[derive(Serialize)]
pub struct SwapBenchmarkOptions {
    page_size: usize,
    budget_pages: usize,
}

impl SwapBenchmarkOptions {
    fn new(swap: &UserSwap) -> Self {
        Self {
            page_size: swap.page_size(),
            budget_pages: swap.budget_pages(),
        }
    }
}

/// Reads from managed memory, faults are resolved by the installed handler
#[inline(always)]
fn touch_read(ptr: *const u8) -> u8 {
    compiler_fence(Ordering::SeqCst);
    let value = unsafe { ptr.read_volatile() };
    compiler_fence(Ordering::SeqCst);

    value
}

/// Writes to managed memory, faults are resolved by the installed handler
#[inline(always)]
fn touch_write(ptr: *mut u8, value: u8) {
    compiler_fence(Ordering::SeqCst);
    unsafe { ptr.write_volatile(value) };
    compiler_fence(Ordering::SeqCst);
}
