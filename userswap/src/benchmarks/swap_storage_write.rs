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

use std::{any::type_name, hint::black_box};

use log::warn;
use serde::Serialize;

use crate::modules::persistent_storage::PersistentStorageModule;

use super::{Benchmark, Timer};

#[derive(Serialize)]
pub struct SwapStorageWriteBenchmarkOptions {
    size: usize,
    persistent_storage_module: &'static str,
}

pub struct SwapStorageWriteBenchmark<'a, S: PersistentStorageModule, const SIZE: usize> {
    storage_module: &'a mut S,
}

impl<'a, S: PersistentStorageModule, const SIZE: usize> SwapStorageWriteBenchmark<'a, S, SIZE> {
    pub fn new(storage_module: &'a mut S) -> Self {
        Self { storage_module }
    }
}

impl<'a, S: PersistentStorageModule, const SIZE: usize> Benchmark<SwapStorageWriteBenchmarkOptions>
    for SwapStorageWriteBenchmark<'a, S, SIZE>
{
    fn get_name(&self) -> &'static str {
        "swap_storage_write"
    }

    fn get_bench_options(&self) -> SwapStorageWriteBenchmarkOptions {
        SwapStorageWriteBenchmarkOptions {
            size: SIZE,
            persistent_storage_module: type_name::<S>(),
        }
    }

    fn execute<T: Timer>(&mut self) -> u32 {
        let data = vec![0u8; SIZE];

        let timer = T::start();

        let res = black_box(self.storage_module.write(0, &data));

        let latency = timer.stop();
        if let Err(err) = res {
            warn!("Write failed: {}", err);
        }

        latency
    }
}
