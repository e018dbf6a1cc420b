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

mod allocation_registry;
mod fault_access_point;
mod page_fault;
mod resident_set;
mod swap_store;
mod userswap;
mod userswap_config;
mod userswap_error;
mod util;

#[cfg(test)]
mod test;

#[cfg(feature = "benchmarks")]
pub mod benchmarks;

pub use crate::page_fault::FaultOutcome;
pub use crate::util::get_page_size;
pub use crate::userswap::UserSwap;
pub use userswap_config::{default_swap_file_path, UserSwapConfig, DEFAULT_RESIDENT_PAGES};
pub use userswap_error::UserSwapError;
pub mod modules;
