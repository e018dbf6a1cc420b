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

use std::path::PathBuf;

use static_assertions::const_assert;

/// How many pages may be resident if no budget is configured
pub const DEFAULT_RESIDENT_PAGES: usize = 2106;

const_assert!(DEFAULT_RESIDENT_PAGES > 0);

#[derive(Debug, Clone, Default)]
pub struct UserSwapConfig {
    /// How many bytes may be resident at the same time.
    /// Rounded up to a multiple of the page size.
    ///
    /// If `None`, `DEFAULT_RESIDENT_PAGES` pages may be resident.
    pub resident_budget: Option<usize>,

    /// Where evicted anonymous pages are stored.
    ///
    /// If `None`, `<pid>.swap` inside of the current working directory is used.
    pub swap_file: Option<PathBuf>,
}

impl UserSwapConfig {
    pub(crate) fn budget_pages(&self, page_size: usize) -> usize {
        match self.resident_budget {
            Some(bytes) => crate::util::div_ceil(bytes, page_size),
            None => DEFAULT_RESIDENT_PAGES,
        }
    }

    pub(crate) fn swap_file_path(&self) -> PathBuf {
        match &self.swap_file {
            Some(path) => path.clone(),
            None => default_swap_file_path(),
        }
    }
}

/// Swap file name that is derived from the id of this process
pub fn default_swap_file_path() -> PathBuf {
    PathBuf::from(format!("{}.swap", std::process::id()))
}
