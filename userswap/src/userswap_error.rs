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

use core::fmt::{self, Display};
use std::io;

#[derive(Debug)]
pub enum UserSwapError {
    /// The address space for an allocation could not be reserved
    Reservation(io::Error),

    /// A mapped file could not be extended to the requested size
    FileResize(io::Error),

    /// The given address was never returned by `alloc` or `map_file`
    /// (or was already freed)
    UnknownAllocation(usize),

    /// The fault handler could not be installed
    HandlerInstall,
}

impl Display for UserSwapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserSwapError::Reservation(err) => write!(f, "could not reserve address space: {}", err),
            UserSwapError::FileResize(err) => write!(f, "could not resize mapped file: {}", err),
            UserSwapError::UnknownAllocation(addr) => {
                write!(f, "no allocation starts at address {:#x}", addr)
            }
            UserSwapError::HandlerInstall => write!(f, "could not install fault handler"),
        }
    }
}

impl std::error::Error for UserSwapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UserSwapError::Reservation(err) | UserSwapError::FileResize(err) => Some(err),
            _ => None,
        }
    }
}
