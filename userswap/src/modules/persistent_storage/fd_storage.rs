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

use std::{
    fs::File,
    io,
    mem::ManuallyDrop,
    os::{
        fd::{FromRawFd, RawFd},
        unix::fs::FileExt,
    },
};

use super::{read_at_zero_filled, PersistentStorageModule};

/// Storage on top of a file descriptor that is owned by somebody else.
///
/// The descriptor is never closed and only accessed with `pread`/`pwrite`,
/// so the read/write cursor of the owner stays where it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdStorageModule {
    fd: RawFd,
}

impl FdStorageModule {
    /// ### Safety
    ///
    /// `fd` has to be an open, readable and writable descriptor
    /// for as long as this module (or any copy of it) is used.
    pub unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Self { fd }
    }

    /// Borrow the descriptor as a `File` that is never closed
    #[inline]
    fn file(&self) -> ManuallyDrop<File> {
        ManuallyDrop::new(unsafe { File::from_raw_fd(self.fd) })
    }

    /// Current length of the file in bytes
    pub fn file_len(&self) -> io::Result<u64> {
        Ok(self.file().metadata()?.len())
    }

    /// Extends the file with zeros if it is shorter than `size` bytes.
    ///
    /// Files that are already long enough are left untouched.
    pub fn ensure_len(&self, size: u64) -> io::Result<()> {
        let file = self.file();
        if file.metadata()?.len() < size {
            file.set_len(size)?;
        }

        Ok(())
    }
}

impl PersistentStorageModule for FdStorageModule {
    fn read(&mut self, offset: usize, dest: &mut [u8]) -> io::Result<()> {
        read_at_zero_filled(&self.file(), offset, dest)
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> io::Result<()> {
        self.file().write_all_at(src, offset as u64)
    }
}
