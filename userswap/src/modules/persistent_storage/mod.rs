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

use std::io;

mod fd_storage;
mod swap_file_storage;

pub use fd_storage::FdStorageModule;
pub use swap_file_storage::SwapFileStorageModule;

/// A backing store for evicted pages.
///
/// All accesses are positioned, implementations must never depend on
/// (or modify) an implicit file cursor.
pub trait PersistentStorageModule {
    /// Reads a region `[offset, offset + dest.len())` to a storage location `dest` that is at least `dest.len()` bytes big.
    ///
    /// Reading past the end of the storage fills the rest of `dest` with zeros.
    ///
    /// If this call fails, it could be that already some data was written to `dest`.
    fn read(&mut self, offset: usize, dest: &mut [u8]) -> io::Result<()>;

    /// Writes the region `src` back to the underlying storage `[offset, offset + src.len())`
    fn write(&mut self, offset: usize, src: &[u8]) -> io::Result<()>;
}

/// Like `FileExt::read_exact_at`, but treats a premature end of file as zeros
pub(crate) fn read_at_zero_filled(
    file: &std::fs::File,
    offset: usize,
    dest: &mut [u8],
) -> io::Result<()> {
    use std::os::unix::fs::FileExt;

    let mut done = 0;
    while done < dest.len() {
        match file.read_at(&mut dest[done..], (offset + done) as u64) {
            Ok(0) => {
                // end of file
                dest[done..].fill(0);
                break;
            }
            Ok(n) => done += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }

    Ok(())
}
