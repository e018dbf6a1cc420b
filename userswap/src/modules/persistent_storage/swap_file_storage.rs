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
    fs::{remove_file, File},
    io,
    os::unix::fs::FileExt,
    path::{Path, PathBuf},
};

use super::{read_at_zero_filled, PersistentStorageModule};

/// The swap file of one manager instance.
///
/// The file is created (and truncated) on the first write only,
/// so managers which never evict a dirty page never touch the file system.
pub struct SwapFileStorageModule {
    /// underlying file, `None` until the first page is written
    file: Option<File>,

    /// path of file, save for creating and deleting file later
    file_path: PathBuf,
}

impl SwapFileStorageModule {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file: None,
            file_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Was the swap file created yet?
    pub fn is_created(&self) -> bool {
        self.file.is_some()
    }

    fn get_or_create_file(&mut self) -> io::Result<&File> {
        if self.file.is_none() {
            let file = File::options()
                .read(true)
                .write(true)
                .truncate(true)
                .create(true)
                .open(&self.file_path)?;

            self.file = Some(file);
        }

        // just created it
        self.file
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

impl PersistentStorageModule for SwapFileStorageModule {
    fn read(&mut self, offset: usize, dest: &mut [u8]) -> io::Result<()> {
        match self.file.as_ref() {
            Some(file) => read_at_zero_filled(file, offset, dest),
            None => {
                // nothing was written yet
                dest.fill(0);
                Ok(())
            }
        }
    }

    fn write(&mut self, offset: usize, src: &[u8]) -> io::Result<()> {
        let file = self.get_or_create_file()?;
        file.write_all_at(src, offset as u64)
    }
}

impl Drop for SwapFileStorageModule {
    fn drop(&mut self) {
        // close file before removing
        if let Some(file) = self.file.take() {
            drop(file);

            if self.file_path.exists() {
                let _ = remove_file(&self.file_path);
            }
        }
    }
}
