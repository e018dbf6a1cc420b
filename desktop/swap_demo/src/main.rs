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
    error::Error,
    fs::File,
    io::Write,
    os::unix::fs::FileExt,
    sync::atomic::{compiler_fence, Ordering},
};

use env_logger::{Builder, Env};
use log::info;
use userswap::{get_page_size, UserSwap, UserSwapConfig};

const DEFAULT_BUDGET_PAGES: usize = 4;
const ANONYMOUS_PAGES: usize = 64;
const FILE_PATH: &str = "/tmp/userswap_demo.data";

fn read(ptr: *const u8) -> u8 {
    compiler_fence(Ordering::SeqCst);
    let value = unsafe { ptr.read_volatile() };
    compiler_fence(Ordering::SeqCst);
    value
}

fn write(ptr: *mut u8, value: u8) {
    compiler_fence(Ordering::SeqCst);
    unsafe { ptr.write_volatile(value) };
    compiler_fence(Ordering::SeqCst);
}

fn main() -> Result<(), Box<dyn Error>> {
    Builder::from_env(Env::default())
        .filter_level(log::LevelFilter::Warn)
        .format_module_path(false)
        .init();

    let budget_pages = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => DEFAULT_BUDGET_PAGES,
    };

    let page_size = get_page_size();
    let mut swap = UserSwap::new(UserSwapConfig {
        resident_budget: Some(budget_pages * page_size),
        swap_file: None,
    })?;
    swap.install_fault_handler()?;

    println!(
        "page size {}, budget {} pages, swap file {}",
        swap.page_size(),
        swap.budget_pages(),
        swap.swap_file_path().display()
    );

    // anonymous memory that is much bigger than the budget
    let base = swap.alloc(ANONYMOUS_PAGES * page_size)?;
    for i in 0..ANONYMOUS_PAGES {
        let page = unsafe { base.add(i * page_size) };
        for j in 0..16 {
            write(unsafe { page.add(j) }, (i + j) as u8);
        }
    }
    info!(
        "{} pages resident, {} pages swapped out",
        swap.resident_page_count(),
        swap.swap_slot_count()
    );

    let mut errors = 0;
    for i in (0..ANONYMOUS_PAGES).rev() {
        let page = unsafe { base.add(i * page_size) };
        for j in 0..16 {
            if read(unsafe { page.add(j) }) != (i + j) as u8 {
                errors += 1;
            }
        }
    }
    println!(
        "anonymous memory: {} pages checked, {} errors, {} still swapped out",
        ANONYMOUS_PAGES,
        errors,
        swap.swap_slot_count()
    );
    swap.free(base)?;

    // file backed memory
    let mut file = File::options()
        .read(true)
        .write(true)
        .truncate(true)
        .create(true)
        .open(FILE_PATH)?;
    file.write_all(&vec![b'X'; page_size])?;
    file.write_all(&vec![b'Y'; page_size])?;

    let mapped = swap.map_file(&file, 2 * page_size)?;
    let second_page = unsafe { mapped.add(page_size) };
    println!(
        "mapped file starts with '{}' and '{}'",
        read(mapped) as char,
        read(second_page) as char
    );

    write(second_page, b'A');
    swap.set_budget(0);

    let mut buffer = [0u8; 1];
    file.read_exact_at(&mut buffer, page_size as u64)?;
    println!(
        "after evicting everything the file contains '{}' at offset {}",
        buffer[0] as char, page_size
    );

    swap.free(mapped)?;
    println!("{} backing store failures", swap.io_failure_count());

    Ok(())
}
