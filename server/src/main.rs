/*
 * Created on Mon Mar 15 2021
 *
 * This file is a part of Sable
 * Sable is a free and open-source in-memory data structure store that
 * speaks the Redis RESP2 protocol, written by Sayan Nandan ("the Author")
 * with the vision to provide a fast and reliable caching and data
 * structure layer without compromising on simplicity
 *
 * Copyright (c) 2021, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Sable
//!
//! The `sabled` crate (or the `server` folder) is Sable's database server:
//! a RESP2-speaking in-memory data structure store. There are several
//! modules within this crate; see the modules for their respective
//! documentation.

use crate::config::ConfigSet;
use crate::config::ConfigType;
use env_logger::*;
use libsable::util::terminal;
use libsable::URL;
use libsable::VERSION;
use std::env;
use std::fs;
use std::io::Write;
use std::path;
use std::process;
use std::thread;
use std::time;

mod actions;
mod admin;
mod arbiter;
mod config;
mod corestore;
mod dbnet;
mod diskstore;
mod protocol;
mod pubsub;
mod queryengine;
mod resp;
mod services;
mod util;

/// A generic I/O result
pub type IoResult<T> = std::io::Result<T>;

const PATH: &str = ".sable_pid";

#[cfg(all(not(target_env = "msvc"), not(miri)))]
use jemallocator::Jemalloc;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
#[global_allocator]
/// Jemallocator - this is the default memory allocator for platforms other than msvc
static GLOBAL: Jemalloc = Jemalloc;

/// The terminal art printed on startup
static TEXT: &str = "\n███████  █████  ██████  ██      ███████ \n██      ██   ██ ██   ██ ██      ██      \n███████ ███████ ██████  ██      █████   \n     ██ ██   ██ ██   ██ ██      ██      \n███████ ██   ██ ██████  ███████ ███████ \n                                        ";

fn main() {
    let cfg = check_args_and_get_cfg();
    init_logger(&cfg);
    println!("Sable v{} | {}\n{}", VERSION, URL, TEXT);
    // check if any other process is using the data directory and lock it if not (else error)
    let pid_file = run_pre_startup_tasks();
    // Start the server which asynchronously waits for a CTRL+C signal
    // which will safely shut down the server
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("server")
        .enable_all()
        .build()
        .unwrap();
    let db = match runtime.block_on(arbiter::run(cfg)) {
        Ok(db) => db,
        Err(e) => {
            log::error!("Startup failure: {}", e);
            process::exit(0x100);
        }
    };
    // Make sure all background workers terminate
    drop(runtime);
    log::info!("Stopped accepting incoming connections");
    if !db.config().save_points.is_empty() && !db.skip_final_save() {
        loop {
            // Keep looping until we successfully write the in-memory table to disk
            match services::bgsave::run_bgsave(&db) {
                Ok(_) => {
                    log::info!("Successfully saved data to disk");
                    break;
                }
                Err(e) => {
                    log::error!(
                        "Failed to write data with error '{}'. Attempting to retry in 10s",
                        e
                    );
                }
            }
            thread::sleep(time::Duration::from_secs(10));
        }
    }
    // close the PID file and remove it
    drop(pid_file);
    if let Err(e) = fs::remove_file(PATH) {
        log::error!("Shutdown failure: Failed to remove pid file: {}", e);
        process::exit(0x100);
    }
    terminal::write_info("Goodbye :)\n").unwrap();
}

/// This function checks the command line arguments and either returns a
/// config object or prints an error/usage text and terminates the server
fn check_args_and_get_cfg() -> ConfigSet {
    match config::parse_cli_args(env::args().skip(1)) {
        Ok(ConfigType::Run(cfg)) => cfg,
        Ok(ConfigType::Help) => {
            println!("{}", config::HELP_TEXT);
            process::exit(0x00);
        }
        Ok(ConfigType::Version) => {
            println!("sabled v{}", VERSION);
            process::exit(0x00);
        }
        Err(e) => {
            eprintln!("{}", e);
            process::exit(0x100);
        }
    }
}

/// Bring up the logger, honoring an explicit `SABLE_LOG` override and the
/// configured logfile target
fn init_logger(cfg: &ConfigSet) {
    let mut builder = Builder::new();
    builder
        .parse_filters(&env::var("SABLE_LOG").unwrap_or_else(|_| cfg.loglevel.filter().to_owned()));
    if let Some(logfile) = &cfg.logfile {
        match fs::OpenOptions::new().create(true).append(true).open(logfile) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("Startup failure: Failed to open logfile: {}", e);
                process::exit(0x100);
            }
        }
    }
    builder.init();
}

/// On startup, we attempt to check if a `.sable_pid` file exists. If it
/// does, then this file will contain the kernel/operating system assigned
/// process ID of the sabled process. We will attempt to read that and log
/// an error complaining that the directory is in active use by another
/// process. If the file doesn't exist, then we're free to create our own
/// file and write our own PID to it. Any subsequent processes will detect
/// this and this helps us prevent two processes from writing to the same
/// directory which can cause potentially undefined behavior.
fn run_pre_startup_tasks() -> fs::File {
    let path = path::Path::new(PATH);
    if path.exists() {
        let pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
        log::error!(
            "Startup failure: Another process with parent PID {} is using the data directory",
            pid
        );
        process::exit(0x100);
    }
    let mut file = match fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(PATH)
    {
        Ok(fle) => fle,
        Err(e) => {
            log::error!("Startup failure: Failed to open pid file: {}", e);
            process::exit(0x100);
        }
    };
    if let Err(e) = file.write_all(process::id().to_string().as_bytes()) {
        log::error!("Startup failure: Failed to write to pid file: {}", e);
        process::exit(0x100);
    }
    file
}
