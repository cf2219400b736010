/*
 * Created on Mon Jul 19 2021
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

//! # Configuration
//!
//! Settings come from two sources: an optional configuration file of
//! whitespace-separated `key value` lines (`#` starts a comment) and the
//! command line flags, which win over the file. Unrecognized file keys
//! are skipped, like the original `redis.conf` reader does for foreign
//! directives.

use core::str::FromStr;
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

#[cfg(test)]
mod tests;

// server defaults
const DEFAULT_IPV4: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
const DEFAULT_PORT: u16 = 6379;
const DEFAULT_MAX_CLIENTS: usize = 10000;
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_RDB_FILENAME: &str = "dump.rdb";
const DEFAULT_DATABASES: usize = 16;

pub const HELP_TEXT: &str = "\
sabled - an in-memory data structure server speaking RESP2

USAGE:
    sabled [OPTIONS]

OPTIONS:
    --host <addr>               Address to bind to (default 127.0.0.1)
    -p, --port <port>           Port to listen on (default 6379)
    -l, --loglevel <level>      debug|info|warning|error (default info)
    -c, --config <file>         Read settings from a configuration file
    -h, --help                  Print this help text
    -v, --version               Print the version
";

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    CliArg(String),
    FileIo(String),
    BadValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CliArg(e) => write!(f, "CLI argument error: {}", e),
            Self::FileIo(e) => write!(f, "Configuration file error: {}", e),
            Self::BadValue(e) => write!(f, "Bad configuration value: {}", e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// The `env_logger` filter string for this level
    pub fn filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();
    fn from_str(st: &str) -> Result<Self, Self::Err> {
        match st.to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            _ => Err(()),
        }
    }
}

/// One `(seconds, changes)` save trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePoint {
    pub seconds: u64,
    pub changes: usize,
}

fn default_save_points() -> Vec<SavePoint> {
    vec![
        SavePoint {
            seconds: 900,
            changes: 1,
        },
        SavePoint {
            seconds: 300,
            changes: 10,
        },
        SavePoint {
            seconds: 60,
            changes: 10000,
        },
    ]
}

/// The complete, resolved server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSet {
    pub host: IpAddr,
    pub port: u16,
    pub max_clients: usize,
    /// idle-connection timeout in seconds; 0 disables it
    pub timeout: u64,
    pub data_dir: PathBuf,
    pub rdb_filename: String,
    /// advisory only: surfaced through `CONFIG GET`, not enforced
    pub maxmemory: u64,
    pub loglevel: LogLevel,
    pub logfile: Option<PathBuf>,
    /// `SELECT` accepts indexes below this; one logical keyspace backs
    /// them all
    pub databases: usize,
    pub save_points: Vec<SavePoint>,
}

impl Default for ConfigSet {
    fn default() -> Self {
        ConfigSet {
            host: DEFAULT_IPV4,
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            timeout: 0,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            rdb_filename: DEFAULT_RDB_FILENAME.to_owned(),
            maxmemory: 0,
            loglevel: LogLevel::Info,
            logfile: None,
            databases: DEFAULT_DATABASES,
            save_points: default_save_points(),
        }
    }
}

impl ConfigSet {
    pub fn rdb_path(&self) -> PathBuf {
        self.data_dir.join(&self.rdb_filename)
    }
    pub fn rdb_tmp_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.tmp", self.rdb_filename))
    }
    /// Every recognized parameter as `(key, value)` strings, the shape
    /// `CONFIG GET` wants
    pub fn parameters(&self) -> Vec<(String, String)> {
        let save = self
            .save_points
            .iter()
            .map(|sp| format!("{} {}", sp.seconds, sp.changes))
            .collect::<Vec<String>>()
            .join(" ");
        vec![
            ("host".to_owned(), self.host.to_string()),
            ("port".to_owned(), self.port.to_string()),
            ("max_clients".to_owned(), self.max_clients.to_string()),
            ("timeout".to_owned(), self.timeout.to_string()),
            (
                "data_dir".to_owned(),
                self.data_dir.display().to_string(),
            ),
            ("rdb_filename".to_owned(), self.rdb_filename.clone()),
            ("maxmemory".to_owned(), self.maxmemory.to_string()),
            ("loglevel".to_owned(), self.loglevel.name().to_owned()),
            (
                "logfile".to_owned(),
                self.logfile
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ),
            ("databases".to_owned(), self.databases.to_string()),
            ("save".to_owned(), save),
        ]
    }
    /// Apply the `key value` lines of a configuration file on top of this
    /// set. Unknown keys are skipped
    pub fn apply_file(&mut self, contents: &str) -> Result<(), ConfigError> {
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = match line.split_once(char::is_whitespace) {
                Some((key, value)) => (key.to_lowercase(), value.trim()),
                None => continue,
            };
            match key.as_str() {
                "host" => self.host = parse_value(&key, value)?,
                "port" => self.port = parse_value(&key, value)?,
                "max_clients" => self.max_clients = parse_value(&key, value)?,
                "timeout" => self.timeout = parse_value(&key, value)?,
                "data_dir" => self.data_dir = PathBuf::from(value.trim_matches('"')),
                "rdb_filename" => self.rdb_filename = value.trim_matches('"').to_owned(),
                "maxmemory" => self.maxmemory = parse_value(&key, value)?,
                "loglevel" => self.loglevel = parse_value(&key, value)?,
                "logfile" => {
                    let value = value.trim_matches('"');
                    self.logfile = if value.is_empty() {
                        None
                    } else {
                        Some(PathBuf::from(value))
                    };
                }
                "databases" => {
                    let databases: usize = parse_value(&key, value)?;
                    if databases == 0 {
                        return Err(ConfigError::BadValue(
                            "databases must be at least 1".to_owned(),
                        ));
                    }
                    self.databases = databases;
                }
                "save" => self.save_points = parse_save_points(value)?,
                // foreign directives are skipped
                _ => {}
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::BadValue(format!("cannot parse '{}' for key '{}'", value, key)))
}

/// `save "900 1 300 10"` or `save ""` to disable
fn parse_save_points(value: &str) -> Result<Vec<SavePoint>, ConfigError> {
    let value = value.trim_matches('"');
    let numbers: Vec<&str> = value.split_whitespace().collect();
    if numbers.is_empty() {
        return Ok(Vec::new());
    }
    if numbers.len() % 2 != 0 {
        return Err(ConfigError::BadValue(
            "save expects pairs of <seconds> <changes>".to_owned(),
        ));
    }
    let mut save_points = Vec::with_capacity(numbers.len() / 2);
    for pair in numbers.chunks_exact(2) {
        save_points.push(SavePoint {
            seconds: parse_value("save", pair[0])?,
            changes: parse_value("save", pair[1])?,
        });
    }
    Ok(save_points)
}

/// What the command line resolved to
#[derive(Debug, PartialEq)]
pub enum ConfigType {
    Run(ConfigSet),
    Help,
    Version,
}

/// Parse the command line (without the binary name). Flags override
/// whatever a `--config` file sets
pub fn parse_cli_args<T: IntoIterator<Item = String>>(args: T) -> Result<ConfigType, ConfigError> {
    let mut host: Option<IpAddr> = None;
    let mut port: Option<u16> = None;
    let mut loglevel: Option<LogLevel> = None;
    let mut config_file: Option<String> = None;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let mut take_value = |flag: &str| {
            iter.next()
                .ok_or_else(|| ConfigError::CliArg(format!("{} expects a value", flag)))
        };
        match arg.as_str() {
            "-h" | "--help" => return Ok(ConfigType::Help),
            "-v" | "--version" => return Ok(ConfigType::Version),
            "--host" => {
                let value = take_value("--host")?;
                host = Some(value.parse().map_err(|_| {
                    ConfigError::BadValue(format!("'{}' is not a valid address", value))
                })?);
            }
            "-p" | "--port" => {
                let value = take_value("--port")?;
                port = Some(value.parse().map_err(|_| {
                    ConfigError::BadValue(format!("'{}' is not a valid port", value))
                })?);
            }
            "-l" | "--loglevel" => {
                let value = take_value("--loglevel")?;
                loglevel = Some(value.parse().map_err(|_| {
                    ConfigError::BadValue(format!(
                        "'{}' is not one of debug|info|warning|error",
                        value
                    ))
                })?);
            }
            "-c" | "--config" => config_file = Some(take_value("--config")?),
            unknown => {
                return Err(ConfigError::CliArg(format!(
                    "unexpected argument '{}'",
                    unknown
                )))
            }
        }
    }
    let mut cfg = ConfigSet::default();
    if let Some(path) = config_file {
        let contents = fs::read_to_string(&path)
            .map_err(|e| ConfigError::FileIo(format!("cannot read '{}': {}", path, e)))?;
        cfg.apply_file(&contents)?;
    }
    if let Some(host) = host {
        cfg.host = host;
    }
    if let Some(port) = port {
        cfg.port = port;
    }
    if let Some(loglevel) = loglevel {
        cfg.loglevel = loglevel;
    }
    Ok(ConfigType::Run(cfg))
}
