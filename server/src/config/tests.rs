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

use super::*;

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

#[test]
fn test_defaults() {
    let cfg = ConfigSet::default();
    assert_eq!(cfg.host, DEFAULT_IPV4);
    assert_eq!(cfg.port, 6379);
    assert_eq!(cfg.timeout, 0);
    assert_eq!(cfg.save_points.len(), 3);
    assert_eq!(cfg.rdb_path(), PathBuf::from("./data/dump.rdb"));
    assert_eq!(cfg.rdb_tmp_path(), PathBuf::from("./data/dump.rdb.tmp"));
}

#[test]
fn test_cli_flags() {
    let parsed = parse_cli_args(args(&["--host", "0.0.0.0", "-p", "7878", "-l", "warning"]));
    match parsed {
        Ok(ConfigType::Run(cfg)) => {
            assert_eq!(cfg.host.to_string(), "0.0.0.0");
            assert_eq!(cfg.port, 7878);
            assert_eq!(cfg.loglevel, LogLevel::Warning);
        }
        other => panic!("unexpected parse outcome: {:?}", other),
    }
}

#[test]
fn test_cli_help_version_and_errors() {
    assert_eq!(parse_cli_args(args(&["--help"])), Ok(ConfigType::Help));
    assert_eq!(parse_cli_args(args(&["-v"])), Ok(ConfigType::Version));
    assert!(parse_cli_args(args(&["--port"])).is_err());
    assert!(parse_cli_args(args(&["--port", "notaport"])).is_err());
    assert!(parse_cli_args(args(&["--frobnicate"])).is_err());
}

#[test]
fn test_file_parsing() {
    let mut cfg = ConfigSet::default();
    cfg.apply_file(
        "# sable configuration\n\
         host 0.0.0.0\n\
         port 7000\n\
         max_clients 512\n\
         timeout 300\n\
         data_dir /var/lib/sable\n\
         rdb_filename snapshot.rdb\n\
         maxmemory 1048576\n\
         loglevel debug\n\
         logfile \"/var/log/sable.log\"\n\
         databases 4\n\
         save 100 5 10 1000\n\
         \n\
         some_foreign_directive yes\n",
    )
    .unwrap();
    assert_eq!(cfg.host.to_string(), "0.0.0.0");
    assert_eq!(cfg.port, 7000);
    assert_eq!(cfg.max_clients, 512);
    assert_eq!(cfg.timeout, 300);
    assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/sable"));
    assert_eq!(cfg.rdb_filename, "snapshot.rdb");
    assert_eq!(cfg.maxmemory, 1048576);
    assert_eq!(cfg.loglevel, LogLevel::Debug);
    assert_eq!(cfg.logfile, Some(PathBuf::from("/var/log/sable.log")));
    assert_eq!(cfg.databases, 4);
    assert_eq!(
        cfg.save_points,
        vec![
            SavePoint {
                seconds: 100,
                changes: 5
            },
            SavePoint {
                seconds: 10,
                changes: 1000
            }
        ]
    );
}

#[test]
fn test_save_disable_and_bad_values() {
    let mut cfg = ConfigSet::default();
    cfg.apply_file("save \"\"\n").unwrap();
    assert!(cfg.save_points.is_empty());
    let mut cfg = ConfigSet::default();
    assert!(cfg.apply_file("save 900\n").is_err());
    assert!(cfg.apply_file("port hello\n").is_err());
    assert!(cfg.apply_file("databases 0\n").is_err());
}

#[test]
fn test_parameters_cover_every_key() {
    let cfg = ConfigSet::default();
    let params = cfg.parameters();
    for key in [
        "host",
        "port",
        "max_clients",
        "timeout",
        "data_dir",
        "rdb_filename",
        "maxmemory",
        "loglevel",
        "logfile",
        "databases",
        "save",
    ] {
        assert!(
            params.iter().any(|(k, _)| k == key),
            "missing parameter {}",
            key
        );
    }
}
