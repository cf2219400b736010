/*
 * Created on Sat May 15 2021
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

use super::{Frame, ParseError, Parser};
use crate::corestore::Data;

fn bulk(s: &str) -> Frame {
    Frame::Bulk(Data::from(s))
}

/// Re-encode a frame the way a client would send it
fn encode(frame: &Frame) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(frame, &mut out);
    out
}

fn encode_into(frame: &Frame, out: &mut Vec<u8>) {
    match frame {
        Frame::Simple(s) => out.extend_from_slice(format!("+{}\r\n", s).as_bytes()),
        Frame::Error(e) => out.extend_from_slice(format!("-{}\r\n", e).as_bytes()),
        Frame::Integer(i) => out.extend_from_slice(format!(":{}\r\n", i).as_bytes()),
        Frame::Bulk(d) => {
            out.extend_from_slice(format!("${}\r\n", d.len()).as_bytes());
            out.extend_from_slice(d.as_ref());
            out.extend_from_slice(b"\r\n");
        }
        Frame::NullBulk => out.extend_from_slice(b"$-1\r\n"),
        Frame::Array(items) => {
            out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                encode_into(item, out);
            }
        }
        Frame::NullArray => out.extend_from_slice(b"*-1\r\n"),
    }
}

#[test]
fn test_simple_command() {
    let buf = b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n";
    let (frame, consumed) = Parser::parse(buf).unwrap();
    assert_eq!(consumed, buf.len());
    assert_eq!(
        frame,
        Frame::Array(vec![bulk("SET"), bulk("foo"), bulk("bar")])
    );
}

#[test]
fn test_partial_frame_across_reads() {
    // scenario straight out of a split socket read
    let mut buf = b"*3\r\n$3\r\nSET\r\n$1\r\nk".to_vec();
    assert_eq!(Parser::parse(&buf).unwrap_err(), ParseError::NotEnough);
    buf.extend_from_slice(b"\r\n$1\r\nv\r\n");
    let (frame, consumed) = Parser::parse(&buf).unwrap();
    assert_eq!(consumed, buf.len());
    assert_eq!(frame, Frame::Array(vec![bulk("SET"), bulk("k"), bulk("v")]));
}

#[test]
fn test_byte_at_a_time() {
    let full = b"*2\r\n$4\r\nLLEN\r\n$6\r\nmylist\r\n";
    for cut in 1..full.len() {
        assert_eq!(
            Parser::parse(&full[..cut]).unwrap_err(),
            ParseError::NotEnough,
            "prefix of {} bytes should be incomplete",
            cut
        );
    }
    assert!(Parser::parse(full).is_ok());
}

#[test]
fn test_pipelined_frames_consume_one_at_a_time() {
    let buf = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n";
    let (frame, consumed) = Parser::parse(buf).unwrap();
    assert_eq!(frame, Frame::Array(vec![bulk("PING")]));
    assert_eq!(consumed, 14);
    let (frame, consumed) = Parser::parse(&buf[14..]).unwrap();
    assert_eq!(frame, Frame::Array(vec![bulk("PING")]));
    assert_eq!(consumed, 14);
}

#[test]
fn test_scalar_frames() {
    assert_eq!(
        Parser::parse(b"+OK\r\n").unwrap(),
        (Frame::Simple("OK".to_owned()), 5)
    );
    assert_eq!(
        Parser::parse(b"-ERR oops\r\n").unwrap(),
        (Frame::Error("ERR oops".to_owned()), 11)
    );
    assert_eq!(Parser::parse(b":1000\r\n").unwrap(), (Frame::Integer(1000), 7));
    assert_eq!(Parser::parse(b":-42\r\n").unwrap(), (Frame::Integer(-42), 6));
}

#[test]
fn test_null_bulk_and_null_array() {
    assert_eq!(Parser::parse(b"$-1\r\n").unwrap(), (Frame::NullBulk, 5));
    assert_eq!(Parser::parse(b"*-1\r\n").unwrap(), (Frame::NullArray, 5));
    assert_eq!(
        Parser::parse(b"*0\r\n").unwrap(),
        (Frame::Array(Vec::new()), 4)
    );
}

#[test]
fn test_empty_bulk() {
    assert_eq!(Parser::parse(b"$0\r\n\r\n").unwrap(), (bulk(""), 6));
}

#[test]
fn test_binary_bulk_payload() {
    let buf = b"$4\r\n\x00\x01\x02\xff\r\n";
    let (frame, _) = Parser::parse(buf).unwrap();
    assert_eq!(
        frame,
        Frame::Bulk(Data::copy_from_slice(&[0x00, 0x01, 0x02, 0xff]))
    );
}

#[test]
fn test_nested_array() {
    let buf = b"*2\r\n*2\r\n:1\r\n:2\r\n$3\r\nend\r\n";
    let (frame, consumed) = Parser::parse(buf).unwrap();
    assert_eq!(consumed, buf.len());
    assert_eq!(
        frame,
        Frame::Array(vec![
            Frame::Array(vec![Frame::Integer(1), Frame::Integer(2)]),
            bulk("end")
        ])
    );
}

#[test]
fn test_inline_command() {
    let (frame, consumed) = Parser::parse(b"PING\r\n").unwrap();
    assert_eq!(consumed, 6);
    assert_eq!(frame, Frame::Array(vec![bulk("PING")]));
    let (frame, _) = Parser::parse(b"SET 'my key' \"my value\"\r\n").unwrap();
    assert_eq!(
        frame,
        Frame::Array(vec![bulk("SET"), bulk("my key"), bulk("my value")])
    );
}

#[test]
fn test_inline_incomplete() {
    assert_eq!(
        Parser::parse(b"SET foo bar").unwrap_err(),
        ParseError::NotEnough
    );
}

#[test]
fn test_bad_length_fields() {
    assert_eq!(Parser::parse(b"$abc\r\nxy\r\n").unwrap_err(), ParseError::BadPacket);
    assert_eq!(Parser::parse(b"*x\r\n").unwrap_err(), ParseError::BadPacket);
    assert_eq!(Parser::parse(b"$-4\r\n").unwrap_err(), ParseError::BadPacket);
}

#[test]
fn test_missing_crlf_after_bulk_payload() {
    assert_eq!(
        Parser::parse(b"$3\r\nfooXY").unwrap_err(),
        ParseError::BadPacket
    );
}

#[test]
fn test_bulk_length_limit() {
    let buf = format!("${}\r\n", (super::MAX_BULK_SIZE + 1) as u64);
    assert_eq!(
        Parser::parse(buf.as_bytes()).unwrap_err(),
        ParseError::DatatypeTooLarge
    );
}

#[test]
fn test_roundtrip() {
    let frames = vec![
        Frame::Simple("OK".to_owned()),
        Frame::Error("ERR bad".to_owned()),
        Frame::Integer(i64::MIN),
        bulk("hello"),
        Frame::NullBulk,
        Frame::NullArray,
        Frame::Array(vec![
            bulk("LPUSH"),
            bulk("list"),
            Frame::Array(vec![Frame::Integer(7), Frame::NullBulk]),
        ]),
    ];
    for frame in frames {
        let encoded = encode(&frame);
        let (parsed, consumed) = Parser::parse(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(parsed, frame);
    }
}

#[test]
fn test_into_command() {
    let (frame, _) = Parser::parse(b"*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n").unwrap();
    let cmd = frame.into_command().unwrap();
    assert_eq!(cmd, vec![Data::from("ECHO"), Data::from("hi")]);
    let (frame, _) = Parser::parse(b":10\r\n").unwrap();
    assert!(frame.into_command().is_err());
    let (frame, _) = Parser::parse(b"*1\r\n:10\r\n").unwrap();
    assert!(frame.into_command().is_err());
}
