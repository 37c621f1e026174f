//! Length-prefixed frame codec.
//!
//! Log layout:
//! ```text
//! ┌──────────────────┬────────────────────────────┬──────────────────┬─────
//! │ varint len (1-10)│ payload (len bytes)        │ varint len       │ ...
//! │ LEB128, minimal  │ protobuf(DataPoint)        │                  │
//! └──────────────────┴────────────────────────────┴──────────────────┴─────
//! ```
//! No header, footer or checksum: corruption only shows up as a decode failure.

use std::io::{self, Read};

use prost::Message;
use thiserror::Error;

use crate::storage::model::TelemetryRecord;
use crate::storage::wire::DataPoint;

/// Longest valid varint encoding of a u64.
pub const MAX_VARINT_LEN: usize = 10;

/// Structural frame decoding failure.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Input ended before the declared frame (or its length prefix) was complete.
    #[error("truncated frame: needed {needed} bytes, {available} available")]
    Truncated { needed: u64, available: u64 },
    /// Length prefix or payload is not a valid record.
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// The underlying reader failed.
    #[error("I/O error while reading frame: {0}")]
    Io(#[from] io::Error),
}

/// Appends the minimal LEB128 encoding of `value` to `buf`.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push(((value as u8) & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Decodes a LEB128 varint from the start of `buf`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize), FrameError> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        // The tenth byte may only carry the top bit of a u64.
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(FrameError::Malformed(format!(
                "length prefix does not terminate within {} bytes",
                MAX_VARINT_LEN
            )));
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(FrameError::Truncated {
        needed: buf.len() as u64 + 1,
        available: buf.len() as u64,
    })
}

/// Serializes a record into one frame.
pub fn encode(record: &TelemetryRecord) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_into(record, &mut buf);
    buf
}

/// Appends one frame for `record` to `buf`.
pub fn encode_into(record: &TelemetryRecord, buf: &mut Vec<u8>) {
    let payload = DataPoint::from(record).encode_to_vec();
    buf.reserve(MAX_VARINT_LEN + payload.len());
    encode_varint(payload.len() as u64, buf);
    buf.extend_from_slice(&payload);
}

/// Decodes the frame at the start of `buf`.
///
/// Returns the record and the total number of bytes consumed (prefix + payload).
pub fn decode(buf: &[u8]) -> Result<(TelemetryRecord, usize), FrameError> {
    let (len, prefix_len) = decode_varint(buf)?;
    let available = (buf.len() - prefix_len) as u64;
    if available < len {
        return Err(FrameError::Truncated {
            needed: len,
            available,
        });
    }
    // len <= available, so it fits in usize
    let end = prefix_len + len as usize;
    let record = decode_payload(&buf[prefix_len..end])?;
    Ok((record, end))
}

/// Reads one frame from a stream.
///
/// Returns `Ok(None)` when the stream ends exactly at a frame boundary.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<(TelemetryRecord, usize)>, FrameError> {
    let Some((len, prefix_len)) = read_length_prefix(reader)? else {
        return Ok(None);
    };

    let mut payload = Vec::new();
    let read = (&mut *reader).take(len).read_to_end(&mut payload)?;
    if (read as u64) < len {
        return Err(FrameError::Truncated {
            needed: len,
            available: read as u64,
        });
    }

    let record = decode_payload(&payload)?;
    Ok(Some((record, prefix_len + read)))
}

fn read_length_prefix<R: Read>(reader: &mut R) -> Result<Option<(u64, usize)>, FrameError> {
    let mut prefix = [0u8; MAX_VARINT_LEN];
    for i in 0..MAX_VARINT_LEN {
        match read_byte(reader)? {
            Some(byte) => {
                prefix[i] = byte;
                if byte & 0x80 == 0 {
                    return decode_varint(&prefix[..=i]).map(Some);
                }
            }
            None if i == 0 => return Ok(None),
            None => return decode_varint(&prefix[..i]).map(Some),
        }
    }
    // Ten continuation bytes: decode_varint reports it as malformed.
    decode_varint(&prefix).map(Some)
}

fn read_byte<R: Read>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

fn decode_payload(payload: &[u8]) -> Result<TelemetryRecord, FrameError> {
    let point = DataPoint::decode(payload).map_err(|e| FrameError::Malformed(e.to_string()))?;
    let record = TelemetryRecord::from(point);
    record.validate().map_err(FrameError::Malformed)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::model::{DiskIo, MemoryUsage, NetworkIo};

    fn sample_record(timestamp: u64) -> TelemetryRecord {
        TelemetryRecord {
            timestamp,
            cpu_load: vec![1250, 9999, 0, 10000],
            memory: MemoryUsage {
                used: 8 * 1024 * 1024 * 1024,
                free: 512 * 1024 * 1024,
            },
            disks: vec![
                DiskIo {
                    name: "sda".into(),
                    read_bytes: 80,
                    write_bytes: 0,
                },
                DiskIo {
                    name: "nvme0n1".into(),
                    read_bytes: 1 << 20,
                    write_bytes: 4096,
                },
            ],
            network: NetworkIo {
                bytes_sent: 1500,
                bytes_received: 64_000,
            },
        }
    }

    /// Payload past 127 bytes, so the length prefix spans two bytes.
    fn large_record(timestamp: u64) -> TelemetryRecord {
        TelemetryRecord {
            cpu_load: vec![9999; 300],
            ..sample_record(timestamp)
        }
    }

    #[test]
    fn varint_minimal_encoding() {
        let cases: [(u64, &[u8]); 6] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (300, &[0xAC, 0x02]),
            (16_384, &[0x80, 0x80, 0x01]),
        ];
        for (value, expected) in cases {
            let mut buf = Vec::new();
            encode_varint(value, &mut buf);
            assert_eq!(buf, expected, "value {}", value);
        }

        let mut buf = Vec::new();
        encode_varint(u64::MAX, &mut buf);
        assert_eq!(buf.len(), MAX_VARINT_LEN);
        assert_eq!(decode_varint(&buf).unwrap(), (u64::MAX, MAX_VARINT_LEN));
    }

    #[test]
    fn varint_stops_at_first_terminated_byte() {
        let (value, used) = decode_varint(&[0xAC, 0x02, 0xFF, 0xFF]).unwrap();
        assert_eq!(value, 300);
        assert_eq!(used, 2);
    }

    #[test]
    fn varint_unterminated_is_malformed() {
        let buf = [0xFFu8; 11];
        assert!(matches!(decode_varint(&buf), Err(FrameError::Malformed(_))));
        // ten bytes where the last one overflows u64
        let mut overflow = [0x80u8; 10];
        overflow[9] = 0x02;
        assert!(matches!(
            decode_varint(&overflow),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn varint_cut_short_is_truncated() {
        assert!(matches!(
            decode_varint(&[0x80, 0x80]),
            Err(FrameError::Truncated { available: 2, .. })
        ));
        assert!(matches!(
            decode_varint(&[]),
            Err(FrameError::Truncated { available: 0, .. })
        ));
    }

    #[test]
    fn round_trip() {
        for record in [
            TelemetryRecord::default(),
            sample_record(1_700_000_000),
            TelemetryRecord {
                timestamp: u64::MAX,
                cpu_load: vec![10000; 128],
                ..TelemetryRecord::default()
            },
        ] {
            let frame = encode(&record);
            let (decoded, consumed) = decode(&frame).unwrap();
            assert_eq!(decoded, record);
            assert_eq!(consumed, frame.len());
        }
    }

    #[test]
    fn frame_starts_with_minimal_length_prefix() {
        let frame = encode(&sample_record(42));
        let payload_len = DataPoint::from(&sample_record(42)).encoded_len();
        let mut prefix = Vec::new();
        encode_varint(payload_len as u64, &mut prefix);
        assert_eq!(&frame[..prefix.len()], prefix.as_slice());
        assert_eq!(frame.len(), prefix.len() + payload_len);
    }

    #[test]
    fn concatenated_frames_decode_in_order() {
        let mut buf = Vec::new();
        for ts in [100, 200, 300, 400] {
            encode_into(&sample_record(ts), &mut buf);
        }

        let mut rest = buf.as_slice();
        let mut timestamps = Vec::new();
        while !rest.is_empty() {
            let (record, consumed) = decode(rest).unwrap();
            timestamps.push(record.timestamp);
            rest = &rest[consumed..];
        }
        assert_eq!(timestamps, vec![100, 200, 300, 400]);
    }

    #[test]
    fn truncation_anywhere_inside_frame_is_detected() {
        let large = encode(&large_record(7));
        assert_ne!(large[0] & 0x80, 0);

        for frame in [encode(&sample_record(7)), large] {
            for cut in 0..frame.len() {
                match decode(&frame[..cut]) {
                    Err(FrameError::Truncated { .. }) => {}
                    other => panic!(
                        "cut at {} of {} gave {:?}",
                        cut,
                        frame.len(),
                        other.map(|(r, n)| (r.timestamp, n))
                    ),
                }
            }
        }
    }

    #[test]
    fn streaming_read_matches_slice_decode() {
        let mut buf = Vec::new();
        encode_into(&sample_record(1), &mut buf);
        encode_into(&sample_record(2), &mut buf);

        let mut cursor = io::Cursor::new(&buf);
        let (first, n1) = read_frame(&mut cursor).unwrap().unwrap();
        let (second, n2) = read_frame(&mut cursor).unwrap().unwrap();
        assert_eq!(first.timestamp, 1);
        assert_eq!(second.timestamp, 2);
        assert_eq!(n1 + n2, buf.len());
        assert!(read_frame(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn streaming_truncation_inside_prefix_and_payload() {
        let large = encode(&large_record(9));
        assert_ne!(large[0] & 0x80, 0);

        for frame in [encode(&sample_record(9)), large] {
            for cut in 1..frame.len() {
                let mut cursor = io::Cursor::new(&frame[..cut]);
                assert!(
                    matches!(read_frame(&mut cursor), Err(FrameError::Truncated { .. })),
                    "cut at {} of {}",
                    cut,
                    frame.len()
                );
            }
        }
    }

    #[test]
    fn large_frame_round_trips_through_stream() {
        let record = large_record(11);
        let frame = encode(&record);
        let mut cursor = io::Cursor::new(&frame);
        let (decoded, consumed) = read_frame(&mut cursor).unwrap().unwrap();
        assert_eq!(decoded, record);
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn garbage_payload_is_malformed() {
        // declared length 2, payload is a field with an invalid wire type (7)
        let buf = [0x02, 0x0F, 0x00];
        assert!(matches!(decode(&buf), Err(FrameError::Malformed(_))));
    }

    #[test]
    fn out_of_range_cpu_load_is_malformed() {
        let bad = TelemetryRecord {
            cpu_load: vec![20_000],
            ..TelemetryRecord::default()
        };
        let frame = encode(&bad);
        assert!(matches!(decode(&frame), Err(FrameError::Malformed(_))));
    }
}
