//! IPC compression.
//!
//! The server applies an LZ-style scheme to large payloads: after the
//! 8-byte frame header, the compressed body starts with a 4-byte
//! uncompressed-total-length prefix followed by a bitstream of control
//! bytes. Each control byte's bits (LSB first) select, for the next 8
//! tokens, a literal byte (0) or a back-reference (1) encoded as a
//! `(hash-index, extra-length)` pair against a 256-entry hash table keyed
//! by the XOR of consecutive output byte pairs. The table is updated as
//! output is produced, so both sides stay in lockstep.
//!
//! The decompressor is byte-exact with the reference implementation and
//! rejects malformed input instead of panicking. The compressor mirrors the
//! reference, including its bail-outs: tiny messages and bodies that fail
//! to shrink are sent uncompressed.

use qmodel_core::{Error, Result};

use super::{pack_header, MsgType, HEADER_SIZE, LITTLE_ENDIAN};

/// Compress a full message (header included). Returns the compressed body
/// (uncompressed-length prefix + bitstream), or `None` when compression is
/// not beneficial.
pub fn compress(data: &[u8]) -> Option<Vec<u8>> {
    let t = data.len();
    if t <= 17 {
        return None;
    }
    let e = t / 2;
    if e < 22 {
        return None;
    }

    let y = data;
    let mut out = vec![0u8; e];
    out[..4].copy_from_slice(&(t as i32).to_le_bytes());

    let mut c = 4usize; // position of the current control byte
    let mut d = c; // output cursor
    let mut s = 8usize; // source cursor (past the frame header)
    let mut i = 0usize; // bit within the control byte; wraps at 256
    let mut f = 0u8; // control byte accumulator
    let mut s0 = 0usize; // deferred hash update: source position
    let mut h0 = 0usize; // deferred hash update: hash slot
    let mut h = 0usize;
    let mut p = 0usize;
    let mut table = [0usize; 256];

    while s < t {
        if i == 0 {
            if d > e - 17 {
                return None; // output would not fit; send uncompressed
            }
            i = 1;
            out[c] = f;
            c = d;
            d += 1;
            f = 0;
        }

        // A match needs at least 3 source bytes and a previous occurrence
        // of the same starting byte at the hashed slot.
        let literal = if s > t - 3 {
            true
        } else {
            h = (y[s] ^ y[s + 1]) as usize;
            p = table[h];
            p == 0 || y[s] != y[p]
        };

        if s0 > 0 {
            table[h0] = s0;
            s0 = 0;
        }

        if literal {
            h0 = h;
            s0 = s;
            out[d] = y[s];
            d += 1;
            s += 1;
        } else {
            table[h] = s;
            f |= i as u8;
            p += 2;
            let run_start = s + 2;
            s += 2;
            let limit = (s + 255).min(t);
            while s < limit && y[p] == y[s] {
                p += 1;
                s += 1;
            }
            out[d] = h as u8;
            d += 1;
            out[d] = (s - run_start) as u8;
            d += 1;
        }

        i = (i * 2) & 0xFF;
    }

    out[c] = f;
    if d >= t {
        return None;
    }
    out.truncate(d);
    Some(out)
}

/// Compress a full message in place: returns a complete compressed frame
/// (new header with the compression flag set) when beneficial, otherwise
/// the original bytes.
pub fn compress_message(data: Vec<u8>) -> Vec<u8> {
    if data.len() < HEADER_SIZE {
        return data;
    }
    match compress(&data) {
        Some(body) => {
            let msg_type = MsgType::from_byte(data[1]).unwrap_or(MsgType::Sync);
            let total = (HEADER_SIZE + body.len()) as u32;
            let mut header = pack_header(msg_type, total);
            header[2] = 1;
            let mut out = Vec::with_capacity(total as usize);
            out.extend_from_slice(&header);
            out.extend_from_slice(&body);
            out
        }
        None => data,
    }
}

/// Decompress a compressed body (everything after the frame header).
///
/// Returns the full uncompressed message with the original header
/// reconstructed in the first 8 bytes: same endianness and message kind,
/// compression flag cleared, length replaced by the uncompressed total.
pub fn decompress(body: &[u8], header: &[u8]) -> Result<Vec<u8>> {
    if body.len() < 8 {
        return Err(Error::deserialize(format!(
            "compressed body too short: {} bytes",
            body.len()
        )));
    }
    let le = header.first().map_or(true, |b| *b == LITTLE_ENDIAN);
    let len_bytes: [u8; 4] = body[..4].try_into().unwrap_or_default();
    let total = if le {
        i32::from_le_bytes(len_bytes)
    } else {
        i32::from_be_bytes(len_bytes)
    };
    if total < 9 {
        return Err(Error::deserialize(format!(
            "compressed body declares uncompressed length {total}"
        )));
    }
    let total = total as usize;

    let mut dst = vec![0u8; total];
    if header.len() >= HEADER_SIZE {
        dst[0] = header[0];
        dst[1] = header[1];
        let len = total as u32;
        let len = if le {
            len.to_le_bytes()
        } else {
            len.to_be_bytes()
        };
        dst[4..8].copy_from_slice(&len);
    }

    let mut table = [0usize; 256];
    let mut extra = 0usize; // run length beyond the first two copied bytes
    let mut f = 0usize; // current control byte
    let mut s = 8usize; // output cursor (header occupies 0..8)
    let mut p = 8usize; // hash update cursor
    let mut i = 0usize; // control bit; 0 means a fresh control byte is due
    let mut d = 4usize; // input cursor (past the length prefix)

    while s < total {
        if i == 0 {
            if d >= body.len() {
                break;
            }
            f = body[d] as usize;
            d += 1;
            i = 1;
        }

        if f & i != 0 {
            if d + 1 >= body.len() {
                return Err(Error::deserialize("truncated back-reference"));
            }
            let mut r = table[body[d] as usize];
            d += 1;
            if r >= s {
                return Err(Error::deserialize("back-reference ahead of output"));
            }
            dst[s] = dst[r];
            s += 1;
            r += 1;
            dst[s] = dst[r];
            s += 1;
            r += 1;
            extra = body[d] as usize;
            d += 1;
            if s + extra > total {
                return Err(Error::deserialize("back-reference overruns output"));
            }
            // Byte-by-byte: runs may overlap their own output.
            for m in 0..extra {
                dst[s + m] = dst[r + m];
            }
        } else {
            if d >= body.len() {
                break;
            }
            dst[s] = body[d];
            s += 1;
            d += 1;
        }

        while p < s - 1 {
            table[(dst[p] ^ dst[p + 1]) as usize] = p;
            p += 1;
        }

        if f & i != 0 {
            s += extra;
            p = s;
        }

        i *= 2;
        if i == 256 {
            i = 0;
        }
    }

    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::super::{decode_message, MsgType, Serializer};
    use super::*;
    use qmodel_core::{Value, Vector};

    fn ones_message(n: usize) -> Vec<u8> {
        let mut ser = Serializer::new();
        ser.serialize_message(
            &Value::Vector(Vector::longs(vec![1i64; n])),
            MsgType::Response,
        )
        .unwrap()
    }

    #[test]
    fn repetitive_payload_compresses() {
        let msg = ones_message(10_000);
        let compressed = compress_message(msg.clone());
        assert!(compressed.len() < msg.len() / 4);
        assert_eq!(compressed[2], 1);
    }

    #[test]
    fn compressed_roundtrip_is_exact() {
        let msg = ones_message(10_000);
        let compressed = compress_message(msg.clone());
        let restored =
            decompress(&compressed[HEADER_SIZE..], &compressed[..HEADER_SIZE]).unwrap();
        assert_eq!(restored, msg);
    }

    #[test]
    fn decode_handles_compressed_frames_end_to_end() {
        let msg = ones_message(10_000);
        let compressed = compress_message(msg);
        let (msg_type, value) = decode_message(&compressed).unwrap();
        assert_eq!(msg_type, MsgType::Response);
        match value {
            Value::Vector(v) => {
                assert_eq!(v.len(), 10_000);
                assert_eq!(v.get(0), Some(Value::Long(1)));
                assert_eq!(v.get(9_999), Some(Value::Long(1)));
            }
            other => panic!("expected vector, got {other:?}"),
        }
    }

    #[test]
    fn incompressible_payload_stays_uncompressed() {
        // A pseudo-random body defeats the matcher; the frame passes
        // through untouched.
        let mut ser = Serializer::new();
        let mut state = 0x2545_F491_4F6C_DD1Du64;
        let noise: Vec<i64> = (0..64)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as i64
            })
            .collect();
        let msg = ser
            .serialize_message(&Value::Vector(Vector::longs(noise)), MsgType::Sync)
            .unwrap();
        let out = compress_message(msg.clone());
        assert_eq!(out, msg);
    }

    #[test]
    fn tiny_messages_are_never_compressed() {
        let msg = ones_message(1);
        assert_eq!(compress_message(msg.clone()), msg);
    }

    #[test]
    fn mixed_content_roundtrips() {
        let mut ser = Serializer::new();
        let value = Value::List(vec![
            Value::string("abcabcabcabcabcabcabcabcabcabc"),
            Value::Vector(Vector::symbols(vec!["AAPL".into(); 100])),
            Value::Vector(Vector::floats(vec![1.5; 200])),
        ]);
        let msg = ser.serialize_message(&value, MsgType::Response).unwrap();
        let compressed = compress_message(msg.clone());
        assert!(compressed[2] == 1, "expected compression to engage");
        let (_, decoded) = decode_message(&compressed).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn malformed_input_errors_instead_of_panicking() {
        assert!(decompress(&[0, 0], &[]).is_err());
        // Declares 100 output bytes but provides no stream.
        let mut body = 100i32.to_le_bytes().to_vec();
        body.extend_from_slice(&[0xFF, 0x00, 0x00, 0x00]);
        let _ = decompress(&body, &[]); // must not panic
        // Negative declared length.
        let body = (-5i32).to_le_bytes().to_vec();
        assert!(decompress(&[body, vec![0; 8]].concat(), &[]).is_err());
    }
}
