//! Schema registry wire framing.
//!
//! ```text
//! +-------+----------------------+-------------------------+------+
//! | 0x00  | schema id (u32, BE)  | message indexes (proto) | body |
//! +-------+----------------------+-------------------------+------+
//! ```
//!
//! Protobuf payloads carry the path of the encoded message inside its schema
//! as zig-zag varints: a count followed by the indexes. The common path `[0]`
//! is written as a single `0`.

use crate::error::CodecError;
use kafka_types::Format;
use protobuf::{CodedInputStream, CodedOutputStream};

pub const MAGIC_BYTE: u8 = 0;

const HEADER_LEN: usize = 5;

pub fn frame(schema_id: u32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.push(MAGIC_BYTE);
    out.extend_from_slice(&schema_id.to_be_bytes());
    out.extend_from_slice(body);
    out
}

pub fn frame_with_indexes(
    schema_id: u32,
    indexes: &[i32],
    body: &[u8],
) -> Result<Vec<u8>, CodecError> {
    let mut prefix = Vec::new();
    write_indexes(&mut prefix, indexes).map_err(|e| CodecError::failure(Format::Protobuf, e))?;
    let mut out = Vec::with_capacity(HEADER_LEN + prefix.len() + body.len());
    out.push(MAGIC_BYTE);
    out.extend_from_slice(&schema_id.to_be_bytes());
    out.extend_from_slice(&prefix);
    out.extend_from_slice(body);
    Ok(out)
}

fn write_indexes(out: &mut Vec<u8>, indexes: &[i32]) -> protobuf::Result<()> {
    let mut os = CodedOutputStream::vec(out);
    if indexes == [0] {
        os.write_sint32_no_tag(0)?;
    } else {
        os.write_sint32_no_tag(indexes.len() as i32)?;
        for index in indexes {
            os.write_sint32_no_tag(*index)?;
        }
    }
    os.flush()
}

fn read_indexes(is: &mut CodedInputStream<'_>) -> protobuf::Result<Vec<i32>> {
    let count = is.read_sint32()?;
    if count == 0 {
        return Ok(vec![0]);
    }
    (0..count).map(|_| is.read_sint32()).collect()
}

/// Split a framed payload into its schema id and the remaining bytes.
pub fn unframe(format: Format, bytes: &[u8]) -> Result<(u32, &[u8]), CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::failure(
            format,
            format!("payload too short for wire header: {} bytes", bytes.len()),
        ));
    }
    if bytes[0] != MAGIC_BYTE {
        return Err(CodecError::failure(
            format,
            format!("unknown magic byte {:#04x}", bytes[0]),
        ));
    }
    let id = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    Ok((id, &bytes[HEADER_LEN..]))
}

/// Read the protobuf message index path from the front of `bytes`.
pub fn read_message_indexes(bytes: &[u8]) -> Result<(Vec<i32>, &[u8]), CodecError> {
    let mut is = CodedInputStream::from_bytes(bytes);
    let indexes = read_indexes(&mut is).map_err(|e| CodecError::failure(Format::Protobuf, e))?;
    if indexes.is_empty() || indexes.iter().any(|index| *index < 0) {
        return Err(CodecError::failure(
            Format::Protobuf,
            format!("invalid message indexes {indexes:?}"),
        ));
    }
    let consumed = is.pos() as usize;
    Ok((indexes, &bytes[consumed..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let framed = frame(258, b"body");
        assert_eq!(framed, vec![0, 0, 0, 1, 2, b'b', b'o', b'd', b'y']);
        let (id, body) = unframe(Format::Avro, &framed).unwrap();
        assert_eq!(id, 258);
        assert_eq!(body, b"body");
    }

    #[test]
    fn test_unframe_rejects_bad_input() {
        assert!(unframe(Format::Json, &[0, 0, 1]).is_err());
        assert!(unframe(Format::Json, &[1, 0, 0, 0, 1, 7]).is_err());
    }

    #[test]
    fn test_first_message_index_is_single_zero() {
        let framed = frame_with_indexes(1, &[0], b"x").unwrap();
        assert_eq!(framed, vec![0, 0, 0, 0, 1, 0, b'x']);

        let (_, rest) = unframe(Format::Protobuf, &framed).unwrap();
        let (indexes, body) = read_message_indexes(rest).unwrap();
        assert_eq!(indexes, vec![0]);
        assert_eq!(body, b"x");
    }

    #[test]
    fn test_nested_message_indexes() {
        let framed = frame_with_indexes(1, &[1, 2], b"x").unwrap();
        // count 2, then 1 and 2, all zig-zag encoded
        assert_eq!(&framed[5..], &[4, 2, 4, b'x']);

        let (indexes, body) = read_message_indexes(&framed[5..]).unwrap();
        assert_eq!(indexes, vec![1, 2]);
        assert_eq!(body, b"x");
    }
}
