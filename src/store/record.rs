//! On-disk framing for persisted revision nodes
//!
//! ```text
//! +------------------+
//! | Magic "ALRV"     | (4 bytes, once per file)
//! +------------------+
//! | Payload Length   | (u32 LE)
//! +------------------+
//! | Payload          | (JSON-encoded RevisionNode)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 over length + payload)
//! +------------------+
//! ```
//!
//! Every record is verified on load. A mismatch or a short read is corruption.

use crc32fast::Hasher;

use super::errors::{StoreError, StoreResult};
use crate::revision::RevisionNode;

pub(crate) const MAGIC: &[u8; 4] = b"ALRV";

const LEN_SIZE: usize = 4;
const CRC_SIZE: usize = 4;

fn checksum(length: &[u8], payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(length);
    hasher.update(payload);
    hasher.finalize()
}

/// Appends one framed node to `out`.
pub(crate) fn encode_into(out: &mut Vec<u8>, node: &RevisionNode) -> StoreResult<()> {
    let payload = serde_json::to_vec(node).map_err(|e| {
        StoreError::write_failed(
            format!("Failed to encode revision {}", node.rev_id()),
            e.into(),
        )
    })?;
    let length = (payload.len() as u32).to_le_bytes();

    out.extend_from_slice(&length);
    out.extend_from_slice(&payload);
    out.extend_from_slice(&checksum(&length, &payload).to_le_bytes());
    Ok(())
}

/// Decodes a whole store file, verifying the header and every checksum.
pub(crate) fn decode_all(data: &[u8]) -> StoreResult<Vec<RevisionNode>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
        return Err(StoreError::corruption_at_offset(0, "missing store header"));
    }

    let mut nodes = Vec::new();
    let mut offset = MAGIC.len();
    while offset < data.len() {
        let rest = &data[offset..];
        if rest.len() < LEN_SIZE {
            return Err(StoreError::corruption_at_offset(offset as u64, "truncated length"));
        }
        let length_bytes = &rest[..LEN_SIZE];
        let length = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;

        let end = LEN_SIZE + length + CRC_SIZE;
        if rest.len() < end {
            return Err(StoreError::corruption_at_offset(offset as u64, "truncated record"));
        }
        let payload = &rest[LEN_SIZE..LEN_SIZE + length];
        let crc = &rest[LEN_SIZE + length..end];
        let stored = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
        let computed = checksum(length_bytes, payload);
        if stored != computed {
            return Err(StoreError::corruption_at_offset(
                offset as u64,
                format!(
                    "checksum mismatch: computed {:08x}, stored {:08x}",
                    computed, stored
                ),
            ));
        }

        let node: RevisionNode = serde_json::from_slice(payload).map_err(|e| {
            StoreError::corruption_at_offset(offset as u64, format!("undecodable record: {}", e))
        })?;
        nodes.push(node);
        offset += end;
    }

    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::RevisionId;

    fn node(gen: u64, digest: &str) -> RevisionNode {
        RevisionNode::new("doc", RevisionId::new(gen, digest).unwrap(), None, None, false)
    }

    fn file_with(nodes: &[RevisionNode]) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        for n in nodes {
            encode_into(&mut out, n).unwrap();
        }
        out
    }

    #[test]
    fn test_empty_file_has_no_records() {
        assert!(decode_all(&[]).unwrap().is_empty());
        assert!(decode_all(MAGIC).unwrap().is_empty());
    }

    #[test]
    fn test_decodes_every_record() {
        let data = file_with(&[node(1, "aa"), node(2, "bb")]);
        let nodes = decode_all(&data).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].rev_id().to_string(), "2-bb");
    }

    #[test]
    fn test_flipped_byte_is_corruption() {
        let mut data = file_with(&[node(1, "aa")]);
        let mid = MAGIC.len() + LEN_SIZE + 3;
        data[mid] ^= 0x20;

        let err = decode_all(&data).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.details(), Some("byte_offset: 4"));
    }

    #[test]
    fn test_truncation_is_corruption() {
        let mut data = file_with(&[node(1, "aa"), node(2, "bb")]);
        data.truncate(data.len() - 2);
        assert!(decode_all(&data).unwrap_err().is_fatal());
    }

    #[test]
    fn test_bad_header_is_corruption() {
        let err = decode_all(b"NOPE").unwrap_err();
        assert!(err.is_fatal());
    }
}
