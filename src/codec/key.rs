//! Byte layout of index keys and base-record keys.
//!
//! Index key: `[0x02][partition:3 LE][index id:4 LE][fields][null bitmap:2]?[suffix]`,
//! where the suffix is the vertex id for tag indexes and
//! `src ++ rank ++ dst` for edge indexes.
//!
//! Vertex key: `[0x01][partition:3 LE][vid][tag:4 LE]`.
//! Edge key: `[0x01][partition:3 LE][src][edge type:4 LE][rank:8][dst][0x01]`.

use crate::error::{LookupError, Result};
use crate::primitives::bytes::ord;
use crate::types::{EdgeRanking, EdgeType, IndexId, PartitionId, TagId, MAX_PARTITION_ID};
use crate::value::Value;

/// Key type byte of base records.
pub const DATA_KEY_TYPE: u8 = 0x01;
/// Key type byte of index entries.
pub const INDEX_KEY_TYPE: u8 = 0x02;
/// Type byte plus partition bytes.
pub const PART_PREFIX_LEN: usize = 4;
/// Index key prefix: type, partition and index id.
pub const INDEX_PREFIX_LEN: usize = PART_PREFIX_LEN + 4;
/// Width of the nullable bitmap.
pub const NULL_BITMAP_LEN: usize = 2;
/// Width of an encoded edge ranking.
pub const RANK_LEN: usize = 8;
/// Most fields a nullable bitmap can describe.
pub const MAX_NULLABLE_FIELDS: usize = 16;

const EDGE_VERSION: u8 = 0x01;

/// `[type][partition:3 LE]`.
pub fn part_prefix(key_type: u8, part: PartitionId) -> [u8; PART_PREFIX_LEN] {
    assert!(part.0 <= MAX_PARTITION_ID, "partition {part} exceeds 24 bits");
    let raw = (part.0 << 8) | key_type as u32;
    raw.to_le_bytes()
}

/// Prefix shared by every entry of one index in one partition.
pub fn index_prefix(part: PartitionId, index: IndexId) -> Vec<u8> {
    let mut key = Vec::with_capacity(INDEX_PREFIX_LEN);
    key.extend_from_slice(&part_prefix(INDEX_KEY_TYPE, part));
    key.extend_from_slice(&index.0.to_le_bytes());
    key
}

/// Overwrites the partition bytes of an already built key.
pub fn replace_partition(key: &mut [u8], part: PartitionId) {
    if key.len() < PART_PREFIX_LEN {
        return;
    }
    let prefix = part_prefix(key[0], part);
    key[1..PART_PREFIX_LEN].copy_from_slice(&prefix[1..]);
}

/// Partition id stored in a key.
pub fn key_partition(key: &[u8]) -> PartitionId {
    PartitionId(u32::from_le_bytes([key[1], key[2], key[3], 0]))
}

/// Builds the nullable bitmap: bit `15 - i` is set when field `i` is NULL.
pub fn null_bitmap(nulls: &[bool]) -> [u8; NULL_BITMAP_LEN] {
    assert!(nulls.len() <= MAX_NULLABLE_FIELDS, "too many indexed fields");
    let mut bits = 0u16;
    for (i, is_null) in nulls.iter().enumerate() {
        if *is_null {
            bits |= 1 << (15 - i);
        }
    }
    bits.to_le_bytes()
}

/// Reads bit `field` of the bitmap stored at `offset`.
pub fn is_null_at(key: &[u8], offset: usize, field: usize) -> bool {
    assert!(field < MAX_NULLABLE_FIELDS, "null bitmap has no bit for field {field}");
    let bits = u16::from_le_bytes([key[offset], key[offset + 1]]);
    bits & (1 << (15 - field)) != 0
}

/// Pads a vertex id with NUL to `vid_len`.
pub fn pad_vid(vid: &[u8], vid_len: usize) -> Result<Vec<u8>> {
    if vid.len() > vid_len {
        return Err(LookupError::InvalidFieldValue(format!(
            "vertex id of {} bytes exceeds vid_len {vid_len}",
            vid.len()
        )));
    }
    let mut out = vec![0u8; vid_len];
    out[..vid.len()].copy_from_slice(vid);
    Ok(out)
}

/// Reserved-column value of a padded vertex id.
pub fn vid_value(raw: &[u8]) -> Value {
    let end = raw.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
    match std::str::from_utf8(&raw[..end]) {
        Ok(s) => Value::String(s.to_owned()),
        Err(_) => Value::Bytes(raw[..end].to_vec()),
    }
}

/// Order-preserving edge ranking bytes.
pub fn encode_rank(rank: EdgeRanking) -> [u8; RANK_LEN] {
    let mut out = [0u8; RANK_LEN];
    ord::put_i64_be(&mut out, rank);
    out
}

/// Suffix width of tag index keys.
pub fn vertex_suffix_len(vid_len: usize) -> usize {
    vid_len
}

/// Suffix width of edge index keys.
pub fn edge_suffix_len(vid_len: usize) -> usize {
    vid_len * 2 + RANK_LEN
}

/// Tag index entry key.
pub fn vertex_index_key(
    part: PartitionId,
    index: IndexId,
    fields: &[u8],
    bitmap: Option<[u8; NULL_BITMAP_LEN]>,
    vid: &[u8],
) -> Vec<u8> {
    let mut key = index_prefix(part, index);
    key.extend_from_slice(fields);
    if let Some(bits) = bitmap {
        key.extend_from_slice(&bits);
    }
    key.extend_from_slice(vid);
    key
}

/// Edge index entry key.
pub fn edge_index_key(
    part: PartitionId,
    index: IndexId,
    fields: &[u8],
    bitmap: Option<[u8; NULL_BITMAP_LEN]>,
    src: &[u8],
    rank: EdgeRanking,
    dst: &[u8],
) -> Vec<u8> {
    let mut key = index_prefix(part, index);
    key.extend_from_slice(fields);
    if let Some(bits) = bitmap {
        key.extend_from_slice(&bits);
    }
    key.extend_from_slice(src);
    key.extend_from_slice(&encode_rank(rank));
    key.extend_from_slice(dst);
    key
}

/// Vertex id carried by a tag index key.
pub fn index_vertex_id(key: &[u8], vid_len: usize) -> &[u8] {
    &key[key.len() - vid_len..]
}

/// `(src, rank, dst)` carried by an edge index key.
pub fn index_edge_id(key: &[u8], vid_len: usize) -> (&[u8], EdgeRanking, &[u8]) {
    let suffix = &key[key.len() - edge_suffix_len(vid_len)..];
    let (src, rest) = suffix.split_at(vid_len);
    let (rank, dst) = rest.split_at(RANK_LEN);
    (src, ord::get_i64_be(rank), dst)
}

/// Base-record key of a vertex tag.
pub fn vertex_key(part: PartitionId, vid: &[u8], tag: TagId) -> Vec<u8> {
    let mut key = Vec::with_capacity(PART_PREFIX_LEN + vid.len() + 4);
    key.extend_from_slice(&part_prefix(DATA_KEY_TYPE, part));
    key.extend_from_slice(vid);
    key.extend_from_slice(&tag.0.to_le_bytes());
    key
}

/// Base-record key of an edge.
pub fn edge_key(
    part: PartitionId,
    src: &[u8],
    edge: EdgeType,
    rank: EdgeRanking,
    dst: &[u8],
) -> Vec<u8> {
    let mut key = Vec::with_capacity(PART_PREFIX_LEN + src.len() + dst.len() + 13);
    key.extend_from_slice(&part_prefix(DATA_KEY_TYPE, part));
    key.extend_from_slice(src);
    key.extend_from_slice(&edge.0.to_le_bytes());
    key.extend_from_slice(&encode_rank(rank));
    key.extend_from_slice(dst);
    key.push(EDGE_VERSION);
    key
}

/// Index entry value for schemas with a TTL column.
pub fn ttl_index_value(ttl: i64) -> Vec<u8> {
    ttl.to_be_bytes().to_vec()
}

/// TTL column stored in an index entry value, if any.
pub fn index_value_ttl(value: &[u8]) -> Option<i64> {
    let raw: [u8; 8] = value.get(..8)?.try_into().ok()?;
    Some(i64::from_be_bytes(raw))
}
