//! Per-bucket frame codec: JSON → zlib → keyed XOR, and back.
//!
//! The XOR stage is obfuscation against casual inspection of the shipped
//! payload, not encryption. Its keystream is the SHA-256 digest of a seed that
//! ships with the client, and XOR with a known keystream is trivially
//! reversible by anyone holding that seed. The positional mix term only
//! prevents repeated JSON structure from showing through as a repeating
//! pattern.
//!
//! ```text
//! encode: [EncodedRecordItem] ─json─▶ bytes ─zlib(best)─▶ bytes ─xor─▶ frame
//! decode: frame ─xor─▶ bytes ─zlib│raw-deflate─▶ json ─strict│tolerant─▶ records
//! ```

use crate::envelope::CodecDescriptor;
use crate::error::BucketError;
use crate::types::EncodedRecordItem;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

/// Identifiers this build writes into envelopes.
pub const COMPRESSION_ZLIB: &str = "zlib";
pub const OBFUSCATION_XOR_MIX: &str = "xor-sha256-mix";
pub const ENCODING_JSON: &str = "json";

const ACCEPTED_COMPRESSION: &[&str] = &["zlib", "deflate"];
const ACCEPTED_OBFUSCATION: &[&str] = &["xor-sha256-mix", "xor-sha256", "xor"];
const ACCEPTED_ENCODING: &[&str] = &["json", "json-utf8"];

/// Records recovered from one frame plus the number of elements discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedFrame {
    pub records: Vec<EncodedRecordItem>,
    pub skipped: usize,
}

/// Encoder/decoder bound to one obfuscation key seed.
#[derive(Clone)]
pub struct FrameCodec {
    keystream: [u8; 32],
}

impl std::fmt::Debug for FrameCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCodec").finish_non_exhaustive()
    }
}

impl FrameCodec {
    /// Derives the keystream from `key_seed`.
    pub fn new(key_seed: &str) -> Self {
        Self {
            keystream: Sha256::digest(key_seed.as_bytes()).into(),
        }
    }

    /// XORs `bytes` in place with the keystream and positional mix.
    ///
    /// Self-inverse: applying it twice restores the input.
    pub fn obfuscate(&self, bytes: &mut [u8]) {
        let len = self.keystream.len();
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte ^= self.keystream[i % len] ^ mix(i);
        }
    }

    /// Serializes, compresses and obfuscates one bucket.
    ///
    /// Returns the frame bytes and the hex SHA-256 of the uncompressed JSON.
    pub fn encode(&self, records: &[EncodedRecordItem]) -> std::io::Result<(Vec<u8>, String)> {
        let json = serde_json::to_vec(records)?;
        let checksum = hex::encode(Sha256::digest(&json));

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&json)?;
        let mut frame = encoder.finish()?;

        self.obfuscate(&mut frame);
        Ok((frame, checksum))
    }

    /// Reverses the obfuscation and compression stages, returning raw JSON.
    ///
    /// When `expected_sha256` is given, the inflated bytes must hash to it.
    pub fn open(
        &self,
        key: &str,
        frame: &[u8],
        expected_sha256: Option<&str>,
    ) -> Result<Vec<u8>, BucketError> {
        let mut bytes = frame.to_vec();
        self.obfuscate(&mut bytes);
        let json = inflate(&bytes)?;

        if let Some(expected) = expected_sha256 {
            let actual = hex::encode(Sha256::digest(&json));
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                return Err(BucketError::Checksum { key: key.to_string() });
            }
        }
        tracing::trace!(
            bucket = key,
            frame_bytes = frame.len(),
            json_bytes = json.len(),
            "opened frame"
        );
        Ok(json)
    }

    /// Full decode of one frame into records.
    pub fn decode(
        &self,
        key: &str,
        frame: &[u8],
        expected_sha256: Option<&str>,
    ) -> Result<DecodedFrame, BucketError> {
        let json = self.open(key, frame, expected_sha256)?;
        parse_records(key, &json)
    }
}

/// Rejects codec descriptors naming a stage this build cannot invert.
pub fn check_codec(codec: &CodecDescriptor) -> Result<(), BucketError> {
    check_stage("compression", &codec.compression, ACCEPTED_COMPRESSION)?;
    check_stage("obfuscation", &codec.obfuscation, ACCEPTED_OBFUSCATION)?;
    check_stage("encoding", &codec.encoding, ACCEPTED_ENCODING)
}

fn check_stage(stage: &'static str, value: &str, accepted: &[&str]) -> Result<(), BucketError> {
    if accepted.iter().any(|a| a.eq_ignore_ascii_case(value.trim())) {
        Ok(())
    } else {
        Err(BucketError::UnsupportedCodec {
            stage,
            value: value.to_string(),
        })
    }
}

#[inline]
fn mix(i: usize) -> u8 {
    ((i.wrapping_mul(131).wrapping_add(17)) % 256) as u8
}

/// Zlib first; earlier builders wrote raw deflate streams.
fn inflate(bytes: &[u8]) -> Result<Vec<u8>, BucketError> {
    let mut out = Vec::new();
    match ZlibDecoder::new(bytes).read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(zlib_err) => {
            out.clear();
            DeflateDecoder::new(bytes)
                .read_to_end(&mut out)
                .map(|_| out)
                .map_err(|_| BucketError::Inflate(zlib_err))
        }
    }
}

/// Strict parse first, then element-by-element salvage of the top-level array.
pub(crate) fn parse_records(key: &str, json: &[u8]) -> Result<DecodedFrame, BucketError> {
    let strict_err = match serde_json::from_slice::<Vec<EncodedRecordItem>>(json) {
        Ok(records) => return Ok(DecodedFrame { records, skipped: 0 }),
        Err(e) => e,
    };

    let Some(elements) = split_top_level_array(json) else {
        return Err(BucketError::Json(strict_err));
    };

    let mut decoded = DecodedFrame::default();
    for element in elements {
        match serde_json::from_slice::<EncodedRecordItem>(element) {
            Ok(record) => decoded.records.push(record),
            Err(_) => decoded.skipped += 1,
        }
    }
    tracing::warn!(
        bucket = key,
        kept = decoded.records.len(),
        skipped = decoded.skipped,
        error = %strict_err,
        "frame JSON malformed, salvaged elements individually"
    );
    Ok(decoded)
}

/// Splits a JSON array into its top-level element slices without validating them.
///
/// Returns `None` when the text does not open with `[`. A missing closing
/// bracket keeps whatever trailing element was in flight.
fn split_top_level_array(json: &[u8]) -> Option<Vec<&[u8]>> {
    let text = json.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(json);
    let open = text.iter().position(|b| !b.is_ascii_whitespace())?;
    if text[open] != b'[' {
        return None;
    }

    let mut elements = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = open + 1;

    for (i, &b) in text.iter().enumerate().skip(open + 1) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' if depth > 0 => depth -= 1,
            b']' => {
                push_element(&mut elements, &text[start..i]);
                return Some(elements);
            }
            b',' if depth == 0 => {
                push_element(&mut elements, &text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    push_element(&mut elements, &text[start..]);
    Some(elements)
}

fn push_element<'a>(elements: &mut Vec<&'a [u8]>, slice: &'a [u8]) {
    if slice.iter().any(|b| !b.is_ascii_whitespace()) {
        elements.push(slice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use serde_json::json;

    fn record(key: &str) -> EncodedRecordItem {
        serde_json::from_value(json!({
            "category": "hanabi",
            "primaryKey": key,
            "scaleScore": 70,
            "heatScore": 55,
            "normalizedStartDate": "2025-08-02",
            "normalizedStartTime": "19:30",
            "geohash": "xn76u",
            "rawFields": {"name": format!("Event {key}"), "lat": 35.68, "lng": 139.76}
        }))
        .unwrap()
    }

    #[test]
    fn test_roundtrip_preserves_order() {
        let codec = FrameCodec::new("seed");
        let records = vec![record("b"), record("a"), record("c")];
        let (frame, checksum) = codec.encode(&records).unwrap();
        let decoded = codec.decode("xn76u", &frame, Some(&checksum)).unwrap();
        assert_eq!(decoded.records, records);
        assert_eq!(decoded.skipped, 0);
    }

    #[test]
    fn test_obfuscation_is_self_inverse_and_positional() {
        let codec = FrameCodec::new("seed");
        let original = vec![0u8; 64];
        let mut bytes = original.clone();
        codec.obfuscate(&mut bytes);
        // A pure repeating key would make bytes 0 and 32 equal.
        assert_ne!(bytes[0..32], bytes[32..64]);
        codec.obfuscate(&mut bytes);
        assert_eq!(bytes, original);
    }

    #[test]
    fn test_mix_formula() {
        assert_eq!(mix(0), 17);
        assert_eq!(mix(1), 148);
        assert_eq!(mix(2), 23);
    }

    #[test]
    fn test_wrong_seed_fails_decode() {
        let (frame, _) = FrameCodec::new("right").encode(&[record("a")]).unwrap();
        let err = FrameCodec::new("wrong").decode("k", &frame, None).unwrap_err();
        // Garbage may partially inflate as raw deflate and then fail as JSON.
        assert!(matches!(err, BucketError::Inflate(_) | BucketError::Json(_)));
    }

    #[test]
    fn test_raw_deflate_frames_still_decode() {
        let codec = FrameCodec::new("legacy");
        let json = serde_json::to_vec(&vec![record("a")]).unwrap();
        let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&json).unwrap();
        let mut frame = encoder.finish().unwrap();
        codec.obfuscate(&mut frame);

        let decoded = codec.decode("k", &frame, None).unwrap();
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.records[0].category, Category::Hanabi);
    }

    #[test]
    fn test_checksum_mismatch() {
        let codec = FrameCodec::new("seed");
        let (frame, _) = codec.encode(&[record("a")]).unwrap();
        let err = codec.decode("k", &frame, Some("00ff")).unwrap_err();
        assert!(matches!(err, BucketError::Checksum { .. }));
    }

    #[test]
    fn test_tolerant_parse_drops_only_bad_elements() {
        let json = br#"[
            {"category": "hanabi", "primaryKey": "ok-1", "rawFields": {"name": "a, [b]"}},
            {"category": "matsuri", "primaryKey": oops},
            42,
            {"category": "nature", "primaryKey": "ok-2"}
        ]"#;
        let decoded = parse_records("k", json).unwrap();
        let keys: Vec<_> = decoded.records.iter().map(|r| r.primary_key.as_str()).collect();
        assert_eq!(keys, ["ok-1", "ok-2"]);
        assert_eq!(decoded.skipped, 2);
    }

    #[test]
    fn test_truncated_array_keeps_complete_elements() {
        let json = br#"[{"primaryKey": "a"}, {"primaryKey": "b"}, {"primaryKey": "#;
        let decoded = parse_records("k", json).unwrap();
        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.skipped, 1);
    }

    #[test]
    fn test_non_array_is_bucket_error() {
        assert!(matches!(
            parse_records("k", br#"{"primaryKey": "a"}"#),
            Err(BucketError::Json(_))
        ));
        assert!(matches!(parse_records("k", b"garbage"), Err(BucketError::Json(_))));
    }

    #[test]
    fn test_codec_descriptor_check() {
        let mut codec = CodecDescriptor::default();
        assert!(check_codec(&codec).is_ok());
        codec.compression = "ZLIB".into();
        assert!(check_codec(&codec).is_ok());
        codec.obfuscation = "aes-gcm".into();
        assert!(matches!(
            check_codec(&codec),
            Err(BucketError::UnsupportedCodec { stage: "obfuscation", .. })
        ));
    }
}
