#![allow(dead_code)]

use festa::{BuiltIndex, Catalog, CatalogConfig, CatalogSources, EncodedRecordItem, IndexBuilder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::io::Write;

pub const SEED: &str = "fixture-seed";
pub const PRECISION: u8 = 5;

/// Tokyo Station.
pub const CENTER: (f64, f64) = (35.6812, 139.7671);

pub fn record(value: Value) -> EncodedRecordItem {
    serde_json::from_value(value).unwrap()
}

/// A located record with a name equal to its key.
pub fn place(key: &str, category: &str, lat: f64, lng: f64) -> EncodedRecordItem {
    record(json!({
        "category": category,
        "primaryKey": key,
        "scaleScore": 50,
        "heatScore": 50,
        "rawFields": {"name": key, "lat": lat, "lng": lng}
    }))
}

pub fn build(records: Vec<EncodedRecordItem>) -> BuiltIndex {
    let mut builder = IndexBuilder::new(PRECISION, SEED);
    builder.extend(records);
    builder.build().unwrap()
}

pub fn open(built: &BuiltIndex) -> Catalog {
    let sources = CatalogSources::new(built.envelope_json().unwrap(), built.payload.clone());
    Catalog::open(sources, CatalogConfig::new(SEED))
}

pub fn catalog(records: Vec<EncodedRecordItem>) -> Catalog {
    open(&build(records))
}

/// Replaces one bucket's frame with `json` run through the normal frame
/// stages, re-laying out the payload and refreshing the whole-blob fields.
pub fn replace_bucket_json(built: &BuiltIndex, key: &str, json: &[u8]) -> BuiltIndex {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(json).unwrap();
    let mut replacement = encoder.finish().unwrap();
    festa::frame::FrameCodec::new(SEED).obfuscate(&mut replacement);

    let mut out = built.clone();
    let mut keys: Vec<String> = out.envelope.payload_buckets.keys().cloned().collect();
    keys.sort_by_key(|k| out.envelope.payload_buckets[k].payload_offset);

    let mut payload = Vec::new();
    for k in keys {
        let meta = out.envelope.payload_buckets.get_mut(&k).unwrap();
        let frame = if k == key {
            meta.payload_sha256 = None;
            replacement.clone()
        } else {
            built.payload[meta.payload_offset as usize..meta.end() as usize].to_vec()
        };
        meta.payload_offset = payload.len() as u64;
        meta.payload_length = frame.len() as u64;
        payload.extend_from_slice(&frame);
    }

    out.envelope.payload_sha256 = Some(hex::encode(Sha256::digest(&payload)));
    out.envelope.payload_size_bytes = Some(payload.len() as u64);
    out.payload = payload;
    out
}
