//! Content-addressed resource store: bytes in, a lowercase hex SHA-1 out,
//! stored once no matter how many events reference it (spec §4.4
//! "Screenshots" / "Archive layout").

use std::collections::HashMap;

use sha1::{Digest, Sha1};

#[derive(Debug, Default)]
pub struct ResourceStore {
    entries: HashMap<String, Vec<u8>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes `bytes`, stores them under the hash if not already present,
    /// and returns the hex digest.
    pub fn put(&mut self, bytes: Vec<u8>) -> String {
        let mut hasher = Sha1::new();
        hasher.update(&bytes);
        let digest = hasher.finalize();
        let hex = hex_encode(&digest);
        self.entries.entry(hex.clone()).or_insert(bytes);
        hex
    }

    pub fn get(&self, sha1: &str) -> Option<&[u8]> {
        self.entries.get(sha1).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in sorted hash order, for deterministic archive writing
    /// (spec §4.4 "contents are written deterministically in dictionary
    /// order for reproducibility in tests").
    pub fn sorted_entries(&self) -> Vec<(&str, &[u8])> {
        let mut out: Vec<(&str, &[u8])> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        out.sort_by_key(|(k, _)| *k);
        out
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").expect("writing to a String cannot fail");
    }
    out
}

/// `.png` unless the content begins with `<` (then `.html`) (spec §4.4
/// "Archive layout").
pub fn extension_for(bytes: &[u8]) -> &'static str {
    if bytes.first() == Some(&b'<') {
        ".html"
    } else {
        ".png"
    }
}

/// Reads the width/height out of a PNG's IHDR chunk (spec §4.4
/// "decoded PNG dimensions (read from the IHDR chunk of the PNG header)").
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    if bytes.len() < 24 || &bytes[0..8] != SIGNATURE {
        return None;
    }
    // IHDR starts at byte 8: 4-byte length, 4-byte "IHDR", then width/height.
    if &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_hash_to_the_same_entry() {
        let mut store = ResourceStore::new();
        let a = store.put(b"hello".to_vec());
        let b = store.put(b"hello".to_vec());
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn extension_detects_html_prefix() {
        assert_eq!(extension_for(b"<html></html>"), ".html");
        assert_eq!(extension_for(&[0x89, b'P', b'N', b'G']), ".png");
    }

    #[test]
    fn png_dimensions_reads_ihdr() {
        let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
        bytes.extend_from_slice(&[0, 0, 0, 13]); // length
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&100u32.to_be_bytes());
        bytes.extend_from_slice(&50u32.to_be_bytes());
        assert_eq!(png_dimensions(&bytes), Some((100, 50)));
    }
}
