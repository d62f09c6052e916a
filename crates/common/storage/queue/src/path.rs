// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::{Path, PathBuf};

use crate::Result;

/// Metadata file name inside a FIFO disk queue directory.
pub const INFO_FILE_NAME: &str = "info.json";

/// Generates a chunk file name: `qNNNNN`.
pub fn chunk_file_name(chunk: u32) -> String { format!("q{chunk:05}") }

/// Returns full path to a chunk file: `base/qNNNNN`.
pub fn chunk_file_path<P: AsRef<Path>>(base: P, chunk: u32) -> PathBuf {
    base.as_ref().join(chunk_file_name(chunk))
}

/// Returns full path to the metadata file: `base/info.json`.
pub fn info_file_path<P: AsRef<Path>>(base: P) -> PathBuf { base.as_ref().join(INFO_FILE_NAME) }

/// Whether `name` is a chunk file name (`q` followed by digits).
pub fn is_chunk_file_name(name: &str) -> bool {
    name.strip_prefix('q')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Scans for all chunk files directly under the queue directory.
pub fn scan_chunk_files<P: AsRef<Path>>(base: P) -> Result<Vec<PathBuf>> {
    let base = base.as_ref();
    let mut files = Vec::new();
    if !base.exists() {
        return Ok(files);
    }

    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();
        let is_chunk = path
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(is_chunk_file_name);
        if is_chunk && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Turns an arbitrary queue key into a single safe path component.
///
/// Keeps `[A-Za-z0-9._-]`. When anything else had to be replaced, the CRC32
/// of the original key is appended so distinct keys stay distinct. A safe
/// key that already ends like such a suffix gets one too, so it cannot
/// collide with a rewritten key.
pub fn key_file_name(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if !safe.is_empty() && safe == key && safe != "." && safe != ".." && !has_key_suffix(&safe) {
        return safe;
    }

    format!("{safe}-{:08x}", crc32fast::hash(key.as_bytes()))
}

/// Whether `name` ends in `-` plus 8 hex digits.
fn has_key_suffix(name: &str) -> bool {
    name.len() >= 9
        && name.as_bytes()[name.len() - 9] == b'-'
        && name.as_bytes()[name.len() - 8..].iter().all(u8::is_ascii_hexdigit)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0, "q00000" ; "first chunk")]
    #[test_case(42, "q00042" ; "chunk 42")]
    #[test_case(99_999, "q99999" ; "last five digit chunk")]
    #[test_case(123_456, "q123456" ; "wider than five digits")]
    fn test_chunk_file_name(chunk: u32, expected: &str) {
        assert_eq!(chunk_file_name(chunk), expected);
    }

    #[test]
    fn test_full_paths() {
        assert_eq!(
            chunk_file_path("/queue", 1),
            PathBuf::from("/queue/q00001")
        );
        assert_eq!(info_file_path("/queue"), PathBuf::from("/queue/info.json"));
    }

    #[test_case("q00000", true ; "chunk")]
    #[test_case("q", false ; "bare prefix")]
    #[test_case("info.json", false ; "metadata")]
    #[test_case("q0001a", false ; "non digit suffix")]
    fn test_is_chunk_file_name(name: &str, expected: bool) {
        assert_eq!(is_chunk_file_name(name), expected);
    }

    #[test]
    fn test_scan_chunk_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base = temp_dir.path();

        std::fs::File::create(chunk_file_path(base, 2)).unwrap();
        std::fs::File::create(chunk_file_path(base, 0)).unwrap();
        std::fs::File::create(info_file_path(base)).unwrap();

        let files = scan_chunk_files(base).unwrap();
        assert_eq!(files, vec![chunk_file_path(base, 0), chunk_file_path(base, 2)]);

        assert!(scan_chunk_files(base.join("missing")).unwrap().is_empty());
    }

    #[test_case("3", "3" ; "priority")]
    #[test_case("-7", "-7" ; "negative priority")]
    #[test_case("example.com", "example.com" ; "domain")]
    fn test_key_file_name_keeps_safe_keys(key: &str, expected: &str) {
        assert_eq!(key_file_name(key), expected);
    }

    #[test]
    fn test_key_file_name_disambiguates_replaced_keys() {
        let a = key_file_name("a/b");
        let b = key_file_name("a:b");
        assert!(a.starts_with("a_b-"));
        assert!(b.starts_with("a_b-"));
        assert_ne!(a, b);
        assert_ne!(key_file_name(".."), "..");
        assert!(!key_file_name("").is_empty());
    }

    #[test]
    fn test_key_file_name_suffix_lookalike_is_rewritten() {
        let rewritten = key_file_name("a/b");
        assert_ne!(key_file_name(&rewritten), rewritten);
        assert_eq!(key_file_name("build-2024"), "build-2024");
        assert_eq!(key_file_name("cafe-babe"), "cafe-babe");
    }
}
