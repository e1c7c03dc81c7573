//! Per-client synthetic directory listings (spec.md section 4.8):
//! `LIST` on any path returns the same plausible-looking entries for
//! the same client every time, seeded from `client_id` folded with
//! `CRC64(path)` so repeat listings of the same directory are stable
//! without the server tracking any real filesystem state.

use crc::{Crc, CRC_64_GO_ISO};
use tarpit_rng::SeededRng;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

const DIR_NAME_POOL: &[&str] = &[
    "backups", "config", "logs", "releases", "scripts", "shared", "src", "tmp", "uploads", "vendor",
];
const FILE_STEM_POOL: &[&str] = &[
    "backup", "dump", "export", "report", "settings", "secrets", "snapshot", "archive", "notes", "data",
];
const FILE_EXT_POOL: &[&str] = &["json", "yaml", "xml", "toml", "csv", "sql", "ini", "log"];

const MIN_ENTRIES: usize = 3;
const MAX_ENTRIES: usize = 14;

pub fn crc64(bytes: &[u8]) -> u64 {
    CRC64.checksum(bytes)
}

pub struct SyntheticEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

/// True for paths without a recognizable file extension, so a `stat`
/// on a bare path like `/var/backups` is reported as a directory
/// rather than a zero-byte file.
pub fn looks_like_directory(path: &str) -> bool {
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    !last_segment.contains('.')
}

/// Generates a deterministic directory listing for `path` as seen by
/// `client_id`. The same pair always returns the same entries, in the
/// same order, so a client's second `LIST` of a directory it already
/// browsed looks consistent rather than randomized garbage.
pub fn list_directory(client_id: u64, path: &str, advertised_file_size: u64) -> Vec<SyntheticEntry> {
    let seed = client_id ^ crc64(path.as_bytes());
    let mut rng = SeededRng::from_seed(seed);

    let count = rng.int_range(MIN_ENTRIES as i64, MAX_ENTRIES as i64 + 1) as usize;
    let mut entries = Vec::with_capacity(count);

    for _ in 0..count {
        if rng.bool(0.3) {
            let name = rng.choice(DIR_NAME_POOL).copied().unwrap_or("misc").to_string();
            entries.push(SyntheticEntry { name, is_dir: true, size: 0 });
        } else {
            let stem = rng.choice(FILE_STEM_POOL).copied().unwrap_or("file");
            let ext = rng.choice(FILE_EXT_POOL).copied().unwrap_or("dat");
            let name = format!("{stem}.{ext}");
            entries.push(SyntheticEntry { name, is_dir: false, size: advertised_file_size });
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_client_and_path_produce_the_same_listing() {
        let a = list_directory(42, "/home/user", 1024);
        let b = list_directory(42, "/home/user", 1024);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.name, y.name);
            assert_eq!(x.is_dir, y.is_dir);
        }
    }

    #[test]
    fn different_clients_see_different_listings() {
        let a = list_directory(1, "/home/user", 1024);
        let b = list_directory(2, "/home/user", 1024);
        let names_a: Vec<_> = a.iter().map(|e| e.name.clone()).collect();
        let names_b: Vec<_> = b.iter().map(|e| e.name.clone()).collect();
        assert_ne!(names_a, names_b);
    }

    #[test]
    fn directory_paths_are_recognized() {
        assert!(looks_like_directory("/var/backups"));
        assert!(!looks_like_directory("/var/backups/dump.sql"));
    }
}
