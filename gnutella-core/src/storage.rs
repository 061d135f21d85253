use std::fs;
use std::path::{Path, PathBuf};

use crate::error::GnutellaError;

/// A leaf's private file directory (`Leaves/Leaf <id>/`, spec §6). No
/// sharing between leaves; each `LeafPeer` owns one.
#[derive(Clone)]
pub struct LeafStorage {
    root: PathBuf,
}

impl LeafStorage {
    pub fn new(root: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn write_file(&self, file_name: &str, bytes: &[u8]) -> Result<(), GnutellaError> {
        fs::write(self.path_for(file_name), bytes).map_err(|source| GnutellaError::Read {
            file: file_name.to_string(),
            source,
        })
    }

    pub fn read_file(&self, file_name: &str) -> Result<Vec<u8>, GnutellaError> {
        let path = self.path_for(file_name);
        if !path.exists() {
            return Err(GnutellaError::NotFound(file_name.to_string()));
        }
        fs::read(&path).map_err(|source| GnutellaError::Read {
            file: file_name.to_string(),
            source,
        })
    }

    pub fn exists(&self, file_name: &str) -> bool {
        self.path_for(file_name).exists()
    }
}

/// Builds the private directory path for a leaf, per spec §6
/// (`Leaves/Leaf <id>/`).
pub fn leaf_dir(working_dir: &Path, leaf_id: u32) -> PathBuf {
    working_dir.join("Leaves").join(format!("Leaf {leaf_id}"))
}

/// Generates placeholder bytes for a seeded file: a short header line plus
/// random printable bytes. Any nonempty scheme satisfies the spec (§1's
/// declared-out-of-scope "Generation of placeholder file bytes"); this one
/// is deterministic in shape but random in content, mirroring the original
/// implementation's header-plus-random-bytes approach.
pub fn generate_placeholder_bytes(leaf_id: u32, file_name: &str) -> Vec<u8> {
    use rand::Rng;

    let mut out = format!("Created by leaf {leaf_id}\n").into_bytes();
    let mut rng = rand::rng();
    let body_len = 256 + (file_name.len() * 7) % 512;
    out.extend((0..body_len).map(|_| rng.random_range(32u8..127u8)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let storage = LeafStorage::new(dir.path().join("Leaf 3")).unwrap();

        storage.write_file("5.txt", b"hello world").unwrap();
        let bytes = storage.read_file("5.txt").unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LeafStorage::new(dir.path().join("Leaf 3")).unwrap();

        let err = storage.read_file("missing.txt").unwrap_err();
        assert!(matches!(err, GnutellaError::NotFound(_)));
    }

    #[test]
    fn placeholder_bytes_are_nonempty() {
        let bytes = generate_placeholder_bytes(1, "5.txt");
        assert!(!bytes.is_empty());
    }

    #[test]
    fn leaf_dir_matches_spec_layout() {
        let path = leaf_dir(Path::new("/work"), 7);
        assert_eq!(path, Path::new("/work/Leaves/Leaf 7"));
    }
}
