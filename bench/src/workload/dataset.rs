use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::ops::Deref;
use std::path::Path;

use rand::Rng;

use super::generator::seeded_rng;
use crate::error::{BenchError, Result};
use crate::index::{Key, KEY_WIDTH};

/// Keys decoded per read call while loading.
const KEYS_PER_CHUNK: usize = 64 * 1024;

/// Keys loaded from a key file, in file order.
///
/// Immutable once loaded. Duplicates are kept as they appear in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyArray {
    keys: Vec<Key>,
}

impl KeyArray {
    pub fn from_vec(keys: Vec<Key>) -> Self {
        Self { keys }
    }

    pub fn as_slice(&self) -> &[Key] {
        &self.keys
    }

    pub fn into_vec(self) -> Vec<Key> {
        self.keys
    }

    /// Size of the key buffer in bytes.
    pub fn size_bytes(&self) -> u64 {
        (self.keys.len() * KEY_WIDTH) as u64
    }
}

impl Deref for KeyArray {
    type Target = [Key];

    fn deref(&self) -> &[Key] {
        &self.keys
    }
}

/// Load exactly `count` raw native-endian keys from the start of `path`.
///
/// A file shorter than `count * KEY_WIDTH` bytes is an error; trailing bytes
/// past that length are ignored.
pub fn load_keys(path: impl AsRef<Path>, count: usize) -> Result<KeyArray> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| BenchError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let expected_bytes = (count as u64).saturating_mul(KEY_WIDTH as u64);
    let metadata = file.metadata().map_err(|source| BenchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    // Pipes and character devices report no length; rely on read_exact for those.
    if metadata.is_file() && metadata.len() < expected_bytes {
        return Err(BenchError::Truncated {
            path: path.to_path_buf(),
            count,
            expected_bytes,
            actual_bytes: metadata.len(),
        });
    }

    let mut reader = BufReader::with_capacity(KEYS_PER_CHUNK * KEY_WIDTH, file);
    let mut keys = Vec::with_capacity(count);
    let mut chunk = vec![0u8; KEYS_PER_CHUNK * KEY_WIDTH];

    while keys.len() < count {
        let take = (count - keys.len()).min(KEYS_PER_CHUNK);
        let buf = &mut chunk[..take * KEY_WIDTH];
        if let Err(source) = reader.read_exact(buf) {
            return Err(if source.kind() == io::ErrorKind::UnexpectedEof {
                BenchError::Truncated {
                    path: path.to_path_buf(),
                    count,
                    expected_bytes,
                    actual_bytes: (keys.len() * KEY_WIDTH) as u64,
                }
            } else {
                BenchError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            });
        }
        keys.extend(buf.chunks_exact(KEY_WIDTH).map(decode_key));
    }

    Ok(KeyArray::from_vec(keys))
}

fn decode_key(bytes: &[u8]) -> Key {
    let mut word = [0u8; KEY_WIDTH];
    word.copy_from_slice(bytes);
    Key::from_ne_bytes(word)
}

/// Write `keys` to `path` in the layout [`load_keys`] reads.
pub fn write_keys(path: impl AsRef<Path>, keys: &[Key]) -> Result<()> {
    let path = path.as_ref();
    let to_write_error = |source: io::Error| BenchError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(to_write_error)?;
    let mut writer = BufWriter::with_capacity(KEYS_PER_CHUNK * KEY_WIDTH, file);
    for key in keys {
        writer.write_all(&key.to_ne_bytes()).map_err(to_write_error)?;
    }
    writer.flush().map_err(to_write_error)
}

/// Generate `count` uniformly random keys over the full key range.
pub fn generate_uniform_keys(count: usize, seed: Option<u64>) -> Vec<Key> {
    let mut rng = seeded_rng(seed);
    (0..count).map(|_| rng.gen::<Key>()).collect()
}
