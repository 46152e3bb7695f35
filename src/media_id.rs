use sha2::{Digest, Sha256};
use std::path::Path;

/// Bumping this invalidates every id (and therefore every cached thumbnail name).
const ID_SCHEME_VERSION: &str = "media-id-v1";

/// Derives the stable catalog id for an absolute path.
///
/// The id depends only on the raw path bytes, never on file content, so a
/// renamed or moved file gets a new id and the old record is reconciled
/// away by the next scan of its root.
pub fn id_for(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ID_SCHEME_VERSION.as_bytes());
    hasher.update([0u8]);
    hasher.update(path.as_os_str().as_encoded_bytes());
    let result = hasher.finalize();
    hex_encode(&result[..16])
}

/// Returns true when `value` has the shape of an id produced by [`id_for`].
pub fn is_valid_id(value: &str) -> bool {
    value.len() == 32
        && value
            .bytes()
            .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte))
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}
