//! # Key File Persistence
//!
//! A node's identity lives in two sibling files: `<prefix>.key` holds the
//! raw marshaled private key bytes, `<prefix>.id` the base58-encoded peer
//! ID. Files are created with default directory permissions.

use std::fs;
use std::path::Path;

use crate::keys::NodeKeyPair;
use crate::CryptoError;
use shared_types::PeerId;

const KEY_EXT: &str = "key";
const ID_EXT: &str = "id";

/// Write `<prefix>.key` and `<prefix>.id` for the given keypair.
pub fn save_node_key(prefix: &Path, key: &NodeKeyPair) -> Result<(), CryptoError> {
    let key_path = prefix.with_extension(KEY_EXT);
    let id_path = prefix.with_extension(ID_EXT);

    fs::write(&key_path, key.to_bytes())
        .map_err(|e| CryptoError::KeyFile(format!("{}: {e}", key_path.display())))?;
    fs::write(&id_path, key.peer_id().to_base58())
        .map_err(|e| CryptoError::KeyFile(format!("{}: {e}", id_path.display())))?;
    Ok(())
}

/// Load the keypair from `<prefix>.key` and cross-check `<prefix>.id`.
///
/// A missing ID file is tolerated (it is derivable); a present-but-mismatched
/// one is an error, since it means the files were mixed up.
pub fn load_node_key(prefix: &Path) -> Result<(NodeKeyPair, PeerId), CryptoError> {
    let key_path = prefix.with_extension(KEY_EXT);
    let bytes = fs::read(&key_path)
        .map_err(|e| CryptoError::KeyFile(format!("{}: {e}", key_path.display())))?;
    let key = NodeKeyPair::from_bytes(&bytes)?;
    let id = key.peer_id();

    let id_path = prefix.with_extension(ID_EXT);
    if let Ok(stored) = fs::read_to_string(&id_path) {
        let stored_id = PeerId::from_base58(stored.trim())
            .map_err(|_| CryptoError::KeyFile(format!("{}: corrupt id", id_path.display())))?;
        if stored_id != id {
            return Err(CryptoError::KeyFile(format!(
                "{}: id does not match key",
                id_path.display()
            )));
        }
    }
    Ok((key, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("node");
        let key = NodeKeyPair::generate();

        save_node_key(&prefix, &key).unwrap();
        let (loaded, id) = load_node_key(&prefix).unwrap();

        assert_eq!(loaded.public_key(), key.public_key());
        assert_eq!(id, key.peer_id());
    }

    #[test]
    fn test_mismatched_id_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("node");
        let key = NodeKeyPair::generate();
        save_node_key(&prefix, &key).unwrap();

        let other = NodeKeyPair::generate();
        fs::write(prefix.with_extension(ID_EXT), other.peer_id().to_base58()).unwrap();

        assert!(load_node_key(&prefix).is_err());
    }

    #[test]
    fn test_missing_key_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_node_key(&dir.path().join("absent")).is_err());
    }
}
