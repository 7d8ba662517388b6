//! Unsigned and signed transactions on disk: pretty-printed JSON with a
//! trailing newline.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{WalletError, WalletResult};
use crate::types::Transaction;

pub fn read_txn(path: &Path) -> WalletResult<Transaction> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Replaces `path` atomically so an interrupted write never leaves a
/// truncated transaction behind.
pub fn write_txn(path: &Path, txn: &Transaction) -> WalletResult<()> {
    let mut data = serde_json::to_string_pretty(txn)?;
    data.push('\n');

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(data.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| WalletError::Io(err.error))?;
    tracing::debug!("wrote transaction {} to {}", txn.id(), path.display());
    Ok(())
}

/// `txn.json` becomes `txn-signed.json`.
pub fn signed_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}-signed.{}", stem, ext.to_string_lossy()),
        None => format!("{}-signed", stem),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::currency::Currency;
    use crate::test_utils::address;
    use crate::txn_file::{read_txn, signed_path, write_txn};
    use crate::types::{SiacoinOutput, Transaction};

    #[test]
    fn written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("txn.json");
        let txn = Transaction {
            siacoin_outputs: vec![SiacoinOutput {
                value: Currency::coins(2),
                unlock_hash: address(1),
            }],
            miner_fees: vec![Currency::from(300)],
            ..Default::default()
        };
        write_txn(&path, &txn).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\n  \"siacoinoutputs\""));
        assert_eq!(read_txn(&path).unwrap(), txn);
    }

    #[test]
    fn missing_or_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_txn(&dir.path().join("absent.json")).is_err());
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(read_txn(&bad).is_err());
    }

    #[test]
    fn signed_suffix_goes_before_extension() {
        assert_eq!(signed_path(Path::new("txn.json")), Path::new("txn-signed.json"));
        assert_eq!(
            signed_path(Path::new("/tmp/pay.v2.json")),
            Path::new("/tmp/pay.v2-signed.json")
        );
        assert_eq!(signed_path(Path::new("txn")), Path::new("txn-signed"));
    }
}
