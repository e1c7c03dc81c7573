//! Bridges `tarpit_ftp`'s in-memory, self-minted certificate into
//! `libunftp`'s FTPS configuration, which takes certificate/key file
//! paths rather than raw bytes. The PEM pair is written to a
//! process-scoped temporary file and deleted again on drop -- the
//! nearest thing to "never touches disk" that `libunftp`'s builder
//! actually accepts; the certificate itself is still minted fresh in
//! memory every startup and never persisted intentionally.

use std::io;
use std::path::{Path, PathBuf};

use tarpit_ftp::MintedCertificate;

pub struct TlsTempFiles {
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl TlsTempFiles {
    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }
}

impl Drop for TlsTempFiles {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.cert_path);
        let _ = std::fs::remove_file(&self.key_path);
    }
}

pub fn materialize(minted: &MintedCertificate) -> io::Result<TlsTempFiles> {
    let dir = std::env::temp_dir();
    let pid = std::process::id();
    let cert_path = dir.join(format!("tarpit-node-{pid}-cert.pem"));
    let key_path = dir.join(format!("tarpit-node-{pid}-key.pem"));

    std::fs::write(&cert_path, &minted.certificate_pem)?;
    std::fs::write(&key_path, &minted.private_key_pem)?;

    Ok(TlsTempFiles { cert_path, key_path })
}
