//! Self-minted TLS material for optional FTPS (spec.md section 6: "no
//! certificate is ever provided by the operator; one is generated at
//! startup"). No private key or certificate is ever written to disk.

use rcgen::{CertifiedKey, generate_simple_self_signed};

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to mint self-signed certificate: {0}")]
    Mint(String),
}

pub struct MintedCertificate {
    pub certificate_der: Vec<u8>,
    pub private_key_der: Vec<u8>,
    pub certificate_pem: String,
    pub private_key_pem: String,
}

/// Generates a throwaway self-signed certificate for `common_name`,
/// valid for the lifetime of this process only -- a fresh one is
/// minted on every restart.
pub fn mint_self_signed(common_name: &str) -> Result<MintedCertificate, TlsError> {
    let CertifiedKey { cert, key_pair } =
        generate_simple_self_signed(vec![common_name.to_string()]).map_err(|err| TlsError::Mint(err.to_string()))?;

    Ok(MintedCertificate {
        certificate_der: cert.der().to_vec(),
        private_key_der: key_pair.serialize_der(),
        certificate_pem: cert.pem(),
        private_key_pem: key_pair.serialize_pem(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mints_nonempty_certificate_and_key() {
        let minted = mint_self_signed("tarpit.local").unwrap();
        assert!(!minted.certificate_der.is_empty());
        assert!(!minted.private_key_der.is_empty());
    }
}
