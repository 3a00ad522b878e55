//! Development certificate generation using rcgen.
//!
//! Mints a throwaway CA and a server certificate signed by it, so a local
//! QUIC endpoint can be reached with full certificate verification by handing
//! the CA to the client (`--ca-cert`). NOT suitable for production use.
//!
//! Requires the `certs` feature to be enabled.

use std::path::{Path, PathBuf};

use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use tracing::info;

/// PEM-encoded CA material for signing server certificates.
pub struct CaBundle {
    /// CA certificate parameters (needed for signing).
    pub params: CertificateParams,
    /// CA key pair.
    pub key_pair: KeyPair,
    /// PEM-encoded CA certificate.
    pub ca_cert_pem: String,
}

/// Generated certificate bundle.
pub struct CertBundle {
    /// CA certificate PEM.
    pub ca_cert_pem: String,
    /// Server certificate PEM.
    pub server_cert_pem: String,
    /// Server certificate DER.
    pub server_cert_der: Vec<u8>,
    /// Server private key PEM (PKCS#8).
    pub server_key_pem: String,
    /// Server private key DER (PKCS#8).
    pub server_key_der: Vec<u8>,
}

/// Paths written by [`write_dev_certs`].
#[derive(Debug, Clone)]
pub struct CertPaths {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Certificate generation errors.
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("Certificate generation error: {0}")]
    Generation(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Generate a self-signed CA.
pub fn generate_ca(org_name: &str) -> Result<CaBundle, CertError> {
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params
        .distinguished_name
        .push(DnType::CommonName, format!("{org_name} CA"));
    params
        .distinguished_name
        .push(DnType::OrganizationName, org_name);
    params.key_usages.push(KeyUsagePurpose::KeyCertSign);
    params.key_usages.push(KeyUsagePurpose::CrlSign);

    let key_pair = KeyPair::generate().map_err(|e| CertError::Generation(e.to_string()))?;
    let ca_cert = params
        .self_signed(&key_pair)
        .map_err(|e| CertError::Generation(e.to_string()))?;

    Ok(CaBundle {
        ca_cert_pem: ca_cert.pem(),
        params,
        key_pair,
    })
}

/// Generate a server certificate for `server_names` signed by `ca`.
///
/// Names that parse as IP addresses become IP SANs, everything else a DNS SAN.
fn generate_server_cert(ca: &CaBundle, server_names: &[&str]) -> Result<CertBundle, CertError> {
    let issuer = Issuer::from_params(&ca.params, &ca.key_pair);

    let mut params = CertificateParams::new(
        server_names
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
    )
    .map_err(|e| CertError::Generation(e.to_string()))?;

    params
        .distinguished_name
        .push(DnType::CommonName, "quicssh dev server");
    params
        .extended_key_usages
        .push(ExtendedKeyUsagePurpose::ServerAuth);

    let server_key = KeyPair::generate().map_err(|e| CertError::Generation(e.to_string()))?;
    let server_cert = params
        .signed_by(&server_key, &issuer)
        .map_err(|e| CertError::Generation(e.to_string()))?;

    Ok(CertBundle {
        ca_cert_pem: ca.ca_cert_pem.clone(),
        server_cert_pem: server_cert.pem(),
        server_cert_der: server_cert.der().to_vec(),
        server_key_pem: server_key.serialize_pem(),
        server_key_der: server_key.serialize_der(),
    })
}

/// Generate a full dev certificate bundle (CA + server).
pub fn generate_dev_bundle(server_names: &[&str]) -> Result<CertBundle, CertError> {
    let ca = generate_ca("quicssh Dev")?;
    generate_server_cert(&ca, server_names)
}

/// Write a dev certificate bundle to disk.
pub fn write_dev_certs(dir: &Path, bundle: &CertBundle) -> Result<CertPaths, CertError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| CertError::Io(format!("Failed to create cert dir: {e}")))?;

    let paths = CertPaths {
        ca: dir.join("ca.pem"),
        cert: dir.join("server.pem"),
        key: dir.join("server-key.pem"),
    };

    std::fs::write(&paths.ca, &bundle.ca_cert_pem)
        .map_err(|e| CertError::Io(format!("Failed to write CA cert: {e}")))?;
    std::fs::write(&paths.cert, &bundle.server_cert_pem)
        .map_err(|e| CertError::Io(format!("Failed to write server cert: {e}")))?;
    std::fs::write(&paths.key, &bundle.server_key_pem)
        .map_err(|e| CertError::Io(format!("Failed to write server key: {e}")))?;

    info!(
        ca = %paths.ca.display(),
        cert = %paths.cert.display(),
        key = %paths.key.display(),
        "Dev certificates written"
    );

    Ok(paths)
}
