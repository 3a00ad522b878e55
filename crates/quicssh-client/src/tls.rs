//! TLS policy for the QUIC session.
//!
//! Decides whether the server certificate is verified and against which
//! identity, and turns that decision into a `rustls::ClientConfig`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::TunnelError;

/// ALPN protocol spoken by quicssh peers.
pub const ALPN_QUICSSH: &[u8] = b"quicssh";

/// How the server certificate is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verification {
    /// Accept any certificate.
    Disabled,
    /// Verify against the bundled web PKI roots plus an optional extra CA file.
    WebPki { extra_ca: Option<PathBuf> },
}

/// Verification mode plus the identity expected from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPolicy {
    verification: Verification,
    server_name: Option<String>,
}

impl TlsPolicy {
    /// Derive the policy for a run.
    ///
    /// With verification disabled the address is not inspected at all. With
    /// verification enabled the host part of `config.addr` becomes the
    /// expected server identity, and a malformed address is rejected here,
    /// before anything touches the network.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TunnelError> {
        if config.insecure_skip_verify {
            warn!("Skipping TLS certificate verification");
            return Ok(Self {
                verification: Verification::Disabled,
                server_name: None,
            });
        }

        let (host, _port) = split_host_port(&config.addr)?;
        info!(server_name = %host, "TLS certificate verification enabled");
        Ok(Self {
            verification: Verification::WebPki {
                extra_ca: config.ca_cert_path.clone(),
            },
            server_name: Some(host.to_string()),
        })
    }

    /// Expected server identity; `None` when verification is disabled.
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// Build the rustls client configuration for this policy.
    pub fn rustls_config(&self) -> Result<rustls::ClientConfig, TunnelError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(|e| TunnelError::TlsConfig(e.to_string()))?;

        let mut config = match &self.verification {
            Verification::Disabled => {
                let mut config = builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(NoServerVerification(provider)))
                    .with_no_client_auth();
                config.enable_sni = false;
                config
            }
            Verification::WebPki { extra_ca } => {
                let roots = root_store(extra_ca.as_deref())?;
                builder.with_root_certificates(roots).with_no_client_auth()
            }
        };
        config.alpn_protocols = vec![ALPN_QUICSSH.to_vec()];
        Ok(config)
    }
}

/// Bundled web PKI roots, plus every certificate found in `extra_ca`.
fn root_store(extra_ca: Option<&Path>) -> Result<RootCertStore, TunnelError> {
    let mut roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let Some(path) = extra_ca else {
        return Ok(roots);
    };

    let certs = CertificateDer::pem_file_iter(path)
        .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
        .map_err(|e| {
            TunnelError::TlsConfig(format!("Failed to read CA cert {}: {e}", path.display()))
        })?;
    if certs.is_empty() {
        return Err(TunnelError::TlsConfig(format!(
            "No certificates found in {}",
            path.display()
        )));
    }
    let count = certs.len();
    for cert in certs {
        roots
            .add(cert)
            .map_err(|e| TunnelError::TlsConfig(format!("Invalid CA cert: {e}")))?;
    }
    info!(ca_cert = %path.display(), count, "Added custom CA certificates");
    Ok(roots)
}

/// Split `host:port`, accepting bracketed IPv6 hosts (`[::1]:4242`).
///
/// The port must be a numeric `u16` and the host must be non-empty. This is
/// intentionally strict: `:4242`, `host:` and named ports like `host:ssh`
/// are all rejected rather than left for the resolver to interpret.
pub fn split_host_port(addr: &str) -> Result<(&str, u16), TunnelError> {
    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| TunnelError::address(addr, "missing ']' in address"))?;
        let port = after
            .strip_prefix(':')
            .ok_or_else(|| TunnelError::address(addr, "missing port in address"))?;
        (host, port)
    } else {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| TunnelError::address(addr, "missing port in address"))?;
        if host.contains(':') {
            return Err(TunnelError::address(addr, "too many colons in address"));
        }
        (host, port)
    };

    if host.is_empty() {
        return Err(TunnelError::address(addr, "missing host in address"));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| TunnelError::address(addr, "invalid port"))?;
    Ok((host, port))
}

/// Certificate verifier that accepts any server certificate.
///
/// Handshake signatures are still checked so the peer has to own the key of
/// the certificate it presents.
#[derive(Debug)]
struct NoServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for NoServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
