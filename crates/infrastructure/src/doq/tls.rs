//! TLS 1.3 material and QUIC crypto configuration for both DoQ roles.

use doqd_domain::{DomainError, ProtocolIdentifiers};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{aws_lc_rs, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use std::io::BufReader;
use std::sync::Arc;

/// Certificate chain and private key presented by a DoQ server.
#[derive(Debug)]
pub struct TlsIdentity {
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl Clone for TlsIdentity {
    fn clone(&self) -> Self {
        Self {
            certs: self.certs.clone(),
            key: self.key.clone_key(),
        }
    }
}

impl TlsIdentity {
    pub fn new(certs: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        Self { certs, key }
    }

    pub fn from_pem_files(cert_path: &str, key_path: &str) -> Result<Self, DomainError> {
        let cert_pem = std::fs::read(cert_path).map_err(|e| {
            DomainError::TlsConfig(format!("Failed to read certificate {}: {}", cert_path, e))
        })?;
        let key_pem = std::fs::read(key_path).map_err(|e| {
            DomainError::TlsConfig(format!("Failed to read private key {}: {}", key_path, e))
        })?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, DomainError> {
        let certs: Vec<CertificateDer<'static>> =
            rustls_pemfile::certs(&mut BufReader::new(cert_pem))
                .collect::<Result<_, _>>()
                .map_err(|e| DomainError::TlsConfig(format!("Invalid certificate PEM: {}", e)))?;

        if certs.is_empty() {
            return Err(DomainError::TlsConfig(
                "No certificates found in PEM input".to_string(),
            ));
        }

        let key = rustls_pemfile::private_key(&mut BufReader::new(key_pem))
            .map_err(|e| DomainError::TlsConfig(format!("Invalid private key PEM: {}", e)))?
            .ok_or_else(|| DomainError::TlsConfig("No private key found in PEM input".into()))?;

        Ok(Self { certs, key })
    }

    pub fn certs(&self) -> &[CertificateDer<'static>] {
        &self.certs
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(aws_lc_rs::default_provider())
}

/// Server-side QUIC crypto offering exactly `identifiers` via ALPN.
pub fn server_crypto(
    identity: &TlsIdentity,
    identifiers: &ProtocolIdentifiers,
) -> Result<Arc<quinn::crypto::rustls::QuicServerConfig>, DomainError> {
    let mut tls_config = rustls::ServerConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| DomainError::TlsConfig(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(identity.certs.clone(), identity.key.clone_key())
        .map_err(|e| DomainError::TlsConfig(e.to_string()))?;
    tls_config.alpn_protocols = identifiers.alpn_protocols();

    let quic_config = quinn::crypto::rustls::QuicServerConfig::try_from(tls_config)
        .map_err(|e| DomainError::TlsConfig(e.to_string()))?;
    Ok(Arc::new(quic_config))
}

/// Client-side QUIC crypto. Verifies against the webpki roots unless
/// `insecure_skip_verify` is set.
pub fn client_crypto(
    identifiers: &ProtocolIdentifiers,
    insecure_skip_verify: bool,
) -> Result<Arc<quinn::crypto::rustls::QuicClientConfig>, DomainError> {
    let builder = rustls::ClientConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| DomainError::TlsConfig(e.to_string()))?;

    let mut tls_config = if insecure_skip_verify {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification::new()))
            .with_no_client_auth()
    } else {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder
            .with_root_certificates(root_store)
            .with_no_client_auth()
    };
    tls_config.alpn_protocols = identifiers.alpn_protocols();

    let quic_config = quinn::crypto::rustls::QuicClientConfig::try_from(tls_config)
        .map_err(|e| DomainError::TlsConfig(e.to_string()))?;
    Ok(Arc::new(quic_config))
}

/// Accepts any server certificate. Signatures are still checked so the
/// handshake stays well-formed.
#[derive(Debug)]
pub struct SkipServerVerification(Arc<CryptoProvider>);

impl SkipServerVerification {
    pub fn new() -> Self {
        Self(provider())
    }
}

impl Default for SkipServerVerification {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerCertVerifier for SkipServerVerification {
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
