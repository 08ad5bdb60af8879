// Shared transport configuration and endpoint derivation.
//
// The control client and the detection stream both hang off one backend
// base URL; this module owns how that URL is turned into concrete
// endpoints and how the reqwest client and stream TLS config are built.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_tungstenite::Connector;
use url::Url;

use crate::error::Error;

/// Default stream path on the backend.
pub const DEFAULT_STREAM_PATH: &str = "/ws/detections";

/// Path of the live MJPEG stream served by the backend.
pub const VIDEO_PATH: &str = "/stream";

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (self-signed lab deployments).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::default(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("bob-api/", env!("CARGO_PKG_VERSION")));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// TLS settings for `wss://` handshakes, matching [`build_client`](Self::build_client).
    pub fn stream_tls(&self) -> Result<StreamTls, Error> {
        StreamTls::from_mode(&self.tls)
    }
}

// ── Stream TLS ───────────────────────────────────────────────────────

/// rustls configuration applied to the detection stream handshake.
///
/// `System` keeps tokio-tungstenite's bundled webpki roots; the other
/// modes carry an explicit client config.
#[derive(Clone, Default)]
pub struct StreamTls {
    config: Option<Arc<ClientConfig>>,
}

impl fmt::Debug for StreamTls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTls")
            .field("custom", &self.config.is_some())
            .finish()
    }
}

impl StreamTls {
    pub fn from_mode(mode: &TlsMode) -> Result<Self, Error> {
        let config = match mode {
            TlsMode::System => None,
            TlsMode::CustomCa(path) => Some(custom_ca_config(path)?),
            TlsMode::DangerAcceptInvalid => Some(accept_any_config()?),
        };
        Ok(Self {
            config: config.map(Arc::new),
        })
    }

    pub fn is_custom(&self) -> bool {
        self.config.is_some()
    }

    pub(crate) fn connector(&self) -> Option<Connector> {
        self.config
            .as_ref()
            .map(|config| Connector::Rustls(Arc::clone(config)))
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn config_builder(
    provider: Arc<CryptoProvider>,
) -> Result<rustls::ConfigBuilder<ClientConfig, rustls::WantsVerifier>, Error> {
    ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("unsupported TLS versions: {e}")))
}

fn custom_ca_config(path: &Path) -> Result<ClientConfig, Error> {
    let mut roots = RootCertStore::empty();
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
    for cert in certs {
        let cert = cert.map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
        roots
            .add(cert)
            .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
    }
    if roots.is_empty() {
        return Err(Error::Tls(format!(
            "no certificates in {}",
            path.display()
        )));
    }
    Ok(config_builder(provider())?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

fn accept_any_config() -> Result<ClientConfig, Error> {
    let provider = provider();
    Ok(config_builder(Arc::clone(&provider))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
        .with_no_client_auth())
}

/// Skips chain and hostname checks; handshake signatures are still verified.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
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
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

// ── Endpoints ────────────────────────────────────────────────────────

/// Concrete endpoints derived from the backend base URL.
///
/// The stream endpoint mirrors the base scheme: `http` upgrades to `ws`,
/// `https` to `wss`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
    stream_path: String,
}

impl Endpoints {
    /// Build endpoints for `base` using the default stream path.
    pub fn new(base: Url) -> Result<Self, Error> {
        Self::with_stream_path(base, DEFAULT_STREAM_PATH)
    }

    pub fn with_stream_path(base: Url, stream_path: &str) -> Result<Self, Error> {
        match base.scheme() {
            "http" | "https" => {}
            other => return Err(Error::UnsupportedScheme(other.to_owned())),
        }
        Ok(Self {
            base,
            stream_path: stream_path.to_owned(),
        })
    }

    /// Control-plane URL: `{base}/api/{path}`.
    pub fn api(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base.join(&format!("/api/{}", path.trim_start_matches('/')))?)
    }

    /// Detection stream URL with the scheme upgraded to `ws`/`wss`.
    pub fn stream(&self) -> Result<Url, Error> {
        let mut url = self.base.join(&self.stream_path)?;
        let scheme = if self.base.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::UnsupportedScheme(scheme.to_owned()))?;
        Ok(url)
    }

    /// Live video frame resource.
    pub fn video(&self) -> Result<Url, Error> {
        Ok(self.base.join(VIDEO_PATH)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_base_upgrades_to_ws() {
        let ep = Endpoints::new("http://bob.local:8080".parse().unwrap()).unwrap();
        assert_eq!(ep.stream().unwrap().as_str(), "ws://bob.local:8080/ws/detections");
        assert_eq!(ep.api("status").unwrap().as_str(), "http://bob.local:8080/api/status");
        assert_eq!(ep.video().unwrap().as_str(), "http://bob.local:8080/stream");
    }

    #[test]
    fn secure_base_upgrades_to_wss() {
        let ep = Endpoints::new("https://bob.example.com".parse().unwrap()).unwrap();
        assert_eq!(ep.stream().unwrap().as_str(), "wss://bob.example.com/ws/detections");
    }

    #[test]
    fn custom_stream_path() {
        let ep = Endpoints::with_stream_path("http://10.0.0.2".parse().unwrap(), "/feed").unwrap();
        assert_eq!(ep.stream().unwrap().as_str(), "ws://10.0.0.2/feed");
    }

    #[test]
    fn rejects_non_http_base() {
        let err = Endpoints::new("ftp://bob.local".parse().unwrap()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(s) if s == "ftp"));
    }

    #[test]
    fn system_stream_tls_uses_bundled_roots() {
        let tls = StreamTls::from_mode(&TlsMode::System).unwrap();
        assert!(!tls.is_custom());
        assert!(tls.connector().is_none());
    }

    #[test]
    fn accept_invalid_stream_tls_carries_config() {
        let transport = TransportConfig {
            tls: TlsMode::DangerAcceptInvalid,
            ..TransportConfig::default()
        };
        let tls = transport.stream_tls().unwrap();
        assert!(tls.is_custom());
        assert!(matches!(tls.connector(), Some(Connector::Rustls(_))));
    }

    #[test]
    fn missing_ca_file_is_a_tls_error() {
        let mode = TlsMode::CustomCa(PathBuf::from("/nonexistent/bob-ca.pem"));
        let err = StreamTls::from_mode(&mode).unwrap_err();
        assert!(matches!(err, Error::Tls(_)));
    }

    #[test]
    fn empty_ca_file_is_a_tls_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.pem");
        std::fs::write(&path, "not a certificate\n").unwrap();
        let err = StreamTls::from_mode(&TlsMode::CustomCa(path)).unwrap_err();
        assert!(matches!(err, Error::Tls(msg) if msg.starts_with("no certificates")));
    }
}
