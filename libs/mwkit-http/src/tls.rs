//! rustls client configuration.
//!
//! Native root certificates are loaded once per process; OS certificate
//! store lookups are slow on some platforms.

use crate::config::TlsRootConfig;
use crate::error::HttpError;
use hyper_rustls::ConfigBuilderExt;
use rustls_pki_types::CertificateDer;
use std::sync::{Arc, OnceLock};

static NATIVE_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

fn load_native_certs() -> Vec<CertificateDer<'static>> {
    let result = rustls_native_certs::load_native_certs();
    for err in &result.errors {
        tracing::warn!(error = %err, "error loading native root certificate");
    }
    if result.certs.is_empty() {
        tracing::warn!("no native root CA certificates found");
    } else {
        tracing::debug!(count = result.certs.len(), "loaded native root certificates");
    }
    result.certs
}

/// Cached native root certificates (possibly empty).
pub fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS.get_or_init(load_native_certs).as_slice()
}

/// Globally installed crypto provider, or a fresh aws-lc-rs provider.
///
/// Never installs a provider globally.
pub fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Build the rustls `ClientConfig` for the selected root store.
///
/// # Errors
/// Returns `HttpError::Tls` if protocol versions cannot be set, or if native
/// roots were requested and none could be parsed.
pub fn client_config(roots: TlsRootConfig) -> Result<rustls::ClientConfig, HttpError> {
    let builder = rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| HttpError::Tls(Box::new(e)))?;

    let config = match roots {
        TlsRootConfig::WebPki => builder.with_webpki_roots().with_no_client_auth(),
        TlsRootConfig::Native => builder
            .with_root_certificates(native_root_store()?)
            .with_no_client_auth(),
    };
    Ok(config)
}

fn native_root_store() -> Result<rustls::RootCertStore, HttpError> {
    let certs = native_root_certs();
    if certs.is_empty() {
        return Err(HttpError::Tls(
            "no native root CA certificates found in OS certificate store".into(),
        ));
    }

    let mut store = rustls::RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(certs.iter().cloned());
    if ignored > 0 {
        tracing::warn!(added, ignored, "some native root certificates could not be parsed");
    }
    if added == 0 {
        return Err(HttpError::Tls(
            format!("none of the {} native root certificates could be parsed", certs.len()).into(),
        ));
    }
    Ok(store)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_native_roots_cached() {
        let first = native_root_certs();
        let second = native_root_certs();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_webpki_config_builds() {
        let config = client_config(TlsRootConfig::WebPki).unwrap();
        assert!(config.alpn_protocols.is_empty());
    }

    #[test]
    fn test_native_config_does_not_panic() {
        // CI containers may have no OS certificates; either outcome is fine.
        match client_config(TlsRootConfig::Native) {
            Ok(_) | Err(HttpError::Tls(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
}
