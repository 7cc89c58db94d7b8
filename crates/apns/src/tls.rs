use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use rustls::client::Resumption;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};

use crate::config::SessionConfig;
use crate::error::Error;

/// TLS 1.2 is the historical floor for APNs; 1.3 is permitted because the
/// stack negotiates `h2` over ALPN on both.
pub static TLS_VERSIONS: &[&rustls::SupportedProtocolVersion] =
	&[&rustls::version::TLS12, &rustls::version::TLS13];

static SYSTEM_ROOT: Lazy<rustls_native_certs::CertificateResult> =
	Lazy::new(rustls_native_certs::load_native_certs);

/// Strong AEAD suites only.
pub fn provider() -> Arc<CryptoProvider> {
	Arc::new(CryptoProvider {
		cipher_suites: vec![
			rustls::crypto::ring::cipher_suite::TLS13_AES_256_GCM_SHA384,
			rustls::crypto::ring::cipher_suite::TLS13_AES_128_GCM_SHA256,
			rustls::crypto::ring::cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
			rustls::crypto::ring::cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
			rustls::crypto::ring::cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
			rustls::crypto::ring::cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
			rustls::crypto::ring::cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
			rustls::crypto::ring::cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
			rustls::crypto::ring::cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
		],
		..rustls::crypto::ring::default_provider()
	})
}

fn load_roots(ca: Option<&Path>) -> Result<RootCertStore, Error> {
	let mut roots = RootCertStore::empty();
	match ca {
		Some(path) => {
			let pem = std::fs::read(path)?;
			let mut reader = BufReader::new(Cursor::new(pem));
			let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
			roots.add_parsable_certificates(certs);
		},
		None => {
			for cert in &SYSTEM_ROOT.certs {
				roots.add(cert.clone())?;
			}
		},
	}
	if roots.is_empty() {
		return Err(Error::Credentials("trust store is empty".to_string()));
	}
	Ok(roots)
}

fn load_client_cert(
	cert: &Path,
	key: &Path,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), Error> {
	let pem = std::fs::read(cert)?;
	let mut reader = BufReader::new(Cursor::new(pem));
	let chain = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
	if chain.is_empty() {
		return Err(Error::Credentials(format!(
			"no certificate in {}",
			cert.display()
		)));
	}
	let pem = std::fs::read(key)?;
	let mut reader = BufReader::new(Cursor::new(pem));
	let private_key = rustls_pemfile::private_key(&mut reader)?.ok_or_else(|| {
		Error::Credentials(format!("no private key in {}", key.display()))
	})?;
	Ok((chain, private_key))
}

/// Builds the rustls client configuration for one session.
///
/// Certificate mode requires the CA bundle and the client cert/key pair; JWT
/// mode uses the system trust store and presents no client certificate.
/// Session resumption and early data stay off; APNs gets a full handshake
/// every time.
pub fn client_config(cfg: &SessionConfig) -> Result<Arc<ClientConfig>, Error> {
	let roots = if cfg.use_jwt {
		load_roots(None)?
	} else {
		let ca = cfg.ca.as_deref().ok_or_else(|| {
			Error::Credentials("certificate mode requires a ca bundle".to_string())
		})?;
		load_roots(Some(ca))?
	};

	let builder = ClientConfig::builder_with_provider(provider())
		.with_protocol_versions(TLS_VERSIONS)?
		.with_root_certificates(roots);

	let mut config = if cfg.use_jwt {
		builder.with_no_client_auth()
	} else {
		let cert = cfg.certificate.as_deref().ok_or_else(|| {
			Error::Credentials("certificate mode requires a client certificate".to_string())
		})?;
		let key = cfg.key.as_deref().ok_or_else(|| {
			Error::Credentials("certificate mode requires a client key".to_string())
		})?;
		let (chain, private_key) = load_client_cert(cert, key)?;
		builder.with_client_auth_cert(chain, private_key)?
	};

	config.resumption = Resumption::disabled();
	config.enable_early_data = false;
	config.alpn_protocols = vec![b"h2".to_vec()];
	Ok(Arc::new(config))
}

/// True only when the configured trust store and credentials load cleanly.
pub fn check_credentials(cfg: &SessionConfig) -> bool {
	client_config(cfg).is_ok()
}
