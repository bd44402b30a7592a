//! Checking the CA certificates returned by the API.

use std::fmt;

use base64::Engine;
use openssl::{nid::Nid, x509::X509};


//------------ CaCertificate -------------------------------------------------

/// A parsed CA certificate.
pub struct CaCertificate {
    cert: X509,
}

impl CaCertificate {
    /// Parses a certificate given as PEM or as bare base64 DER.
    pub fn parse(text: &str) -> Result<Self, CertError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CertError::Empty);
        }

        let cert = if text.contains("-----BEGIN") {
            X509::from_pem(text.as_bytes())?
        } else {
            let compact: String = text.split_whitespace().collect();
            let der = base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())?;
            X509::from_der(&der)?
        };
        Ok(CaCertificate { cert })
    }

    pub fn to_pem(&self) -> Result<Vec<u8>, CertError> {
        Ok(self.cert.to_pem()?)
    }

    /// The subject as comma separated `KEY=value` pairs.
    pub fn subject(&self) -> String {
        subject_attributes(&self.cert)
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Whether the subject holds the same attributes as `dn`.
    ///
    /// Key case, whitespace around values and attribute order are ignored.
    pub fn subject_matches(&self, dn: &str) -> bool {
        let mut expected = parse_dn(dn);
        let mut actual = subject_attributes(&self.cert);
        expected.sort();
        actual.sort();
        expected == actual
    }
}

fn subject_attributes(cert: &X509) -> Vec<(String, String)> {
    cert.subject_name()
        .entries()
        .map(|entry| {
            let nid = entry.object().nid();
            let key = short_name(nid);
            let value = entry
                .data()
                .to_string()
                .unwrap_or_default();
            (key, value.trim().to_string())
        })
        .collect()
}

fn short_name(nid: Nid) -> String {
    nid.short_name()
        .map(|name| name.to_ascii_uppercase())
        .unwrap_or_else(|_| format!("{}", nid.as_raw()))
}

/// Splits a simple DN like `CN=Test Root,O=Org`.
fn parse_dn(dn: &str) -> Vec<(String, String)> {
    dn.split(',')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            Some((
                key.trim().to_ascii_uppercase(),
                value.trim().to_string(),
            ))
        })
        .collect()
}


//------------ CertError -----------------------------------------------------

#[derive(Debug)]
pub enum CertError {
    Empty,
    Base64(base64::DecodeError),
    X509(openssl::error::ErrorStack),
}

impl fmt::Display for CertError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CertError::Empty => f.write_str("the certificate is empty"),
            CertError::Base64(e) => write!(f, "invalid base64 certificate: {e}"),
            CertError::X509(e) => write!(f, "invalid certificate: {e}"),
        }
    }
}

impl std::error::Error for CertError {}

impl From<base64::DecodeError> for CertError {
    fn from(e: base64::DecodeError) -> Self {
        CertError::Base64(e)
    }
}

impl From<openssl::error::ErrorStack> for CertError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        CertError::X509(e)
    }
}


//------------ Tests ---------------------------------------------------------
