//! Types and the client interface of the product's administrative API.
//!
//! The orchestrator only ever talks to the installed PKI product through
//! the [`AdminApi`] trait. The [`http`] module provides the REST binding
//! used in production; tests substitute an in-memory implementation.

pub mod http;

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::commons::httpclient;


//------------ Token ---------------------------------------------------------

/// An opaque session token handed out by the login call.
#[derive(Clone, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Token(String);

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token(s)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Never prints the secret.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Token(..)")
    }
}


//------------ Identifiers ---------------------------------------------------

macro_rules! identifier {
    ( $( #[$attr:meta] )* $name:ident ) => {
        $( #[$attr] )*
        #[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    }
}

identifier!(
    /// Identifies a key store.
    KeyStoreId
);
identifier!(
    /// Identifies a local CA configuration.
    CaConfigId
);
identifier!(
    /// Identifies a certificate profile.
    ProfileId
);
identifier!(
    /// Identifies a certificate issuer.
    IssuerId
);
identifier!(
    /// Identifies a CSR generator.
    GeneratorId
);
identifier!(
    /// Identifies a team.
    TeamId
);


//------------ Key Parameters ------------------------------------------------

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignatureAlgorithm {
    Rsa,
    Ecdsa,
}

impl SignatureAlgorithm {
    /// The key sizes the product accepts for this algorithm.
    pub fn key_sizes(self) -> &'static [u32] {
        match self {
            SignatureAlgorithm::Rsa => &[2048, 3072, 4096],
            SignatureAlgorithm::Ecdsa => &[256, 384, 521],
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignatureAlgorithm::Rsa => f.write_str("RSA"),
            SignatureAlgorithm::Ecdsa => f.write_str("ECDSA"),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

/// Key generation parameters shared by CA configs and CSR generators.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyParameters {
    #[serde(alias = "signature_algorithm")]
    pub signature_algorithm: SignatureAlgorithm,

    #[serde(alias = "key_size")]
    pub key_size: u32,

    #[serde(alias = "hash_algorithm")]
    pub hash_algorithm: HashAlgorithm,
}

impl KeyParameters {
    pub fn verify(&self) -> Result<(), String> {
        if self.signature_algorithm.key_sizes().contains(&self.key_size) {
            Ok(())
        } else {
            Err(format!(
                "key size {} is not valid for {}, expected one of {:?}",
                self.key_size,
                self.signature_algorithm,
                self.signature_algorithm.key_sizes()
            ))
        }
    }
}

impl Default for KeyParameters {
    fn default() -> Self {
        KeyParameters {
            signature_algorithm: SignatureAlgorithm::Rsa,
            key_size: 4096,
            hash_algorithm: HashAlgorithm::Sha256,
        }
    }
}


//------------ Requests ------------------------------------------------------

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    pub token: Token,
}

/// The generic `{"id": ..}` reply of the create calls.
#[derive(Clone, Debug, Deserialize)]
pub struct IdResponse<T> {
    pub id: T,
}

#[derive(Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStoreRequest {
    pub name: String,
    pub password: String,

    #[serde(rename = "type")]
    pub kind: KeyStoreKind,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyStoreKind {
    Software,
}

/// Never prints the password.
impl fmt::Debug for KeyStoreRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeyStoreRequest")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// CRL generation settings of a CA config.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrlSettings {
    pub lifetime_hours: u32,
    pub regeneration_hours: u32,
    pub file_path: String,
    pub distribution_point: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyInformation {
    pub oid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Parameters for creating a local CA config.
///
/// A root has no issuer. An intermediate refers to its root through
/// `issuer_id`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaConfigRequest {
    pub name: String,

    #[serde(flatten)]
    pub key: KeyParameters,

    pub is_root: bool,
    pub key_store_id: KeyStoreId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_id: Option<CaConfigId>,

    pub subject_dn: String,
    pub validity_days: u32,
    pub crl: CrlSettings,
    pub policies: Vec<PolicyInformation>,
}

/// The reply to creating a CA config.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaConfigInfo {
    pub id: CaConfigId,

    /// The CA certificate, as PEM or bare base64 DER.
    pub certificate: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtendedKeyUsage {
    ClientAuth,
    ServerAuth,
    CodeSigning,
    EmailProtection,
    OcspSigning,
    TimeStamping,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyUsage {
    DigitalSignature,
    NonRepudiation,
    KeyEncipherment,
    DataEncipherment,
    KeyAgreement,
    KeyCertSign,
    CrlSign,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertProfileRequest {
    pub name: String,
    pub lifetime_minutes: u64,
    pub copy_sans_from_request: bool,
    pub extended_key_usages: Vec<ExtendedKeyUsage>,
    pub key_usages: Vec<KeyUsage>,
}

/// Binds a CA config and a profile under a named issuer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerRequest {
    pub name: String,
    pub ca_config_id: CaConfigId,
    pub profile_id: ProfileId,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrGeneratorRequest {
    pub name: String,

    #[serde(flatten)]
    pub key: KeyParameters,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    pub name: String,

    #[serde(default)]
    pub authorised_cas: Vec<IssuerId>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAuthorisationUpdate<'a> {
    pub authorised_cas: &'a [IssuerId],
}


//------------ ErrorResponse -------------------------------------------------

/// An API error response.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorResponse {
    /// The error label.
    pub label: String,

    /// The error message.
    pub msg: String,

    /// Arguments with details about the error.
    #[serde(default)]
    pub args: HashMap<String, String>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.msg)
    }
}


//------------ AdminApi ------------------------------------------------------

/// The capabilities of the administrative API used during provisioning.
///
/// Every call except `login` needs the session token it returned.
#[allow(async_fn_in_trait)]
pub trait AdminApi {
    async fn login(
        &self, username: &str, password: &str
    ) -> Result<Token, ApiError>;

    async fn logout(&self, token: &Token) -> Result<(), ApiError>;

    async fn create_key_store(
        &self, token: &Token, req: &KeyStoreRequest
    ) -> Result<KeyStoreId, ApiError>;

    async fn create_local_ca_config(
        &self, token: &Token, req: &CaConfigRequest
    ) -> Result<CaConfigInfo, ApiError>;

    async fn set_ocsp_for_local_ca(
        &self, token: &Token, ca: &CaConfigId
    ) -> Result<(), ApiError>;

    async fn create_cert_profile(
        &self, token: &Token, req: &CertProfileRequest
    ) -> Result<ProfileId, ApiError>;

    async fn create_local_ca(
        &self, token: &Token, req: &IssuerRequest
    ) -> Result<IssuerId, ApiError>;

    async fn create_csr_generator(
        &self, token: &Token, req: &CsrGeneratorRequest
    ) -> Result<GeneratorId, ApiError>;

    async fn get_team(
        &self, token: &Token, name: &str
    ) -> Result<Team, ApiError>;

    async fn update_team(
        &self, token: &Token, team: &TeamId, authorised_cas: &[IssuerId]
    ) -> Result<(), ApiError>;
}


//------------ ApiError ------------------------------------------------------

/// Why an administrative API call failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiError {
    /// Credentials or session were refused.
    Unauthorized(String),

    /// A referenced entity does not exist.
    NotFound(String),

    /// The entity already exists, or was changed concurrently.
    Conflict(String),

    /// The request was refused as invalid.
    Rejected(String),

    /// The service could not be reached or is not ready.
    Unavailable(String),

    /// The service answered with something we could not understand.
    Protocol(String),
}

impl ApiError {
    /// Returns whether trying again later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Unavailable(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            ApiError::NotFound(msg) => write!(f, "not found: {msg}"),
            ApiError::Conflict(msg) => write!(f, "conflict: {msg}"),
            ApiError::Rejected(msg) => write!(f, "rejected: {msg}"),
            ApiError::Unavailable(msg) => write!(f, "unavailable: {msg}"),
            ApiError::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<httpclient::Error> for ApiError {
    fn from(err: httpclient::Error) -> Self {
        let msg = err.to_string();
        if err.is_unreachable() {
            return ApiError::Unavailable(msg);
        }
        match err.status() {
            Some(status) => match status.as_u16() {
                401 | 403 => ApiError::Unauthorized(msg),
                404 => ApiError::NotFound(msg),
                409 => ApiError::Conflict(msg),
                400..=499 => ApiError::Rejected(msg),
                _ => ApiError::Unavailable(msg),
            },
            None => match err {
                httpclient::Error::RequestExecute(..) => {
                    ApiError::Unavailable(msg)
                }
                _ => ApiError::Protocol(msg),
            },
        }
    }
}


//------------ Tests ---------------------------------------------------------
