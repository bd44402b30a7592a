//! Errors of a provisioning run.

use std::{fmt, path::PathBuf};

use url::Url;

use crate::api::{ApiError, CaConfigId};
use crate::commons::file::FileError;
use crate::commons::template::TemplateError;
use crate::local::HostError;
use crate::local::process::ExitOutcome;
use crate::local::truststore::{StoreLocation, TrustStoreError};
use super::cert::CertError;
use super::step::Step;


//------------ Failure -------------------------------------------------------

/// The error that ended a provisioning run, and the step it happened in.
#[derive(Debug)]
pub struct Failure {
    pub step: Step,
    pub error: ProvisionError,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "step '{}' failed: {}", self.step, self.error)
    }
}

impl std::error::Error for Failure {}


//------------ ProvisionError ------------------------------------------------

#[derive(Debug)]
pub enum ProvisionError {
    Privileges(TrustStoreError),
    Download {
        uri: Url,
        cause: HostError,
    },
    Extraction {
        archive: PathBuf,
        cause: HostError,
    },
    PrerequisiteInstall {
        command: String,
        cause: InstallFailure,
    },
    Install {
        command: String,
        cause: InstallFailure,
    },
    TrustImport {
        cert: PathBuf,
        location: StoreLocation,
        cause: TrustStoreError,
    },
    Authentication {
        username: String,
        cause: ApiError,
    },
    KeyStoreCreation {
        name: String,
        cause: ApiError,
    },
    HostResolution(HostError),
    CaConfig {
        name: String,
        cause: CaFailure,
    },
    CertificateFile {
        path: PathBuf,
        cause: FileError,
    },
    IssuerNotFound {
        name: String,
        issuer: CaConfigId,
        cause: ApiError,
    },
    OcspBinding {
        ca: CaConfigId,
        cause: ApiError,
    },
    ProfileCreation {
        name: String,
        cause: ApiError,
    },
    IssuerCreation {
        name: String,
        cause: ApiError,
    },
    GeneratorCreation {
        name: String,
        cause: ApiError,
    },
    TeamUpdate {
        team: String,
        cause: ApiError,
    },
    AuthorizationUpdate {
        team: String,
        cause: ApiError,
    },
    SessionClose(ApiError),
    Browser {
        uri: Url,
        cause: HostError,
    },

    /// A step ran before the one producing what it needs.
    MissingPrerequisite {
        step: Step,
        needs: &'static str,
    },
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProvisionError::Privileges(e) => {
                write!(f, "cannot modify the trust store: {e}")
            }
            ProvisionError::Download { uri, cause } => {
                write!(f, "cannot download installer from {uri}: {cause}")
            }
            ProvisionError::Extraction { archive, cause } => {
                write!(f, "cannot unpack '{}': {}", archive.display(), cause)
            }
            ProvisionError::PrerequisiteInstall { command, cause } => {
                write!(f, "prerequisite installer '{command}' {cause}")
            }
            ProvisionError::Install { command, cause } => {
                write!(f, "installer '{command}' {cause}")
            }
            ProvisionError::TrustImport { cert, location, cause } => write!(
                f, "cannot add '{}' to the {}: {}",
                cert.display(), location, cause
            ),
            ProvisionError::Authentication { username, cause } => {
                write!(f, "cannot log in as '{username}': {cause}")
            }
            ProvisionError::KeyStoreCreation { name, cause } => {
                write!(f, "cannot create key store '{name}': {cause}")
            }
            ProvisionError::HostResolution(e) => {
                write!(f, "cannot determine the local FQDN: {e}")
            }
            ProvisionError::CaConfig { name, cause } => {
                write!(f, "cannot create CA '{name}': {cause}")
            }
            ProvisionError::CertificateFile { path, cause } => write!(
                f, "cannot save certificate to '{}': {}", path.display(), cause
            ),
            ProvisionError::IssuerNotFound { name, issuer, cause } => write!(
                f, "cannot create CA '{name}' under issuing CA '{issuer}', \
                    a referenced entity is unknown: {cause}"
            ),
            ProvisionError::OcspBinding { ca, cause } => {
                write!(f, "cannot enable OCSP for CA '{ca}': {cause}")
            }
            ProvisionError::ProfileCreation { name, cause } => {
                write!(f, "cannot create certificate profile '{name}': {cause}")
            }
            ProvisionError::IssuerCreation { name, cause } => {
                write!(f, "cannot create issuer '{name}': {cause}")
            }
            ProvisionError::GeneratorCreation { name, cause } => {
                write!(f, "cannot create CSR generator '{name}': {cause}")
            }
            ProvisionError::TeamUpdate { team, cause } => {
                write!(f, "cannot read team '{team}': {cause}")
            }
            ProvisionError::AuthorizationUpdate { team, cause } => {
                write!(f, "cannot update issuers of team '{team}': {cause}")
            }
            ProvisionError::SessionClose(e) => {
                write!(f, "cannot log out: {e}")
            }
            ProvisionError::Browser { uri, cause } => {
                write!(f, "cannot open {uri}: {cause}")
            }
            ProvisionError::MissingPrerequisite { step, needs } => {
                write!(f, "step '{step}' ran before {needs} was available")
            }
        }
    }
}

impl std::error::Error for ProvisionError {}


//------------ InstallFailure ------------------------------------------------

/// Why an installer program did not succeed.
#[derive(Debug)]
pub enum InstallFailure {
    Template(TemplateError),
    Host(HostError),
    Exit(ExitOutcome),
}

impl fmt::Display for InstallFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InstallFailure::Template(e) => write!(f, "has invalid arguments: {e}"),
            InstallFailure::Host(e) => write!(f, "could not be started: {e}"),
            InstallFailure::Exit(outcome) => outcome.fmt(f),
        }
    }
}


//------------ CaFailure -----------------------------------------------------

/// Why creating a CA config failed.
#[derive(Debug)]
pub enum CaFailure {
    Template(TemplateError),
    Api(ApiError),
    Certificate(CertError),
}

impl fmt::Display for CaFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CaFailure::Template(e) => e.fmt(f),
            CaFailure::Api(e) => e.fmt(f),
            CaFailure::Certificate(e) => {
                write!(f, "the returned certificate is unusable: {e}")
            }
        }
    }
}
