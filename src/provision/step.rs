//! The steps of a provisioning run.

use std::fmt;

use serde::Serialize;


//------------ Step ----------------------------------------------------------

/// A single step of a provisioning run.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Preflight,
    FetchInstaller,
    UnpackInstaller,
    InstallPrerequisites,
    InstallProduct,
    TrustBootstrapCertificate,
    Authenticate,
    CreateKeyStore,
    ResolveFqdn,
    CreateRootCa,
    CreateIntermediateCa,
    EnableOcsp,
    CreateProfile,
    CreateIssuer,
    CreateCsrGenerator,
    AuthorizeTeam,
    CloseSession,
    ImportCertificates,
    LaunchBrowser,
}

impl Step {
    /// All steps in the order they are run.
    pub const ALL: &'static [Step] = &[
        Step::Preflight,
        Step::FetchInstaller,
        Step::UnpackInstaller,
        Step::InstallPrerequisites,
        Step::InstallProduct,
        Step::TrustBootstrapCertificate,
        Step::Authenticate,
        Step::CreateKeyStore,
        Step::ResolveFqdn,
        Step::CreateRootCa,
        Step::CreateIntermediateCa,
        Step::EnableOcsp,
        Step::CreateProfile,
        Step::CreateIssuer,
        Step::CreateCsrGenerator,
        Step::AuthorizeTeam,
        Step::CloseSession,
        Step::ImportCertificates,
        Step::LaunchBrowser,
    ];

    /// Whether a failure of this step is only logged.
    pub fn is_best_effort(self) -> bool {
        matches!(self, Step::CloseSession | Step::LaunchBrowser)
    }

    pub fn name(self) -> &'static str {
        match self {
            Step::Preflight => "preflight",
            Step::FetchInstaller => "fetch-installer",
            Step::UnpackInstaller => "unpack-installer",
            Step::InstallPrerequisites => "install-prerequisites",
            Step::InstallProduct => "install-product",
            Step::TrustBootstrapCertificate => "trust-bootstrap-certificate",
            Step::Authenticate => "authenticate",
            Step::CreateKeyStore => "create-key-store",
            Step::ResolveFqdn => "resolve-fqdn",
            Step::CreateRootCa => "create-root-ca",
            Step::CreateIntermediateCa => "create-intermediate-ca",
            Step::EnableOcsp => "enable-ocsp",
            Step::CreateProfile => "create-profile",
            Step::CreateIssuer => "create-issuer",
            Step::CreateCsrGenerator => "create-csr-generator",
            Step::AuthorizeTeam => "authorize-team",
            Step::CloseSession => "close-session",
            Step::ImportCertificates => "import-certificates",
            Step::LaunchBrowser => "launch-browser",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}


//------------ Tests ---------------------------------------------------------
