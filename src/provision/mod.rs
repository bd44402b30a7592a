//! The provisioning run.
//!
//! A [`Provisioner`] walks through the [`Step`]s in order. Each step reads
//! what it needs from the [`Progress`] of the steps before it and records
//! what it created. The first failing step ends the run, except for the
//! steps marked as best effort.

pub mod cert;
pub mod error;
pub mod progress;
pub mod step;

pub use self::error::{Failure, ProvisionError};
pub use self::progress::{Progress, Provisioned};
pub use self::step::Step;

use std::path::Path;
use std::time::Duration;

use backoff::ExponentialBackoff;
use log::{debug, info, warn};

use crate::api::{
    AdminApi, ApiError, CaConfigId, CaConfigRequest, CertProfileRequest,
    CrlSettings, CsrGeneratorRequest, IssuerId, IssuerRequest, KeyStoreId,
    KeyStoreKind, KeyStoreRequest, Token,
};
use crate::commons::{file, template};
use crate::config::{CaSettings, Config};
use crate::constants::{
    LOGIN_RETRY_INITIAL_MS, LOGIN_RETRY_MAX_INTERVAL_SECS,
    LOGIN_RETRY_MULTIPLIER,
};
use crate::install::InstallCommand;
use crate::local::Host;
use crate::local::fqdn::HostName;
use crate::local::truststore::{StoreLocation, TrustStore};
use self::cert::CaCertificate;
use self::error::{CaFailure, InstallFailure};
use self::progress::{CaRecord, TeamRecord};


//------------ Provisioner ---------------------------------------------------

/// Runs the provisioning of a host.
pub struct Provisioner<'a, A, H, T> {
    config: &'a Config,
    api: A,
    host: H,
    trust_store: T,
}

impl<'a, A: AdminApi, H: Host, T: TrustStore> Provisioner<'a, A, H, T> {
    pub fn new(config: &'a Config, api: A, host: H, trust_store: T) -> Self {
        Provisioner { config, api, host, trust_store }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn trust_store(&self) -> &T {
        &self.trust_store
    }

    /// Runs all steps.
    ///
    /// Nothing created is rolled back on failure. A session opened before
    /// the failure is closed if possible.
    pub async fn run(&self) -> Result<Provisioned, Failure> {
        let mut progress = Progress::default();
        let total = Step::ALL.len();

        for (index, step) in Step::ALL.iter().copied().enumerate() {
            info!("[{}/{}] {}", index + 1, total, step);
            match self.execute(step, &mut progress).await {
                Ok(()) => debug!("Step {step} done"),
                Err(error) if step.is_best_effort() => {
                    warn!("Step {step} failed, continuing: {error}");
                    progress.warnings.push(format!("{step}: {error}"));
                }
                Err(error) => {
                    self.abort(&mut progress).await;
                    return Err(Failure { step, error });
                }
            }
        }

        // Only fails if a step did not record its result.
        let last = Step::LaunchBrowser;
        let provisioned = progress
            .finish(last)
            .map_err(|error| Failure { step: last, error })?;
        info!("Provisioning complete, issuer {} is ready", provisioned.issuer);
        Ok(provisioned)
    }

    /// Runs only the privilege check.
    pub async fn preflight(&self) -> Result<(), Failure> {
        self.check_privileges().await.map_err(|error| Failure {
            step: Step::Preflight, error
        })
    }

    async fn execute(
        &self, step: Step, progress: &mut Progress
    ) -> Result<(), ProvisionError> {
        match step {
            Step::Preflight => self.check_privileges().await,
            Step::FetchInstaller => self.fetch_installer().await,
            Step::UnpackInstaller => self.unpack_installer().await,
            Step::InstallPrerequisites => self.install_prerequisites().await,
            Step::InstallProduct => self.install_product().await,
            Step::TrustBootstrapCertificate => self.trust_bootstrap().await,
            Step::Authenticate => {
                progress.token = Some(self.authenticate().await?);
                Ok(())
            }
            Step::CreateKeyStore => {
                let token = Progress::require(&progress.token, step, "a session")?;
                progress.key_store = Some(self.create_key_store(token).await?);
                Ok(())
            }
            Step::ResolveFqdn => {
                progress.fqdn = Some(self.resolve_fqdn().await?);
                Ok(())
            }
            Step::CreateRootCa => {
                let token = Progress::require(&progress.token, step, "a session")?;
                let key_store = Progress::require(
                    &progress.key_store, step, "the key store"
                )?;
                let fqdn = Progress::require(&progress.fqdn, step, "the FQDN")?;
                let root = self.create_ca(
                    token, &self.config.root_ca, key_store, None, fqdn
                ).await?;
                progress.root_ca = Some(root);
                Ok(())
            }
            Step::CreateIntermediateCa => {
                let token = Progress::require(&progress.token, step, "a session")?;
                let key_store = Progress::require(
                    &progress.key_store, step, "the key store"
                )?;
                let fqdn = Progress::require(&progress.fqdn, step, "the FQDN")?;
                let root = Progress::require(&progress.root_ca, step, "the root CA")?;
                let intermediate = self.create_ca(
                    token, &self.config.intermediate_ca, key_store,
                    Some(&root.id), fqdn
                ).await?;
                progress.intermediate_ca = Some(intermediate);
                Ok(())
            }
            Step::EnableOcsp => {
                let token = Progress::require(&progress.token, step, "a session")?;
                let ca = Progress::require(
                    &progress.intermediate_ca, step, "the intermediate CA"
                )?;
                self.api.set_ocsp_for_local_ca(token, &ca.id).await.map_err(
                    |cause| ProvisionError::OcspBinding { ca: ca.id.clone(), cause }
                )?;
                info!("Enabled OCSP for CA {}", ca.id);
                Ok(())
            }
            Step::CreateProfile => {
                let token = Progress::require(&progress.token, step, "a session")?;
                let settings = &self.config.profile;
                let req = CertProfileRequest {
                    name: settings.name.clone(),
                    lifetime_minutes: settings.lifetime_minutes,
                    copy_sans_from_request: settings.copy_sans_from_request,
                    extended_key_usages: settings.extended_key_usages.clone(),
                    key_usages: settings.key_usages.clone(),
                };
                let id = self.api.create_cert_profile(token, &req).await.map_err(
                    |cause| ProvisionError::ProfileCreation {
                        name: req.name.clone(), cause
                    }
                )?;
                info!("Created certificate profile '{}' with id {}", req.name, id);
                progress.profile = Some(id);
                Ok(())
            }
            Step::CreateIssuer => {
                let token = Progress::require(&progress.token, step, "a session")?;
                let ca = Progress::require(
                    &progress.intermediate_ca, step, "the intermediate CA"
                )?;
                let profile = Progress::require(&progress.profile, step, "the profile")?;
                let req = IssuerRequest {
                    name: self.config.issuer.name.clone(),
                    ca_config_id: ca.id.clone(),
                    profile_id: profile.clone(),
                };
                let id = self.api.create_local_ca(token, &req).await.map_err(
                    |cause| ProvisionError::IssuerCreation {
                        name: req.name.clone(), cause
                    }
                )?;
                info!("Created issuer '{}' with id {}", req.name, id);
                progress.issuer = Some(id);
                Ok(())
            }
            Step::CreateCsrGenerator => {
                let token = Progress::require(&progress.token, step, "a session")?;
                let settings = &self.config.csr_generator;
                let req = CsrGeneratorRequest {
                    name: settings.name.clone(),
                    key: settings.key.clone(),
                };
                let id = self.api.create_csr_generator(token, &req).await.map_err(
                    |cause| ProvisionError::GeneratorCreation {
                        name: req.name.clone(), cause
                    }
                )?;
                info!("Created CSR generator '{}' with id {}", req.name, id);
                progress.csr_generator = Some(id);
                Ok(())
            }
            Step::AuthorizeTeam => {
                let token = Progress::require(&progress.token, step, "a session")?;
                let issuer = Progress::require(&progress.issuer, step, "the issuer")?;
                progress.team = Some(self.authorize_team(token, issuer).await?);
                Ok(())
            }
            Step::CloseSession => {
                if let Some(token) = progress.token.take() {
                    self.api.logout(&token).await
                        .map_err(ProvisionError::SessionClose)?;
                    info!("Logged out");
                }
                Ok(())
            }
            Step::ImportCertificates => {
                let root = Progress::require(&progress.root_ca, step, "the root CA")?;
                let intermediate = Progress::require(
                    &progress.intermediate_ca, step, "the intermediate CA"
                )?;
                self.import(&root.cert_file, StoreLocation::Root).await?;
                self.import(
                    &intermediate.cert_file, StoreLocation::IntermediateCa
                ).await
            }
            Step::LaunchBrowser => {
                let uri = self.config.ui_uri();
                self.host.open_browser(uri).map_err(|cause| {
                    ProvisionError::Browser { uri: uri.clone(), cause }
                })?;
                info!("Opened {uri}");
                Ok(())
            }
        }
    }

    /// Closes a session left open by a failed run.
    async fn abort(&self, progress: &mut Progress) {
        if let Some(token) = progress.token.take() {
            match self.api.logout(&token).await {
                Ok(()) => debug!("Closed session after failure"),
                Err(e) => warn!("Could not log out after failure: {e}"),
            }
        }
    }
}


/// # Installation
impl<A: AdminApi, H: Host, T: TrustStore> Provisioner<'_, A, H, T> {
    async fn check_privileges(&self) -> Result<(), ProvisionError> {
        self.trust_store
            .check_privileges()
            .await
            .map_err(ProvisionError::Privileges)
    }

    async fn fetch_installer(&self) -> Result<(), ProvisionError> {
        let artifact = &self.config.artifact;
        let size = self.host
            .fetch_artifact(
                &artifact.uri,
                &artifact.download_path,
                self.config.download_timeout(),
            )
            .await
            .map_err(|cause| ProvisionError::Download {
                uri: artifact.uri.clone(), cause
            })?;
        info!(
            "Downloaded {} bytes from {} to {}",
            size, artifact.uri, artifact.download_path.display()
        );
        Ok(())
    }

    async fn unpack_installer(&self) -> Result<(), ProvisionError> {
        let artifact = &self.config.artifact;
        let count = self.host
            .unpack_artifact(&artifact.download_path, &artifact.install_root)
            .await
            .map_err(|cause| ProvisionError::Extraction {
                archive: artifact.download_path.clone(), cause
            })?;
        info!(
            "Unpacked {} entries to {}",
            count, artifact.install_root.display()
        );
        Ok(())
    }

    async fn install_prerequisites(&self) -> Result<(), ProvisionError> {
        let command = InstallCommand::prerequisite(self.config).map_err(|e| {
            ProvisionError::PrerequisiteInstall {
                command: self.config.prerequisite.program.display().to_string(),
                cause: InstallFailure::Template(e),
            }
        })?;
        self.run_installer(&command).await.map_err(|cause| {
            ProvisionError::PrerequisiteInstall {
                command: command.to_string(), cause
            }
        })
    }

    async fn install_product(&self) -> Result<(), ProvisionError> {
        let command = InstallCommand::product(self.config).map_err(|e| {
            ProvisionError::Install {
                command: self.config.installer.program.display().to_string(),
                cause: InstallFailure::Template(e),
            }
        })?;
        self.run_installer(&command).await.map_err(|cause| {
            ProvisionError::Install { command: command.to_string(), cause }
        })
    }

    async fn run_installer(
        &self, command: &InstallCommand
    ) -> Result<(), InstallFailure> {
        info!("Running {command}");
        let outcome = self.host
            .run_program(command)
            .await
            .map_err(InstallFailure::Host)?;
        if outcome.is_success() {
            info!("{} {}", command.program.display(), outcome);
            Ok(())
        } else {
            Err(InstallFailure::Exit(outcome))
        }
    }

    async fn trust_bootstrap(&self) -> Result<(), ProvisionError> {
        let cert = self.config.bootstrap_certificate();
        warn!(
            "Trusting the bootstrap certificate {} as a root. Remove it from \
             the trust store once a production TLS certificate is installed.",
            cert.display()
        );
        self.import(&cert, StoreLocation::Root).await
    }

    async fn import(
        &self, cert: &Path, location: StoreLocation
    ) -> Result<(), ProvisionError> {
        self.trust_store
            .import_certificate(cert, location)
            .await
            .map_err(|cause| ProvisionError::TrustImport {
                cert: cert.to_path_buf(), location, cause
            })
    }
}


/// # Administrative API
impl<A: AdminApi, H: Host, T: TrustStore> Provisioner<'_, A, H, T> {
    /// Logs in, retrying while the service is not reachable yet.
    async fn authenticate(&self) -> Result<Token, ProvisionError> {
        let username = self.config.credentials.admin_username.as_str();
        let password = self.config.credentials.admin_password.as_str();
        let budget = self.config.login_retry();

        let res = if budget.is_zero() {
            self.api.login(username, password).await
        } else {
            let backoff = ExponentialBackoff {
                current_interval: Duration::from_millis(LOGIN_RETRY_INITIAL_MS),
                initial_interval: Duration::from_millis(LOGIN_RETRY_INITIAL_MS),
                multiplier: LOGIN_RETRY_MULTIPLIER,
                max_interval: Duration::from_secs(LOGIN_RETRY_MAX_INTERVAL_SECS),
                max_elapsed_time: Some(budget),
                ..Default::default()
            };
            let api = &self.api;
            backoff::future::retry_notify(
                backoff,
                move || async move {
                    api.login(username, password).await.map_err(|e| {
                        if e.is_transient() {
                            backoff::Error::transient(e)
                        } else {
                            backoff::Error::permanent(e)
                        }
                    })
                },
                |e: ApiError, wait: Duration| {
                    warn!(
                        "Login failed, retrying in {} ms: {}",
                        wait.as_millis(), e
                    )
                },
            )
            .await
        };

        let token = res.map_err(|cause| ProvisionError::Authentication {
            username: username.to_string(), cause
        })?;
        info!("Logged in as '{username}'");
        Ok(token)
    }

    async fn create_key_store(
        &self, token: &Token
    ) -> Result<KeyStoreId, ProvisionError> {
        let req = KeyStoreRequest {
            name: self.config.key_store.name.clone(),
            password: self.config.credentials.keystore_password.clone(),
            kind: KeyStoreKind::Software,
        };
        let id = self.api.create_key_store(token, &req).await.map_err(|cause| {
            ProvisionError::KeyStoreCreation { name: req.name.clone(), cause }
        })?;
        info!("Created key store '{}' with id {}", req.name, id);
        Ok(id)
    }

    async fn resolve_fqdn(&self) -> Result<String, ProvisionError> {
        if let Some(fqdn) = &self.config.fqdn {
            info!("Using configured FQDN {fqdn}");
            return Ok(fqdn.clone());
        }
        let name = self.host
            .local_fqdn()
            .await
            .map_err(ProvisionError::HostResolution)?;
        match &name {
            HostName::Qualified(fqdn) => info!("Resolved local FQDN {fqdn}"),
            HostName::Unqualified(host) => warn!(
                "Could not determine a domain for host '{host}', CRL \
                 distribution points will use the plain hostname"
            ),
        }
        Ok(name.into_string())
    }

    /// Creates a root CA if `issuer` is `None`, an intermediate otherwise.
    async fn create_ca(
        &self,
        token: &Token,
        settings: &CaSettings,
        key_store: &KeyStoreId,
        issuer: Option<&CaConfigId>,
        fqdn: &str,
    ) -> Result<CaRecord, ProvisionError> {
        let req = self.ca_request(settings, key_store, issuer, fqdn)
            .map_err(|cause| ProvisionError::CaConfig {
                name: settings.name.clone(), cause
            })?;

        let info = self.api.create_local_ca_config(token, &req).await.map_err(
            |cause| match (issuer, cause) {
                (Some(issuer), ApiError::NotFound(msg)) => {
                    ProvisionError::IssuerNotFound {
                        name: settings.name.clone(),
                        issuer: issuer.clone(),
                        cause: ApiError::NotFound(msg),
                    }
                }
                (_, cause) => ProvisionError::CaConfig {
                    name: settings.name.clone(),
                    cause: CaFailure::Api(cause),
                },
            }
        )?;
        info!("Created CA '{}' with id {}", settings.name, info.id);

        let unusable = |cause| ProvisionError::CaConfig {
            name: settings.name.clone(),
            cause: CaFailure::Certificate(cause),
        };
        let cert = CaCertificate::parse(&info.certificate).map_err(unusable)?;
        let pem = cert.to_pem().map_err(unusable)?;
        let subject = cert.subject();
        if !cert.subject_matches(&settings.dn) {
            warn!(
                "Certificate of CA '{}' has subject '{}', expected '{}'",
                settings.name, subject, settings.dn
            );
        }

        let path = file::file_path(&self.config.cert_dir, &settings.cert_file());
        file::save(&pem, &path).map_err(|cause| {
            ProvisionError::CertificateFile { path: path.clone(), cause }
        })?;
        info!("Saved certificate of CA '{}' to {}", settings.name, path.display());

        Ok(CaRecord {
            name: settings.name.clone(),
            id: info.id,
            subject,
            cert_file: path,
        })
    }

    fn ca_request(
        &self,
        settings: &CaSettings,
        key_store: &KeyStoreId,
        issuer: Option<&CaConfigId>,
        fqdn: &str,
    ) -> Result<CaConfigRequest, CaFailure> {
        let crl_file = settings.crl_file();
        let distribution_point = template::expand(
            &self.config.crl.uri_template,
            |name| match name {
                "fqdn" => Some(fqdn.to_string()),
                "file" => Some(crl_file.clone()),
                _ => None,
            },
        ).map_err(CaFailure::Template)?;

        Ok(CaConfigRequest {
            name: settings.name.clone(),
            key: settings.key.clone(),
            is_root: issuer.is_none(),
            key_store_id: key_store.clone(),
            issuer_id: issuer.cloned(),
            subject_dn: settings.dn.clone(),
            validity_days: settings.validity_days,
            crl: CrlSettings {
                lifetime_hours: settings.crl_lifetime_hours,
                regeneration_hours: settings.crl_regeneration_hours,
                file_path: self.config.crl_dir().join(&crl_file)
                    .display().to_string(),
                distribution_point,
            },
            policies: settings.policies.clone(),
        })
    }

    async fn authorize_team(
        &self, token: &Token, issuer: &IssuerId
    ) -> Result<TeamRecord, ProvisionError> {
        let settings = &self.config.team;
        let team = self.api.get_team(token, &settings.name).await.map_err(
            |cause| ProvisionError::TeamUpdate {
                team: settings.name.clone(), cause
            }
        )?;

        let authorised = merge_authorised(
            &team.authorised_cas, &settings.additional_issuers, issuer
        );
        self.api.update_team(token, &team.id, &authorised).await.map_err(
            |cause| ProvisionError::AuthorizationUpdate {
                team: settings.name.clone(), cause
            }
        )?;
        info!(
            "Team '{}' may now use {} issuer(s), including {}",
            team.name, authorised.len(), issuer
        );

        Ok(TeamRecord {
            id: team.id,
            name: team.name,
            authorised_cas: authorised,
        })
    }
}


//------------ merge_authorised ----------------------------------------------

/// The issuers a team may use after adding `new`.
///
/// Keeps what the team already had, then adds `additional` and `new`.
/// Duplicates are dropped, the first occurrence wins.
pub fn merge_authorised(
    existing: &[IssuerId],
    additional: &[IssuerId],
    new: &IssuerId,
) -> Vec<IssuerId> {
    let mut res: Vec<IssuerId> = Vec::with_capacity(
        existing.len() + additional.len() + 1
    );
    for id in existing.iter().chain(additional).chain(Some(new)) {
        if !res.contains(id) {
            res.push(id.clone());
        }
    }
    res
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ids: &[&str]) -> Vec<IssuerId> {
        ids.iter().map(|id| IssuerId::from(*id)).collect()
    }

    #[test]
    fn merge_keeps_existing_and_appends() {
        let merged = merge_authorised(
            &ids(&["web", "mail"]), &ids(&["code-signing"]), &"tls".into()
        );
        assert_eq!(merged, ids(&["web", "mail", "code-signing", "tls"]));
    }

    #[test]
    fn merge_drops_duplicates() {
        let merged = merge_authorised(
            &ids(&["tls", "web"]), &ids(&["web", "code-signing", "tls"]),
            &"tls".into()
        );
        assert_eq!(merged, ids(&["tls", "web", "code-signing"]));
    }

    #[test]
    fn merge_into_empty_team() {
        let merged = merge_authorised(&[], &[], &"tls".into());
        assert_eq!(merged, ids(&["tls"]));
    }
}
