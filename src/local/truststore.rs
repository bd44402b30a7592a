//! Adding certificates to the trust store of this host.

use std::{
    ffi::OsStr,
    fmt, io,
    path::{Path, PathBuf},
    time::Duration,
};

use log::{debug, info};

use crate::commons::file::{self, FileError};
use crate::config::{TrustStoreConfig, TrustStoreKind};
use crate::constants::ANCHOR_FILE_PREFIX;
use super::process::{self, ExitOutcome};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);


//------------ StoreLocation -------------------------------------------------

/// Which part of the trust store a certificate goes into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreLocation {
    /// Trusted root certificates.
    Root,

    /// Intermediate certification authorities.
    IntermediateCa,
}

impl StoreLocation {
    fn certutil_store(self) -> &'static str {
        match self {
            StoreLocation::Root => "Root",
            StoreLocation::IntermediateCa => "CA",
        }
    }

    fn label(self) -> &'static str {
        match self {
            StoreLocation::Root => "root",
            StoreLocation::IntermediateCa => "intermediate",
        }
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreLocation::Root => f.write_str("root store"),
            StoreLocation::IntermediateCa => {
                f.write_str("intermediate CA store")
            }
        }
    }
}


//------------ TrustStore ----------------------------------------------------

/// Access to the certificate trust store of the operating system.
#[allow(async_fn_in_trait)]
pub trait TrustStore {
    /// Checks that certificates can be imported by this process.
    async fn check_privileges(&self) -> Result<(), TrustStoreError>;

    async fn import_certificate(
        &self, cert: &Path, location: StoreLocation
    ) -> Result<(), TrustStoreError>;
}


//------------ CertutilStore -------------------------------------------------

/// The Windows certificate store, managed through `certutil`.
#[derive(Clone, Debug, Default)]
pub struct CertutilStore;

impl TrustStore for CertutilStore {
    async fn check_privileges(&self) -> Result<(), TrustStoreError> {
        // Only succeeds in an elevated session.
        let outcome = process::run("net", &["session"], COMMAND_TIMEOUT)
            .await
            .map_err(|e| TrustStoreError::Spawn("net".into(), e))?;
        if outcome.is_success() {
            Ok(())
        } else {
            Err(TrustStoreError::NotPrivileged(
                "administrator rights are required".into()
            ))
        }
    }

    async fn import_certificate(
        &self, cert: &Path, location: StoreLocation
    ) -> Result<(), TrustStoreError> {
        let args = [
            OsStr::new("-addstore"),
            OsStr::new("-f"),
            OsStr::new(location.certutil_store()),
            cert.as_os_str(),
        ];
        let output = process::output("certutil", &args, COMMAND_TIMEOUT)
            .await
            .map_err(|e| TrustStoreError::Spawn("certutil".into(), e))?;
        if !output.outcome.is_success() {
            return Err(TrustStoreError::Command {
                program: "certutil".into(),
                outcome: output.outcome,
                stderr: output.stderr,
            });
        }
        info!("Added {} to the {}", cert.display(), location);
        Ok(())
    }
}


//------------ AnchorStore ---------------------------------------------------

/// A directory of trust anchors picked up by a refresh command.
///
/// This is how Debian-style and RHEL-style systems manage local roots.
/// These systems have no store for intermediates, so intermediate CA
/// certificates go into a separate directory that is never refreshed into
/// the anchors.
#[derive(Clone, Debug)]
pub struct AnchorStore {
    dir: PathBuf,
    intermediates_dir: PathBuf,
    refresh: Vec<String>,
}

impl AnchorStore {
    pub fn new(
        dir: PathBuf, intermediates_dir: PathBuf, refresh: Vec<String>
    ) -> Self {
        AnchorStore { dir, intermediates_dir, refresh }
    }

    /// The file name a certificate is stored under.
    ///
    /// Refresh tools typically only consider `.crt` files.
    pub fn anchor_path(&self, cert: &Path, location: StoreLocation) -> PathBuf {
        let stem = cert
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "certificate".to_string());
        let dir = match location {
            StoreLocation::Root => &self.dir,
            StoreLocation::IntermediateCa => &self.intermediates_dir,
        };
        file::file_path(
            dir,
            &format!("{}-{}-{}.crt", ANCHOR_FILE_PREFIX, location.label(), stem),
        )
    }

    async fn refresh(&self) -> Result<(), TrustStoreError> {
        let (program, args) = match self.refresh.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };
        let output = process::output(program, args, COMMAND_TIMEOUT)
            .await
            .map_err(|e| TrustStoreError::Spawn(program.clone(), e))?;
        if output.outcome.is_success() {
            debug!("Refreshed trust store with {program}");
            Ok(())
        } else {
            Err(TrustStoreError::Command {
                program: program.clone(),
                outcome: output.outcome,
                stderr: output.stderr,
            })
        }
    }
}

impl TrustStore for AnchorStore {
    async fn check_privileges(&self) -> Result<(), TrustStoreError> {
        match tempfile::Builder::new()
            .prefix(".caprov-check")
            .tempfile_in(&self.dir)
        {
            Ok(_) => Ok(()),
            Err(e) => Err(TrustStoreError::NotPrivileged(format!(
                "cannot write to {}: {}", self.dir.display(), e
            ))),
        }
    }

    async fn import_certificate(
        &self, cert: &Path, location: StoreLocation
    ) -> Result<(), TrustStoreError> {
        let content = file::read(cert)?;
        let target = self.anchor_path(cert, location);
        file::save(&content, &target)?;
        if location == StoreLocation::Root {
            self.refresh().await?;
        }
        info!(
            "Added {} to the {} as {}",
            cert.display(), location, target.display()
        );
        Ok(())
    }
}


//------------ SystemTrustStore ----------------------------------------------

/// The trust store selected by the configuration.
#[derive(Clone, Debug)]
pub enum SystemTrustStore {
    Certutil(CertutilStore),
    Anchors(AnchorStore),
}

impl SystemTrustStore {
    pub fn from_config(config: &TrustStoreConfig) -> Self {
        match config.kind {
            TrustStoreKind::Certutil => SystemTrustStore::Certutil(CertutilStore),
            TrustStoreKind::Anchors => SystemTrustStore::Anchors(
                AnchorStore::new(
                    config.anchors_dir.clone(),
                    config.intermediates_dir.clone(),
                    config.refresh_command.clone(),
                )
            ),
        }
    }
}

impl TrustStore for SystemTrustStore {
    async fn check_privileges(&self) -> Result<(), TrustStoreError> {
        match self {
            SystemTrustStore::Certutil(store) => store.check_privileges().await,
            SystemTrustStore::Anchors(store) => store.check_privileges().await,
        }
    }

    async fn import_certificate(
        &self, cert: &Path, location: StoreLocation
    ) -> Result<(), TrustStoreError> {
        match self {
            SystemTrustStore::Certutil(store) => {
                store.import_certificate(cert, location).await
            }
            SystemTrustStore::Anchors(store) => {
                store.import_certificate(cert, location).await
            }
        }
    }
}


//------------ TrustStoreError -----------------------------------------------

#[derive(Debug)]
pub enum TrustStoreError {
    NotPrivileged(String),
    File(FileError),
    Spawn(String, io::Error),
    Command {
        program: String,
        outcome: ExitOutcome,
        stderr: String,
    },
}

impl fmt::Display for TrustStoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrustStoreError::NotPrivileged(msg) => {
                write!(f, "insufficient privileges: {msg}")
            }
            TrustStoreError::File(e) => e.fmt(f),
            TrustStoreError::Spawn(program, e) => {
                write!(f, "cannot run {program}: {e}")
            }
            TrustStoreError::Command { program, outcome, stderr } => {
                if stderr.is_empty() {
                    write!(f, "{program} {outcome}")
                } else {
                    write!(f, "{program} {outcome}: {stderr}")
                }
            }
        }
    }
}

impl std::error::Error for TrustStoreError {}

impl From<FileError> for TrustStoreError {
    fn from(e: FileError) -> Self {
        TrustStoreError::File(e)
    }
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path, refresh: Vec<String>) -> AnchorStore {
        AnchorStore::new(
            dir.join("anchors"), dir.join("intermediates"), refresh
        )
    }

    #[tokio::test]
    async fn anchors_copy_and_privileges() {
        let dir = tempfile::tempdir().unwrap();
        let anchors = dir.path().join("anchors");
        file::create_dir_all(&anchors).unwrap();

        let cert = dir.path().join("bootstrap.pem");
        file::save(b"-----BEGIN CERTIFICATE-----\n", &cert).unwrap();

        let store = store(dir.path(), vec![]);
        store.check_privileges().await.unwrap();
        store.import_certificate(&cert, StoreLocation::Root).await.unwrap();

        let target = anchors.join("caprov-root-bootstrap.crt");
        assert_eq!(file::read(&target).unwrap(), file::read(&cert).unwrap());
    }

    #[tokio::test]
    async fn intermediate_stays_out_of_anchor_dir() {
        let dir = tempfile::tempdir().unwrap();
        let anchors = dir.path().join("anchors");
        file::create_dir_all(&anchors).unwrap();

        let cert = dir.path().join("issuing.crt");
        file::save(b"cert", &cert).unwrap();

        let store = store(dir.path(), vec![]);
        store
            .import_certificate(&cert, StoreLocation::IntermediateCa)
            .await
            .unwrap();

        assert!(
            dir.path().join("intermediates/caprov-intermediate-issuing.crt").is_file()
        );
        assert_eq!(std::fs::read_dir(&anchors).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_anchor_dir_is_not_privileged() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnchorStore::new(
            dir.path().join("absent"), dir.path().join("intermediates"), vec![]
        );
        assert!(matches!(
            store.check_privileges().await,
            Err(TrustStoreError::NotPrivileged(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_refresh_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("root.crt");
        file::save(b"cert", &cert).unwrap();

        let store = store(dir.path(), vec!["false".to_string()]);
        let err = store
            .import_certificate(&cert, StoreLocation::Root)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TrustStoreError::Command { outcome: ExitOutcome::Code(1), .. }
        ));
        assert!(dir.path().join("anchors/caprov-root-root.crt").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn intermediate_import_does_not_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("issuing.crt");
        file::save(b"cert", &cert).unwrap();

        // The refresh command would fail if it were run.
        let store = store(dir.path(), vec!["false".to_string()]);
        store
            .import_certificate(&cert, StoreLocation::IntermediateCa)
            .await
            .unwrap();
    }
}
