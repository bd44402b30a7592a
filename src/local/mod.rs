//! Everything happening on the local machine.
//!
//! The orchestrator reaches the machine through the [`Host`] and
//! [`TrustStore`](truststore::TrustStore) traits, so tests can run a
//! complete provisioning without touching the system.

pub mod archive;
pub mod browser;
pub mod fqdn;
pub mod process;
pub mod truststore;

use std::{
    fmt, io,
    path::{Path, PathBuf},
    time::Duration,
};

use log::debug;
use url::Url;

use crate::commons::file::{self, FileError};
use crate::commons::httpclient;
use crate::install::InstallCommand;
use self::archive::ArchiveError;
use self::fqdn::HostName;
use self::process::ExitOutcome;


//------------ Host ----------------------------------------------------------

/// The local operations of a provisioning run.
#[allow(async_fn_in_trait)]
pub trait Host {
    /// Downloads `uri` to `dest`, replacing whatever was there.
    ///
    /// Returns the number of bytes written.
    async fn fetch_artifact(
        &self, uri: &Url, dest: &Path, timeout: Duration
    ) -> Result<u64, HostError>;

    /// Unpacks the archive at `archive` below `dest`.
    ///
    /// Returns the number of entries unpacked.
    async fn unpack_artifact(
        &self, archive: &Path, dest: &Path
    ) -> Result<usize, HostError>;

    async fn run_program(
        &self, command: &InstallCommand
    ) -> Result<ExitOutcome, HostError>;

    async fn local_fqdn(&self) -> Result<HostName, HostError>;

    fn open_browser(&self, uri: &Url) -> Result<(), HostError>;
}


//------------ SystemHost ----------------------------------------------------

/// The real machine this process runs on.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemHost;

impl Host for SystemHost {
    async fn fetch_artifact(
        &self, uri: &Url, dest: &Path, timeout: Duration
    ) -> Result<u64, HostError> {
        file::remove_if_exists(dest)?;
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                file::create_dir_all(parent)?;
            }
        }
        let client = httpclient::client(uri.as_str(), timeout, &[])?;
        Ok(httpclient::download(&client, uri.as_str(), dest).await?)
    }

    async fn unpack_artifact(
        &self, archive: &Path, dest: &Path
    ) -> Result<usize, HostError> {
        let archive = archive.to_path_buf();
        let dest = dest.to_path_buf();
        let count = tokio::task::spawn_blocking(move || {
            archive::unpack(&archive, &dest)
        })
        .await
        .map_err(|e| HostError::Task(e.to_string()))??;
        Ok(count)
    }

    async fn run_program(
        &self, command: &InstallCommand
    ) -> Result<ExitOutcome, HostError> {
        debug!("Running {command}");
        process::run(&command.program, &command.args, command.timeout)
            .await
            .map_err(|e| HostError::Spawn(command.program.clone(), e))
    }

    async fn local_fqdn(&self) -> Result<HostName, HostError> {
        tokio::task::spawn_blocking(fqdn::resolve)
            .await
            .map_err(|e| HostError::Task(e.to_string()))?
            .map_err(HostError::Resolve)
    }

    fn open_browser(&self, uri: &Url) -> Result<(), HostError> {
        browser::open(uri).map_err(HostError::Browser)
    }
}


//------------ HostError -----------------------------------------------------

#[derive(Debug)]
pub enum HostError {
    Download(httpclient::Error),
    File(FileError),
    Archive(ArchiveError),
    Spawn(PathBuf, io::Error),
    Resolve(io::Error),
    Browser(io::Error),
    Task(String),
    Other(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HostError::Download(e) => e.fmt(f),
            HostError::File(e) => e.fmt(f),
            HostError::Archive(e) => e.fmt(f),
            HostError::Spawn(program, e) => {
                write!(f, "cannot run '{}': {}", program.display(), e)
            }
            HostError::Resolve(e) => write!(f, "cannot determine hostname: {e}"),
            HostError::Browser(e) => write!(f, "cannot start browser: {e}"),
            HostError::Task(e) => write!(f, "background task failed: {e}"),
            HostError::Other(msg) => msg.fmt(f),
        }
    }
}

impl std::error::Error for HostError {}

impl From<httpclient::Error> for HostError {
    fn from(e: httpclient::Error) -> Self {
        HostError::Download(e)
    }
}

impl From<FileError> for HostError {
    fn from(e: FileError) -> Self {
        HostError::File(e)
    }
}

impl From<ArchiveError> for HostError {
    fn from(e: ArchiveError) -> Self {
        HostError::Archive(e)
    }
}
