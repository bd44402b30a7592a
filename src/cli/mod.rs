//! The command line tool.

pub mod options;
pub mod report;

use std::fmt;

use crate::config::ConfigError;
use crate::provision::Failure;
use self::report::ReportError;


//------------ Error ---------------------------------------------------------

/// Everything that makes the command line tool exit with an error.
#[derive(Debug)]
pub enum Error {
    Config(ConfigError),
    Provision(Failure),
    Report(ReportError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {e}"),
            Error::Provision(e) => e.fmt(f),
            Error::Report(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<Failure> for Error {
    fn from(e: Failure) -> Self {
        Error::Provision(e)
    }
}

impl From<ReportError> for Error {
    fn from(e: ReportError) -> Self {
        Error::Report(e)
    }
}
