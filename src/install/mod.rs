//! Building the installer command lines.

use std::{fmt, path::PathBuf, time::Duration};

use crate::commons::template::{self, TemplateError};
use crate::config::{Config, ProgramConfig};

/// The placeholders available in installer argument templates.
pub const INSTALLER_PLACEHOLDERS: &[&str] = &[
    "admin_username",
    "admin_email",
    "admin_password",
    "db_admin_password",
    "keystore_password",
    "listen_address",
    "listen_port",
    "install_dir",
    "install_root",
];


//------------ InstallCommand ------------------------------------------------

/// A fully expanded installer invocation.
///
/// The expanded arguments may contain secrets. Use the [`Display`]
/// implementation, which shows the templates instead, for logging.
///
/// [`Display`]: fmt::Display
#[derive(Clone)]
pub struct InstallCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
    templates: Vec<String>,
}

impl InstallCommand {
    /// The prerequisite installer, run before the product itself.
    pub fn prerequisite(config: &Config) -> Result<Self, TemplateError> {
        Self::build(config, &config.prerequisite, &[])
    }

    /// The product installer, including the agent arguments if enabled.
    pub fn product(config: &Config) -> Result<Self, TemplateError> {
        let installer = &config.installer;
        let program = ProgramConfig {
            program: installer.program.clone(),
            args: installer.args.clone(),
            timeout_secs: installer.timeout_secs,
        };
        let extra = if installer.enable_agent {
            installer.agent_args.as_slice()
        } else {
            &[]
        };
        Self::build(config, &program, extra)
    }

    fn build(
        config: &Config,
        program: &ProgramConfig,
        extra: &[String],
    ) -> Result<Self, TemplateError> {
        let templates: Vec<String> = program.args.iter()
            .chain(extra.iter())
            .cloned()
            .collect();

        let args = templates.iter()
            .map(|arg| template::expand(arg, |name| lookup(config, name)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(InstallCommand {
            program: config.program_path(&program.program),
            args,
            timeout: Duration::from_secs(program.timeout_secs),
            templates,
        })
    }
}

impl fmt::Display for InstallCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.templates {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for InstallCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InstallCommand")
            .field("program", &self.program)
            .field("args", &self.templates)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn lookup(config: &Config, name: &str) -> Option<String> {
    let credentials = &config.credentials;
    let installer = &config.installer;
    let value = match name {
        "admin_username" => credentials.admin_username.clone(),
        "admin_email" => credentials.admin_email.clone(),
        "admin_password" => credentials.admin_password.clone(),
        "db_admin_password" => credentials.db_admin_password.clone(),
        "keystore_password" => credentials.keystore_password.clone(),
        "listen_address" => installer.listen_address.clone(),
        "listen_port" => installer.listen_port.to_string(),
        "install_dir" => installer.install_dir.display().to_string(),
        "install_root" => config.artifact.install_root.display().to_string(),
        _ => return None,
    };
    Some(value)
}


//------------ Tests ---------------------------------------------------------
