//! Opening the product's user interface.

use std::{io, process::Command, process::Stdio};

use url::Url;

/// Opens `uri` in the default browser without waiting for it.
pub fn open(uri: &Url) -> Result<(), io::Error> {
    let mut cmd = opener(uri.as_str());
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

#[cfg(windows)]
fn opener(uri: &str) -> Command {
    let mut cmd = Command::new("cmd");
    // The empty argument is the window title taken by `start`.
    cmd.args(["/C", "start", "", uri]);
    cmd
}

#[cfg(target_os = "macos")]
fn opener(uri: &str) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(uri);
    cmd
}

#[cfg(not(any(windows, target_os = "macos")))]
fn opener(uri: &str) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(uri);
    cmd
}
