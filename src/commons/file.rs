//! Helpers for files written and read during provisioning.

use std::{
    error, fmt, fs,
    fs::File,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use log::trace;

/// Creates a dir, including all parents, if it doesn't exist yet.
pub fn create_dir_all(dir: &Path) -> Result<(), FileError> {
    if !dir.is_dir() {
        fs::create_dir_all(dir).map_err(|e| {
            FileError::new(format!("could not create dir: {}", dir.display()), e)
        })?;
    }
    Ok(())
}

pub fn create_file_with_path(path: &Path) -> Result<File, FileError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                trace!("Creating path: {}", parent.display());
                create_dir_all(parent)?;
            }
        }
    }
    File::create(path).map_err(|e| {
        FileError::new(format!("could not create file: {}", path.display()), e)
    })
}

/// Derive the path for this file.
pub fn file_path(base_path: &Path, file_name: &str) -> PathBuf {
    let mut path = base_path.to_path_buf();
    path.push(file_name);
    path
}

/// Saves a file, creating parent dirs as needed.
pub fn save(content: &[u8], full_path: &Path) -> Result<(), FileError> {
    let mut f = create_file_with_path(full_path)?;
    f.write_all(content).map_err(|e| {
        FileError::new(format!("could not write to: {}", full_path.display()), e)
    })?;

    trace!("Saved file: {}", full_path.display());
    Ok(())
}

/// Reads a file into memory.
pub fn read(path: &Path) -> Result<Vec<u8>, FileError> {
    let mut f = File::open(path).map_err(|e| {
        FileError::new(format!("could not open file: {}", path.display()), e)
    })?;
    let mut bytes = Vec::new();
    f.read_to_end(&mut bytes).map_err(|e| {
        FileError::new(format!("could not read file: {}", path.display()), e)
    })?;
    Ok(bytes)
}

/// Removes a file, succeeding when it was never there.
pub fn remove_if_exists(path: &Path) -> Result<(), FileError> {
    match fs::remove_file(path) {
        Ok(()) => {
            trace!("Removed file: {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FileError::new(
            format!("could not remove file: {}", path.display()), e
        )),
    }
}


//------------ FileError -----------------------------------------------------

/// An I/O error with a description of what was being attempted.
#[derive(Debug)]
pub struct FileError {
    context: String,
    cause: io::Error,
}

impl FileError {
    pub fn new(context: String, cause: io::Error) -> Self {
        FileError { context, cause }
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.cause)
    }
}

impl error::Error for FileError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.cause)
    }
}


//------------ Tests ---------------------------------------------------------
