//! Unpacking the installer artifact.

use std::{
    fmt,
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use log::{debug, warn};

use crate::commons::file;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Unpacks a tar archive, gzipped or not, below `dest`.
///
/// Compression is detected from the content rather than the file name.
/// Entries that would end up outside `dest` are skipped. Returns the number
/// of entries unpacked.
pub fn unpack(archive: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let mut reader = File::open(archive)
        .map(BufReader::new)
        .map_err(|e| ArchiveError::io(archive, e))?;

    let mut magic = [0u8; 2];
    let gzipped = match reader.read_exact(&mut magic) {
        Ok(()) => magic == GZIP_MAGIC,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(ArchiveError::io(archive, e)),
    };
    reader
        .seek(SeekFrom::Start(0))
        .map_err(|e| ArchiveError::io(archive, e))?;

    file::create_dir_all(dest).map_err(|e| {
        ArchiveError::Destination(dest.to_path_buf(), e.to_string())
    })?;

    if gzipped {
        unpack_tar(archive, tar::Archive::new(GzDecoder::new(reader)), dest)
    } else {
        unpack_tar(archive, tar::Archive::new(reader), dest)
    }
}

fn unpack_tar<R: Read>(
    path: &Path,
    mut archive: tar::Archive<R>,
    dest: &Path,
) -> Result<usize, ArchiveError> {
    archive.set_preserve_permissions(true);

    let mut count = 0;
    let entries = archive.entries().map_err(|e| ArchiveError::corrupt(path, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| ArchiveError::corrupt(path, e))?;
        let name = entry
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        match entry.unpack_in(dest) {
            Ok(true) => {
                debug!("Unpacked {name}");
                count += 1;
            }
            Ok(false) => warn!("Skipped archive entry outside destination: {name}"),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Err(ArchiveError::Destination(
                    dest.to_path_buf(), e.to_string()
                ))
            }
            Err(e) => return Err(ArchiveError::corrupt(path, e)),
        }
    }

    if count == 0 {
        return Err(ArchiveError::Empty(path.to_path_buf()));
    }
    Ok(count)
}


//------------ ArchiveError --------------------------------------------------

#[derive(Debug)]
pub enum ArchiveError {
    Io(PathBuf, io::Error),
    Corrupt(PathBuf, String),
    Empty(PathBuf),
    Destination(PathBuf, String),
}

impl ArchiveError {
    fn io(path: &Path, e: io::Error) -> Self {
        ArchiveError::Io(path.to_path_buf(), e)
    }

    fn corrupt(path: &Path, e: impl fmt::Display) -> Self {
        ArchiveError::Corrupt(path.to_path_buf(), e.to_string())
    }
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArchiveError::Io(path, e) => {
                write!(f, "cannot read archive '{}': {}", path.display(), e)
            }
            ArchiveError::Corrupt(path, e) => {
                write!(f, "archive '{}' is corrupt: {}", path.display(), e)
            }
            ArchiveError::Empty(path) => {
                write!(f, "archive '{}' contains no files", path.display())
            }
            ArchiveError::Destination(path, e) => {
                write!(f, "cannot write to '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ArchiveError {}


//------------ Tests ---------------------------------------------------------
