//! Finding the fully qualified name of this host.

use std::{fmt, io};


//------------ HostName ------------------------------------------------------

/// The name of this host as far as it could be determined.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HostName {
    /// A name including a domain.
    Qualified(String),

    /// Resolution yielded no domain, this is the plain hostname.
    Unqualified(String),
}

impl HostName {
    pub fn as_str(&self) -> &str {
        match self {
            HostName::Qualified(name) | HostName::Unqualified(name) => name,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            HostName::Qualified(name) | HostName::Unqualified(name) => name,
        }
    }

    /// Picks the best name from the hostname and its canonical name.
    fn classify(host: &str, canonical: Option<&str>) -> Option<Self> {
        let host = normalise(host);
        if let Some(canonical) = canonical.map(normalise) {
            if canonical.contains('.') {
                return Some(HostName::Qualified(canonical));
            }
        }
        if host.is_empty() {
            None
        } else if host.contains('.') {
            Some(HostName::Qualified(host))
        } else {
            Some(HostName::Unqualified(host))
        }
    }
}

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalise(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}


//------------ Resolution ----------------------------------------------------

/// Determines the name of this host.
///
/// This performs a blocking DNS lookup. Fails only if there is no hostname
/// at all.
pub fn resolve() -> Result<HostName, io::Error> {
    let host = hostname()?;
    let canonical = canonical_name(&host);
    HostName::classify(&host, canonical.as_deref()).ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "the hostname is empty")
    })
}

#[cfg(unix)]
fn hostname() -> Result<String, io::Error> {
    let mut buf = [0u8; 256];
    let rc = unsafe {
        libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len())
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}

#[cfg(unix)]
fn canonical_name(host: &str) -> Option<String> {
    use std::ffi::{CStr, CString};
    use std::{mem, ptr};

    let c_host = CString::new(host).ok()?;
    let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
    hints.ai_flags = libc::AI_CANONNAME;
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_socktype = libc::SOCK_STREAM;

    let mut res: *mut libc::addrinfo = ptr::null_mut();
    let rc = unsafe {
        libc::getaddrinfo(c_host.as_ptr(), ptr::null(), &hints, &mut res)
    };
    if rc != 0 || res.is_null() {
        return None;
    }

    // The canonical name is only set on the first entry.
    let name = unsafe {
        let canon = (*res).ai_canonname;
        if canon.is_null() {
            None
        } else {
            Some(CStr::from_ptr(canon).to_string_lossy().into_owned())
        }
    };
    unsafe { libc::freeaddrinfo(res) };
    name
}

#[cfg(windows)]
fn hostname() -> Result<String, io::Error> {
    std::env::var("COMPUTERNAME").map_err(|_| {
        io::Error::new(io::ErrorKind::NotFound, "COMPUTERNAME is not set")
    })
}

#[cfg(windows)]
fn canonical_name(host: &str) -> Option<String> {
    std::env::var("USERDNSDOMAIN")
        .ok()
        .filter(|domain| !domain.is_empty())
        .map(|domain| format!("{host}.{domain}"))
}


//------------ Tests ---------------------------------------------------------
