//! Name resolution for the `rhost_addr` and `rhost_name` items.
//!
//! Both lookups are synchronous and bounded by the system resolver's own
//! timeouts.

use std::collections::HashMap;
use std::ffi::CStr;
use std::net::{IpAddr, ToSocketAddrs};

use crate::error::ResolveError;

/// Forward and reverse host lookups.
pub trait Resolver {
    /// Host name to address. The first address returned wins.
    fn forward(&self, host: &str) -> Result<IpAddr, ResolveError>;

    /// Address to canonical host name. Fails when no name is registered.
    fn reverse(&self, addr: IpAddr) -> Result<String, ResolveError>;
}

/// Resolver backed by the C library (`getaddrinfo` / `getnameinfo`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn forward(&self, host: &str) -> Result<IpAddr, ResolveError> {
        let failed = |reason: String| ResolveError {
            target: host.to_string(),
            reason,
        };

        (host, 0)
            .to_socket_addrs()
            .map_err(|e| failed(e.to_string()))?
            .next()
            .map(|sa| sa.ip())
            .ok_or_else(|| failed("no addresses".to_string()))
    }

    fn reverse(&self, addr: IpAddr) -> Result<String, ResolveError> {
        let (storage, len) = raw_sockaddr(addr);
        let mut host = [0 as libc::c_char; libc::NI_MAXHOST as usize];

        // SAFETY: `storage` holds an initialised sockaddr of length `len`
        // and `host` is a writable buffer of the advertised size.
        let ret = unsafe {
            libc::getnameinfo(
                &storage as *const libc::sockaddr_storage as *const libc::sockaddr,
                len,
                host.as_mut_ptr(),
                host.len() as libc::socklen_t,
                std::ptr::null_mut(),
                0,
                libc::NI_NAMEREQD,
            )
        };

        if ret != 0 {
            return Err(ResolveError {
                target: addr.to_string(),
                reason: gai_message(ret),
            });
        }

        // SAFETY: getnameinfo NUL-terminates `host` on success.
        let name = unsafe { CStr::from_ptr(host.as_ptr()) };
        Ok(name.to_string_lossy().into_owned())
    }
}

fn raw_sockaddr(addr: IpAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    // SAFETY: all-zero bytes are a valid sockaddr_storage.
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };

    match addr {
        IpAddr::V4(v4) => {
            let sin = &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr_in;
            // SAFETY: sockaddr_storage is large and aligned enough for sockaddr_in.
            unsafe {
                (*sin).sin_family = libc::AF_INET as libc::sa_family_t;
                (*sin).sin_addr.s_addr = u32::from_ne_bytes(v4.octets());
            }
            (
                storage,
                std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        }
        IpAddr::V6(v6) => {
            let sin6 = &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr_in6;
            // SAFETY: sockaddr_storage is large and aligned enough for sockaddr_in6.
            unsafe {
                (*sin6).sin6_family = libc::AF_INET6 as libc::sa_family_t;
                (*sin6).sin6_addr.s6_addr = v6.octets();
            }
            (
                storage,
                std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
            )
        }
    }
}

fn gai_message(code: libc::c_int) -> String {
    // SAFETY: gai_strerror returns a pointer to a static string.
    let msg = unsafe { libc::gai_strerror(code) };
    if msg.is_null() {
        return format!("resolver error {}", code);
    }
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

/// Resolver answering from fixed tables.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    forward: HashMap<String, IpAddr>,
    reverse: HashMap<IpAddr, String>,
}

impl StaticResolver {
    /// Create an empty resolver; every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name/address pair in both directions.
    pub fn with_host(mut self, name: &str, addr: IpAddr) -> Self {
        self.forward.insert(name.to_string(), addr);
        self.reverse.insert(addr, name.to_string());
        self
    }
}

impl Resolver for StaticResolver {
    fn forward(&self, host: &str) -> Result<IpAddr, ResolveError> {
        self.forward.get(host).copied().ok_or_else(|| ResolveError {
            target: host.to_string(),
            reason: "unknown host".to_string(),
        })
    }

    fn reverse(&self, addr: IpAddr) -> Result<String, ResolveError> {
        self.reverse.get(&addr).cloned().ok_or_else(|| ResolveError {
            target: addr.to_string(),
            reason: "no name registered".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_static_resolver() {
        let addr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7));
        let resolver = StaticResolver::new().with_host("host.example", addr);
        assert_eq!(resolver.forward("host.example"), Ok(addr));
        assert_eq!(resolver.reverse(addr), Ok("host.example".to_string()));
        assert!(resolver.forward("other.example").is_err());
    }

    #[test]
    fn test_system_forward_literal() {
        let addr = SystemResolver.forward("127.0.0.1").unwrap();
        assert_eq!(addr, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_raw_sockaddr_lengths() {
        let (_, len4) = raw_sockaddr(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let (_, len6) = raw_sockaddr("::1".parse().unwrap());
        assert_eq!(len4 as usize, std::mem::size_of::<libc::sockaddr_in>());
        assert_eq!(len6 as usize, std::mem::size_of::<libc::sockaddr_in6>());
    }
}
