//! Turning a candidate field value into an IP address.

use std::fmt;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};

use tracing::debug;

use crate::record::FieldValue;

/// How the text of a candidate field is interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Resolution {
    /// The field holds an IPv4 or IPv6 literal.
    #[default]
    Literal,
    /// The field holds a host name to resolve.
    Dns,
}

/// A host-name resolver.
///
/// The decoder never retries and adds no timeout of its own; whatever the
/// implementation does on a slow lookup is what the record waits for.
pub trait Resolve: Send + Sync {
    fn lookup_host(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolves through the operating system (`getaddrinfo` and friends).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn lookup_host(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        Ok((host, 0).to_socket_addrs()?.map(|sa| sa.ip()).collect())
    }
}

/// Produces an address from a field value, or nothing.
pub struct AddressResolver {
    mode: Resolution,
    resolver: Box<dyn Resolve>,
}

impl fmt::Debug for AddressResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressResolver")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl AddressResolver {
    pub fn new(mode: Resolution) -> Self {
        Self {
            mode,
            resolver: Box::new(SystemResolver),
        }
    }

    /// Swap the host resolver, e.g. for a caching resolver owned by the host.
    pub fn with_resolver<R: Resolve + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Resolve a field value. Non-text values, unparsable literals, resolver
    /// errors and empty answers all yield `None`.
    pub fn resolve(&self, value: Option<&FieldValue>) -> Option<IpAddr> {
        let host = value?.as_str()?;

        match self.mode {
            Resolution::Literal => match host.parse::<IpAddr>() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    debug!(host, "not an IP address literal");
                    None
                }
            },
            Resolution::Dns => match self.resolver.lookup_host(host) {
                // Only the first answer is used
                Ok(ips) => ips.into_iter().next(),
                Err(err) => {
                    debug!(host, error = %err, "host lookup failed");
                    None
                }
            },
        }
    }
}
