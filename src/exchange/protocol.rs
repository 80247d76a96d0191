//! Protocol tags.
//!
//! # Responsibilities
//! - Name the protocols an exchange can travel over
//! - Map URI schemes to protocols (case-insensitive)
//! - Parse protocol names from configuration
//!
//! # Design Decisions
//! - Closed set: a connector either speaks a protocol or does not
//! - Secure variants are distinct protocols (HTTPS is not HTTP)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol an exchange is carried over, or a client is able to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Protocol {
    Http,
    Https,
    File,
    Ftp,
    Smtp,
    /// In-process dispatch between applications of the same component.
    Riap,
}

/// Returned when a protocol name or scheme is not recognised.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown protocol '{0}'")]
pub struct UnknownProtocol(pub String);

impl Protocol {
    /// All known protocols.
    pub const ALL: [Protocol; 6] = [
        Protocol::Http,
        Protocol::Https,
        Protocol::File,
        Protocol::Ftp,
        Protocol::Smtp,
        Protocol::Riap,
    ];

    /// URI scheme for this protocol, lowercase.
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::File => "file",
            Protocol::Ftp => "ftp",
            Protocol::Smtp => "smtp",
            Protocol::Riap => "riap",
        }
    }

    /// Upper-case display name (e.g. `HTTP`).
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
            Protocol::File => "FILE",
            Protocol::Ftp => "FTP",
            Protocol::Smtp => "SMTP",
            Protocol::Riap => "RIAP",
        }
    }

    /// Well-known default port, if the protocol has one.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Protocol::Http => Some(80),
            Protocol::Https => Some(443),
            Protocol::Ftp => Some(21),
            Protocol::Smtp => Some(25),
            Protocol::File | Protocol::Riap => None,
        }
    }

    /// Resolve a URI scheme to a protocol.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.scheme().eq_ignore_ascii_case(scheme))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_scheme(s.trim()).ok_or_else(|| UnknownProtocol(s.to_string()))
    }
}

impl TryFrom<String> for Protocol {
    type Error = UnknownProtocol;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Protocol> for String {
    fn from(protocol: Protocol) -> Self {
        protocol.name().to_string()
    }
}
