//! Reads the host's resolver configuration in `resolv.conf(5)` format.

use std::{
    io,
    num::IntErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

/// The well-known location of the host's resolver configuration.
pub const DEFAULT_PATH: &str = "/etc/resolv.conf";

// Values the resolver uses when the file does not set an option.
const DEFAULT_NDOTS: u32 = 1;
const DEFAULT_TIMEOUT: u32 = 5;
const DEFAULT_ATTEMPTS: u32 = 2;

// Upper bounds the resolver silently applies to option values.
const MAX_NDOTS: u32 = 15;
const MAX_TIMEOUT: u32 = 30;
const MAX_ATTEMPTS: u32 = 5;

/// Host resolver settings.
///
/// The numeric options are zero when unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Nameserver addresses, in the order they appear in the file.
    pub servers: Vec<String>,
    pub search: Vec<String>,
    pub ndots: u32,
    pub timeout: u32,
    pub attempts: u32,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("nameserver requires an address")]
    MissingAddress,

    #[error("invalid value for option '{option}': {value:?}")]
    InvalidOption { option: &'static str, value: String },
}

// === impl ResolverConfig ===

impl ResolverConfig {
    /// Reads and parses the resolver configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = contents.parse().map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), ?config, "Loaded resolver config");
        Ok(config)
    }

    fn set_option(&mut self, option: &str) -> Result<(), ParseErrorKind> {
        let Some((name, value)) = option.split_once(':') else {
            // Flag options (e.g. `rotate`, `edns0`) don't affect the pod's DNS config.
            return Ok(());
        };

        let (option, field, max) = match name {
            "ndots" => ("ndots", &mut self.ndots, MAX_NDOTS),
            "timeout" => ("timeout", &mut self.timeout, MAX_TIMEOUT),
            "attempts" => ("attempts", &mut self.attempts, MAX_ATTEMPTS),
            _ => return Ok(()),
        };
        let n = match value.parse::<u32>() {
            Ok(n) => n,
            // Oversized values are capped like any other out-of-range value.
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => u32::MAX,
            Err(_) => {
                return Err(ParseErrorKind::InvalidOption {
                    option,
                    value: value.to_string(),
                })
            }
        };
        *field = n.min(max);
        Ok(())
    }
}

impl FromStr for ResolverConfig {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        let mut config = Self {
            ndots: DEFAULT_NDOTS,
            timeout: DEFAULT_TIMEOUT,
            attempts: DEFAULT_ATTEMPTS,
            ..Self::default()
        };

        for (i, line) in s.lines().enumerate() {
            let err = |kind| ParseError { line: i + 1, kind };

            let mut words = line.split_whitespace();
            let keyword = match words.next() {
                None => continue,
                Some(w) if w.starts_with('#') || w.starts_with(';') => continue,
                Some(w) => w,
            };

            match keyword {
                "nameserver" => {
                    let addr = words
                        .next()
                        .ok_or_else(|| err(ParseErrorKind::MissingAddress))?;
                    config.servers.push(addr.to_string());
                }
                // `domain` and `search` are mutually exclusive; the last one wins.
                "domain" => {
                    config.search = words.next().map(String::from).into_iter().collect();
                }
                "search" => {
                    config.search = words.map(String::from).collect();
                }
                "options" => {
                    for option in words {
                        config.set_option(option).map_err(err)?;
                    }
                }
                _ => {}
            }
        }

        Ok(config)
    }
}
