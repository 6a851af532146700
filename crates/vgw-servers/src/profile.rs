//! OpenVPN profile parsing
//!
//! Extracts the server endpoint from the `remote` directive of a profile.

use thiserror::Error;

/// Profile parser signature carried by provider descriptors
pub type ProfileParser = fn(&str) -> Result<ParsedProfile, ProfileError>;

/// Result of parsing one profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedProfile {
    /// Hostname (or address literal) of the remote server
    pub host: String,
    /// Non-fatal ambiguity found in the profile
    pub warning: Option<String>,
}

/// Profile errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("remote host not found")]
    RemoteNotFound,
}

/// Extract the host of the `remote` directive.
///
/// Several `remote` lines yield the first host and a warning.
pub fn openvpn_remote(content: &str) -> Result<ParsedProfile, ProfileError> {
    let mut hosts = content.lines().filter_map(remote_host);

    let host = hosts.next().ok_or(ProfileError::RemoteNotFound)?;
    let discarded = hosts.count();

    let warning = (discarded > 0).then(|| {
        format!(
            "only using the first host {:?} and discarding {} other hosts",
            host, discarded
        )
    });

    Ok(ParsedProfile {
        host: host.to_string(),
        warning,
    })
}

/// Host of a `remote <host> [port] [proto]` line
fn remote_host(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.starts_with('#') || line.starts_with(';') {
        return None;
    }

    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some("remote"), Some(host)) => Some(host),
        _ => None,
    }
}
