//! Conflict policy
//!
//! When a file's content hash no longer matches its ledger entry, the
//! configured policy decides whose version wins. The policy is selected
//! once per run and applied uniformly by the upload decision engine and
//! the reconciler.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Rule applied when local and remote content have diverged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Local content is authoritative; diverged files are re-uploaded.
    ///
    /// The default for an export-then-upload pipeline: the local copy is
    /// freshly produced and the remote destination is a passive mirror.
    #[default]
    LocalWins,
    /// Diverged files are left alone, preserving manual remote edits.
    Skip,
    /// Re-upload only when the local file was modified after the last
    /// recorded upload time.
    NewerWins,
}

impl ConflictPolicy {
    /// The literal used in configuration and CLI flags
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalWins => "local-wins",
            Self::Skip => "skip",
            Self::NewerWins => "newer-wins",
        }
    }
}

impl Display for ConflictPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local-wins" => Ok(Self::LocalWins),
            "skip" => Ok(Self::Skip),
            "newer-wins" => Ok(Self::NewerWins),
            other => Err(DomainError::InvalidPolicy(format!(
                "expected one of local-wins, skip, newer-wins; got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_literals() {
        assert_eq!(
            "local-wins".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::LocalWins
        );
        assert_eq!(
            "skip".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::Skip
        );
        assert_eq!(
            "newer-wins".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::NewerWins
        );
    }

    #[test]
    fn test_parse_unknown_fails() {
        let result = "remote-wins".parse::<ConflictPolicy>();
        assert!(result.is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for policy in [
            ConflictPolicy::LocalWins,
            ConflictPolicy::Skip,
            ConflictPolicy::NewerWins,
        ] {
            let parsed: ConflictPolicy = policy.to_string().parse().unwrap();
            assert_eq!(parsed, policy);
        }
    }

    #[test]
    fn test_default_is_local_wins() {
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::LocalWins);
    }

    #[test]
    fn test_serde_kebab_case() {
        let yaml = "newer-wins";
        let policy: ConflictPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy, ConflictPolicy::NewerWins);

        let out = serde_yaml::to_string(&ConflictPolicy::LocalWins).unwrap();
        assert_eq!(out.trim(), "local-wins");
    }
}
