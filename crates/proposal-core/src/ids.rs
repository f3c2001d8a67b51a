//! Identifier newtypes
//!
//! Entities owned by the engine use ULIDs (sortable by creation time).
//! References to things owned by external collaborators (users, teams,
//! departments) are plain integers handed to us by those systems.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a fresh identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(s).map(Self)
            }
        }
    };
}

macro_rules! external_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(
    /// Proposal identifier
    ProposalId
);
entity_id!(
    /// Proposal version identifier
    VersionId
);
entity_id!(
    /// Review decision identifier
    DecisionId
);
entity_id!(
    /// Derived project record identifier
    ProjectId
);

external_id!(
    /// User reference issued by the identity system
    UserId
);
external_id!(
    /// Team reference owned by the team directory
    TeamId
);
external_id!(
    /// Department reference owned by the role system
    DepartmentId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_roundtrips_through_string() {
        let id = ProposalId::new();
        let parsed: ProposalId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn entity_id_rejects_garbage() {
        assert!("not-a-ulid".parse::<VersionId>().is_err());
    }

    #[test]
    fn external_ids_display_as_integers() {
        assert_eq!(TeamId(7).to_string(), "7");
        assert_eq!(UserId::from(42), UserId(42));
    }
}
