//! Opaque identifier newtypes.
//!
//! Every id crossing a boundary (server, channel, message, entity) is parsed
//! into one of these before touching the store. Parsing never panics: a
//! malformed id yields [`InvalidId`].

use std::{fmt, str::FromStr};

use {
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// A syntactically invalid identifier was supplied.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid {kind} id: {value:?}")]
pub struct InvalidId {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! id_type {
    ($name:ident, $kind:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random id.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = InvalidId;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self).map_err(|_| InvalidId {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }

        impl TryFrom<&str> for $name {
            type Error = InvalidId;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                s.parse()
            }
        }
    };
}

id_type!(ServerId, "server");
id_type!(ChannelId, "channel");
id_type!(MessageId, "message");
id_type!(EntityId, "entity");

impl ServerId {
    /// The well-known default server. Always valid, and the store guarantees
    /// it resolves even when no server was ever explicitly created.
    pub const DEFAULT: ServerId = ServerId(Uuid::nil());
}
