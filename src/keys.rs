//! Opaque handle identities
//!
//! Backends index their tables by these keys, never by addresses, so a
//! façade can be dropped or moved without leaving a dangling entry behind.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! handle_key {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0.simple())
            }
        }
    };
}

handle_key!(
    /// Identity of a [`crate::Service`]
    ServiceKey,
    "service"
);
handle_key!(
    /// Identity of a [`crate::Job`]
    JobKey,
    "job"
);
handle_key!(
    /// Identity of a [`crate::Container`]
    ContainerKey,
    "container"
);
