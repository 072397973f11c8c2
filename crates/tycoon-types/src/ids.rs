//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every entity in the simulation has a strongly-typed ID so that a rig ID
//! can never be passed where a site ID is expected. IDs use UUID v7
//! (time-ordered) for efficient database indexing.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a player account (issued by the auth collaborator).
    UserId
}

define_id! {
    /// Unique identifier for a company.
    CompanyId
}

define_id! {
    /// Unique identifier for a mining site.
    SiteId
}

define_id! {
    /// Unique identifier for a mining rig.
    RigId
}

define_id! {
    /// Unique identifier for an energy contract attached to a site.
    ContractId
}

define_id! {
    /// Unique identifier for a trading position.
    PositionId
}

define_id! {
    /// Unique identifier for a research row.
    ResearchId
}

define_id! {
    /// Unique identifier for a quest definition.
    QuestId
}

define_id! {
    /// Unique identifier for a company's enrolment in a quest.
    CompanyQuestId
}

define_id! {
    /// Unique identifier for an alert.
    AlertId
}

define_id! {
    /// Unique identifier for a world event.
    EventId
}
