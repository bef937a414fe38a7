use bitflags::bitflags;

use crate::error::{Result, ValidationError};

bitflags! {
    /// Flags describing the data being validated
    ///
    /// At most one data-type flag may be set per pass; none means a plain
    /// data tree. [`ValidationOptions::OBSOLETE`] combines with any of them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ValidationOptions: u32 {
        /// Complete configuration datastore content
        const CONFIG = 1 << 0;
        /// Reply to a get request (config and state)
        const GET = 1 << 1;
        /// Reply to a get-config request
        const GET_CONFIG = 1 << 2;
        /// Content of an edit-config request
        const EDIT = 1 << 3;
        /// Subtree filter
        const FILTER = 1 << 4;
        /// RPC input
        const RPC = 1 << 5;
        /// RPC output
        const RPC_REPLY = 1 << 6;
        /// Notification content
        const NOTIF = 1 << 7;
        /// Reject instances of obsolete definitions
        const OBSOLETE = 1 << 8;
    }
}

impl ValidationOptions {
    pub const TYPE_MASK: Self = Self::CONFIG
        .union(Self::GET)
        .union(Self::GET_CONFIG)
        .union(Self::EDIT)
        .union(Self::FILTER)
        .union(Self::RPC)
        .union(Self::RPC_REPLY)
        .union(Self::NOTIF);

    /// Partial data where config-only completeness checks do not apply
    pub const RETRIEVAL_OR_EDIT: Self = Self::EDIT.union(Self::GET).union(Self::GET_CONFIG);

    /// The data-type part of the options
    pub fn data_type(self) -> Self {
        self & Self::TYPE_MASK
    }

    pub fn is_filter(self) -> bool {
        self.contains(Self::FILTER)
    }

    /// Get or get-config reply
    pub fn is_retrieval(self) -> bool {
        self.intersects(Self::GET.union(Self::GET_CONFIG))
    }

    /// References are left unresolved for these data types
    pub fn defers_references(self) -> bool {
        self.intersects(Self::FILTER.union(Self::RETRIEVAL_OR_EDIT))
    }

    /// Reject option sets with more than one data-type flag
    pub fn ensure_single_mode(self) -> Result<Self> {
        let data_type = self.data_type();
        if data_type.bits().count_ones() > 1 {
            let modes: Vec<&str> = data_type.iter_names().map(|(name, _)| name).collect();
            return Err(ValidationError::ConflictingModes {
                modes: modes.join(", "),
            });
        }
        Ok(self)
    }
}
