//! Operation flags passed to storage primitives.
use bitflags::bitflags;

bitflags! {
    /// Represents the bit vector of options for an update primitive.
    pub struct OpUpdateFlags: i32 {
        const UPSERT       = 0b00000001;
        const MULTI_UPDATE = 0b00000010;
    }
}

bitflags! {
    /// Represents the bit vector of options for a delete primitive.
    pub struct OpDeleteFlags: i32 {
        const SINGLE_REMOVE = 0b00000001;
    }
}

impl OpUpdateFlags {
    /// Constructs the flags for an update item.
    pub fn with_options(multi: bool, upsert: bool) -> OpUpdateFlags {
        let mut flags = OpUpdateFlags::empty();

        if multi {
            flags.insert(Self::MULTI_UPDATE);
        }

        if upsert {
            flags.insert(Self::UPSERT);
        }

        flags
    }
}

impl OpDeleteFlags {
    /// Constructs the flags for a delete item.
    pub fn with_options(limit_one: bool) -> OpDeleteFlags {
        if limit_one {
            OpDeleteFlags::SINGLE_REMOVE
        } else {
            OpDeleteFlags::empty()
        }
    }
}
