//! Integer-coded value domains shared with the store and peer services.
//!
//! Every domain reserves `0` for `Unknown`. Decoding never fails: an integer outside the known
//! set becomes `Unrecognized` carrying the code as sent, and the code that needs a decided value
//! rejects both sentinels there.

use serde::{Deserialize, Serialize};

macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $code:literal => $label:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(from = "i32", into = "i32")]
        pub enum $name {
            #[default]
            Unknown,
            $($variant,)+
            /// A code outside the known set, kept as sent.
            Unrecognized(i32),
        }

        impl $name {
            pub const fn code(self) -> i32 {
                match self {
                    Self::Unknown => 0,
                    $(Self::$variant => $code,)+
                    Self::Unrecognized(code) => code,
                }
            }

            pub const fn label(self) -> &'static str {
                match self {
                    Self::Unknown => "unknown",
                    $(Self::$variant => $label,)+
                    Self::Unrecognized(_) => "unrecognized",
                }
            }

            pub const fn is_known(self) -> bool {
                !matches!(self, Self::Unknown | Self::Unrecognized(_))
            }
        }

        impl From<i32> for $name {
            fn from(code: i32) -> Self {
                match code {
                    0 => Self::Unknown,
                    $($code => Self::$variant,)+
                    other => Self::Unrecognized(other),
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> Self {
                value.code()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} ({})", self.label(), self.code())
            }
        }
    };
}

coded_enum! {
    /// Lifecycle status of an inspection; advances Unknown -> InWork -> Done.
    pub enum InspectionStatus {
        InWork = 1 => "in work",
        Done = 2 => "done",
    }
}

coded_enum! {
    /// What the field visit was for; selects the act template.
    pub enum InspectionType {
        Limitation = 1 => "limitation",
        Resumption = 2 => "resumption",
        Verification = 3 => "verification",
        UnauthorizedConnection = 4 => "unauthorized connection",
    }
}

coded_enum! {
    pub enum Resolution {
        Limited = 1 => "limited",
        Stopped = 2 => "stopped",
        Resumed = 3 => "resumed",
    }
}

coded_enum! {
    /// Who performed the limitation on site.
    pub enum MethodBy {
        Consumer = 1 => "consumer",
        Inspector = 2 => "inspector",
    }
}

coded_enum! {
    pub enum ReasonType {
        NotIntroduced = 1 => "not introduced",
        ConsumerLimited = 2 => "consumer limited",
        InspectorLimited = 3 => "inspector limited",
        Resumed = 4 => "resumed",
    }
}

coded_enum! {
    pub enum AttachmentType {
        DevicePhoto = 1 => "device photo",
        SealPhoto = 2 => "seal photo",
        Act = 3 => "act",
    }
}

coded_enum! {
    /// Where a metering device is mounted relative to the subscriber's premises.
    pub enum DevicePlaceType {
        Other = 1 => "other",
        Flat = 2 => "flat",
        StairLanding = 3 => "stair landing",
    }
}

coded_enum! {
    /// Status of the upstream work order.
    pub enum TaskStatus {
        InWork = 1 => "in work",
        Done = 2 => "done",
    }
}

coded_enum! {
    /// Inbound task lifecycle event kind.
    pub enum TaskEventType {
        Add = 1 => "add",
        Start = 2 => "start",
        Finish = 3 => "finish",
    }
}

coded_enum! {
    /// Outbound inspection state-change event kind.
    pub enum InspectionEventType {
        Started = 1 => "started",
        Finished = 2 => "finished",
    }
}
