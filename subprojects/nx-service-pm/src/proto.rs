//! PM protocol constants and types.

use bitflags::bitflags;
use nx_sf::{
    ServiceName,
    wire::{self, Field, Record},
};

/// Service name for the debug monitor interface.
pub const DMNT_SERVICE_NAME: ServiceName = ServiceName::from_static("pm:dmnt");

/// Service name for the shell interface.
pub const SHELL_SERVICE_NAME: ServiceName = ServiceName::from_static("pm:shell");

/// pm:shell command: LaunchProcess.
pub const CMD_LAUNCH_PROCESS: u32 = 0;

/// pm:dmnt commands.
///
/// 5.0.0 removed a command at the start of the table, so every later command
/// moved down by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmntCommand {
    StartProcess,
    GetTitlePid,
    EnableDebugForTitleId,
    GetApplicationPid,
    EnableDebugForApplication,
}

impl DmntCommand {
    /// The command id, in the renumbered (5.0.0+) table or the legacy one.
    pub const fn id(self, renumbered: bool) -> u32 {
        let legacy = match self {
            Self::StartProcess => 2,
            Self::GetTitlePid => 3,
            Self::EnableDebugForTitleId => 4,
            Self::GetApplicationPid => 5,
            Self::EnableDebugForApplication => 6,
        };
        if renumbered { legacy - 1 } else { legacy }
    }
}

pub const PID_IN: Record = Record::new("PidIn", 8, &[Field::u64("pid", 0)]);

pub const TITLE_ID_IN: Record = Record::new("TitleIdIn", 8, &[Field::u64("title_id", 0)]);

pub const PID_OUT: Record = Record::new("PidOut", 8, &[Field::u64("pid", 0)]);

pub const LAUNCH_PROCESS_IN: Record = Record::new(
    "LaunchProcessIn",
    0x18,
    &[
        Field::u32("launch_flags", 0),
        Field::u64("title_id", 8),
        Field::u64("storage_id", 0x10),
    ],
);

/// Every record this crate puts on the wire.
pub const ALL_RECORDS: &[Record] = &[
    wire::EMPTY,
    PID_IN,
    TITLE_ID_IN,
    PID_OUT,
    LAUNCH_PROCESS_IN,
];

bitflags! {
    /// Flags for [`PmClient::shell_launch_process`].
    ///
    /// Unknown bits are passed to the service unchanged.
    ///
    /// [`PmClient::shell_launch_process`]: crate::PmClient::shell_launch_process
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(transparent)]
    pub struct LaunchFlags: u32 {
        const SIGNAL_ON_EXIT = 1 << 0;
        const SIGNAL_ON_START = 1 << 1;
        const SIGNAL_ON_CRASH = 1 << 2;
        const SIGNAL_ON_DEBUG = 1 << 3;
        const START_SUSPENDED = 1 << 4;
        const DISABLE_ASLR = 1 << 5;
    }
}

/// Storage a title is launched from.
///
/// Any raw id can be wrapped; the constants name the common ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct StorageId(pub u64);

impl StorageId {
    pub const NONE: Self = Self(0);
    pub const HOST: Self = Self(1);
    pub const GAME_CARD: Self = Self(2);
    pub const NAND_SYSTEM: Self = Self(3);
    pub const NAND_USER: Self = Self(4);
    pub const SD_CARD: Self = Self(5);
}
