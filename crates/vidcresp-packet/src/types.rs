//! Packet type codes and their classification.
//!
//! Type codes are grouped into numeric ranges. A range's `BEGIN`/`END`
//! markers are never valid types themselves: a code belongs to a range only
//! when it lies strictly between them.

use bitflags::bitflags;

/// First code of the command range (exclusive).
pub const CMD_BEGIN: u32 = 0x0100_0000;
pub const CMD_INIT: u32 = 0x0100_0001;
pub const CMD_POWER_COLLAPSE: u32 = 0x0100_0002;
pub const CMD_OPEN: u32 = 0x0100_0003;
pub const CMD_CLOSE: u32 = 0x0100_0004;
pub const CMD_START: u32 = 0x0100_0005;
pub const CMD_STOP: u32 = 0x0100_0006;
pub const CMD_DRAIN: u32 = 0x0100_0007;
pub const CMD_RESUME: u32 = 0x0100_0008;
pub const CMD_BUFFER: u32 = 0x0100_0009;
pub const CMD_DELIVERY_MODE: u32 = 0x0100_000A;
pub const CMD_SUBSCRIBE_MODE: u32 = 0x0100_000B;
pub const CMD_SETTINGS_CHANGE: u32 = 0x0100_000C;
/// Last code of the command range (exclusive).
pub const CMD_END: u32 = 0x01FF_FFFF;

pub const PROP_BEGIN: u32 = 0x0300_0000;
pub const PROP_IMAGE_VERSION: u32 = 0x0300_0001;
/// System-scope properties live below this code; session properties above.
pub const PROP_CODEC: u32 = 0x0300_0100;
pub const PROP_PROFILE: u32 = 0x0300_0103;
pub const PROP_LEVEL: u32 = 0x0300_0104;
pub const PROP_TIER: u32 = 0x0300_0105;
pub const PROP_LUMA_CHROMA_BIT_DEPTH: u32 = 0x0300_0109;
pub const PROP_CODED_FRAMES: u32 = 0x0300_010A;
pub const PROP_BUFFER_FW_MIN_OUTPUT_COUNT: u32 = 0x0300_010D;
pub const PROP_PIC_ORDER_CNT_TYPE: u32 = 0x0300_010E;
pub const PROP_SIGNAL_COLOR_INFO: u32 = 0x0300_010F;
pub const PROP_BITSTREAM_RESOLUTION: u32 = 0x0300_0120;
pub const PROP_CROP_OFFSETS: u32 = 0x0300_0121;
pub const PROP_PICTURE_TYPE: u32 = 0x0300_0122;
pub const PROP_NO_OUTPUT: u32 = 0x0300_0123;
pub const PROP_END: u32 = 0x03FF_FFFF;

pub const SESSION_ERROR_BEGIN: u32 = 0x0400_0000;
pub const ERROR_UNKNOWN_SESSION: u32 = 0x0400_0001;
pub const ERROR_MAX_SESSIONS: u32 = 0x0400_0002;
pub const ERROR_FATAL: u32 = 0x0400_0003;
pub const ERROR_INVALID_STATE: u32 = 0x0400_0004;
pub const ERROR_INSUFFICIENT_RESOURCES: u32 = 0x0400_0005;
pub const ERROR_BUFFER_NOT_SET: u32 = 0x0400_0006;
pub const SESSION_ERROR_END: u32 = 0x04FF_FFFF;

pub const SYSTEM_ERROR_BEGIN: u32 = 0x0500_0000;
pub const SYS_ERROR_WD_TIMEOUT: u32 = 0x0500_0001;
pub const SYS_ERROR_NOC: u32 = 0x0500_0002;
pub const SYS_ERROR_FATAL: u32 = 0x0500_0003;
pub const SYSTEM_ERROR_END: u32 = 0x05FF_FFFF;

pub const INFORMATION_BEGIN: u32 = 0x0600_0000;
pub const INFO_UNSUPPORTED: u32 = 0x0600_0001;
pub const INFO_DATA_CORRUPT: u32 = 0x0600_0002;
pub const INFORMATION_END: u32 = 0x06FF_FFFF;

/// Payload descriptors carried in a packet's `payload_info` field.
pub const PAYLOAD_NONE: u32 = 0x0;
pub const PAYLOAD_U32: u32 = 0x1;
pub const PAYLOAD_U64: u32 = 0x3;
pub const PAYLOAD_STRUCTURE: u32 = 0x5;
pub const PAYLOAD_BLOB: u32 = 0x6;
pub const PAYLOAD_STRING: u32 = 0x7;
pub const PAYLOAD_U32_ARRAY: u32 = 0xB;

bitflags! {
    /// Result flags the firmware sets on every response packet.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct PacketFlags: u32 {
        const SUCCESS = 1 << 0;
        const INFORMATION = 1 << 1;
        const SESSION_ERROR = 1 << 2;
        const SYSTEM_ERROR = 1 << 3;
    }
}

/// Port a packet refers to.
///
/// Whether a port is the session's input or output depends on the session
/// domain: a decoder consumes bitstream and produces raw frames, an encoder
/// does the opposite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    None,
    Bitstream,
    Raw,
    Unknown(u32),
}

impl Port {
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Bitstream,
            2 => Self::Raw,
            other => Self::Unknown(other),
        }
    }

    pub const fn raw(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Bitstream => 1,
            Self::Raw => 2,
            Self::Unknown(other) => other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Bitstream => "BITSTREAM",
            Self::Raw => "RAW",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Session commands the firmware acknowledges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Init,
    PowerCollapse,
    Open,
    Close,
    Start,
    Stop,
    Drain,
    Resume,
    Buffer,
    DeliveryMode,
    SubscribeMode,
    SettingsChange,
}

impl Command {
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            CMD_INIT => Self::Init,
            CMD_POWER_COLLAPSE => Self::PowerCollapse,
            CMD_OPEN => Self::Open,
            CMD_CLOSE => Self::Close,
            CMD_START => Self::Start,
            CMD_STOP => Self::Stop,
            CMD_DRAIN => Self::Drain,
            CMD_RESUME => Self::Resume,
            CMD_BUFFER => Self::Buffer,
            CMD_DELIVERY_MODE => Self::DeliveryMode,
            CMD_SUBSCRIBE_MODE => Self::SubscribeMode,
            CMD_SETTINGS_CHANGE => Self::SettingsChange,
            _ => return None,
        })
    }
}

/// Session properties the firmware reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    BitstreamResolution,
    CropOffsets,
    BitDepth,
    CodedFrames,
    FwMinOutputCount,
    PicOrderCntType,
    ColorInfo,
    Profile,
    Level,
    Tier,
    PictureType,
    NoOutput,
}

impl Property {
    pub const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            PROP_BITSTREAM_RESOLUTION => Self::BitstreamResolution,
            PROP_CROP_OFFSETS => Self::CropOffsets,
            PROP_LUMA_CHROMA_BIT_DEPTH => Self::BitDepth,
            PROP_CODED_FRAMES => Self::CodedFrames,
            PROP_BUFFER_FW_MIN_OUTPUT_COUNT => Self::FwMinOutputCount,
            PROP_PIC_ORDER_CNT_TYPE => Self::PicOrderCntType,
            PROP_SIGNAL_COLOR_INFO => Self::ColorInfo,
            PROP_PROFILE => Self::Profile,
            PROP_LEVEL => Self::Level,
            PROP_TIER => Self::Tier,
            PROP_PICTURE_TYPE => Self::PictureType,
            PROP_NO_OUTPUT => Self::NoOutput,
            _ => return None,
        })
    }
}

/// Dispatch category of a session-scope packet.
///
/// The derived ordering is the dispatch priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    SessionError,
    Info,
    Property,
    Command,
}

/// Session categories in the order a batch is dispatched.
pub const SESSION_DISPATCH_ORDER: [Category; 4] = [
    Category::SessionError,
    Category::Info,
    Category::Property,
    Category::Command,
];

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Self::SessionError => "SESSION_ERROR",
            Self::Info => "INFO",
            Self::Property => "PROPERTY",
            Self::Command => "COMMAND",
        }
    }
}

/// A session-scope packet type decoded once into its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketClass {
    SessionError(u32),
    Info(u32),
    Property(u32),
    Command(u32),
    Unknown(u32),
}

impl PacketClass {
    pub const fn of_session(code: u32) -> Self {
        if in_range(SESSION_ERROR_BEGIN, SESSION_ERROR_END, code) {
            Self::SessionError(code)
        } else if in_range(INFORMATION_BEGIN, INFORMATION_END, code) {
            Self::Info(code)
        } else if in_range(PROP_BEGIN, PROP_END, code) {
            Self::Property(code)
        } else if in_range(CMD_BEGIN, CMD_END, code) {
            Self::Command(code)
        } else {
            Self::Unknown(code)
        }
    }

    pub const fn category(self) -> Option<Category> {
        match self {
            Self::SessionError(_) => Some(Category::SessionError),
            Self::Info(_) => Some(Category::Info),
            Self::Property(_) => Some(Category::Property),
            Self::Command(_) => Some(Category::Command),
            Self::Unknown(_) => None,
        }
    }

    pub const fn code(self) -> u32 {
        match self {
            Self::SessionError(code)
            | Self::Info(code)
            | Self::Property(code)
            | Self::Command(code)
            | Self::Unknown(code) => code,
        }
    }
}

/// A system-scope packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemClass {
    Init,
    Error(u32),
    Property(u32),
    Unknown(u32),
}

impl SystemClass {
    pub const fn of(code: u32) -> Self {
        if code == CMD_INIT {
            Self::Init
        } else if in_range(SYSTEM_ERROR_BEGIN, SYSTEM_ERROR_END, code) {
            Self::Error(code)
        } else if in_range(PROP_BEGIN, PROP_CODEC, code) {
            Self::Property(code)
        } else {
            Self::Unknown(code)
        }
    }
}

const fn in_range(begin: u32, end: u32, code: u32) -> bool {
    begin < code && code < end
}

/// Returns a human-readable name for a packet type code.
pub fn packet_type_name(code: u32) -> &'static str {
    match code {
        CMD_INIT => "CMD_INIT",
        CMD_POWER_COLLAPSE => "CMD_POWER_COLLAPSE",
        CMD_OPEN => "CMD_OPEN",
        CMD_CLOSE => "CMD_CLOSE",
        CMD_START => "CMD_START",
        CMD_STOP => "CMD_STOP",
        CMD_DRAIN => "CMD_DRAIN",
        CMD_RESUME => "CMD_RESUME",
        CMD_BUFFER => "CMD_BUFFER",
        CMD_DELIVERY_MODE => "CMD_DELIVERY_MODE",
        CMD_SUBSCRIBE_MODE => "CMD_SUBSCRIBE_MODE",
        CMD_SETTINGS_CHANGE => "CMD_SETTINGS_CHANGE",
        PROP_IMAGE_VERSION => "PROP_IMAGE_VERSION",
        PROP_PROFILE => "PROP_PROFILE",
        PROP_LEVEL => "PROP_LEVEL",
        PROP_TIER => "PROP_TIER",
        PROP_LUMA_CHROMA_BIT_DEPTH => "PROP_LUMA_CHROMA_BIT_DEPTH",
        PROP_CODED_FRAMES => "PROP_CODED_FRAMES",
        PROP_BUFFER_FW_MIN_OUTPUT_COUNT => "PROP_BUFFER_FW_MIN_OUTPUT_COUNT",
        PROP_PIC_ORDER_CNT_TYPE => "PROP_PIC_ORDER_CNT_TYPE",
        PROP_SIGNAL_COLOR_INFO => "PROP_SIGNAL_COLOR_INFO",
        PROP_BITSTREAM_RESOLUTION => "PROP_BITSTREAM_RESOLUTION",
        PROP_CROP_OFFSETS => "PROP_CROP_OFFSETS",
        PROP_PICTURE_TYPE => "PROP_PICTURE_TYPE",
        PROP_NO_OUTPUT => "PROP_NO_OUTPUT",
        ERROR_UNKNOWN_SESSION => "ERROR_UNKNOWN_SESSION",
        ERROR_MAX_SESSIONS => "ERROR_MAX_SESSIONS",
        ERROR_FATAL => "ERROR_FATAL",
        ERROR_INVALID_STATE => "ERROR_INVALID_STATE",
        ERROR_INSUFFICIENT_RESOURCES => "ERROR_INSUFFICIENT_RESOURCES",
        ERROR_BUFFER_NOT_SET => "ERROR_BUFFER_NOT_SET",
        SYS_ERROR_WD_TIMEOUT => "SYS_ERROR_WD_TIMEOUT",
        SYS_ERROR_NOC => "SYS_ERROR_NOC",
        SYS_ERROR_FATAL => "SYS_ERROR_FATAL",
        INFO_UNSUPPORTED => "INFO_UNSUPPORTED",
        INFO_DATA_CORRUPT => "INFO_DATA_CORRUPT",
        _ => "UNKNOWN",
    }
}

/// Describes a firmware-reported session error code.
pub fn session_error_reason(code: u32) -> &'static str {
    match code {
        ERROR_MAX_SESSIONS => "exceeded max sessions",
        ERROR_UNKNOWN_SESSION => "unknown session id",
        ERROR_INVALID_STATE => "invalid operation for current state",
        ERROR_INSUFFICIENT_RESOURCES => "insufficient resources",
        ERROR_BUFFER_NOT_SET => "internal buffers not set",
        ERROR_FATAL => "fatal error",
        _ => "unknown",
    }
}
