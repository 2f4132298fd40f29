//! Human-readable text the firmware hands back: the image version string and
//! the crash report it leaves behind on a system error.

use crate::codec::le_u32;
use crate::error::{PacketError, Result};

/// Length of the firmware version buffer, terminator included.
pub const VERSION_LENGTH: usize = 128;

/// Decode the firmware image version from a `PROP_IMAGE_VERSION` payload.
///
/// The firmware pads the string with NUL bytes at the start and between its
/// fields; those become spaces so the result reads as one line.
pub fn decode_image_version(payload: &[u8]) -> Result<String> {
    let need = VERSION_LENGTH - 1;
    if payload.len() < need {
        return Err(PacketError::PayloadTooShort {
            what: "image version",
            len: payload.len(),
            need,
        });
    }
    let bytes: Vec<u8> = payload[..need]
        .iter()
        .map(|&b| if b == 0 { b' ' } else { b })
        .collect();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode the crash-report region the firmware fills on a fatal error.
///
/// Layout: a little-endian `u32` holding the region size, then text. The
/// embedded size must match the region exactly. The text is not guaranteed
/// to be NUL-terminated; without a terminator the last byte is dropped.
pub fn decode_crash_report(region: &[u8]) -> Result<String> {
    if region.len() < 4 {
        return Err(PacketError::CorruptCrashReport {
            declared: 0,
            actual: region.len(),
        });
    }
    let declared = le_u32(region, 0) as usize;
    if declared != region.len() {
        return Err(PacketError::CorruptCrashReport {
            declared,
            actual: region.len(),
        });
    }

    let text = &region[4..];
    let end = match text.iter().position(|&b| b == 0) {
        Some(nul) => nul,
        None => text.len().saturating_sub(1),
    };
    Ok(String::from_utf8_lossy(&text[..end]).into_owned())
}
