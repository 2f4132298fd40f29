/// Errors raised while validating or decoding a firmware response.
///
/// Any of these means the firmware handed us bytes we cannot trust; the
/// whole response batch is discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// The response buffer is empty.
    #[error("empty response buffer")]
    EmptyBuffer,

    /// The response exceeds the configured maximum size.
    #[error("response too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },

    /// A packet starts outside the batch it belongs to.
    #[error("packet offset {offset} outside batch of {len} bytes")]
    OffsetOutOfBounds { offset: usize, len: usize },

    /// Not enough bytes remain to even read the packet's size field.
    #[error("truncated packet at offset {offset} ({remaining} bytes remain)")]
    Truncated { offset: usize, remaining: usize },

    /// The packet declares a size of zero.
    #[error("packet at offset {offset} declares zero size")]
    ZeroSize { offset: usize },

    /// The packet declares a size smaller than its own fixed header.
    #[error("packet at offset {offset} declares {size} bytes, below the {min}-byte header")]
    Undersized { offset: usize, size: usize, min: usize },

    /// The packet's declared size runs past the end of the batch.
    #[error("packet at offset {offset} declares {size} bytes but only {remaining} remain")]
    Overrun {
        offset: usize,
        size: usize,
        remaining: usize,
    },

    /// A packet payload is too short for the structure it should carry.
    #[error("payload too short for {what} ({len} bytes, need {need})")]
    PayloadTooShort {
        what: &'static str,
        len: usize,
        need: usize,
    },

    /// The crash-report region's embedded size disagrees with the region.
    #[error("corrupt crash report (declares {declared} bytes, region is {actual})")]
    CorruptCrashReport { declared: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, PacketError>;
