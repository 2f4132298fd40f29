use vidcresp_packet::{Port, DEFAULT_MAX_RESPONSE};

/// Whether a session decodes or encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Decode,
    Encode,
}

impl Domain {
    /// Map a firmware port to the session's input or output side.
    ///
    /// A decoder takes bitstream in and hands raw frames out; an encoder is
    /// the reverse.
    pub fn driver_port(self, port: Port) -> Option<DriverPort> {
        match (self, port) {
            (Self::Decode, Port::Bitstream) | (Self::Encode, Port::Raw) => Some(DriverPort::Input),
            (Self::Decode, Port::Raw) | (Self::Encode, Port::Bitstream) => Some(DriverPort::Output),
            _ => None,
        }
    }
}

/// Driver-side direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverPort {
    Input,
    Output,
}

impl DriverPort {
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Input => 0,
            Self::Output => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    H264,
    Hevc,
    Vp9,
    Av1,
    Heic,
}

/// Per-session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub domain: Domain,
    pub codec: Codec,
    /// Number of frames batched into one input buffer. Values above one
    /// enable batched (super-frame) input.
    pub super_frame: u32,
    /// Whether buffers carry metadata tags; enables error marking for
    /// frames the firmware produced no output for.
    pub meta_buf_tag: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            domain: Domain::Decode,
            codec: Codec::H264,
            super_frame: 0,
            meta_buf_tag: false,
        }
    }
}

impl SessionConfig {
    pub fn decoder(codec: Codec) -> Self {
        Self {
            domain: Domain::Decode,
            codec,
            ..Self::default()
        }
    }

    pub fn encoder(codec: Codec) -> Self {
        Self {
            domain: Domain::Encode,
            codec,
            ..Self::default()
        }
    }

    pub(crate) fn is_batched(&self) -> bool {
        self.super_frame > 1
    }
}

/// Core-wide configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreConfig {
    /// Responses larger than this are rejected as malformed.
    pub max_response_size: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_response_size: DEFAULT_MAX_RESPONSE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_mapping_depends_on_domain() {
        assert_eq!(
            Domain::Decode.driver_port(Port::Bitstream),
            Some(DriverPort::Input)
        );
        assert_eq!(Domain::Decode.driver_port(Port::Raw), Some(DriverPort::Output));
        assert_eq!(Domain::Encode.driver_port(Port::Raw), Some(DriverPort::Input));
        assert_eq!(
            Domain::Encode.driver_port(Port::Bitstream),
            Some(DriverPort::Output)
        );
        assert_eq!(Domain::Decode.driver_port(Port::None), None);
        assert_eq!(Domain::Encode.driver_port(Port::Unknown(9)), None);
    }

    #[test]
    fn batching_needs_more_than_one_frame() {
        let mut config = SessionConfig::default();
        assert!(!config.is_batched());
        config.super_frame = 1;
        assert!(!config.is_batched());
        config.super_frame = 4;
        assert!(config.is_batched());
    }
}
