use tracing::{debug, error};
use vidcresp_packet::{payload_word, Packet, PictureType, Property};

use crate::config::{Domain, DriverPort};
use crate::error::{ResponseError, Result};
use crate::session::SessionCtx;

impl SessionCtx<'_> {
    /// Apply a session property to the subscription parameters or frame info.
    pub(crate) fn handle_property(&mut self, packet: &Packet<'_>) -> Result<()> {
        let header = &packet.header;
        let code = header.packet_type;
        debug!(session = self.id, property = format_args!("{code:#x}"), "session property");

        let invalid_port = || ResponseError::InvalidPort {
            packet_type: code,
            port: header.port,
        };
        let Some(port) = self.config.domain.driver_port(header.port) else {
            error!(session = self.id, port = header.port.raw(), "invalid port for property");
            return Err(invalid_port());
        };
        let Some(property) = Property::from_code(code) else {
            return Err(ResponseError::InvalidProperty(code));
        };

        let word = |index| payload_word(packet.payload, index, "property");
        let params = &mut self.session.subscription[port.index()];
        match property {
            Property::BitstreamResolution => params.bitstream_resolution = word(0)?,
            Property::CropOffsets => {
                params.crop_offsets = [word(0)?, word(1)?];
            }
            Property::BitDepth => params.bit_depth = word(0)?,
            Property::CodedFrames => params.coded_frames = word(0)?,
            Property::FwMinOutputCount => params.fw_min_count = word(0)?,
            Property::PicOrderCntType => params.pic_order_cnt = word(0)?,
            Property::ColorInfo => params.color_info = word(0)?,
            Property::Profile => params.profile = word(0)?,
            Property::Level => params.level = word(0)?,
            Property::Tier => params.tier = word(0)?,
            Property::PictureType => {
                if self.config.domain == Domain::Encode && port == DriverPort::Input {
                    return Err(invalid_port());
                }
                self.session.frame.picture_type = PictureType::from_bits_retain(word(0)?);
            }
            Property::NoOutput => {
                if port != DriverPort::Input {
                    return Err(invalid_port());
                }
                self.session.frame.no_output = true;
            }
        }
        Ok(())
    }
}
