use vidcresp_packet::{BufferFwFlags, PictureType};

use crate::buffer::BufferFlags;
use crate::config::{Codec, SessionConfig};

/// Per-frame facts gathered from the info and property packets of one
/// response. Reset before and after each dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub picture_type: PictureType,
    pub data_corrupt: bool,
    pub no_output: bool,
}

impl FrameInfo {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Flags for a completed input or output buffer.
    pub fn buffer_flags(&self, fw: BufferFwFlags, config: &SessionConfig) -> BufferFlags {
        let mut flags = BufferFlags::empty();
        let pic = self.picture_type;

        if pic.contains(PictureType::IDR) {
            flags |= BufferFlags::KEYFRAME;
        } else if pic.contains(PictureType::P) {
            flags |= BufferFlags::PFRAME;
        } else if pic.contains(PictureType::B) {
            flags |= BufferFlags::BFRAME;
        } else if pic.contains(PictureType::I) {
            if config.codec == Codec::Vp9 {
                flags |= BufferFlags::KEYFRAME;
            }
        } else if pic.intersects(PictureType::CRA | PictureType::BLA) {
            flags |= BufferFlags::KEYFRAME;
        }

        if self.data_corrupt {
            flags |= BufferFlags::ERROR;
        }
        if self.no_output && config.meta_buf_tag && !fw.contains(BufferFwFlags::CODEC_CONFIG) {
            flags |= BufferFlags::ERROR;
        }
        if fw.contains(BufferFwFlags::CODEC_CONFIG) {
            flags |= BufferFlags::CODEC_CONFIG;
        }
        if fw.contains(BufferFwFlags::LAST) {
            flags |= BufferFlags::LAST;
        }
        flags
    }
}
