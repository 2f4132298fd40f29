/// Port parameters the firmware reports ahead of a port settings change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriptionParams {
    /// Width in the upper 16 bits, height in the lower.
    pub bitstream_resolution: u32,
    pub crop_offsets: [u32; 2],
    pub bit_depth: u32,
    pub coded_frames: u32,
    pub fw_min_count: u32,
    pub pic_order_cnt: u32,
    pub color_info: u32,
    pub profile: u32,
    pub level: u32,
    pub tier: u32,
}

impl SubscriptionParams {
    pub fn width(&self) -> u32 {
        self.bitstream_resolution >> 16
    }

    pub fn height(&self) -> u32 {
        self.bitstream_resolution & 0xFFFF
    }
}
