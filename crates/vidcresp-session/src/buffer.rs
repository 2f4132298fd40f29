//! Driver-side buffer records and the per-kind pools that own them.

use std::collections::HashMap;

use bitflags::bitflags;
use vidcresp_packet::HfiBufferType;

/// Buffers the driver allocates for firmware-private use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalKind {
    Bin,
    Arp,
    Comv,
    NonComv,
    Line,
    Dpb,
    Persist,
}

impl InternalKind {
    pub fn from_hfi(buffer_type: HfiBufferType) -> Option<Self> {
        Some(match buffer_type {
            HfiBufferType::Bin => Self::Bin,
            HfiBufferType::Arp => Self::Arp,
            HfiBufferType::Comv => Self::Comv,
            HfiBufferType::NonComv => Self::NonComv,
            HfiBufferType::Line => Self::Line,
            HfiBufferType::Dpb => Self::Dpb,
            HfiBufferType::Persist => Self::Persist,
            HfiBufferType::Bitstream | HfiBufferType::Raw | HfiBufferType::Metadata => {
                return None
            }
        })
    }
}

/// Which pool a buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Input,
    Output,
    InputMeta,
    OutputMeta,
    Internal(InternalKind),
}

impl BufferKind {
    /// Kinds whose dequeued records are completed back to the client.
    pub const RECONCILE_ORDER: [BufferKind; 4] = [
        BufferKind::InputMeta,
        BufferKind::Input,
        BufferKind::OutputMeta,
        BufferKind::Output,
    ];

    pub fn is_internal(self) -> bool {
        matches!(self, Self::Internal(_))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::InputMeta => "input_meta",
            Self::OutputMeta => "output_meta",
            Self::Internal(InternalKind::Bin) => "bin",
            Self::Internal(InternalKind::Arp) => "arp",
            Self::Internal(InternalKind::Comv) => "comv",
            Self::Internal(InternalKind::NonComv) => "non_comv",
            Self::Internal(InternalKind::Line) => "line",
            Self::Internal(InternalKind::Dpb) => "dpb",
            Self::Internal(InternalKind::Persist) => "persist",
        }
    }

    /// Parse a kind from its [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "input" => Self::Input,
            "output" => Self::Output,
            "input_meta" => Self::InputMeta,
            "output_meta" => Self::OutputMeta,
            "bin" => Self::Internal(InternalKind::Bin),
            "arp" => Self::Internal(InternalKind::Arp),
            "comv" => Self::Internal(InternalKind::Comv),
            "non_comv" => Self::Internal(InternalKind::NonComv),
            "line" => Self::Internal(InternalKind::Line),
            "dpb" => Self::Internal(InternalKind::Dpb),
            "persist" => Self::Internal(InternalKind::Persist),
            _ => return None,
        })
    }
}

bitflags! {
    /// Ownership state of a buffer record.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct BufferAttr: u32 {
        /// Handed to the firmware.
        const QUEUED = 1 << 0;
        /// Returned by the firmware in the current response, not yet completed.
        const DEQUEUED = 1 << 1;
        /// Completion has been delivered to the client.
        const COMPLETED = 1 << 2;
        /// Firmware still references the buffer; keep it mapped.
        const READ_ONLY = 1 << 3;
    }
}

bitflags! {
    /// Frame flags reported to the client with a completed buffer.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        const KEYFRAME = 1 << 0;
        const PFRAME = 1 << 1;
        const BFRAME = 1 << 2;
        const CODEC_CONFIG = 1 << 3;
        const ERROR = 1 << 4;
        const LAST = 1 << 5;
    }
}

/// One driver buffer, keyed by device address within its pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferRecord {
    pub kind: BufferKind,
    pub index: u32,
    pub device_address: u64,
    pub data_offset: u32,
    pub data_size: u32,
    pub timestamp: u64,
    pub attr: BufferAttr,
    pub flags: BufferFlags,
}

impl BufferRecord {
    /// A freshly queued record.
    pub fn queued(kind: BufferKind, device_address: u64, index: u32) -> Self {
        Self {
            kind,
            index,
            device_address,
            data_offset: 0,
            data_size: 0,
            timestamp: 0,
            attr: BufferAttr::QUEUED,
            flags: BufferFlags::empty(),
        }
    }

    /// Move from queued to dequeued.
    pub(crate) fn mark_dequeued(&mut self) {
        self.attr.remove(BufferAttr::QUEUED);
        self.attr.insert(BufferAttr::DEQUEUED);
    }
}

/// Buffer pools of one session.
#[derive(Debug, Default)]
pub struct BufferPools {
    pools: HashMap<BufferKind, Vec<BufferRecord>>,
}

impl BufferPools {
    /// Queue a buffer to the firmware.
    ///
    /// A record already present at the address (a retained read-only buffer)
    /// is re-armed rather than duplicated. Returns true when re-armed.
    pub fn queue(&mut self, kind: BufferKind, device_address: u64, index: u32) -> bool {
        let pool = self.pools.entry(kind).or_default();
        match pool
            .iter_mut()
            .find(|rec| rec.device_address == device_address)
        {
            Some(existing) => {
                existing.index = index;
                existing
                    .attr
                    .remove(BufferAttr::DEQUEUED | BufferAttr::COMPLETED);
                existing.attr.insert(BufferAttr::QUEUED);
                true
            }
            None => {
                pool.push(BufferRecord::queued(kind, device_address, index));
                false
            }
        }
    }

    pub fn get(&self, kind: BufferKind, device_address: u64) -> Option<&BufferRecord> {
        self.pools
            .get(&kind)?
            .iter()
            .find(|rec| rec.device_address == device_address)
    }

    pub(crate) fn get_mut(
        &mut self,
        kind: BufferKind,
        device_address: u64,
    ) -> Option<&mut BufferRecord> {
        self.pools
            .get_mut(&kind)?
            .iter_mut()
            .find(|rec| rec.device_address == device_address)
    }

    pub(crate) fn remove(&mut self, kind: BufferKind, device_address: u64) -> Option<BufferRecord> {
        let pool = self.pools.get_mut(&kind)?;
        let at = pool
            .iter()
            .position(|rec| rec.device_address == device_address)?;
        Some(pool.remove(at))
    }

    pub(crate) fn pool_mut(&mut self, kind: BufferKind) -> Option<&mut Vec<BufferRecord>> {
        self.pools.get_mut(&kind)
    }

    /// Records of one kind, in queue order.
    pub fn records(&self, kind: BufferKind) -> &[BufferRecord] {
        self.pools.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
