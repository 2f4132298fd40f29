//! `CMD_BUFFER` handling: routing a returned buffer to its pool, updating the
//! record, and the reconciliation pass that completes dequeued records.

use tracing::{debug, error, warn};
use vidcresp_packet::{
    BufferFwFlags, BufferPayload, HfiBufferType, Packet, PacketFlags, Port, PAYLOAD_NONE,
};

use crate::buffer::{BufferAttr, BufferFlags, BufferKind, BufferRecord, InternalKind};
use crate::config::Domain;
use crate::error::{ResponseError, Result};
use crate::session::SessionCtx;

/// Resolve the pool a returned buffer belongs to.
///
/// Returns `None` for combinations the firmware has no business sending.
pub fn route(domain: Domain, port: Port, buffer_type: HfiBufferType) -> Option<BufferKind> {
    use HfiBufferType as T;

    let internal = |ty| InternalKind::from_hfi(ty).map(BufferKind::Internal);
    match (domain, port, buffer_type) {
        (_, Port::None, T::Arp | T::Persist) => internal(buffer_type),

        (Domain::Encode, Port::Bitstream, T::Metadata) => Some(BufferKind::OutputMeta),
        (Domain::Encode, Port::Bitstream, T::Bitstream) => Some(BufferKind::Output),
        (
            Domain::Encode,
            Port::Bitstream,
            T::Bin | T::Comv | T::NonComv | T::Line | T::Arp | T::Dpb,
        ) => internal(buffer_type),
        (Domain::Encode, Port::Raw, T::Metadata) => Some(BufferKind::InputMeta),
        (Domain::Encode, Port::Raw, T::Raw) => Some(BufferKind::Input),

        (Domain::Decode, Port::Bitstream, T::Metadata) => Some(BufferKind::InputMeta),
        (Domain::Decode, Port::Bitstream, T::Bitstream) => Some(BufferKind::Input),
        (
            Domain::Decode,
            Port::Bitstream,
            T::Bin | T::Comv | T::NonComv | T::Line | T::Persist,
        ) => internal(buffer_type),
        (Domain::Decode, Port::Raw, T::Metadata) => Some(BufferKind::OutputMeta),
        (Domain::Decode, Port::Raw, T::Raw) => Some(BufferKind::Output),
        (Domain::Decode, Port::Raw, T::Dpb) => internal(buffer_type),

        _ => None,
    }
}

fn port_allowed(port: Port, buffer_type: HfiBufferType) -> bool {
    match port {
        Port::Bitstream | Port::Raw => true,
        Port::None => matches!(buffer_type, HfiBufferType::Arp | HfiBufferType::Persist),
        Port::Unknown(_) => false,
    }
}

impl SessionCtx<'_> {
    pub(crate) fn handle_buffer(&mut self, packet: &Packet<'_>) -> Result<()> {
        let header = &packet.header;
        if header.flags.contains(PacketFlags::SESSION_ERROR) {
            error!(session = self.id, "session error on buffer");
            self.fail("session error on buffer");
            return Ok(());
        }
        if header.payload_info == PAYLOAD_NONE {
            debug!(session = self.id, "buffer packet without payload");
            return Ok(());
        }

        let mut buffer = BufferPayload::decode(packet.payload)?;
        let Some(buffer_type) = buffer.hfi_type() else {
            error!(session = self.id, buffer_type = buffer.buffer_type, "invalid buffer type");
            self.fail("invalid buffer type");
            return Ok(());
        };
        if !port_allowed(header.port, buffer_type) {
            error!(
                session = self.id,
                port = header.port.raw(),
                ?buffer_type,
                "invalid port for buffer"
            );
            self.fail("invalid buffer port");
            return Ok(());
        }

        let Some(kind) = route(self.config.domain, header.port, buffer_type) else {
            warn!(
                session = self.id,
                port = header.port.name(),
                ?buffer_type,
                "no pool for returned buffer"
            );
            return Ok(());
        };

        match kind {
            BufferKind::Input => self.input_done(&buffer),
            BufferKind::InputMeta => self.input_meta_done(&buffer),
            BufferKind::Output => self.output_done(&mut buffer),
            BufferKind::OutputMeta => self.output_meta_done(&buffer),
            BufferKind::Internal(_) => self.internal_done(kind, &buffer),
        }
    }

    fn batch_geometry(&self, kind: BufferKind) -> Option<BatchGeometry> {
        self.config.is_batched().then(|| BatchGeometry {
            frame_size: self.ops.frame_size(self.id, kind),
            batch_size: self.config.super_frame,
        })
    }

    fn input_done(&mut self, buffer: &BufferPayload) -> Result<()> {
        let kind = BufferKind::Input;
        let id = self.id;
        let geometry = self.batch_geometry(kind);
        let flags = self.session.frame.buffer_flags(buffer.flags, self.config);
        let rec = self.find(kind, buffer)?;
        if !is_final_sub_frame(id, geometry, buffer)? {
            return Ok(());
        }
        rec.data_offset = buffer.data_offset;
        rec.data_size = buffer.data_size;
        rec.mark_dequeued();
        rec.flags = flags;
        Ok(())
    }

    fn input_meta_done(&mut self, buffer: &BufferPayload) -> Result<()> {
        let kind = BufferKind::InputMeta;
        let id = self.id;
        let geometry = self.batch_geometry(kind);
        let rec = self.find(kind, buffer)?;
        if !is_final_sub_frame(id, geometry, buffer)? {
            return Ok(());
        }
        rec.data_size = buffer.data_size;
        rec.mark_dequeued();
        rec.flags = last_only(buffer.flags);
        Ok(())
    }

    fn output_done(&mut self, buffer: &mut BufferPayload) -> Result<()> {
        let kind = BufferKind::Output;

        // The last buffer carries no frame and is never kept by the firmware.
        if buffer.flags.contains(BufferFwFlags::LAST) {
            if buffer.data_size != 0 {
                warn!(
                    session = self.id,
                    size = buffer.data_size,
                    "clearing data size on last buffer"
                );
                buffer.data_size = 0;
            }
            if buffer.flags.contains(BufferFwFlags::READONLY) {
                warn!(session = self.id, "clearing read-only on last buffer");
                buffer.flags.remove(BufferFwFlags::READONLY);
            }
        }

        let corrupt = self.config.domain == Domain::Encode && self.session.frame.data_corrupt;
        let flags = self.session.frame.buffer_flags(buffer.flags, self.config);
        let rec = self.find(kind, buffer)?;
        rec.data_offset = buffer.data_offset;
        rec.data_size = buffer.data_size;
        rec.timestamp = buffer.timestamp;
        rec.mark_dequeued();
        rec.attr.set(
            BufferAttr::READ_ONLY,
            buffer.flags.contains(BufferFwFlags::READONLY),
        );
        rec.flags = flags;

        if corrupt {
            error!(session = self.id, "encoder output is corrupt");
            self.fail("corrupt encoder output");
        }
        Ok(())
    }

    fn output_meta_done(&mut self, buffer: &BufferPayload) -> Result<()> {
        let rec = self.find(BufferKind::OutputMeta, buffer)?;
        rec.data_size = buffer.data_size;
        rec.mark_dequeued();
        rec.flags = last_only(buffer.flags);
        Ok(())
    }

    fn internal_done(&mut self, kind: BufferKind, buffer: &BufferPayload) -> Result<()> {
        let Some(rec) = self.session.buffers.remove(kind, buffer.base_address) else {
            return Err(not_found(self.id, kind, buffer));
        };
        debug!(
            session = self.id,
            kind = kind.name(),
            addr = format_args!("{:#x}", rec.device_address),
            "internal buffer returned"
        );
        self.ops.destroy_internal_buffer(self.id, &rec)
    }

    fn find(&mut self, kind: BufferKind, buffer: &BufferPayload) -> Result<&mut BufferRecord> {
        let id = self.id;
        self.session
            .buffers
            .get_mut(kind, buffer.base_address)
            .ok_or_else(|| not_found(id, kind, buffer))
    }

    /// Complete every dequeued client buffer.
    ///
    /// A buffer returned twice is completed once. Read-only buffers stay in
    /// their pool because the firmware still references them.
    pub(crate) fn reconcile_buffers(&mut self) {
        let id = self.id;
        let ops = self.ops;
        for kind in BufferKind::RECONCILE_ORDER {
            let Some(pool) = self.session.buffers.pool_mut(kind) else {
                continue;
            };
            pool.retain_mut(|rec| {
                if !rec.attr.contains(BufferAttr::DEQUEUED) {
                    return true;
                }
                rec.attr.remove(BufferAttr::DEQUEUED);
                if rec.attr.contains(BufferAttr::COMPLETED) {
                    debug!(
                        session = id,
                        kind = kind.name(),
                        addr = format_args!("{:#x}", rec.device_address),
                        "buffer already completed"
                    );
                } else {
                    rec.attr.insert(BufferAttr::COMPLETED);
                    ops.buffer_done(id, rec);
                }

                if rec.attr.contains(BufferAttr::READ_ONLY) {
                    return true;
                }
                ops.release_buffer(id, rec);
                false
            });
        }
    }
}

fn not_found(session: u32, kind: BufferKind, buffer: &BufferPayload) -> ResponseError {
    error!(
        session,
        kind = kind.name(),
        index = buffer.index,
        addr = format_args!("{:#x}", buffer.base_address),
        "returned buffer not found"
    );
    ResponseError::BufferNotFound {
        kind,
        address: buffer.base_address,
    }
}

/// Sub-frame layout of a batched input buffer.
#[derive(Debug, Clone, Copy)]
struct BatchGeometry {
    frame_size: u32,
    batch_size: u32,
}

/// Batched input is returned one sub-frame at a time; only the last
/// sub-frame of the batch releases the buffer. Unbatched input is always
/// final.
fn is_final_sub_frame(
    session: u32,
    geometry: Option<BatchGeometry>,
    buffer: &BufferPayload,
) -> Result<bool> {
    let Some(BatchGeometry {
        frame_size,
        batch_size,
    }) = geometry
    else {
        return Ok(true);
    };
    if frame_size == 0 || batch_size == 0 {
        error!(session, frame_size, batch_size, "invalid batch geometry");
        return Err(ResponseError::InvalidBatchGeometry {
            frame_size,
            batch_size,
        });
    }
    if buffer.addr_offset / frame_size < batch_size - 1 {
        debug!(
            session,
            offset = buffer.addr_offset,
            frame_size,
            batch_size,
            "batch not complete"
        );
        return Ok(false);
    }
    Ok(true)
}

fn last_only(fw: BufferFwFlags) -> BufferFlags {
    if fw.contains(BufferFwFlags::LAST) {
        BufferFlags::LAST
    } else {
        BufferFlags::empty()
    }
}
