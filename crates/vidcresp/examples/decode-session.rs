//! Drive a decode session through one returned output buffer and an
//! end-of-stream buffer that goes through the deferred queue.
//!
//! Run with:
//!   cargo run --example decode-session

use std::sync::Arc;

use vidcresp::packet::{
    BufferFwFlags, BufferPayload, HfiBufferType, PacketFlags, PacketHeader, Port, CMD_BUFFER,
    PAYLOAD_STRUCTURE,
};
use vidcresp::session::{BufferRecord, Codec, ManualScheduler};
use vidcresp::{BufferKind, ResponseBuilder, SessionConfig, SessionOps, VidcCore};

struct Printer;

impl SessionOps for Printer {
    fn buffer_done(&self, session: u32, buffer: &BufferRecord) {
        println!(
            "session {session:#x}: {} {:#x} done, {} bytes, flags {:?}",
            buffer.kind.name(),
            buffer.device_address,
            buffer.data_size,
            buffer.flags
        );
    }

    fn complete_last_flag(&self, session: u32) -> vidcresp::session::Result<()> {
        println!("session {session:#x}: end of stream");
        Ok(())
    }
}

fn output_buffer(session: u32, address: u64, flags: BufferFwFlags) -> Vec<u8> {
    let payload = BufferPayload {
        buffer_type: HfiBufferType::Raw.raw(),
        base_address: address,
        data_size: 4096,
        flags,
        ..BufferPayload::default()
    };
    ResponseBuilder::new(session)
        .packet(
            PacketHeader::new(CMD_BUFFER)
                .with_port(Port::Raw)
                .with_flags(PacketFlags::SUCCESS)
                .with_payload_info(PAYLOAD_STRUCTURE),
            &payload.to_bytes(),
        )
        .build()
        .to_vec()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let scheduler = Arc::new(ManualScheduler::new());
    let core = VidcCore::default().with_scheduler(scheduler.clone());
    let session = core.open_session(0x10, SessionConfig::decoder(Codec::Hevc), Arc::new(Printer))?;

    session.queue_buffer(BufferKind::Output, 0x1000, 0);
    session.queue_buffer(BufferKind::Output, 0x2000, 1);

    let outcome = core.handle_response(&output_buffer(0x10, 0x1000, BufferFwFlags::empty()))?;
    println!("{outcome:?}");

    let outcome = core.handle_response(&output_buffer(0x10, 0x2000, BufferFwFlags::LAST))?;
    println!("{outcome:?}");

    for report in core.run_scheduled(&scheduler) {
        println!("{report:?}");
    }
    Ok(())
}
