//! The session response pipeline.
//!
//! Packets are handled category-major: every session error in the response
//! first, then every info packet, then properties, then commands. Within a
//! category packets keep their wire order. This lets a command observe the
//! errors, frame info and properties that arrived alongside it no matter
//! where the firmware placed them.

use tracing::{debug, error, info, warn};
use vidcresp_packet::{
    packet_type_name, session_error_reason, Category, Command, Packet, PacketClass, PacketFlags,
    Port, ResponseBatch, CMD_BUFFER, CMD_SETTINGS_CHANGE, INFO_DATA_CORRUPT, INFO_UNSUPPORTED,
    SESSION_DISPATCH_ORDER,
};

use crate::config::DriverPort;
use crate::error::{ResponseError, Result};
use crate::ops::SessionSignal;
use crate::session::{InstanceState, SessionCtx};

/// Whether the response is handled on arrival or replayed from the
/// deferred queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PipelineMode {
    Direct,
    /// Replay rejects any packet dispatched after a settings change.
    Replay,
}

/// Run the pipeline over a validated response. Returns the number of packets
/// dispatched.
pub(crate) fn run(
    ctx: &mut SessionCtx<'_>,
    batch: &ResponseBatch<'_>,
    mode: PipelineMode,
) -> Result<usize> {
    let classes = classify(ctx, batch)?;

    ctx.session.frame.reset();
    let result = dispatch_categories(ctx, batch, &classes, mode);
    ctx.session.frame.reset();
    result
}

/// Classify every packet up front so that an unhandled type aborts the
/// response before any handler runs.
fn classify(ctx: &mut SessionCtx<'_>, batch: &ResponseBatch<'_>) -> Result<Vec<PacketClass>> {
    let mut classes = Vec::with_capacity(batch.len());
    for packet in batch.packets() {
        let class = PacketClass::of_session(packet.header.packet_type);
        let supported = match class {
            PacketClass::Unknown(_) => false,
            PacketClass::Command(code) => matches!(
                Command::from_code(code),
                Some(command) if !matches!(command, Command::Init | Command::PowerCollapse)
            ),
            _ => true,
        };
        if !supported {
            warn!(
                session = ctx.id,
                packet_type = format_args!("{:#x}", class.code()),
                index = packet.index,
                "unhandled packet type in session response"
            );
            ctx.fail("unhandled packet type");
            return Err(ResponseError::UnknownType(class.code()));
        }
        classes.push(class);
    }
    Ok(classes)
}

fn dispatch_categories(
    ctx: &mut SessionCtx<'_>,
    batch: &ResponseBatch<'_>,
    classes: &[PacketClass],
    mode: PipelineMode,
) -> Result<usize> {
    let mut last_type = None;
    let mut saw_buffer = false;
    let mut dispatched = 0;

    for category in SESSION_DISPATCH_ORDER {
        for (packet, class) in batch.packets().zip(classes) {
            if class.category() != Some(category) {
                continue;
            }
            let packet_type = packet.header.packet_type;
            if mode == PipelineMode::Replay && last_type == Some(CMD_SETTINGS_CHANGE) {
                error!(
                    session = ctx.id,
                    packet_type = format_args!("{packet_type:#x}"),
                    "packet after port settings change"
                );
                return Err(ResponseError::UnexpectedAfterSettingsChange(packet_type));
            }
            last_type = Some(packet_type);

            match category {
                Category::SessionError => handle_session_error(ctx, &packet),
                Category::Info => handle_info(ctx, &packet),
                Category::Property => ctx.handle_property(&packet)?,
                Category::Command => {
                    saw_buffer |= packet_type == CMD_BUFFER;
                    handle_command(ctx, &packet)?;
                }
            }
            dispatched += 1;
        }
    }

    if saw_buffer {
        ctx.reconcile_buffers();
    }
    Ok(dispatched)
}

fn handle_session_error(ctx: &mut SessionCtx<'_>, packet: &Packet<'_>) {
    let code = packet.header.packet_type;
    error!(
        session = ctx.id,
        packet_type = format_args!("{code:#x}"),
        reason = session_error_reason(code),
        "session error"
    );
    ctx.fail(session_error_reason(code));
}

fn handle_info(ctx: &mut SessionCtx<'_>, packet: &Packet<'_>) {
    let code = packet.header.packet_type;
    let info = match code {
        INFO_UNSUPPORTED => "unsupported",
        INFO_DATA_CORRUPT => {
            ctx.session.frame.data_corrupt = true;
            "data corrupt"
        }
        _ => "unknown",
    };
    warn!(session = ctx.id, packet_type = format_args!("{code:#x}"), info, "session info");
}

fn handle_command(ctx: &mut SessionCtx<'_>, packet: &Packet<'_>) -> Result<()> {
    let header = &packet.header;
    // Classification already rejected everything else.
    let Some(command) = Command::from_code(header.packet_type) else {
        return Err(ResponseError::UnknownType(header.packet_type));
    };

    match command {
        Command::Buffer => ctx.handle_buffer(packet),
        Command::SettingsChange => handle_settings_change(ctx, packet),
        Command::Close => {
            acknowledge(ctx, packet);
            ctx.set_state(InstanceState::Closing);
            ctx.ops.signal(ctx.id, SessionSignal::Close);
            Ok(())
        }
        Command::Stop => {
            acknowledge(ctx, packet);
            let signal = match ctx.config.domain.driver_port(header.port) {
                Some(DriverPort::Input) => SessionSignal::StopInput,
                Some(DriverPort::Output) => SessionSignal::StopOutput,
                None => {
                    return Err(ResponseError::InvalidPort {
                        packet_type: header.packet_type,
                        port: header.port,
                    })
                }
            };
            ctx.ops.signal(ctx.id, signal);
            Ok(())
        }
        Command::Start => {
            if acknowledge(ctx, packet) {
                ctx.set_state(InstanceState::Active);
            }
            Ok(())
        }
        Command::Open
        | Command::Drain
        | Command::Resume
        | Command::SubscribeMode
        | Command::DeliveryMode => {
            acknowledge(ctx, packet);
            Ok(())
        }
        Command::Init | Command::PowerCollapse => {
            Err(ResponseError::UnknownType(header.packet_type))
        }
    }
}

/// Common flag handling for acknowledgement packets. Returns true when the
/// firmware reported success without a session error.
fn acknowledge(ctx: &mut SessionCtx<'_>, packet: &Packet<'_>) -> bool {
    let header = &packet.header;
    let name = packet_type_name(header.packet_type);
    if header.flags.contains(PacketFlags::SESSION_ERROR) {
        error!(session = ctx.id, command = name, "session error on command");
        ctx.fail("session error on command");
        return false;
    }
    if header.flags.contains(PacketFlags::SUCCESS) {
        info!(session = ctx.id, command = name, port = header.port.name(), "command successful");
        return true;
    }
    debug!(session = ctx.id, command = name, flags = header.flags.bits(), "command acknowledged");
    false
}

fn handle_settings_change(ctx: &mut SessionCtx<'_>, packet: &Packet<'_>) -> Result<()> {
    let header = &packet.header;
    match header.port {
        Port::Raw => {
            let params = ctx.session.subscription[DriverPort::Output.index()];
            info!(session = ctx.id, ?params, "output port settings change");
            ctx.ops.output_port_settings_change(ctx.id, &params)
        }
        Port::Bitstream => {
            let params = ctx.session.subscription[DriverPort::Input.index()];
            info!(session = ctx.id, ?params, "input port settings change");
            ctx.ops.input_port_settings_change(ctx.id, &params)
        }
        port => Err(ResponseError::InvalidPort {
            packet_type: header.packet_type,
            port,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use vidcresp_packet::{
        PacketHeader, ResponseBuilder, CMD_CLOSE, CMD_INIT, CMD_OPEN, CMD_START, CMD_STOP,
        ERROR_FATAL, PROP_PICTURE_TYPE,
    };

    use super::*;
    use crate::config::SessionConfig;
    use crate::ops::SessionOps;
    use crate::session::SessionInstance;

    #[derive(Default)]
    struct Signals(Mutex<Vec<SessionSignal>>);

    impl SessionOps for Signals {
        fn signal(&self, _session: u32, signal: SessionSignal) {
            self.0.lock().expect("signals lock").push(signal);
        }
    }

    fn run_on(inst: &SessionInstance, raw: &[u8]) -> Result<usize> {
        let batch = ResponseBatch::parse(raw).expect("batch should parse");
        match inst.handle(&batch)? {
            crate::session::Disposition::Dispatched(n) => Ok(n),
            other => panic!("unexpected disposition {other:?}"),
        }
    }

    #[test]
    fn error_category_runs_before_commands() {
        let inst = SessionInstance::new(3, SessionConfig::default(), Arc::new(Signals::default()));
        // Start first in wire order; the error must still win.
        let raw = ResponseBuilder::new(3)
            .packet(PacketHeader::new(CMD_START).with_flags(PacketFlags::SUCCESS), &[])
            .packet(PacketHeader::new(ERROR_FATAL), &[])
            .build();
        assert_eq!(run_on(&inst, &raw).expect("dispatch should succeed"), 2);
        assert_eq!(inst.state(), InstanceState::Error);
    }

    #[test]
    fn start_success_activates_session() {
        let inst = SessionInstance::new(3, SessionConfig::default(), Arc::new(Signals::default()));
        let raw = ResponseBuilder::new(3)
            .packet(PacketHeader::new(CMD_OPEN).with_flags(PacketFlags::SUCCESS), &[])
            .packet(PacketHeader::new(CMD_START).with_flags(PacketFlags::SUCCESS), &[])
            .build();
        run_on(&inst, &raw).expect("dispatch should succeed");
        assert_eq!(inst.state(), InstanceState::Active);
    }

    #[test]
    fn stop_signals_by_domain_and_port() {
        let ops = Arc::new(Signals::default());
        let inst = SessionInstance::new(3, SessionConfig::default(), ops.clone());
        let raw = ResponseBuilder::new(3)
            .packet(PacketHeader::new(CMD_STOP).with_port(Port::Raw), &[])
            .packet(PacketHeader::new(CMD_STOP).with_port(Port::Bitstream), &[])
            .packet(PacketHeader::new(CMD_CLOSE), &[])
            .build();
        run_on(&inst, &raw).expect("dispatch should succeed");
        assert_eq!(
            *ops.0.lock().expect("signals lock"),
            vec![
                SessionSignal::StopOutput,
                SessionSignal::StopInput,
                SessionSignal::Close
            ]
        );
        assert_eq!(inst.state(), InstanceState::Closing);
    }

    #[test]
    fn stop_without_port_is_invalid() {
        let inst = SessionInstance::new(3, SessionConfig::default(), Arc::new(Signals::default()));
        let raw = ResponseBuilder::new(3)
            .packet(PacketHeader::new(CMD_STOP), &[])
            .build();
        let err = run_on(&inst, &raw).unwrap_err();
        assert!(matches!(err, ResponseError::InvalidPort { port: Port::None, .. }));
    }

    #[test]
    fn unknown_type_fails_before_any_handler() {
        let inst = SessionInstance::new(3, SessionConfig::default(), Arc::new(Signals::default()));
        let raw = ResponseBuilder::new(3)
            .words(PacketHeader::new(PROP_PICTURE_TYPE).with_port(Port::Raw), &[1])
            .packet(PacketHeader::new(0x0900_0001), &[])
            .build();
        let err = run_on(&inst, &raw).unwrap_err();
        assert!(matches!(err, ResponseError::UnknownType(0x0900_0001)));
        assert_eq!(inst.state(), InstanceState::Error);
    }

    #[test]
    fn system_command_at_session_scope_is_unsupported() {
        let inst = SessionInstance::new(3, SessionConfig::default(), Arc::new(Signals::default()));
        let raw = ResponseBuilder::new(3)
            .packet(PacketHeader::new(CMD_INIT), &[])
            .build();
        let err = run_on(&inst, &raw).unwrap_err();
        assert!(matches!(err, ResponseError::UnknownType(CMD_INIT)));
    }

    #[test]
    fn frame_info_is_cleared_after_dispatch() {
        let inst = SessionInstance::new(3, SessionConfig::default(), Arc::new(Signals::default()));
        let raw = ResponseBuilder::new(3)
            .packet(PacketHeader::new(INFO_DATA_CORRUPT), &[])
            .build();
        run_on(&inst, &raw).expect("dispatch should succeed");
        assert!(!inst.frame_info().data_corrupt);
    }
}
