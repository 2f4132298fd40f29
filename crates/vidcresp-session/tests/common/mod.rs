#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use vidcresp_packet::{
    BufferFwFlags, BufferPayload, HfiBufferType, PacketFlags, PacketHeader, Port, ResponseBuilder,
    CMD_BUFFER, PAYLOAD_STRUCTURE,
};
use vidcresp_session::{
    Admission, BufferKind, BufferRecord, InstanceState, Result, SessionOps, SessionSignal,
    SubscriptionParams, WorkKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Done(BufferRecord),
    Released(BufferKind, u64),
    Destroyed(BufferKind, u64),
    Signal(SessionSignal),
    State(InstanceState),
    Admit(WorkKind),
    InitInput,
    InputPsc(SubscriptionParams),
    OutputPsc(SubscriptionParams),
    InputPscDone,
    LastFlagDone,
}

/// Collaborator double that records every hook call.
pub struct Recorder {
    events: Mutex<Vec<Event>>,
    admission: Mutex<Admission>,
    frame_size: u32,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Self::with_frame_size(0)
    }

    pub fn with_frame_size(frame_size: u32) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            admission: Mutex::new(Admission::Allow),
            frame_size,
        })
    }

    pub fn set_admission(&self, admission: Admission) {
        *self.admission.lock().expect("admission lock") = admission;
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("events lock").clone()
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().expect("events lock"))
    }

    pub fn completions(&self) -> Vec<BufferRecord> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Done(rec) => Some(rec),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl SessionOps for Recorder {
    fn frame_size(&self, _session: u32, _kind: BufferKind) -> u32 {
        self.frame_size
    }

    fn buffer_done(&self, _session: u32, buffer: &BufferRecord) {
        self.push(Event::Done(buffer.clone()));
    }

    fn release_buffer(&self, _session: u32, buffer: &BufferRecord) {
        self.push(Event::Released(buffer.kind, buffer.device_address));
    }

    fn destroy_internal_buffer(&self, _session: u32, buffer: &BufferRecord) -> Result<()> {
        self.push(Event::Destroyed(buffer.kind, buffer.device_address));
        Ok(())
    }

    fn signal(&self, _session: u32, signal: SessionSignal) {
        self.push(Event::Signal(signal));
    }

    fn state_changed(&self, _session: u32, _from: InstanceState, to: InstanceState) {
        self.push(Event::State(to));
    }

    fn input_port_settings_change(&self, _session: u32, params: &SubscriptionParams) -> Result<()> {
        self.push(Event::InputPsc(*params));
        Ok(())
    }

    fn output_port_settings_change(
        &self,
        _session: u32,
        params: &SubscriptionParams,
    ) -> Result<()> {
        self.push(Event::OutputPsc(*params));
        Ok(())
    }

    fn init_input_subscription(&self, _session: u32, _params: &mut SubscriptionParams) {
        self.push(Event::InitInput);
    }

    fn admit(&self, _session: u32, kind: WorkKind) -> Admission {
        self.push(Event::Admit(kind));
        *self.admission.lock().expect("admission lock")
    }

    fn complete_input_settings_change(&self, _session: u32) -> Result<()> {
        self.push(Event::InputPscDone);
        Ok(())
    }

    fn complete_last_flag(&self, _session: u32) -> Result<()> {
        self.push(Event::LastFlagDone);
        Ok(())
    }
}

pub fn descriptor(buffer_type: HfiBufferType, base_address: u64) -> BufferPayload {
    BufferPayload {
        buffer_type: buffer_type.raw(),
        base_address,
        ..BufferPayload::default()
    }
}

/// Append a `CMD_BUFFER` packet carrying `buffer`.
pub fn with_buffer(builder: ResponseBuilder, port: Port, buffer: &BufferPayload) -> ResponseBuilder {
    builder.packet(
        PacketHeader::new(CMD_BUFFER)
            .with_port(port)
            .with_flags(PacketFlags::SUCCESS)
            .with_payload_info(PAYLOAD_STRUCTURE),
        &buffer.to_bytes(),
    )
}

/// A response with a single returned buffer.
pub fn buffer_response(session: u32, port: Port, buffer: &BufferPayload) -> Bytes {
    with_buffer(ResponseBuilder::new(session), port, buffer).build()
}

pub fn last_flag(buffer: BufferPayload) -> BufferPayload {
    BufferPayload {
        flags: buffer.flags | BufferFwFlags::LAST,
        ..buffer
    }
}
