//! Responses that must not be handled on the response path.
//!
//! Port settings changes and end-of-stream buffers need the session's state
//! machine to agree first. Such a response is copied whole into the session's
//! FIFO and replayed later by the scheduler, in arrival order.

use std::collections::VecDeque;

use bytes::Bytes;
use tracing::{debug, info, warn};
use vidcresp_packet::{
    BufferFwFlags, BufferPayload, Port, ResponseBatch, CMD_BUFFER, CMD_SETTINGS_CHANGE,
};

use crate::config::DriverPort;
use crate::dispatch::{self, PipelineMode};
use crate::error::{ResponseError, Result};
use crate::ops::Admission;
use crate::session::SessionCtx;
use crate::subscription::SubscriptionParams;

/// Why a response was deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    InputPortSettingsChange,
    OutputPortSettingsChange,
    LastFlag,
}

impl WorkKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::InputPortSettingsChange => "input_psc",
            Self::OutputPortSettingsChange => "output_psc",
            Self::LastFlag => "last_flag",
        }
    }
}

/// One deferred response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredWorkItem {
    pub kind: WorkKind,
    /// Owned copy of the whole response.
    pub snapshot: Bytes,
    pub enqueue_order: u64,
}

#[derive(Debug, Default)]
pub(crate) struct DeferredQueue {
    items: VecDeque<DeferredWorkItem>,
    next_order: u64,
}

impl DeferredQueue {
    pub(crate) fn push(&mut self, kind: WorkKind, response: &[u8]) -> u64 {
        let enqueue_order = self.next_order;
        self.next_order += 1;
        self.items.push_back(DeferredWorkItem {
            kind,
            snapshot: Bytes::copy_from_slice(response),
            enqueue_order,
        });
        enqueue_order
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn items(&self) -> Vec<DeferredWorkItem> {
        self.items.iter().cloned().collect()
    }

    pub(crate) fn kinds(&self) -> Vec<WorkKind> {
        self.items.iter().map(|item| item.kind).collect()
    }
}

/// Decide whether a session response must be deferred.
///
/// The first settings-change packet, or raw-port buffer carrying the last
/// flag, in wire order decides the kind.
pub(crate) fn deferral_kind(batch: &ResponseBatch<'_>) -> Result<Option<WorkKind>> {
    for packet in batch.packets() {
        let header = packet.header;
        match header.packet_type {
            CMD_SETTINGS_CHANGE => {
                return match header.port {
                    Port::Bitstream => Ok(Some(WorkKind::InputPortSettingsChange)),
                    Port::Raw => Ok(Some(WorkKind::OutputPortSettingsChange)),
                    port => Err(ResponseError::InvalidPort {
                        packet_type: header.packet_type,
                        port,
                    }),
                };
            }
            CMD_BUFFER if header.port == Port::Raw => {
                let last = BufferPayload::decode(packet.payload)
                    .is_ok_and(|buffer| buffer.flags.contains(BufferFwFlags::LAST));
                if last {
                    return Ok(Some(WorkKind::LastFlag));
                }
            }
            _ => {}
        }
    }
    Ok(None)
}

/// Outcome of one drain of a session's deferred queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    pub session_id: u32,
    /// Items replayed successfully.
    pub completed: usize,
    /// Items replayed that failed and put the session in error.
    pub failed: usize,
    /// Items refused by admission.
    pub dropped: usize,
    /// Items discarded because the session was already in error.
    pub cleared: usize,
    /// Items still queued, blocked behind a deferred head.
    pub remaining: usize,
}

/// Drain from the head until the queue empties or admission defers.
pub(crate) fn drain(ctx: &mut SessionCtx<'_>) -> DrainReport {
    let mut report = DrainReport {
        session_id: ctx.id,
        ..DrainReport::default()
    };

    loop {
        if ctx.is_error() {
            report.cleared += ctx.session.deferred.items.len();
            if report.cleared > 0 {
                warn!(session = ctx.id, cleared = report.cleared, "discarding deferred work");
            }
            ctx.session.deferred.items.clear();
            break;
        }

        let Some(kind) = ctx.session.deferred.items.front().map(|item| item.kind) else {
            break;
        };

        match ctx.ops.admit(ctx.id, kind) {
            Admission::Defer => {
                debug!(session = ctx.id, kind = kind.name(), "deferred work not admitted yet");
                break;
            }
            Admission::Disallow => {
                ctx.session.deferred.items.pop_front();
                report.dropped += 1;
                ctx.fail("deferred work disallowed");
            }
            Admission::Allow => {
                let Some(item) = ctx.session.deferred.items.pop_front() else {
                    break;
                };
                match replay(ctx, &item) {
                    Ok(()) => {
                        info!(
                            session = ctx.id,
                            kind = kind.name(),
                            order = item.enqueue_order,
                            "deferred work done"
                        );
                        report.completed += 1;
                    }
                    Err(err) => {
                        warn!(session = ctx.id, kind = kind.name(), %err, "deferred work failed");
                        report.failed += 1;
                        ctx.fail("deferred work failed");
                    }
                }
            }
        }
    }

    report.remaining = ctx.session.deferred.len();
    report
}

fn replay(ctx: &mut SessionCtx<'_>, item: &DeferredWorkItem) -> Result<()> {
    let batch = ResponseBatch::parse(&item.snapshot)?;

    if item.kind == WorkKind::InputPortSettingsChange {
        let mut params = SubscriptionParams::default();
        ctx.ops.init_input_subscription(ctx.id, &mut params);
        ctx.session.subscription[DriverPort::Input.index()] = params;
    }

    dispatch::run(ctx, &batch, PipelineMode::Replay)?;

    match item.kind {
        WorkKind::InputPortSettingsChange => ctx.ops.complete_input_settings_change(ctx.id),
        WorkKind::OutputPortSettingsChange => Ok(()),
        WorkKind::LastFlag => {
            if ctx.ops.allow_last_flag(ctx.id) {
                ctx.ops.complete_last_flag(ctx.id)
            } else {
                Ok(())
            }
        }
    }
}
