use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};
use vidcresp_session::{
    Admission, BufferAttr, BufferFlags, BufferKind, BufferRecord, CoreConfig, DrainReport,
    InstanceState, ManualScheduler, Outcome, Result as SessionResult, SessionConfig, SessionOps,
    SessionSignal, SubscriptionParams, VidcCore, WorkKind,
};

use crate::cmd::ReplayArgs;
use crate::exit::{io_error, response_code, response_error, CliResult, SUCCESS};
use crate::output::{hex, print_json, table, OutputFormat};

/// A collaborator call observed during the replay.
#[derive(Debug, Clone, Serialize)]
struct Notification {
    event: &'static str,
    detail: String,
}

/// Session collaborator that records every hook and answers admission with
/// a fixed verdict.
struct ReplayOps {
    events: Mutex<Vec<Notification>>,
    admission: Admission,
    frame_size: u32,
}

impl ReplayOps {
    fn record(&self, event: &'static str, detail: String) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notification { event, detail });
    }

    fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl SessionOps for ReplayOps {
    fn frame_size(&self, _session: u32, _kind: BufferKind) -> u32 {
        self.frame_size
    }

    fn buffer_done(&self, _session: u32, buffer: &BufferRecord) {
        self.record(
            "buffer_done",
            format!(
                "{} {} size={} flags={}",
                buffer.kind.name(),
                hex(buffer.device_address),
                buffer.data_size,
                buffer_flags(buffer.flags)
            ),
        );
    }

    fn release_buffer(&self, _session: u32, buffer: &BufferRecord) {
        self.record(
            "buffer_released",
            format!("{} {}", buffer.kind.name(), hex(buffer.device_address)),
        );
    }

    fn destroy_internal_buffer(&self, _session: u32, buffer: &BufferRecord) -> SessionResult<()> {
        self.record(
            "internal_destroyed",
            format!("{} {}", buffer.kind.name(), hex(buffer.device_address)),
        );
        Ok(())
    }

    fn signal(&self, _session: u32, signal: SessionSignal) {
        let name = match signal {
            SessionSignal::Close => "close",
            SessionSignal::StopInput => "stop_input",
            SessionSignal::StopOutput => "stop_output",
        };
        self.record("signal", name.to_string());
    }

    fn state_changed(&self, _session: u32, from: InstanceState, to: InstanceState) {
        self.record("state_changed", format!("{} -> {}", from.name(), to.name()));
    }

    fn input_port_settings_change(
        &self,
        _session: u32,
        params: &SubscriptionParams,
    ) -> SessionResult<()> {
        self.record("input_settings_change", subscription(params));
        Ok(())
    }

    fn output_port_settings_change(
        &self,
        _session: u32,
        params: &SubscriptionParams,
    ) -> SessionResult<()> {
        self.record("output_settings_change", subscription(params));
        Ok(())
    }

    fn admit(&self, _session: u32, kind: WorkKind) -> Admission {
        self.record("admit", format!("{} -> {:?}", kind.name(), self.admission));
        self.admission
    }

    fn complete_input_settings_change(&self, _session: u32) -> SessionResult<()> {
        self.record("input_settings_change_done", String::new());
        Ok(())
    }

    fn complete_last_flag(&self, _session: u32) -> SessionResult<()> {
        self.record("last_flag", String::new());
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ResponseResult {
    file: String,
    outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
struct DrainRow {
    after: String,
    completed: usize,
    failed: usize,
    dropped: usize,
    cleared: usize,
    remaining: usize,
}

#[derive(Debug, Serialize)]
struct BufferRow {
    kind: &'static str,
    address: String,
    index: u32,
    attr: String,
    flags: String,
    data_size: u32,
}

#[derive(Debug, Serialize)]
struct ReplayOutput {
    schema_id: &'static str,
    session_id: u32,
    responses: Vec<ResponseResult>,
    drains: Vec<DrainRow>,
    final_state: &'static str,
    deferred_pending: usize,
    buffers: Vec<BufferRow>,
}

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let dumps = args
        .files
        .iter()
        .map(|path| {
            std::fs::read(path)
                .map(|raw| (path.display().to_string(), raw))
                .map_err(|err| io_error("read failed", err))
        })
        .collect::<CliResult<Vec<_>>>()?;

    let config = SessionConfig {
        domain: args.domain.into(),
        codec: args.codec.into(),
        super_frame: args.super_frame,
        ..SessionConfig::default()
    };
    let ops = Arc::new(ReplayOps {
        events: Mutex::new(Vec::new()),
        admission: args.admission.into(),
        frame_size: args.frame_size,
    });
    let scheduler = Arc::new(ManualScheduler::new());
    let core = VidcCore::new(CoreConfig::default()).with_scheduler(scheduler.clone());
    let session = core
        .open_session(args.session, config, ops.clone())
        .map_err(|err| response_error("open session failed", err))?;

    let mut kinds = BufferKind::RECONCILE_ORDER.to_vec();
    for seed in &args.buffers {
        session.queue_buffer(seed.kind, seed.address, seed.index);
        if !kinds.contains(&seed.kind) {
            kinds.push(seed.kind);
        }
    }

    let mut exit = SUCCESS;
    let mut responses = Vec::with_capacity(dumps.len());
    let mut drains = Vec::new();
    for (file, raw) in &dumps {
        debug!(file = %file, size = raw.len(), "replaying response");
        let (outcome, error) = match core.handle_response(raw) {
            Ok(outcome) => (describe(&outcome), None),
            Err(err) => {
                warn!(file = %file, error = %err, "response rejected");
                exit = exit.max(response_code(&err));
                ("rejected".to_string(), Some(err.to_string()))
            }
        };
        drains.extend(
            core.run_scheduled(&scheduler)
                .iter()
                .map(|report| drain_row(file, report)),
        );
        responses.push(ResponseResult {
            file: file.clone(),
            outcome,
            error,
            notifications: ops.take(),
        });
    }

    let buffers = kinds
        .iter()
        .flat_map(|&kind| session.buffers(kind))
        .map(|rec| BufferRow {
            kind: rec.kind.name(),
            address: hex(rec.device_address),
            index: rec.index,
            attr: buffer_attr(rec.attr),
            flags: buffer_flags(rec.flags),
            data_size: rec.data_size,
        })
        .collect();

    let out = ReplayOutput {
        schema_id: "https://schemas.3leaps.dev/vidcresp/cli/v1/replay-report.schema.json",
        session_id: args.session,
        responses,
        drains,
        final_state: session.state().name(),
        deferred_pending: session.deferred_len(),
        buffers,
    };

    print_replay(&out, format);
    Ok(exit)
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::System(report) => format!(
            "system: handled={} ignored={}{}",
            report.handled,
            report.ignored,
            if report.torn_down { " torn_down" } else { "" }
        ),
        Outcome::Session { packets, .. } => format!("dispatched {packets} packets"),
        Outcome::Deferred { kind, .. } => format!("deferred ({})", kind.name()),
    }
}

fn drain_row(file: &str, report: &DrainReport) -> DrainRow {
    DrainRow {
        after: file.to_string(),
        completed: report.completed,
        failed: report.failed,
        dropped: report.dropped,
        cleared: report.cleared,
        remaining: report.remaining,
    }
}

fn subscription(params: &SubscriptionParams) -> String {
    format!(
        "{}x{} bit_depth={} profile={} level={} min_count={}",
        params.width(),
        params.height(),
        params.bit_depth,
        params.profile,
        params.level,
        params.fw_min_count
    )
}

fn buffer_flags(flags: BufferFlags) -> String {
    join_names(flags.iter_names().map(|(name, _)| name))
}

fn buffer_attr(attr: BufferAttr) -> String {
    join_names(attr.iter_names().map(|(name, _)| name))
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let joined = names.collect::<Vec<_>>().join("|");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}

fn print_replay(out: &ReplayOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut t = table(["FILE", "OUTCOME", "EVENT", "DETAIL"]);
            for r in &out.responses {
                let outcome = match &r.error {
                    Some(err) => format!("{}: {err}", r.outcome),
                    None => r.outcome.clone(),
                };
                t.add_row(vec![r.file.clone(), outcome, String::new(), String::new()]);
                for n in &r.notifications {
                    t.add_row(vec![
                        String::new(),
                        String::new(),
                        n.event.to_string(),
                        n.detail.clone(),
                    ]);
                }
            }
            println!("{t}");

            if !out.drains.is_empty() {
                let mut t = table(["AFTER", "COMPLETED", "FAILED", "DROPPED", "CLEARED", "REMAINING"]);
                for d in &out.drains {
                    t.add_row(vec![
                        d.after.clone(),
                        d.completed.to_string(),
                        d.failed.to_string(),
                        d.dropped.to_string(),
                        d.cleared.to_string(),
                        d.remaining.to_string(),
                    ]);
                }
                println!("{t}");
            }

            let mut t = table(["KIND", "ADDRESS", "INDEX", "ATTR", "FLAGS", "SIZE"]);
            for b in &out.buffers {
                t.add_row(vec![
                    b.kind.to_string(),
                    b.address.clone(),
                    b.index.to_string(),
                    b.attr.clone(),
                    b.flags.clone(),
                    b.data_size.to_string(),
                ]);
            }
            println!("{t}");
            println!(
                "session {}: {} ({} deferred pending)",
                hex(out.session_id),
                out.final_state,
                out.deferred_pending
            );
        }
        OutputFormat::Pretty => {
            for r in &out.responses {
                match &r.error {
                    Some(err) => println!("{}: {} ({err})", r.file, r.outcome),
                    None => println!("{}: {}", r.file, r.outcome),
                }
                for n in &r.notifications {
                    println!("  {} {}", n.event, n.detail);
                }
            }
            for d in &out.drains {
                println!(
                    "drain after {}: completed={} failed={} dropped={} cleared={} remaining={}",
                    d.after, d.completed, d.failed, d.dropped, d.cleared, d.remaining
                );
            }
            for b in &out.buffers {
                println!(
                    "buffer {} {} index={} attr={} flags={} size={}",
                    b.kind, b.address, b.index, b.attr, b.flags, b.data_size
                );
            }
            println!(
                "session={} state={} deferred_pending={}",
                hex(out.session_id),
                out.final_state,
                out.deferred_pending
            );
        }
    }
}
