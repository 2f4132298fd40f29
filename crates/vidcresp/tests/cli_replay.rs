#![cfg(feature = "cli")]

use std::path::{Path, PathBuf};
use std::process::Command;

use vidcresp::packet::{
    BufferFwFlags, BufferPayload, HfiBufferType, PacketFlags, PacketHeader, Port, CMD_BUFFER,
    CMD_SETTINGS_CHANGE, PAYLOAD_STRUCTURE, PROP_BITSTREAM_RESOLUTION,
};
use vidcresp::ResponseBuilder;

const SESSION: u32 = 0x30;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "vidcresp-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn write_output_buffer(path: &Path, address: u64, flags: BufferFwFlags) {
    let payload = BufferPayload {
        buffer_type: HfiBufferType::Raw.raw(),
        base_address: address,
        data_size: 2048,
        flags,
        ..BufferPayload::default()
    };
    let raw = ResponseBuilder::new(SESSION)
        .packet(
            PacketHeader::new(CMD_BUFFER)
                .with_port(Port::Raw)
                .with_flags(PacketFlags::SUCCESS)
                .with_payload_info(PAYLOAD_STRUCTURE),
            &payload.to_bytes(),
        )
        .build();
    std::fs::write(path, &raw).expect("dump should be writable");
}

fn replay(args: &[&str], files: &[&Path]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_vidcresp"))
        .arg("--log-level")
        .arg("off")
        .arg("--format")
        .arg("json")
        .arg("replay")
        .args(files)
        .arg("--session")
        .arg(format!("{SESSION:#x}"))
        .args(args)
        .output()
        .expect("replay should run")
}

fn json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("replay should emit json")
}

#[test]
fn read_only_output_is_completed_once_and_retained() {
    let dir = unique_temp_dir("replay-readonly");
    let dump = dir.join("out.bin");
    write_output_buffer(&dump, 0x1000, BufferFwFlags::READONLY);

    let output = replay(&["--buffer", "output:0x1000"], &[&dump, &dump]);
    assert!(output.status.success());
    let report = json(&output);

    let responses = report["responses"]
        .as_array()
        .expect("responses should be an array");
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["notifications"][0]["event"], "buffer_done");
    assert_eq!(
        responses[1]["notifications"]
            .as_array()
            .expect("notifications should be an array")
            .len(),
        0
    );

    let buffers = report["buffers"].as_array().expect("buffers should be an array");
    assert_eq!(buffers.len(), 1);
    assert_eq!(buffers[0]["address"], "0x1000");
    assert_eq!(buffers[0]["attr"], "COMPLETED|READ_ONLY");
    assert_eq!(report["final_state"], "open");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn last_buffer_is_deferred_then_drained() {
    let dir = unique_temp_dir("replay-last");
    let dump = dir.join("eos.bin");
    write_output_buffer(&dump, 0x2000, BufferFwFlags::LAST | BufferFwFlags::READONLY);

    let output = replay(&["--buffer", "output:0x2000"], &[&dump]);
    assert!(output.status.success());
    let report = json(&output);

    assert_eq!(report["responses"][0]["outcome"], "deferred (last_flag)");
    assert_eq!(report["drains"][0]["completed"], 1);
    let events: Vec<&str> = report["responses"][0]["notifications"]
        .as_array()
        .expect("notifications should be an array")
        .iter()
        .filter_map(|n| n["event"].as_str())
        .collect();
    assert_eq!(
        events,
        vec!["admit", "buffer_done", "buffer_released", "last_flag"]
    );
    let detail = report["responses"][0]["notifications"][1]["detail"]
        .as_str()
        .expect("detail should be a string");
    assert!(detail.contains("size=0"));
    assert!(report["buffers"].as_array().is_some_and(|b| b.is_empty()));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn deferred_admission_leaves_work_pending() {
    let dir = unique_temp_dir("replay-defer");
    let dump = dir.join("psc.bin");
    let raw = ResponseBuilder::new(SESSION)
        .words(
            PacketHeader::new(PROP_BITSTREAM_RESOLUTION).with_port(Port::Bitstream),
            &[(640 << 16) | 480],
        )
        .packet(
            PacketHeader::new(CMD_SETTINGS_CHANGE).with_port(Port::Bitstream),
            &[],
        )
        .build();
    std::fs::write(&dump, &raw).expect("dump should be writable");

    let output = replay(&["--admission", "defer"], &[&dump, &dump]);
    assert!(output.status.success());
    let report = json(&output);
    assert_eq!(report["deferred_pending"], 2);
    assert_eq!(report["final_state"], "open");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_buffer_returns_1_and_reports_error() {
    let dir = unique_temp_dir("replay-missing");
    let dump = dir.join("out.bin");
    write_output_buffer(&dump, 0x9000, BufferFwFlags::empty());

    let output = replay(&[], &[&dump]);
    assert_eq!(output.status.code(), Some(1));
    let report = json(&output);
    assert_eq!(report["responses"][0]["outcome"], "rejected");
    assert!(report["responses"][0]["error"]
        .as_str()
        .is_some_and(|e| e.contains("0x9000")));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn corrupt_dump_returns_60() {
    let dir = unique_temp_dir("replay-corrupt");
    let dump = dir.join("bad.bin");
    std::fs::write(&dump, [0u8; 40]).expect("dump should be writable");

    let output = replay(&[], &[&dump]);
    assert_eq!(output.status.code(), Some(60));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn reserved_session_id_is_usage_error() {
    let dir = unique_temp_dir("replay-reserved");
    let dump = dir.join("out.bin");
    write_output_buffer(&dump, 0x1000, BufferFwFlags::empty());

    let output = Command::new(env!("CARGO_BIN_EXE_vidcresp"))
        .arg("replay")
        .arg(&dump)
        .arg("--session")
        .arg("0")
        .output()
        .expect("replay should run");
    assert_eq!(output.status.code(), Some(64));

    let _ = std::fs::remove_dir_all(&dir);
}
