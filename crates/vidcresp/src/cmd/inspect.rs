use serde::Serialize;
use tracing::debug;
use vidcresp_packet::{
    packet_type_name, Category, PacketClass, ResponseBatch, SystemClass, HEADER_SIZE,
};

use crate::cmd::InspectArgs;
use crate::exit::{io_error, packet_error, CliResult, SUCCESS};
use crate::output::{flag_names, hex, print_json, table, OutputFormat};

#[derive(Debug, Serialize)]
struct PacketRow {
    index: usize,
    offset: usize,
    size: usize,
    packet_type: String,
    name: &'static str,
    category: &'static str,
    port: &'static str,
    flags: String,
    payload_info: u32,
}

#[derive(Debug, Serialize)]
struct InspectOutput {
    schema_id: &'static str,
    file: String,
    file_size: usize,
    declared_size: u32,
    session_id: u32,
    scope: &'static str,
    header_id: u32,
    packets: Vec<PacketRow>,
    trailing_bytes: usize,
}

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let raw = std::fs::read(&args.file).map_err(|err| io_error("read failed", err))?;
    let batch = ResponseBatch::parse_with_limit(&raw, args.max_size)
        .map_err(|err| packet_error("invalid response", err))?;

    let system = batch.is_system();
    debug!(
        file = %args.file.display(),
        size = raw.len(),
        packets = batch.len(),
        system,
        "response dump validated"
    );
    let packets = batch
        .spans()
        .iter()
        .zip(batch.packets())
        .map(|(span, packet)| {
            let code = packet.header.packet_type;
            PacketRow {
                index: packet.index,
                offset: span.offset,
                size: span.size,
                packet_type: hex(code),
                name: packet_type_name(code),
                category: category(system, code),
                port: packet.header.port.name(),
                flags: flag_names(packet.header.flags),
                payload_info: packet.header.payload_info,
            }
        })
        .collect();

    let header = batch.header();
    let out = InspectOutput {
        schema_id: "https://schemas.3leaps.dev/vidcresp/cli/v1/response-dump.schema.json",
        file: args.file.display().to_string(),
        file_size: raw.len(),
        declared_size: header.size,
        session_id: header.session_id,
        scope: if system { "system" } else { "session" },
        header_id: header.header_id,
        packets,
        trailing_bytes: batch.as_bytes().len() - batch.consumed(),
    };

    print_inspect(&out, format);
    Ok(SUCCESS)
}

fn category(system: bool, code: u32) -> &'static str {
    if !system {
        return PacketClass::of_session(code)
            .category()
            .map_or("UNKNOWN", Category::name);
    }
    match SystemClass::of(code) {
        SystemClass::Init => "INIT",
        SystemClass::Error(_) => "SYSTEM_ERROR",
        SystemClass::Property(_) => "PROPERTY",
        SystemClass::Unknown(_) => "UNKNOWN",
    }
}

fn print_inspect(out: &InspectOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            println!(
                "{}: {} scope, session {}, {} packets, {} bytes ({} header)",
                out.file,
                out.scope,
                hex(out.session_id),
                out.packets.len(),
                out.declared_size,
                HEADER_SIZE
            );
            let mut t = table(["#", "OFFSET", "SIZE", "TYPE", "NAME", "CATEGORY", "PORT", "FLAGS"]);
            for p in &out.packets {
                t.add_row(vec![
                    p.index.to_string(),
                    p.offset.to_string(),
                    p.size.to_string(),
                    p.packet_type.clone(),
                    p.name.to_string(),
                    p.category.to_string(),
                    p.port.to_string(),
                    p.flags.clone(),
                ]);
            }
            println!("{t}");
            if out.trailing_bytes > 0 {
                println!("trailing bytes: {}", out.trailing_bytes);
            }
        }
        OutputFormat::Pretty => {
            println!(
                "session={} scope={} packets={} size={} trailing={}",
                hex(out.session_id),
                out.scope,
                out.packets.len(),
                out.declared_size,
                out.trailing_bytes
            );
            for p in &out.packets {
                println!(
                    "  [{}] {} {} ({}) port={} flags={} size={}",
                    p.index, p.packet_type, p.name, p.category, p.port, p.flags, p.size
                );
            }
        }
    }
}
