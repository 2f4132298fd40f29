use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use vidcresp_packet::PacketFlags;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// A table with the CLI's common styling.
pub fn table<I, S>(header: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: Into<comfy_table::Cell>,
{
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn hex(value: impl Into<u64>) -> String {
    format!("{:#x}", value.into())
}

/// Flag names joined with `|`, with any undefined bits appended in hex.
pub fn flag_names(flags: PacketFlags) -> String {
    let mut names: Vec<String> = flags
        .iter_names()
        .map(|(name, _)| name.to_string())
        .collect();
    let unknown = flags.bits() & !PacketFlags::all().bits();
    if unknown != 0 {
        names.push(hex(unknown));
    }
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join("|")
    }
}
