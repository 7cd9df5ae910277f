use std::io::IsTerminal;

use canrx_core::{Bucket, StatsSnapshot};
use canrx_frame::candump::{format_log_line, LogRecord};
use canrx_frame::Filter;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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

#[derive(Serialize)]
pub struct Classification {
    pub filter: String,
    pub bucket: Bucket,
    pub id: String,
    pub mask: String,
}

impl Classification {
    pub fn new(filter: Filter, bucket: Bucket, normalized: Filter) -> Self {
        Self {
            filter: filter.to_string(),
            bucket,
            id: format!("{:08X}", normalized.id),
            mask: format!("{:08X}", normalized.mask),
        }
    }
}

pub fn print_classification(out: &Classification, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(out)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FILTER", "BUCKET", "ID", "MASK"])
                .add_row(vec![
                    out.filter.clone(),
                    out.bucket.to_string(),
                    out.id.clone(),
                    out.mask.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "filter={} bucket={} id={} mask={}",
            out.filter, out.bucket, out.id, out.mask
        ),
        OutputFormat::Raw => println!("{}", out.bucket),
    }
}

#[derive(Serialize)]
struct MatchOutput<'a> {
    timestamp: Option<f64>,
    interface: &'a str,
    receiver: &'a str,
    frame: String,
}

/// One delivery of `record` to the receiver called `receiver`.
pub fn print_match(record: &LogRecord, receiver: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MatchOutput {
                timestamp: record.timestamp.map(|ts| ts.as_secs_f64()),
                interface: &record.interface,
                receiver,
                frame: record.frame.to_string(),
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{}  -> {receiver}", format_log_line(record));
        }
        OutputFormat::Raw => println!("{}", format_log_line(record)),
    }
}

/// Per-receiver line of the replay summary.
#[derive(Serialize)]
pub struct ReceiverRow {
    pub name: String,
    pub interface: String,
    pub filter: String,
    pub bucket: Bucket,
    pub matches: u64,
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    receivers: &'a [ReceiverRow],
    stats: StatsSnapshot,
}

pub fn print_summary(rows: &[ReceiverRow], stats: StatsSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SummaryOutput {
                receivers: rows,
                stats,
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["RECEIVER", "INTERFACE", "FILTER", "BUCKET", "MATCHES"]);
            for row in rows {
                table.add_row(vec![
                    row.name.clone(),
                    row.interface.clone(),
                    row.filter.clone(),
                    row.bucket.to_string(),
                    row.matches.to_string(),
                ]);
            }
            println!("{table}");
            println!("{}", stats_line(stats));
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "receiver={} interface={} filter={} bucket={} matches={}",
                    row.name, row.interface, row.filter, row.bucket, row.matches
                );
            }
            println!("{}", stats_line(stats));
        }
        // keep stdout a valid log
        OutputFormat::Raw => eprintln!("{}", stats_line(stats)),
    }
}

fn stats_line(stats: StatsSnapshot) -> String {
    format!(
        "frames={} matched={} ({}%) deliveries={}",
        stats.rx_frames,
        stats.matched_frames,
        stats.match_ratio(),
        stats.matches
    )
}

fn to_json(value: &impl Serialize) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
