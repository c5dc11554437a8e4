//! One-shot report output.

use crate::cert::CertificateRecord;
use comfy_table::{presets, Cell, CellAlignment, Table};
use std::io;

/// The columns of the table report.
pub const COLUMNS: [&str; 4] = [
    "CERTIFICATE_NAME",
    "NAMESPACE",
    "ISSUER",
    "REMAINING_LIFETIME (days)",
];

/// How report records are written.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Fixed-width columns, one row per certificate
    #[default]
    Table,

    /// A JSON array of records
    Json,
}

/// Writes `records` to `out` in the given format.
pub fn write<W: io::Write>(
    out: &mut W,
    format: OutputFormat,
    records: &[CertificateRecord],
) -> io::Result<()> {
    match format {
        OutputFormat::Table => write_table(out, records),
        OutputFormat::Json => write_json(out, records),
    }
}

/// Writes a header line followed by one fixed-width row per record.
pub fn write_table<W: io::Write>(out: &mut W, records: &[CertificateRecord]) -> io::Result<()> {
    let mut table = Table::new();
    table.load_preset(presets::NOTHING).set_header(COLUMNS);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.secret_name),
            Cell::new(&record.namespace),
            Cell::new(&record.issuer),
            Cell::new(record.remaining_days).set_alignment(CellAlignment::Right),
        ]);
    }
    writeln!(out, "{table}")
}

/// Writes the records as a pretty-printed JSON array.
pub fn write_json<W: io::Write>(out: &mut W, records: &[CertificateRecord]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, records)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn records() -> Vec<CertificateRecord> {
        vec![
            CertificateRecord {
                namespace: "default".to_string(),
                secret_name: "web-tls".to_string(),
                issuer: "CN=example.com".to_string(),
                not_after: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
                remaining_days: 365,
            },
            CertificateRecord {
                namespace: "kube-system".to_string(),
                secret_name: "old-tls".to_string(),
                issuer: "CN=internal-ca".to_string(),
                not_after: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                remaining_days: -12,
            },
        ]
    }

    #[test]
    fn table_has_header_and_one_row_per_record() {
        let mut out = Vec::new();
        write_table(&mut out, &records()).expect("write table");
        let text = String::from_utf8(out).expect("utf8");
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3, "{text}");

        for column in COLUMNS {
            assert!(lines[0].contains(column), "{text}");
        }
        assert!(lines[1].contains("web-tls"), "{text}");
        assert!(lines[1].contains("CN=example.com"), "{text}");
        assert!(lines[1].trim_end().ends_with("365"), "{text}");
        assert!(lines[2].contains("kube-system"), "{text}");
        assert!(lines[2].trim_end().ends_with("-12"), "{text}");
    }

    #[test]
    fn empty_table_is_just_the_header() {
        let mut out = Vec::new();
        write_table(&mut out, &[]).expect("write table");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text.lines().count(), 1, "{text}");
    }

    #[test]
    fn json_uses_camel_case() {
        let mut out = Vec::new();
        write_json(&mut out, &records()).expect("write json");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("valid json");
        assert_eq!(value[0]["secretName"], "web-tls");
        assert_eq!(value[0]["remainingDays"], 365);
        assert_eq!(value[1]["namespace"], "kube-system");
    }
}
