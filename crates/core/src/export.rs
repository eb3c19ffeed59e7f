//! CSV export of analysis results.
//!
//! Each writer emits a header row derived from the record's field names and
//! one row per record. Missing optional values are written as empty fields.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::analysis::{AgeGap, GenerationSummary, InfluenceRow};
use crate::error::Result;

fn write_records<W: Write, T: Serialize>(writer: W, records: &[T]) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write an influence table, one ancestor per row.
pub fn write_influence_csv<W: Write>(writer: W, rows: &[InfluenceRow]) -> Result<()> {
    write_records(writer, rows)
}

/// Write per-generation summaries, one generation per row.
pub fn write_summary_csv<W: Write>(writer: W, summaries: &[GenerationSummary]) -> Result<()> {
    write_records(writer, summaries)
}

/// Write an age-gap report, one (child, role) per row.
pub fn write_age_gap_csv<W: Write>(writer: W, gaps: &[AgeGap]) -> Result<()> {
    write_records(writer, gaps)
}

/// Write an influence table to a file at `path`.
pub fn save_influence_csv<P: AsRef<Path>>(path: P, rows: &[InfluenceRow]) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_influence_csv(file, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{classify_gap, GapClass};
    use crate::graph::{NodeId, ParentRole};

    #[test]
    fn test_influence_csv_layout() {
        let rows = vec![InfluenceRow {
            id: NodeId::external("42462"),
            name: "Elding".to_string(),
            birth_year: Some(1983),
            count: 2,
            min_depth: Some(1),
            linear: 1.5,
            exponential: 0.75,
            slow_exponential: 1.0,
            power_law: 1.25,
        }];
        let mut out = Vec::new();
        write_influence_csv(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,name,birth_year,count,min_depth,linear,exponential,slow_exponential,power_law"
        );
        assert_eq!(lines.next().unwrap(), "ext:42462,Elding,1983,2,1,1.5,0.75,1.0,1.25");
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_save_influence_csv_to_file() {
        let path = std::env::temp_dir().join(format!(
            "test_influence_{}.csv",
            std::process::id()
        ));
        let rows = vec![InfluenceRow {
            id: NodeId::derived("Kaprell", 1955),
            name: "Kaprell".to_string(),
            birth_year: Some(1955),
            count: 1,
            min_depth: Some(3),
            linear: 0.5,
            exponential: 0.125,
            slow_exponential: 0.25,
            power_law: 0.5,
        }];
        save_influence_csv(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(
            text.lines().nth(1).unwrap(),
            "key:KAPRELL#1955,Kaprell,1955,1,3,0.5,0.125,0.25,0.5"
        );
    }

    #[test]
    fn test_summary_csv_rows() {
        let summaries = vec![
            GenerationSummary {
                depth: 1,
                unique_count: 2,
                cumulative_unique: 2,
                distinct_count: 2,
                appearance_count: 2,
            },
            GenerationSummary {
                depth: 2,
                unique_count: 3,
                cumulative_unique: 5,
                distinct_count: 3,
                appearance_count: 4,
            },
        ];
        let mut out = Vec::new();
        write_summary_csv(&mut out, &summaries).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(2).unwrap().starts_with("2,3,5,3,4"));
    }

    #[test]
    fn test_age_gap_csv_empty_fields() {
        let gaps = vec![AgeGap {
            child: NodeId::external("1"),
            child_name: "Child".to_string(),
            role: ParentRole::Dam,
            parent: None,
            parent_name: None,
            child_birth_year: Some(2001),
            parent_birth_year: None,
            gap: None,
            class: classify_gap(None),
        }];
        assert_eq!(gaps[0].class, GapClass::Unknown);
        let mut out = Vec::new();
        write_age_gap_csv(&mut out, &gaps).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(1).unwrap(), "ext:1,Child,dam,,,2001,,,unknown");
    }
}
