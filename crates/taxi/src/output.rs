//! Report rendering (table, json, csv)
//!
//! Every report is flattened to rows of JSON values first, so tabular metric
//! results and typed reports (overview, simulation) print the same way.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use taxi_analytics::MetricReport;
use taxi_query::{OutputFormat, QueryResult};

/// Widest a table cell may get before it is cut
const MAX_CELL_WIDTH: usize = 50;

/// Report data flattened into named columns
#[derive(Debug, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build from a query result, keeping column order
    pub fn from_result(result: &QueryResult) -> Self {
        Self {
            columns: result.columns.iter().map(|c| c.name.clone()).collect(),
            rows: result
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|v| serde_json::to_value(v).unwrap_or(Value::Null))
                        .collect()
                })
                .collect(),
        }
    }

    /// Build from any JSON document
    ///
    /// An array becomes one row per element, anything else a single row.
    /// Nested objects flatten to dotted column names (`before.total_trips`).
    pub fn from_json(data: &Value) -> Self {
        let records: Vec<Map<String, Value>> = match data {
            Value::Array(items) => items.iter().map(flatten).collect(),
            other => vec![flatten(other)],
        };

        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn flatten(value: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    match value {
        Value::Object(obj) => flatten_into(&mut out, "", obj),
        other => {
            out.insert("value".to_string(), other.clone());
        }
    }
    out
}

fn flatten_into(out: &mut Map<String, Value>, prefix: &str, obj: &Map<String, Value>) {
    for (key, value) in obj {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(inner) => flatten_into(out, &name, inner),
            other => {
                out.insert(name, other.clone());
            }
        }
    }
}

/// Write a tabular metric report
pub fn write_result_report<W: Write>(
    out: &mut W,
    report: &MetricReport<QueryResult>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let data = Value::Array(
                report
                    .data
                    .to_records()
                    .into_iter()
                    .map(Value::Object)
                    .collect(),
            );
            write_json(out, report, data)
        }
        _ => write_flat(out, report, &Table::from_result(&report.data), format),
    }
}

/// Write a typed report
pub fn write_report<W: Write, T: Serialize>(
    out: &mut W,
    report: &MetricReport<T>,
    format: OutputFormat,
) -> Result<()> {
    let data = serde_json::to_value(&report.data)?;
    match format {
        OutputFormat::Json => write_json(out, report, data),
        _ => write_flat(out, report, &Table::from_json(&data), format),
    }
}

fn write_json<W: Write, T>(out: &mut W, report: &MetricReport<T>, data: Value) -> Result<()> {
    let doc = serde_json::json!({
        "metric": report.metric,
        "data": data,
        "assumptions": report.assumptions,
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
    Ok(())
}

fn write_flat<W: Write, T>(
    out: &mut W,
    report: &MetricReport<T>,
    table: &Table,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Csv {
        return write_csv(out, table);
    }

    writeln!(out, "{}", report.metric)?;
    writeln!(out)?;
    write_table(out, table)?;

    if !report.assumptions.is_empty() {
        writeln!(out)?;
        writeln!(out, "Assumptions:")?;
        for assumption in &report.assumptions {
            writeln!(out, "  - {}: {}", assumption.key, assumption.text)?;
        }
    }
    Ok(())
}

/// Write as ASCII table
pub fn write_table<W: Write>(out: &mut W, table: &Table) -> Result<()> {
    if table.is_empty() {
        writeln!(out, "(empty result)")?;
        return Ok(());
    }

    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in &table.rows {
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(format_value(value).chars().count());
        }
    }
    for w in &mut widths {
        *w = (*w).min(MAX_CELL_WIDTH);
    }

    let header: Vec<String> = table
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:width$}", c, width = *w))
        .collect();
    writeln!(out, "{}", header.join(" | ").trim_end())?;

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}", sep.join("-+-"))?;

    for row in &table.rows {
        let values: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:width$}", truncate(&format_value(v), *w), width = *w))
            .collect();
        writeln!(out, "{}", values.join(" | ").trim_end())?;
    }

    Ok(())
}

/// Write as CSV
pub fn write_csv<W: Write>(out: &mut W, table: &Table) -> Result<()> {
    let header: Vec<String> = table.columns.iter().map(|c| csv_escape(c)).collect();
    writeln!(out, "{}", header.join(","))?;

    for row in &table.rows {
        let values: Vec<String> = row
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                Value::String(s) => csv_escape(s),
                other => csv_escape(&format_value(other)),
            })
            .collect();
        writeln!(out, "{}", values.join(","))?;
    }

    Ok(())
}

/// Format a JSON value for display
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) => format_real(f),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(obj) => serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string()),
    }
}

/// Four decimals, trailing zeros dropped
fn format_real(f: f64) -> String {
    let s = format!("{:.4}", f);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "" | "-" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let kept: String = s.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Escape value for CSV output
fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('\n') || s.contains('"') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxi_analytics::Assumption;
    use taxi_query::{Column, DataType, Value as Cell};

    fn sample_result() -> QueryResult {
        QueryResult::new(
            vec![
                Column::new("zone_id", DataType::Integer),
                Column::new("zone", DataType::Text),
                Column::new("congestion_index", DataType::Real),
            ],
            vec![
                vec![
                    Cell::Integer(161),
                    Cell::Text("Midtown Center".into()),
                    Cell::Real(5.0),
                ],
                vec![Cell::Integer(4), Cell::Text("Alphabet, City".into()), Cell::Null],
            ],
            3,
        )
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_table_keeps_column_order() {
        let table = Table::from_result(&sample_result());
        assert_eq!(table.columns, vec!["zone_id", "zone", "congestion_index"]);
        assert_eq!(table.rows[1][2], Value::Null);
    }

    #[test]
    fn test_ascii_table() {
        let table = Table::from_result(&sample_result());
        let text = render(|out| write_table(out, &table));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "zone_id | zone           | congestion_index");
        assert!(lines[1].starts_with("--------+-"));
        assert!(lines[2].starts_with("161     | Midtown Center | 5"));
        assert!(lines[3].ends_with("NULL"));
    }

    #[test]
    fn test_empty_table() {
        let text = render(|out| write_table(out, &Table::default()));
        assert_eq!(text, "(empty result)\n");
    }

    #[test]
    fn test_csv_escapes_and_nulls() {
        let table = Table::from_result(&sample_result());
        let text = render(|out| write_csv(out, &table));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "zone_id,zone,congestion_index");
        assert_eq!(lines[1], "161,Midtown Center,5");
        assert_eq!(lines[2], "4,\"Alphabet, City\",");
    }

    #[test]
    fn test_json_report_shape() {
        let report = MetricReport::new(
            "congestion_zones",
            sample_result(),
            vec![Assumption::new("congestion_index", "minutes per mile")],
        );
        let text = render(|out| write_result_report(out, &report, OutputFormat::Json));
        let doc: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(doc["metric"], "congestion_zones");
        assert_eq!(doc["data"][0]["zone_id"], 161);
        assert_eq!(doc["data"][1]["congestion_index"], Value::Null);
        assert_eq!(doc["assumptions"][0]["key"], "congestion_index");
    }

    #[test]
    fn test_table_report_lists_assumptions() {
        let report = MetricReport::new(
            "congestion_zones",
            sample_result(),
            vec![Assumption::new("approximation", "median approximated by arithmetic mean")],
        );
        let text = render(|out| write_result_report(out, &report, OutputFormat::Table));
        assert!(text.starts_with("congestion_zones\n"));
        assert!(text.contains("Assumptions:"));
        assert!(text.contains("  - approximation: median approximated by arithmetic mean"));
    }

    #[test]
    fn test_flatten_nested_object() {
        let data = serde_json::json!({
            "threshold_miles": 1.0,
            "before": {"total_trips": 44, "avg_duration_minutes": null},
            "impact": {"trips_removed": 10},
        });
        let table = Table::from_json(&data);
        assert_eq!(
            table.columns,
            vec![
                "threshold_miles",
                "before.total_trips",
                "before.avg_duration_minutes",
                "impact.trips_removed",
            ]
        );
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][1], 44);
    }

    #[test]
    fn test_array_of_records() {
        let data = serde_json::json!([
            {"threshold_miles": 0.5, "trips_removed": 2},
            {"threshold_miles": 1.0, "trips_removed": 4},
        ]);
        let table = Table::from_json(&data);
        assert_eq!(table.columns, vec!["threshold_miles", "trips_removed"]);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(5.0), "5");
        assert_eq!(format_real(0.090909), "0.0909");
        assert_eq!(format_real(-0.00001), "0");
        assert_eq!(format_real(12.5), "12.5");
    }

    #[test]
    fn test_truncate_long_cell() {
        let long = "x".repeat(60);
        let cut = truncate(&long, MAX_CELL_WIDTH);
        assert_eq!(cut.chars().count(), MAX_CELL_WIDTH);
        assert!(cut.ends_with("..."));
    }
}
