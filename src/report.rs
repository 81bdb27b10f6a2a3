use std::fmt::Write;

use crate::table::{Table, Value};

pub const NO_RESULTS: &str =
    "No results found for your query. Try adjusting your question or check your access scope.";

/// Cell text for display: dates as `%Y-%m-%d`, nulls empty.
pub fn format_cell(value: &Value) -> String {
    value.to_string()
}

fn escape_markdown(cell: &str) -> String {
    cell.replace('|', "\\|")
}

pub fn summary_line(table: &Table) -> String {
    if table.is_empty() {
        NO_RESULTS.to_string()
    } else {
        format!("Found {} result(s)", table.len())
    }
}

pub fn build_report(title: &str, details: &[(&str, String)], table: &Table) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {title}");
    for (label, value) in details {
        let _ = writeln!(output, "- **{label}:** {value}");
    }
    let _ = writeln!(output);

    if table.is_empty() {
        let _ = writeln!(output, "{NO_RESULTS}");
        return output;
    }

    let _ = writeln!(output, "| {} |", table.columns().join(" | "));
    let rule: Vec<&str> = table.columns().iter().map(|_| "---").collect();
    let _ = writeln!(output, "| {} |", rule.join(" | "));

    for row in table.rows() {
        let cells: Vec<String> = row
            .values()
            .iter()
            .map(|value| escape_markdown(&format_cell(value)))
            .collect();
        let _ = writeln!(output, "| {} |", cells.join(" | "));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "{}", summary_line(table));
    output
}

pub fn write_csv<W: std::io::Write>(table: &Table, writer: W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.values().iter().map(format_cell))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> Table {
        Table::from_rows(
            vec!["Student Name".into(), "Due Date".into(), "Submission Date".into()],
            vec![vec![
                Value::from("Avery | Lee"),
                Value::Date(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()),
                Value::Null,
            ]],
        )
        .unwrap()
    }

    #[test]
    fn report_lists_rows_and_summary() {
        let report = build_report("Query Results", &[("Intent", "homework_status".into())], &sample());
        assert!(report.contains("| Student Name | Due Date | Submission Date |"));
        assert!(report.contains("| Avery \\| Lee | 2026-02-01 |  |"));
        assert!(report.contains("Found 1 result(s)"));
    }

    #[test]
    fn empty_report_says_so() {
        let report = build_report("Query Results", &[], &Table::empty(["Quiz Name"]));
        assert!(report.contains(NO_RESULTS));
        assert!(!report.contains("| Quiz Name |"));
    }

    #[test]
    fn csv_uses_display_formatting() {
        let mut buffer = Vec::new();
        write_csv(&sample(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "Student Name,Due Date,Submission Date\nAvery | Lee,2026-02-01,\n"
        );
    }
}
