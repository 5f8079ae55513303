use std::io;

use crate::repo::leave_repo::ApprovedLeaveRow;

pub const HEADER: [&str; 5] = ["Employee", "Start Date", "End Date", "Days Taken", "Leave Type"];

/// Writes approved requests as CSV, one line per request after the header.
pub fn write_holidays<W: io::Write>(rows: &[ApprovedLeaveRow], writer: W) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)?;
    for row in rows {
        wtr.write_record([
            row.full_name.clone(),
            row.start_date.format("%Y-%m-%d").to_string(),
            row.end_date.format("%Y-%m-%d").to_string(),
            row.days_taken.to_string(),
            row.leave_type_label(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn holidays_csv(rows: &[ApprovedLeaveRow]) -> csv::Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_holidays(rows, &mut buf)?;
    Ok(buf)
}

pub fn export_filename(year: i32) -> String {
    format!("holidays_{year}.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(name: &str, special: Option<&str>) -> ApprovedLeaveRow {
        ApprovedLeaveRow {
            id: 1,
            employee_id: 1,
            full_name: name.into(),
            start_date: NaiveDate::from_ymd_opt(2025, 7, 21).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 7, 23).unwrap(),
            days_taken: 3,
            special_type: special.map(Into::into),
        }
    }

    #[test]
    fn csv_has_header_and_leave_type_labels() {
        let bytes = holidays_csv(&[
            row("Ann Smith", None),
            row("Bob, Jr.", Some("Marriage Leave")),
        ])
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Employee,Start Date,End Date,Days Taken,Leave Type");
        assert_eq!(lines[1], "Ann Smith,2025-07-21,2025-07-23,3,Regular Leave");
        assert_eq!(
            lines[2],
            "\"Bob, Jr.\",2025-07-21,2025-07-23,3,Special Leave - Marriage Leave"
        );
    }

    #[test]
    fn empty_export_is_just_the_header() {
        let text = String::from_utf8(holidays_csv(&[]).unwrap()).unwrap();
        assert_eq!(text.trim_end(), "Employee,Start Date,End Date,Days Taken,Leave Type");
        assert_eq!(export_filename(2025), "holidays_2025.csv");
    }
}
