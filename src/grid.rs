//! Results Grid Module
//!
//! Renders query results as a table for the terminal, or exports them as CSV
//! or Markdown.

use crate::core::db::{FlightRecord, Frequency};
use crate::core::{FlightsError, Result};

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Csv,
    Markdown,
    Json,
}

/// Text shown in place of an empty table.
pub const NO_DATA: &str = "no data";

/// Headers and rows of one result table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultsGrid {
    /// Creates an empty grid with the given headers.
    pub fn new(headers: &[&str]) -> Self {
        ResultsGrid {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Adds a row to the grid.
    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One column of city names.
    pub fn from_cities<'a, I>(cities: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut grid = ResultsGrid::new(&["City"]);
        for city in cities {
            grid.add_row(vec![city.clone()]);
        }
        grid
    }

    pub fn from_flights(flights: &[FlightRecord]) -> Self {
        let mut grid = ResultsGrid::new(&["Airline", "Departure", "Duration", "Distance"]);
        for f in flights {
            grid.add_row(vec![
                f.airline.clone(),
                f.departure_time_label.clone(),
                f.duration.clone(),
                f.distance_type.clone(),
            ]);
        }
        grid
    }

    /// Two columns: `label_header` and "Frequency".
    pub fn from_frequency(label_header: &str, freq: &Frequency) -> Self {
        let mut grid = ResultsGrid::new(&[label_header, "Frequency"]);
        for (label, count) in freq.iter() {
            grid.add_row(vec![label.to_string(), count.to_string()]);
        }
        grid
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(len),
                    None => widths.push(len),
                }
            }
        }
        widths
    }

    /// Renders the grid as aligned text, or `no data` when there are no rows.
    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return format!("{}\n", NO_DATA);
        }
        let widths = self.column_widths();
        let pad = |cells: &[String]| -> String {
            let padded: Vec<String> = cells
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
                .collect();
            padded.join(" | ").trim_end().to_string()
        };

        let mut output = String::new();
        output.push_str(&pad(&self.headers));
        output.push('\n');
        let underline: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        output.push_str(&underline.join("-|-"));
        output.push('\n');
        for row in &self.rows {
            output.push_str(&pad(row));
            output.push('\n');
        }
        output
    }

    /// Exports the grid as text, CSV or Markdown.
    pub fn export(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => Ok(self.render()),
            OutputFormat::Csv => self.export_to_csv(),
            OutputFormat::Markdown => Ok(self.export_to_markdown()),
            OutputFormat::Json => Err(FlightsError::Ui(
                "JSON output is produced from typed results, not from a grid".to_string(),
            )),
        }
    }

    fn export_to_csv(&self) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| FlightsError::Ui(format!("CSV flush error: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| FlightsError::Ui(format!("CSV encoding error: {}", e)))
    }

    fn export_to_markdown(&self) -> String {
        let escape = |s: &String| s.replace('|', "\\|");
        let mut output = String::new();
        output.push_str("| ");
        output.push_str(&self.headers.iter().map(escape).collect::<Vec<_>>().join(" | "));
        output.push_str(" |\n|");
        for _ in &self.headers {
            output.push_str(" --- |");
        }
        output.push('\n');
        for row in &self.rows {
            output.push_str("| ");
            output.push_str(&row.iter().map(escape).collect::<Vec<_>>().join(" | "));
            output.push_str(" |\n");
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> ResultsGrid {
        let mut grid = ResultsGrid::new(&["City", "Frequency"]);
        grid.add_row(vec!["Atlanta, GA".to_string(), "4".to_string()]);
        grid.add_row(vec!["Boston, MA".to_string(), "1".to_string()]);
        grid
    }

    #[test]
    fn test_render_empty_grid() {
        let grid = ResultsGrid::new(&["City"]);
        assert_eq!(grid.render(), "no data\n");
    }

    #[test]
    fn test_render_aligns_columns() {
        let rendered = sample_grid().render();
        let expected = "\
City        | Frequency
------------|----------
Atlanta, GA | 4
Boston, MA  | 1
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_export_csv_quotes_commas() {
        let csv = sample_grid().export(OutputFormat::Csv).unwrap();
        assert_eq!(csv, "City,Frequency\n\"Atlanta, GA\",4\n\"Boston, MA\",1\n");
    }

    #[test]
    fn test_export_markdown() {
        let md = sample_grid().export(OutputFormat::Markdown).unwrap();
        assert_eq!(
            md,
            "| City | Frequency |\n| --- | --- |\n| Atlanta, GA | 4 |\n| Boston, MA | 1 |\n"
        );
    }

    #[test]
    fn test_export_json_is_rejected() {
        assert!(matches!(
            sample_grid().export(OutputFormat::Json),
            Err(FlightsError::Ui(_))
        ));
    }

    #[test]
    fn test_from_frequency() {
        let freq = Frequency {
            labels: vec!["X".to_string(), "Y".to_string()],
            counts: vec![3, 1],
        };
        let grid = ResultsGrid::from_frequency("Airline", &freq);
        assert_eq!(grid.headers, vec!["Airline", "Frequency"]);
        assert_eq!(grid.rows[1], vec!["Y".to_string(), "1".to_string()]);
    }
}
