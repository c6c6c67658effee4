use std::any::Any;
use std::fs::File;
use std::path::Path;

use crate::dsp::median;
use crate::error::{EngineError, Result};
use crate::node::{Node, NodeCore, PortSpec};
use crate::time::{Stamp, parse_stamp, seconds_between};
use crate::types::{Kind, Value};

const PARAMETERS: &[PortSpec] = &[("filename", Kind::Text)];
const INPUTS: &[PortSpec] = &[];
const OUTPUTS: &[PortSpec] = &[
    ("time", Kind::Time),
    ("value", Kind::Real),
    ("fs", Kind::Scalar),
];

/// Ingests a two-column csv file of `(timestamp, value)` rows, sorts both
/// columns jointly by ascending time and derives the sampling rate from
/// the median sample spacing.  An unparseable first row is treated as a
/// header; any later malformed row is an error.
pub struct DataLoaderNode {
    core: NodeCore,
}

impl DataLoaderNode {
    pub fn new(name: &str) -> Self {
        let mut core = NodeCore::new(name);
        core.store_parameter("filename", Value::Text(String::new()));
        Self { core }
    }

    fn read_rows(&self) -> Result<Vec<(Stamp, f64)>> {
        let filename = match self.core.parameter("filename").and_then(Value::as_text) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => return Err(EngineError::missing_parameter(self.core.name(), "filename")),
        };
        if !Path::new(&filename).is_file() {
            return Err(EngineError::FileNotFound { path: filename });
        }
        let file = File::open(&filename).map_err(|_| EngineError::FileNotFound {
            path: filename.clone(),
        })?;
        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(file);
        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let row = index + 1;
            let record = record.map_err(|err| EngineError::Parse {
                row,
                message: err.to_string(),
            })?;
            match parse_record(&record, row) {
                Ok(parsed) => rows.push(parsed),
                // a header line is tolerated, but only as the first row
                Err(_) if index == 0 => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(rows)
    }
}

fn parse_record(record: &csv::StringRecord, row: usize) -> Result<(Stamp, f64)> {
    let stamp_field = record.get(0).ok_or_else(|| EngineError::Parse {
        row,
        message: "missing timestamp column".to_string(),
    })?;
    let value_field = record.get(1).ok_or_else(|| EngineError::Parse {
        row,
        message: "missing value column".to_string(),
    })?;
    let stamp = parse_stamp(stamp_field, row)?;
    let value = value_field.trim().parse::<f64>().map_err(|err| EngineError::Parse {
        row,
        message: format!("bad value {value_field:?}: {err}"),
    })?;
    Ok((stamp, value))
}

impl Node for DataLoaderNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn parameter_ports(&self) -> &'static [PortSpec] {
        PARAMETERS
    }

    fn input_ports(&self) -> &'static [PortSpec] {
        INPUTS
    }

    fn output_ports(&self) -> &'static [PortSpec] {
        OUTPUTS
    }

    fn execute(&mut self) -> Result<()> {
        let mut rows = self.read_rows()?;
        if rows.len() < 2 {
            return Err(EngineError::validation(
                self.core.name(),
                format!("need at least two data rows to derive a sampling rate, got {}", rows.len()),
            ));
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        let (time, value): (Vec<Stamp>, Vec<f64>) = rows.into_iter().unzip();
        let spacings: Vec<f64> = time.windows(2).map(|w| seconds_between(&w[0], &w[1])).collect();
        let spacing = median(&spacings);
        if spacing <= 0.0 {
            return Err(EngineError::validation(
                self.core.name(),
                "median sample spacing is zero",
            ));
        }
        let fs = 1.0 / spacing;
        info!("loaded {} rows, fs = {fs:.6} Hz", value.len());
        self.core.set_output("time", Value::Time(time));
        self.core.set_output("value", Value::Real(value));
        self.core.set_output("fs", Value::Scalar(fs));
        self.core.mark_clean();
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {

    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    fn scratch_file(tag: &str, contents: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("spectraflow_loader_{tag}_{}.csv", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn loaded(tag: &str, contents: &str) -> DataLoaderNode {
        let path = scratch_file(tag, contents);
        let mut node = DataLoaderNode::new("loader");
        node.set_parameter("filename", Value::Text(path.to_string_lossy().into_owned()))
            .unwrap();
        node.execute().unwrap();
        node
    }

    #[test]
    fn rows_are_sorted_and_rate_derived() {
        let node = loaded(
            "sorted",
            "2021-01-01 00:00:02.000,3.0\n\
             2021-01-01 00:00:00.000,1.0\n\
             2021-01-01 00:00:01.000,2.0\n\
             2021-01-01 00:00:03.000,4.0\n",
        );
        let value = node.core().output("value").unwrap().as_real().unwrap().to_vec();
        assert_eq!(value, vec![1.0, 2.0, 3.0, 4.0]);
        let fs = node.core().output("fs").unwrap().as_scalar().unwrap();
        assert!((fs - 1.0).abs() < 1e-12);
    }

    #[test]
    fn header_row_is_skipped() {
        let node = loaded(
            "header",
            "timestamp,value\n\
             2021-01-01 00:00:00.000,1.0\n\
             2021-01-01 00:00:00.500,2.0\n",
        );
        let fs = node.core().output("fs").unwrap().as_scalar().unwrap();
        assert!((fs - 2.0).abs() < 1e-12);
    }

    #[test]
    fn malformed_row_reports_its_number() {
        let path = scratch_file(
            "malformed",
            "2021-01-01 00:00:00.000,1.0\n\
             2021-01-01 00:00:01.000,not-a-number\n",
        );
        let mut node = DataLoaderNode::new("loader");
        node.set_parameter("filename", Value::Text(path.to_string_lossy().into_owned()))
            .unwrap();
        match node.execute().unwrap_err() {
            EngineError::Parse { row, .. } => assert_eq!(row, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_filename_is_a_missing_parameter() {
        let mut node = DataLoaderNode::new("loader");
        assert!(matches!(
            node.execute().unwrap_err(),
            EngineError::MissingParameter { .. }
        ));
    }

    #[test]
    fn absent_file_is_reported() {
        let mut node = DataLoaderNode::new("loader");
        node.set_parameter("filename", Value::Text("/nonexistent/readings.csv".to_string()))
            .unwrap();
        assert!(matches!(
            node.execute().unwrap_err(),
            EngineError::FileNotFound { .. }
        ));
    }

    #[test]
    fn duplicate_stamps_leave_the_median_alone() {
        let node = loaded(
            "dups",
            "2021-01-01 00:00:00.000,1.0\n\
             2021-01-01 00:00:01.000,2.0\n\
             2021-01-01 00:00:01.000,2.5\n\
             2021-01-01 00:00:02.000,3.0\n\
             2021-01-01 00:00:03.000,4.0\n\
             2021-01-01 00:00:04.000,5.0\n",
        );
        let fs = node.core().output("fs").unwrap().as_scalar().unwrap();
        assert!((fs - 1.0).abs() < 1e-12);
    }
}
