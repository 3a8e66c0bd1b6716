//! Dataset loading for symbolic regression: a CSV file
//! whose last column is the regression target and the rest are features,
//! same convention as the single-output CSV loader this crate grew out of.

use csv::ReaderBuilder;

use crate::error::{CgpError, CgpResult};

pub struct Dataset {
    pub points: Vec<Vec<f64>>,
    pub labels: Vec<Vec<f64>>,
}

impl Dataset {
    pub fn n_features(&self) -> usize {
        self.points.first().map(|p| p.len()).unwrap_or(0)
    }

    pub fn n_outputs(&self) -> usize {
        self.labels.first().map(|l| l.len()).unwrap_or(0)
    }
}

/// Reads a headerless, comma-separated CSV at `path`; every row's last
/// column becomes the (single) label, the rest become features.
pub fn read_csv(path: &str) -> CgpResult<Dataset> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| CgpError::InvalidArgument(format!("could not open dataset {path}: {e}")))?;

    let mut points = Vec::new();
    let mut labels = Vec::new();
    for result in rdr.records() {
        let record =
            result.map_err(|e| CgpError::InvalidArgument(format!("malformed CSV row: {e}")))?;
        let mut row: Vec<f64> = Vec::with_capacity(record.len());
        for field in record.iter() {
            let v: f64 = field.trim().parse().map_err(|_| {
                CgpError::InvalidArgument(format!("could not parse '{field}' as a number"))
            })?;
            row.push(v);
        }
        let label = row.pop().ok_or_else(|| {
            CgpError::InvalidArgument("dataset rows must have at least one column".into())
        })?;
        points.push(row);
        labels.push(vec![label]);
    }
    if points.is_empty() {
        return Err(CgpError::InvalidArgument("dataset is empty".into()));
    }
    let n_features = points[0].len();
    if !points.iter().all(|p| p.len() == n_features) {
        return Err(CgpError::InvalidArgument(
            "all dataset rows must have the same number of columns".into(),
        ));
    }
    Ok(Dataset { points, labels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_csv(contents: &str) -> std::path::PathBuf {
        let checksum: u32 = contents.bytes().map(|b| b as u32).sum();
        let mut path = std::env::temp_dir();
        path.push(format!(
            "cgp_engine_dataset_test_{}_{}.csv",
            std::process::id(),
            checksum
        ));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_features_and_trailing_label() {
        let path = write_temp_csv("1.0,2.0,3.0\n4.0,5.0,6.0\n");
        let ds = read_csv(path.to_str().unwrap()).unwrap();
        assert_eq!(ds.points, vec![vec![1.0, 2.0], vec![4.0, 5.0]]);
        assert_eq!(ds.labels, vec![vec![3.0], vec![6.0]]);
        assert_eq!(ds.n_features(), 2);
        assert_eq!(ds.n_outputs(), 1);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_ragged_rows() {
        let path = write_temp_csv("1.0,2.0\n3.0,4.0,5.0\n");
        assert!(read_csv(path.to_str().unwrap()).is_err());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn rejects_missing_file() {
        assert!(read_csv("/nonexistent/path/does-not-exist.csv").is_err());
    }
}
