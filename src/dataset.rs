//! Transaction/target tables: CSV loading, per-client slicing and array
//! persistence.
//!
//! Persisted arrays are CSV with a `client_id` column followed by one column
//! per value, one row per client in target order.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{DataSourceConfig, SplitConfig};
use crate::split::{validation_split, DatasetSplit, SplitError};

const CLIENT_ID: &str = "client_id";
const TRANS_DATE: &str = "trans_date";
const SMALL_GROUP: &str = "small_group";
const AMOUNT_RUR: &str = "amount_rur";

// Tokens pandas reads as missing by default.
const MISSING_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub client_id: String,
    pub trans_date: i64,
    pub small_group: Option<i64>,
    pub amount_rur: f64,
}

impl Transaction {
    pub fn new(
        client_id: impl Into<String>,
        trans_date: i64,
        small_group: Option<i64>,
        amount_rur: f64,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            trans_date,
            small_group,
            amount_rur,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRow {
    pub client_id: String,
    pub labels: Vec<(String, String)>,
}

impl TargetRow {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            labels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub client_ids: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("required column '{column}' missing from {source_name}")]
    MissingColumn {
        column: &'static str,
        source_name: String,
    },
    #[error("failed to parse field {field} value '{value}' on line {line}")]
    ParseField {
        field: &'static str,
        value: String,
        line: u64,
    },
    #[error("negative trans_date {trans_date} on line {line}")]
    NegativeDate { trans_date: i64, line: u64 },
    #[error("row width {found} does not match header width {expected}")]
    RowWidth { found: usize, expected: usize },
    #[error("{rows} rows for {client_ids} client ids")]
    RowCount { rows: usize, client_ids: usize },
    #[error("invalid output path: {0}")]
    InvalidPath(PathBuf),
    #[error("split error: {0}")]
    Split(#[from] SplitError),
}

pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>, DatasetError> {
    let file = fs::File::open(path)?;
    let rows = read_transactions(file)?;
    info!(
        component = "dataset",
        event = "dataset.load.finish",
        table = "transactions",
        path = %path.display(),
        rows = rows.len()
    );
    Ok(rows)
}

pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let client_idx = column_index(&headers, CLIENT_ID, "transactions")?;
    let date_idx = column_index(&headers, TRANS_DATE, "transactions")?;
    let group_idx = column_index(&headers, SMALL_GROUP, "transactions")?;
    let amount_idx = column_index(&headers, AMOUNT_RUR, "transactions")?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record_line(&record);
        let trans_date = parse_i64(&record, date_idx, TRANS_DATE, line)?;
        if trans_date < 0 {
            return Err(DatasetError::NegativeDate { trans_date, line });
        }
        let raw_group = record.get(group_idx).unwrap_or_default();
        let small_group = if MISSING_TOKENS.contains(&raw_group) {
            None
        } else {
            Some(parse_i64(&record, group_idx, SMALL_GROUP, line)?)
        };
        rows.push(Transaction {
            client_id: record.get(client_idx).unwrap_or_default().to_string(),
            trans_date,
            small_group,
            amount_rur: parse_f64(&record, amount_idx, AMOUNT_RUR, line)?,
        });
    }

    Ok(rows)
}

pub fn load_targets(path: &Path) -> Result<Vec<TargetRow>, DatasetError> {
    let file = fs::File::open(path)?;
    let rows = read_targets(file)?;
    info!(
        component = "dataset",
        event = "dataset.load.finish",
        table = "targets",
        path = %path.display(),
        rows = rows.len()
    );
    Ok(rows)
}

pub fn read_targets<R: Read>(reader: R) -> Result<Vec<TargetRow>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let client_idx = column_index(&headers, CLIENT_ID, "targets")?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let labels = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(idx, _)| *idx != client_idx)
            .map(|(_, (name, value))| (name.to_string(), value.to_string()))
            .collect();
        rows.push(TargetRow {
            client_id: record.get(client_idx).unwrap_or_default().to_string(),
            labels,
        });
    }

    Ok(rows)
}

#[derive(Debug, Clone, Default)]
pub struct ClientIndex {
    by_client: HashMap<String, Vec<Transaction>>,
}

impl ClientIndex {
    pub fn new(transactions: &[Transaction]) -> Self {
        let mut by_client: HashMap<String, Vec<Transaction>> = HashMap::new();
        for txn in transactions {
            by_client
                .entry(txn.client_id.clone())
                .or_default()
                .push(txn.clone());
        }
        Self { by_client }
    }

    pub fn slice(&self, client_id: &str) -> &[Transaction] {
        self.by_client
            .get(client_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn client_count(&self) -> usize {
        self.by_client.len()
    }
}

pub fn write_matrix<T: Display>(
    path: &Path,
    columns: &[String],
    client_ids: &[String],
    rows: &[Vec<T>],
) -> Result<(), DatasetError> {
    if client_ids.len() != rows.len() {
        return Err(DatasetError::RowCount {
            rows: rows.len(),
            client_ids: client_ids.len(),
        });
    }
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = Vec::with_capacity(columns.len() + 1);
    header.push(CLIENT_ID.to_string());
    header.extend(columns.iter().cloned());
    writer.write_record(&header)?;

    for (client_id, row) in client_ids.iter().zip(rows) {
        if row.len() != columns.len() {
            return Err(DatasetError::RowWidth {
                found: row.len(),
                expected: columns.len(),
            });
        }
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(client_id.clone());
        record.extend(row.iter().map(ToString::to_string));
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| DatasetError::Io(err.into_error()))?;
    write_atomic(path, &bytes)?;

    info!(
        component = "dataset",
        event = "dataset.write.finish",
        path = %path.display(),
        rows = rows.len(),
        columns = columns.len()
    );
    Ok(())
}

pub fn load_matrix(path: &Path) -> Result<FeatureMatrix, DatasetError> {
    let file = fs::File::open(path)?;
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers = reader.headers()?.clone();
    if headers.get(0) != Some(CLIENT_ID) {
        return Err(DatasetError::MissingColumn {
            column: CLIENT_ID,
            source_name: path.display().to_string(),
        });
    }
    let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut client_ids = Vec::new();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record_line(&record);
        if record.len() != headers.len() {
            return Err(DatasetError::RowWidth {
                found: record.len(),
                expected: headers.len(),
            });
        }
        client_ids.push(record.get(0).unwrap_or_default().to_string());
        let row = (1..record.len())
            .map(|idx| parse_f64(&record, idx, "value", line))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }

    Ok(FeatureMatrix {
        columns,
        client_ids,
        rows,
    })
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DatasetError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| DatasetError::InvalidPath(path.to_path_buf()))?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct DataSource {
    pub transactions: Vec<Transaction>,
    pub targets: Vec<TargetRow>,
    features: BTreeMap<String, FeatureMatrix>,
}

impl DataSource {
    pub fn new(transactions: Vec<Transaction>, targets: Vec<TargetRow>) -> Self {
        Self {
            transactions,
            targets,
            features: BTreeMap::new(),
        }
    }

    pub fn read(cfg: &DataSourceConfig) -> Result<Self, DatasetError> {
        let transactions = load_transactions(&cfg.transactions_path)?;
        let targets = load_targets(&cfg.targets_path)?;
        Ok(Self::new(transactions, targets))
    }

    pub fn validation_split(&self, cfg: &SplitConfig) -> Result<DatasetSplit, DatasetError> {
        Ok(validation_split(&self.transactions, &self.targets, cfg)?)
    }

    pub fn add_features(&mut self, name: &str, path: &Path) -> Result<(), DatasetError> {
        let matrix = load_matrix(path)?;
        self.features.insert(name.to_string(), matrix);
        Ok(())
    }

    pub fn features(&self, name: &str) -> Option<&FeatureMatrix> {
        self.features.get(name)
    }

    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Dataset: transactions, rows: {}", self.transactions.len()),
            format!("Dataset: targets, rows: {}", self.targets.len()),
        ];
        for (name, matrix) in &self.features {
            let (rows, cols) = matrix.shape();
            lines.push(format!("Dataset: {name}, shape: ({rows}, {cols})"));
        }
        lines
    }
}

fn column_index(
    headers: &StringRecord,
    column: &'static str,
    source_name: &str,
) -> Result<usize, DatasetError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| DatasetError::MissingColumn {
            column,
            source_name: source_name.to_string(),
        })
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or_default()
}

fn parse_i64(
    record: &StringRecord,
    idx: usize,
    field: &'static str,
    line: u64,
) -> Result<i64, DatasetError> {
    let raw = record.get(idx).unwrap_or_default();
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(value);
    }
    // Exported tables sometimes carry integral codes as "5.0".
    match raw.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.is_finite() => Ok(value as i64),
        _ => Err(DatasetError::ParseField {
            field,
            value: raw.to_string(),
            line,
        }),
    }
}

fn parse_f64(
    record: &StringRecord,
    idx: usize,
    field: &'static str,
    line: u64,
) -> Result<f64, DatasetError> {
    let raw = record.get(idx).unwrap_or_default();
    raw.parse::<f64>().map_err(|_| DatasetError::ParseField {
        field,
        value: raw.to_string(),
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_transactions_with_missing_group_and_float_codes() {
        let csv = "client_id,trans_date,small_group,amount_rur\n\
                   7,0,5,100.5\n\
                   7,3,,20\n\
                   8,12,31.0,1e3\n";
        let rows = read_transactions(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], Transaction::new("7", 0, Some(5), 100.5));
        assert_eq!(rows[1].small_group, None);
        assert_eq!(rows[2].small_group, Some(31));
        assert_eq!(rows[2].amount_rur, 1000.0);
    }

    #[test]
    fn missing_group_tokens_read_as_none() {
        let csv = "client_id,trans_date,small_group,amount_rur\n\
                   7,0,NaN,1\n\
                   7,1,nan,1\n\
                   7,2,NA,1\n\
                   7,3,null,1\n\
                   7,4,4,1\n";
        let rows = read_transactions(csv.as_bytes()).unwrap();
        let groups: Vec<Option<i64>> = rows.iter().map(|r| r.small_group).collect();
        assert_eq!(groups, vec![None, None, None, None, Some(4)]);

        let err = read_transactions(
            "client_id,trans_date,small_group,amount_rur\n1,0,abc,5\n".as_bytes(),
        )
        .expect_err("non-numeric group");
        assert!(matches!(err, DatasetError::ParseField { field: "small_group", .. }));
    }

    #[test]
    fn rejects_missing_columns_and_bad_values() {
        let err = read_transactions("client_id,trans_date,amount_rur\n1,0,5\n".as_bytes())
            .expect_err("small_group is required");
        assert!(matches!(
            err,
            DatasetError::MissingColumn {
                column: "small_group",
                ..
            }
        ));

        let err = read_transactions(
            "client_id,trans_date,small_group,amount_rur\n1,x,1,5\n".as_bytes(),
        )
        .expect_err("bad date");
        assert!(matches!(
            err,
            DatasetError::ParseField {
                field: "trans_date",
                line: 2,
                ..
            }
        ));

        let err = read_transactions(
            "client_id,trans_date,small_group,amount_rur\n1,-4,1,5\n".as_bytes(),
        )
        .expect_err("negative date");
        assert!(matches!(err, DatasetError::NegativeDate { trans_date: -4, .. }));
    }

    #[test]
    fn targets_keep_label_columns_in_order() {
        let csv = "client_id,bins,weight\n10,2,0.5\n11,0,1\n";
        let rows = read_targets(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].client_id, "10");
        assert_eq!(
            rows[0].labels,
            vec![
                ("bins".to_string(), "2".to_string()),
                ("weight".to_string(), "0.5".to_string())
            ]
        );
    }

    #[test]
    fn client_index_returns_empty_slice_for_unknown_client() {
        let txns = vec![
            Transaction::new("a", 1, Some(1), 1.0),
            Transaction::new("b", 2, Some(2), 2.0),
            Transaction::new("a", 0, None, 3.0),
        ];
        let index = ClientIndex::new(&txns);
        assert_eq!(index.client_count(), 2);
        assert_eq!(index.slice("a").len(), 2);
        assert_eq!(index.slice("a")[1].amount_rur, 3.0);
        assert!(index.slice("zzz").is_empty());
    }
}
