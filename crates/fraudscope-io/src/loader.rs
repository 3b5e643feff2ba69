use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use fraudscope_core::{FraudError, FraudResult, Label, RawDataset, RawRecord, Schema};
use tracing::{debug, info, instrument};

/// Field spellings treated as a missing value.
const MISSING_TOKENS: [&str; 6] = ["", "NA", "NaN", "nan", "null", "NULL"];

/// Reads delimited transaction files into a [`RawDataset`].
#[derive(Debug, Clone)]
pub struct TransactionReader {
    schema: Schema,
    delimiter: u8,
    require_label: bool,
}

/// Column positions of the schema within one file's header.
struct ColumnMap {
    inputs: Vec<usize>,
    label: Option<usize>,
}

impl TransactionReader {
    pub fn new(schema: Schema) -> Self {
        TransactionReader {
            schema,
            delimiter: b',',
            require_label: true,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Accept files without the label column (scoring input). Records then
    /// carry no label.
    pub fn with_optional_label(mut self) -> Self {
        self.require_label = false;
        self
    }

    /// Open and read `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(&self, path: impl AsRef<Path>) -> FraudResult<RawDataset> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| FraudError::Load {
            path: path.to_path_buf(),
            line: None,
            reason: e.to_string(),
        })?;
        let data = self.read_from(file, path)?;
        info!(rows = data.len(), "loaded transactions");
        Ok(data)
    }

    /// Read from any byte source; `source` only labels errors.
    pub fn read_from<R: Read>(&self, reader: R, source: &Path) -> FraudResult<RawDataset> {
        let fail = |line: Option<u64>, reason: String| FraudError::Load {
            path: source.to_path_buf(),
            line,
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| fail(Some(1), e.to_string()))?
            .clone();
        let columns = self.map_columns(&headers).map_err(|reason| fail(Some(1), reason))?;
        debug!(columns = headers.len(), "header matches schema");

        let mut records = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| {
                let line = e.position().map(|p| p.line());
                fail(line, e.to_string())
            })?;
            let line = record.position().map(|p| p.line());

            let mut values = Vec::with_capacity(columns.inputs.len());
            for &pos in &columns.inputs {
                let field = record.get(pos).unwrap_or("");
                let value = parse_value(field).map_err(|reason| {
                    fail(line, format!("column `{}`: {reason}", &headers[pos]))
                })?;
                values.push(value);
            }

            let label_field = columns.label.and_then(|pos| record.get(pos)).unwrap_or("");
            let label = if is_missing(label_field) {
                None
            } else {
                Some(Label::parse(label_field).ok_or_else(|| {
                    fail(
                        line,
                        format!(
                            "label `{label_field}` in column `{}` is not 0 or 1",
                            self.schema.label_column
                        ),
                    )
                })?)
            };

            records.push(RawRecord { values, label });
        }

        Ok(RawDataset {
            schema: self.schema.clone(),
            records,
        })
    }

    fn map_columns(&self, headers: &csv::StringRecord) -> Result<ColumnMap, String> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (i, name) in headers.iter().enumerate() {
            if positions.insert(name, i).is_some() {
                return Err(format!("duplicate column `{name}`"));
            }
        }

        let input_columns = self.schema.input_columns();
        let mut inputs = Vec::with_capacity(input_columns.len());
        for name in &input_columns {
            let pos = positions
                .get(name.as_str())
                .ok_or_else(|| format!("missing column `{name}`"))?;
            inputs.push(*pos);
        }
        let label = positions.get(self.schema.label_column.as_str()).copied();
        if label.is_none() && self.require_label {
            return Err(format!("missing label column `{}`", self.schema.label_column));
        }

        for name in headers.iter() {
            let known = input_columns.iter().any(|c| c == name)
                || name == self.schema.label_column
                || self.schema.ignored_columns.iter().any(|c| c == name);
            if !known {
                return Err(format!("unexpected column `{name}`"));
            }
        }

        Ok(ColumnMap { inputs, label })
    }
}

fn is_missing(field: &str) -> bool {
    MISSING_TOKENS.contains(&field.trim())
}

fn parse_value(field: &str) -> Result<Option<f64>, String> {
    if is_missing(field) {
        return Ok(None);
    }
    let v: f64 = field
        .trim()
        .parse()
        .map_err(|_| format!("`{field}` is not a number"))?;
    if !v.is_finite() {
        return Err(format!("`{field}` is not a finite number"));
    }
    Ok(Some(v))
}

/// Load a transaction file with the default `,` delimiter.
pub fn load_transactions(path: impl AsRef<Path>, schema: &Schema) -> FraudResult<RawDataset> {
    TransactionReader::new(schema.clone()).load(path)
}

/// Read transactions from an in-memory or streamed source.
pub fn read_transactions<R: Read>(reader: R, schema: &Schema) -> FraudResult<RawDataset> {
    TransactionReader::new(schema.clone()).read_from(reader, &PathBuf::from("<reader>"))
}
