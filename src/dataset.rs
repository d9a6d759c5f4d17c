//! CSV loading with header and per-column type inference.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("no data rows")]
    Empty,
    #[error("no feature columns besides the label")]
    NoFeatureColumns,
    #[error("column not found: {0}")]
    MissingColumn(String),
    #[error("column {0} is not numeric")]
    NotNumeric(String),
    #[error("column {0} is not categorical")]
    NotCategorical(String),
    #[error("column {0} has missing values where none are allowed")]
    MissingValues(String),
    #[error("column {column} has an unparseable cell {value:?}")]
    BadCell { column: String, value: String },
}

/// Column type produced by schema inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    Str,
}

/// Typed column storage.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Int(Vec<i64>),
    /// Missing cells are `NaN`.
    Float(Vec<f64>),
    /// Missing cells are empty strings.
    Str(Vec<String>),
}

/// Named, typed column.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn column_type(&self) -> ColumnType {
        match self.data {
            ColumnData::Int(_) => ColumnType::Int,
            ColumnData::Float(_) => ColumnType::Float,
            ColumnData::Str(_) => ColumnType::Str,
        }
    }
}

/// Schema field (name + inferred type).
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: ColumnType,
}

/// Inferred schema of a loaded dataframe.
#[derive(Debug, Clone)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Names of numeric fields, excluding `label`, in column order.
    pub fn numeric_feature_names(&self, label: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|field| field.name != label && field.ty != ColumnType::Str)
            .map(|field| field.name.as_str())
            .collect()
    }
}

/// In-memory tabular dataset (rows x typed columns).
#[derive(Debug, Clone)]
pub struct DataFrame {
    columns: Vec<Column>,
    n_rows: usize,
}

impl DataFrame {
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn schema(&self) -> Schema {
        Schema {
            fields: self
                .columns
                .iter()
                .map(|column| Field {
                    name: column.name.clone(),
                    ty: column.column_type(),
                })
                .collect(),
        }
    }

    /// Materialize the numeric feature matrix, excluding the label column.
    ///
    /// String columns other than the label are rejected; the pipeline stages
    /// operate on numeric rows only.
    pub fn feature_matrix(&self, label: &str) -> Result<Vec<Vec<f64>>, DatasetError> {
        if self.column(label).is_none() {
            return Err(DatasetError::MissingColumn(label.to_string()));
        }
        let mut features: Vec<&Column> = Vec::new();
        for column in &self.columns {
            if column.name == label {
                continue;
            }
            if column.column_type() == ColumnType::Str {
                return Err(DatasetError::NotNumeric(column.name.clone()));
            }
            features.push(column);
        }
        if features.is_empty() {
            return Err(DatasetError::NoFeatureColumns);
        }

        let mut rows = vec![Vec::with_capacity(features.len()); self.n_rows];
        for column in features {
            match &column.data {
                ColumnData::Int(values) => {
                    for (row, &value) in rows.iter_mut().zip(values.iter()) {
                        row.push(value as f64);
                    }
                }
                ColumnData::Float(values) => {
                    for (row, &value) in rows.iter_mut().zip(values.iter()) {
                        row.push(value);
                    }
                }
                ColumnData::Str(_) => unreachable!("string columns filtered above"),
            }
        }
        Ok(rows)
    }

    /// Class list (sorted, deduplicated) and per-row class indices for a
    /// categorical label column.
    pub fn class_labels(&self, label: &str) -> Result<(Vec<String>, Vec<usize>), DatasetError> {
        let column = self
            .column(label)
            .ok_or_else(|| DatasetError::MissingColumn(label.to_string()))?;
        let values: Vec<String> = match &column.data {
            ColumnData::Int(values) => values.iter().map(|value| value.to_string()).collect(),
            ColumnData::Str(values) => {
                if values.iter().any(|value| value.is_empty()) {
                    return Err(DatasetError::MissingValues(label.to_string()));
                }
                values.clone()
            }
            ColumnData::Float(_) => return Err(DatasetError::NotCategorical(label.to_string())),
        };

        let classes: Vec<String> = values
            .iter()
            .cloned()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        let indices = values
            .iter()
            .map(|value| {
                classes
                    .binary_search(value)
                    .expect("every value was inserted into the class set")
            })
            .collect();
        Ok((classes, indices))
    }

    /// Per-row numeric label values for a regression target.
    pub fn numeric_labels(&self, label: &str) -> Result<Vec<f64>, DatasetError> {
        let column = self
            .column(label)
            .ok_or_else(|| DatasetError::MissingColumn(label.to_string()))?;
        match &column.data {
            ColumnData::Int(values) => Ok(values.iter().map(|&value| value as f64).collect()),
            ColumnData::Float(values) => {
                if values.iter().any(|value| value.is_nan()) {
                    return Err(DatasetError::MissingValues(label.to_string()));
                }
                Ok(values.clone())
            }
            ColumnData::Str(_) => Err(DatasetError::NotNumeric(label.to_string())),
        }
    }
}

/// Load a delimited file with a header row, inferring column types.
///
/// Each column gets the widest type any of its values needs: integer, then
/// float, then string. Empty cells are missing values; an integer column
/// with missing cells is widened to float so `NaN` can represent them.
pub fn load_csv(path: &Path) -> Result<DataFrame, DatasetError> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?);
    }
    if records.is_empty() {
        return Err(DatasetError::Empty);
    }

    let columns = headers
        .into_iter()
        .enumerate()
        .map(|(idx, name)| build_column(name, idx, &records))
        .collect::<Result<_, _>>()?;
    Ok(DataFrame {
        columns,
        n_rows: records.len(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Missing,
    Int,
    Float,
    Str,
}

fn classify(cell: &str) -> CellKind {
    let cell = cell.trim();
    if cell.is_empty() {
        CellKind::Missing
    } else if cell.parse::<i64>().is_ok() {
        CellKind::Int
    } else if cell.parse::<f64>().is_ok() {
        CellKind::Float
    } else {
        CellKind::Str
    }
}

fn build_column(
    name: String,
    idx: usize,
    records: &[csv::StringRecord],
) -> Result<Column, DatasetError> {
    let mut widest = CellKind::Int;
    let mut has_missing = false;
    for record in records {
        match classify(record.get(idx).unwrap_or("")) {
            CellKind::Missing => has_missing = true,
            CellKind::Int => {}
            CellKind::Float => {
                if widest == CellKind::Int {
                    widest = CellKind::Float;
                }
            }
            CellKind::Str => widest = CellKind::Str,
        }
    }
    if widest == CellKind::Int && has_missing {
        widest = CellKind::Float;
    }

    let cells = records
        .iter()
        .map(|record| record.get(idx).unwrap_or("").trim());
    let bad_cell = |cell: &str| DatasetError::BadCell {
        column: name.clone(),
        value: cell.to_string(),
    };
    let data = match widest {
        CellKind::Int => {
            let mut values = Vec::with_capacity(records.len());
            for cell in cells {
                values.push(cell.parse().map_err(|_| bad_cell(cell))?);
            }
            ColumnData::Int(values)
        }
        CellKind::Float => {
            let mut values = Vec::with_capacity(records.len());
            for cell in cells {
                if cell.is_empty() {
                    values.push(f64::NAN);
                } else {
                    values.push(cell.parse().map_err(|_| bad_cell(cell))?);
                }
            }
            ColumnData::Float(values)
        }
        _ => ColumnData::Str(cells.map(str::to_string).collect()),
    };
    Ok(Column { name, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_csv(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn infers_widest_type_per_column() {
        let (_dir, path) = write_csv("a,b,c\n1,1.5,x\n2,2,y\n3,0.25,3\n");
        let df = load_csv(&path).unwrap();
        let schema = df.schema();
        assert_eq!(schema.field("a").unwrap().ty, ColumnType::Int);
        assert_eq!(schema.field("b").unwrap().ty, ColumnType::Float);
        assert_eq!(schema.field("c").unwrap().ty, ColumnType::Str);
    }

    #[test]
    fn missing_cells_widen_int_to_float() {
        let (_dir, path) = write_csv("a,b\n1,x\n,y\n3,z\n");
        let df = load_csv(&path).unwrap();
        assert_eq!(df.schema().field("a").unwrap().ty, ColumnType::Float);
        match &df.column("a").unwrap().data {
            ColumnData::Float(values) => {
                assert_eq!(values.len(), 3);
                assert!(values[1].is_nan());
            }
            other => panic!("expected float column, got {other:?}"),
        }
    }

    #[test]
    fn padded_numeric_cells_parse_as_classified() {
        let (_dir, path) = write_csv("a,b\n 1 , 2.5 \n2, 3.5\n");
        let df = load_csv(&path).unwrap();
        assert_eq!(df.schema().field("a").unwrap().ty, ColumnType::Int);
        assert_eq!(df.schema().field("b").unwrap().ty, ColumnType::Float);
        match &df.column("b").unwrap().data {
            ColumnData::Float(values) => assert_eq!(values, &vec![2.5, 3.5]),
            other => panic!("expected float column, got {other:?}"),
        }
    }

    #[test]
    fn feature_matrix_excludes_label_and_keeps_order() {
        let (_dir, path) = write_csv("x1,label,x2\n1,a,10\n2,b,20\n");
        let df = load_csv(&path).unwrap();
        let rows = df.feature_matrix("label").unwrap();
        assert_eq!(rows, vec![vec![1.0, 10.0], vec![2.0, 20.0]]);
    }

    #[test]
    fn string_feature_column_is_rejected() {
        let (_dir, path) = write_csv("x1,note,label\n1,hello,a\n2,world,b\n");
        let df = load_csv(&path).unwrap();
        match df.feature_matrix("label") {
            Err(DatasetError::NotNumeric(column)) => assert_eq!(column, "note"),
            other => panic!("expected NotNumeric, got {other:?}"),
        }
    }

    #[test]
    fn class_labels_are_sorted_and_indexed() {
        let (_dir, path) = write_csv("x,label\n1,snare\n2,kick\n3,snare\n");
        let df = load_csv(&path).unwrap();
        let (classes, indices) = df.class_labels("label").unwrap();
        assert_eq!(classes, vec!["kick".to_string(), "snare".to_string()]);
        assert_eq!(indices, vec![1, 0, 1]);
    }

    #[test]
    fn ragged_rows_fail() {
        let (_dir, path) = write_csv("a,b\n1,2\n3\n");
        assert!(matches!(load_csv(&path), Err(DatasetError::Csv(_))));
    }

    #[test]
    fn header_only_file_is_empty() {
        let (_dir, path) = write_csv("a,b\n");
        assert!(matches!(load_csv(&path), Err(DatasetError::Empty)));
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let dir = tempdir().unwrap();
        let err = load_csv(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, DatasetError::Io(_)));
    }
}
