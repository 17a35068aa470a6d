use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use seedforge_core::{DataModel, Model, Row, Value};

use crate::errors::GenerationError;
use crate::store::Store;

/// Write rows of `model` as CSV, one column per declared scalar field.
///
/// Missing fields and nulls become empty cells. Returns the number of bytes
/// written.
pub fn write_model_csv(path: &Path, model: &Model, rows: &[&Row]) -> Result<u64, csv::Error> {
    let writer = BufWriter::new(File::create(path).map_err(csv::Error::from)?);
    let counting = CountingWriter::new(writer);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(counting);

    let columns: Vec<&str> = model
        .grouped()
        .scalars
        .iter()
        .map(|field| field.name.as_str())
        .collect();
    writer.write_record(&columns)?;

    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|column| row.get(*column).map(csv_cell).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(counting.bytes_written())
}

/// Write one `<Model>.csv` per model of `store` into `dir`.
pub fn write_store_csv(
    dir: &Path,
    data_model: &DataModel,
    store: &Store,
) -> Result<u64, GenerationError> {
    std::fs::create_dir_all(dir)?;
    let mut bytes = 0_u64;
    for name in store.models() {
        let model = data_model.model(name)?;
        let rows = store.completed(name);
        bytes += write_model_csv(&dir.join(format!("{name}.csv")), model, &rows)?;
    }
    Ok(bytes)
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.key(),
    }
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
