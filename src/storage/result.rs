//! Query result sets
//!
//! A result set carries the decoded batch together with its canonical Arrow
//! IPC stream encoding. The encoding is what the result cache stores, so a
//! cached answer is byte-identical to the one first computed.

use crate::error::Result;
use arrow::compute::concat_batches;
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use bytes::Bytes;
use std::io::Cursor;

/// Rows returned by a query
#[derive(Debug, Clone)]
pub struct ResultSet {
    batch: RecordBatch,
    bytes: Bytes,
}

impl ResultSet {
    /// Encode a batch
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        let mut buf = Vec::new();
        {
            let mut writer = StreamWriter::try_new(&mut buf, &batch.schema())?;
            writer.write(&batch)?;
            writer.finish()?;
        }

        Ok(Self {
            batch,
            bytes: Bytes::from(buf),
        })
    }

    /// Decode bytes produced by [`ResultSet::from_batch`]
    pub fn from_bytes(bytes: Bytes) -> Result<Self> {
        let reader = StreamReader::try_new(Cursor::new(bytes.clone()), None)?;
        let schema = reader.schema();
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        let batch = concat_batches(&schema, &batches)?;

        Ok(Self { batch, bytes })
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// The canonical encoding
    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Size of the encoded result
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Render as an ASCII table
    pub fn to_pretty_string(&self) -> Result<String> {
        Ok(pretty_format_batches(std::slice::from_ref(&self.batch))?.to_string())
    }
}

impl PartialEq for ResultSet {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}
