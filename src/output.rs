use std::fs::{File, OpenOptions};
use std::marker::PhantomData;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::error::SinkError;
use crate::runner::RecordSink;

/// Appends serialized records to a CSV file, flushing after every row so a
/// crash never loses finished work. The header row is written only when the
/// file starts out empty.
pub struct CsvSink<R> {
    writer: csv::Writer<File>,
    _record: PhantomData<fn(&R)>,
}

impl<R: Serialize> CsvSink<R> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let is_new = path.metadata().map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let writer = csv::WriterBuilder::new().has_headers(is_new).from_writer(file);
        info!("Writing records to {:?}{}", path, if is_new { "" } else { " (appending)" });
        Ok(CsvSink {
            writer,
            _record: PhantomData,
        })
    }
}

impl<R: Serialize> RecordSink<R> for CsvSink<R> {
    fn accept(&mut self, record: &R) -> Result<(), SinkError> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        Ok(())
    }
}
