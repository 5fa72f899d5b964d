use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::spreadsheet::MemoryWorkbook;

/// Write `workbook` as gzip-compressed bincode.
pub fn write_workbook<W: Write>(workbook: &MemoryWorkbook, out: W) -> io::Result<()> {
    let encoder = GzEncoder::new(out, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serialize_into(&mut writer, workbook).map_err(io::Error::other)?;

    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    encoder.finish()?;
    Ok(())
}

pub fn read_workbook<R: Read>(input: R) -> io::Result<MemoryWorkbook> {
    let decoder = GzDecoder::new(input);
    let mut reader = BufReader::new(decoder);

    deserialize_from(&mut reader).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Save the workbook snapshot to `path`, replacing any previous one.
pub fn save_workbook(workbook: &MemoryWorkbook, path: impl AsRef<Path>) -> io::Result<()> {
    let file = File::create(path)?;
    write_workbook(workbook, file)
}

pub fn load_workbook(path: impl AsRef<Path>) -> io::Result<MemoryWorkbook> {
    let file = File::open(path)?;
    read_workbook(file)
}
