use std::io::{Read, Write};

use bincode::Options;
use cs_core::{ErrorKind, ScriptError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Upper bound for a single payload frame.
const MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

fn bincode_options() -> impl bincode::Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

fn write_error(error: impl std::fmt::Display) -> ScriptError {
    ScriptError::new(ErrorKind::SaveWrite, error.to_string())
}

fn corrupt(error: impl std::fmt::Display) -> ScriptError {
    ScriptError::new(ErrorKind::CorruptSave, error.to_string())
}

/// Little-endian `u32` scalars and length-framed bincode payloads.
pub struct RecordWriter<W: Write> {
    inner: W,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), ScriptError> {
        self.inner.write_all(&value.to_le_bytes()).map_err(write_error)
    }

    pub fn write_len(&mut self, len: usize) -> Result<(), ScriptError> {
        let len = u32::try_from(len).map_err(|_| write_error("record count too large"))?;
        self.write_u32(len)
    }

    pub fn write_payload<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ScriptError> {
        let payload = bincode_options().serialize(value).map_err(write_error)?;
        self.write_len(payload.len())?;
        self.inner.write_all(&payload).map_err(write_error)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn flush(&mut self) -> Result<(), ScriptError> {
        self.inner.flush().map_err(write_error)
    }
}

pub struct RecordReader<R: Read> {
    inner: R,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn read_u32(&mut self) -> Result<u32, ScriptError> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf).map_err(corrupt)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_payload<T: DeserializeOwned>(&mut self) -> Result<T, ScriptError> {
        let len = self.read_u32()? as usize;
        if len > MAX_PAYLOAD_LEN {
            return Err(corrupt(format!("payload of {} bytes exceeds limit", len)));
        }
        let mut payload = vec![0u8; len];
        self.inner.read_exact(&mut payload).map_err(corrupt)?;
        bincode_options().deserialize(&payload).map_err(corrupt)
    }
}

#[cfg(test)]
mod persist_tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn scalars_and_payloads_round_trip() {
        let mut vars = BTreeMap::new();
        vars.insert("hp".to_string(), "10".to_string());

        let mut writer = RecordWriter::new(Vec::new());
        writer.write_u32(7).expect("u32");
        writer.write_payload(&vars).expect("payload");
        let bytes = writer.into_inner();
        assert_eq!(&bytes[..4], &7u32.to_le_bytes());

        let mut reader = RecordReader::new(bytes.as_slice());
        assert_eq!(reader.read_u32().expect("u32"), 7);
        let restored: BTreeMap<String, String> = reader.read_payload().expect("payload");
        assert_eq!(restored, vars);
    }

    #[test]
    fn truncated_stream_is_corrupt() {
        let mut reader = RecordReader::new(&[1u8, 0][..]);
        let error = reader.read_u32().expect_err("short");
        assert_eq!(error.kind, ErrorKind::CorruptSave);
    }

    #[test]
    fn oversized_frame_is_rejected_before_allocation() {
        let bytes = u32::MAX.to_le_bytes();
        let mut reader = RecordReader::new(&bytes[..]);
        let error = reader.read_payload::<String>().expect_err("huge");
        assert_eq!(error.kind, ErrorKind::CorruptSave);
    }
}
