use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;

/// Asserts the number of bytes each header writes with its default value
#[macro_export]
macro_rules! structure_size_tests {
    ($($typename:path = $size:expr),*) => {
    };
}

/// Reads a fixed-size, zero-padded name field
pub fn name_from_bytes(bytes: &[u8]) -> String {
    let null_pos = bytes.iter().position(|&p| p == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[0..null_pos]).to_string()
}

/// Writes a name into a fixed-size field, truncating to leave room for the terminator
pub fn name_to_bytes<const N: usize>(name: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let len = name.len().min(N - 1);
    out[..len].copy_from_slice(&name.as_bytes()[..len]);
    out
}

/// Number of bytes left between the current position and the end of the stream
pub fn remaining_len<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let pos = reader.stream_position()?;
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(pos))?;
    Ok(end.saturating_sub(pos))
}

/// Reads exactly `len` bytes into a new buffer
pub fn read_bytes<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if data.len() != len {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(data)
}
