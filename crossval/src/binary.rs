//! Raw float32 tensor files.
//!
//! The format is the bare element data in row-major order, four
//! little-endian bytes per `f32`, with no header. Shapes travel out of band.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::{CrossvalError, Result};

const ELEM: usize = std::mem::size_of::<f32>();

/// Write `data` to `path`, creating parent directories as needed.
pub fn write_matrix_binary(path: impl AsRef<Path>, data: &[f32]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for value in data {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;

    log::debug!("wrote {} elements to {}", data.len(), path.display());
    Ok(())
}

/// Read every element of a raw float32 file.
pub fn read_tensor_binary(path: impl AsRef<Path>) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    if bytes.len() % ELEM != 0 {
        return Err(CrossvalError::Format(format!(
            "{}: {} bytes is not a whole number of f32 values",
            path.display(),
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(ELEM)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Read a raw float32 file that must hold exactly `count` elements.
pub fn read_tensor_binary_exact(path: impl AsRef<Path>, count: usize) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let data = read_tensor_binary(path)?;
    if data.len() != count {
        return Err(CrossvalError::Format(format!(
            "{}: expected {} elements, found {}",
            path.display(),
            count,
            data.len()
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_is_headerless_little_endian() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("two.bin");
        write_matrix_binary(&path, &[1.0, -2.5]).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..], &(-2.5f32).to_le_bytes());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output_files").join("nested").join("c_scalar.bin");
        write_matrix_binary(&path, &[0.5; 3]).unwrap();
        assert_eq!(read_tensor_binary(&path).unwrap(), vec![0.5; 3]);
    }

    #[test]
    fn truncated_file_is_a_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.bin");
        fs::write(&path, [0u8; 7]).unwrap();
        assert!(matches!(read_tensor_binary(&path), Err(CrossvalError::Format(_))));
    }

    #[test]
    fn exact_read_checks_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("four.bin");
        write_matrix_binary(&path, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(read_tensor_binary_exact(&path, 4).unwrap().len(), 4);
        let err = read_tensor_binary_exact(&path, 5).unwrap_err();
        assert!(err.to_string().contains("expected 5 elements, found 4"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = read_tensor_binary(dir.path().join("nope.bin"));
        assert!(matches!(result, Err(CrossvalError::Io(_))));
    }
}
