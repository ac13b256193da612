use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use fs_err::File;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Pretty-prints something as JSON, with a trailing newline.
pub fn to_json<T: Serialize>(obj: &T) -> Result<String> {
    let mut s = serde_json::to_string_pretty(obj)?;
    s.push('\n');
    Ok(s)
}

fn create_parent_dir(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Writes an object as pretty JSON, creating any parent directories. An existing file is
/// overwritten.
pub fn write_json<T: Serialize>(path: &str, obj: &T) -> Result<()> {
    create_parent_dir(path)?;
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(to_json(obj)?.as_bytes())?;
    file.flush()?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let bytes = slurp_file(path)?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {} as JSON", path))
}

/// Writes an object in the compact bincode format, creating any parent directories.
pub fn write_binary<T: Serialize>(path: &str, obj: &T) -> Result<()> {
    create_parent_dir(path)?;
    let mut file = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut file, obj).with_context(|| format!("encoding {}", path))?;
    file.flush()?;
    Ok(())
}

pub fn read_binary<T: DeserializeOwned>(path: &str) -> Result<T> {
    let file = BufReader::new(File::open(path)?);
    bincode::deserialize_from(file).with_context(|| format!("decoding {}", path))
}

pub fn slurp_file(path: &str) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

pub fn file_exists<I: AsRef<str>>(path: I) -> bool {
    Path::new(path.as_ref()).exists()
}
