use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// Loads JSON data from `path`.  A missing file is not an error.
pub fn load_json<D, P>(path: P) -> Result<Option<D>, Error>
where
    D: DeserializeOwned,
    P: AsRef<Path>,
    P: std::fmt::Debug,
{
    let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(?path, "No data file");
            return Ok(None);
        }
        Err(err) => {
            tracing::error!(%err, ?path, "Failed to read data file");
            return Err(err.into());
        }
    };
    match serde_json::from_slice(&data) {
        Ok(data) => Ok(Some(data)),
        Err(err) => {
            tracing::error!(%err, ?path, "Failed to parse data file");
            Err(err.into())
        }
    }
}

pub fn save_json<D, P>(data: D, path: P) -> Result<(), Error>
where
    D: Serialize,
    P: AsRef<Path>,
    P: std::fmt::Debug,
{
    // Serialize in advance in order to improve error traceability.
    let buf = match serde_json::to_vec(&data) {
        Ok(buf) => buf,
        Err(err) => {
            tracing::error!(%err, ?path, "Failed to serialize data");
            return Err(err.into());
        }
    };

    save_data(&buf, path)
}

pub fn save_data<P>(data: &[u8], path: P) -> Result<(), Error>
where
    P: AsRef<Path>,
    P: std::fmt::Debug,
{
    if let Some(dir) = path.as_ref().parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir).inspect_err(|err| {
                tracing::error!(%err, ?path, "Failed to create the parent directory");
            })?;
        }
    }

    // Write the data to a temporal file called <path>.new, then rename it to
    // the original so that readers never see a partially written file.
    let new_path = append_extension(&path, "new");
    {
        let mut file = std::fs::File::create(&new_path).inspect_err(|err| {
            tracing::error!(%err, ?path, "Failed to create <path>.new file");
        })?;
        file.write_all(data).inspect_err(|err| {
            tracing::error!(%err, ?path, "Failed to write data to <path>.new");
        })?;
        file.sync_all().inspect_err(|err| {
            tracing::error!(%err, ?path, "Failed to sync <path>.new file to disk");
        })?;
        tracing::debug!(nwritten = data.len(), ?path, "Wrote data to <path>.new file");
    }

    std::fs::rename(&new_path, &path).inspect_err(|err| {
        tracing::error!(%err, ?path, "Failed to rename <path>.new to <path>");
    })?;
    tracing::debug!(?path, "Saved data");

    Ok(())
}

fn append_extension<P, S>(path: P, ext: S) -> PathBuf
where
    P: AsRef<Path>,
    S: AsRef<OsStr>,
{
    let path = path.as_ref();
    match path.extension() {
        Some(last_ext) => {
            let mut last_ext = last_ext.to_os_string();
            last_ext.push(".");
            last_ext.push(ext);
            path.with_extension(last_ext)
        }
        None => path.with_extension(ext),
    }
}
