use crate::error::CliError;
use serde::Serialize;
use std::path::Path;

pub async fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => tokio::fs::write(path, json).await?,
        None => println!("{json}"),
    }
    Ok(())
}
