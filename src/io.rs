use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use polars::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

const MISSING_TOKENS: [&str; 4] = ["", "NA", "NaN", "."];

pub fn read_table(path: &Path) -> Result<DataFrame> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    if ext == "gz" || ext == "bz2" {
        let tmp = decompress_to_temp(path, &ext)?;
        return read_table_plain(tmp.path())
            .with_context(|| format!("read {}", path.display()));
    }

    read_table_plain(path)
}

fn read_table_plain(path: &Path) -> Result<DataFrame> {
    let delimiter = detect_delimiter(path)?;
    if delimiter == b' ' {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        return read_table_whitespace(BufReader::new(file));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(delimiter)
                .with_null_values(Some(NullValues::AllColumns(
                    MISSING_TOKENS.iter().map(|t| (*t).into()).collect(),
                )))
                .with_missing_is_null(true),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("read {}", path.display()))?;
    trim_string_columns(df)
}

fn read_table_whitespace<R: Read>(reader: R) -> Result<DataFrame> {
    let mut reader = BufReader::new(reader);
    let mut header_line = String::new();
    reader.read_line(&mut header_line)?;
    if header_line.trim().is_empty() {
        return Err(anyhow::anyhow!("empty file"));
    }
    let headers: Vec<String> = header_line.split_whitespace().map(str::to_string).collect();
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        for (i, col) in columns.iter_mut().enumerate() {
            col.push(normalize_missing_token(parts.get(i).copied().unwrap_or("")));
        }
    }

    let series: Vec<Series> = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Series::new(name.as_str().into(), values))
        .collect();
    Ok(frame_from_series(series))
}

fn detect_delimiter(path: &Path) -> Result<u8> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut first = String::new();
    reader.read_line(&mut first)?;
    if first.contains('\t') {
        return Ok(b'\t');
    }
    if first.contains(',') {
        return Ok(b',');
    }
    if first.trim().contains(char::is_whitespace) {
        return Ok(b' ');
    }
    // Single-column file.
    Ok(b'\t')
}

fn decompress_to_temp(path: &Path, ext: &str) -> Result<NamedTempFile> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut decoder: Box<dyn Read> = match ext {
        "gz" => Box::new(GzDecoder::new(file)),
        "bz2" => Box::new(BzDecoder::new(file)),
        _ => Box::new(file),
    };
    let mut tmp = NamedTempFile::new()?;
    std::io::copy(&mut decoder, &mut tmp)?;
    Ok(tmp)
}

fn normalize_missing_token(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if MISSING_TOKENS
        .iter()
        .any(|t| t.eq_ignore_ascii_case(trimmed))
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn trim_string_columns(mut df: DataFrame) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        if let Ok(column) = df.column(&name)
            && column.dtype() == &DataType::String
        {
            let utf8 = column.as_series().context("series")?.str()?;
            let mut trimmed = utf8
                .apply(|v| v.map(|s| Cow::Owned(s.trim().to_string())))
                .into_series();
            trimmed.rename(name.clone().into());
            df.with_column(trimmed)?;
        }
    }
    Ok(df)
}

pub fn frame_from_series(series: Vec<Series>) -> DataFrame {
    series.into_iter().collect()
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Text values of a column; missing cells become empty strings.
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = df
        .column(name)
        .with_context(|| format!("column {name}"))?
        .as_series()
        .context("series")?
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or("").to_string())
        .collect())
}

/// Numeric values of a column; missing or unparseable cells become NaN.
pub fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df.column(name).with_context(|| format!("column {name}"))?;
    let series = column.as_series().context("series")?;
    let series = if series.dtype() == &DataType::String {
        let parsed: Float64Chunked = series
            .str()?
            .into_iter()
            .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok()))
            .collect();
        parsed.into_series()
    } else {
        series.cast(&DataType::Float64)?
    };
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

fn temp_in_parent(path: &Path) -> Result<NamedTempFile> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    NamedTempFile::new_in(dir).with_context(|| format!("temp file in {}", dir.display()))
}

fn persist(tmp: NamedTempFile, path: &Path) -> Result<()> {
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("rename into {}", path.display()))?;
    Ok(())
}

/// Write a tab-separated table next to its destination and rename it into place.
pub fn write_table_atomic(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut tmp = temp_in_parent(path)?;
    CsvWriter::new(tmp.as_file_mut())
        .with_separator(b'\t')
        .finish(df)
        .with_context(|| format!("write {}", path.display()))?;
    persist(tmp, path)
}

pub fn write_json_atomic<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let mut tmp = temp_in_parent(path)?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), value)?;
    writeln!(tmp.as_file_mut())?;
    persist(tmp, path)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parse {}", path.display()))?;
    Ok(value)
}
