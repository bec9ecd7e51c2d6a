use anyhow::Result;
use polars::prelude::*;

pub fn ensure_utf8(mut df: DataFrame, cols: &[&str]) -> Result<DataFrame> {
    for col in cols {
        if let Ok(column) = df.column(col)
            && let Some(series) = column.as_series()
            && series.dtype() != &DataType::String
        {
            let mut casted = series.cast(&DataType::String)?;
            casted.rename((*col).into());
            df.with_column(casted)?;
        }
    }
    Ok(df)
}

pub fn ensure_f64(mut df: DataFrame, cols: &[&str]) -> Result<DataFrame> {
    for col in cols {
        if let Ok(column) = df.column(col)
            && let Some(series) = column.as_series()
            && series.dtype() != &DataType::Float64
        {
            let mut casted = series.cast(&DataType::Float64)?;
            casted.rename((*col).into());
            df.with_column(casted)?;
        }
    }
    Ok(df)
}

/// Prepend constant string columns, e.g. the factor/outcome key of a merged table.
pub fn prepend_keys(df: &DataFrame, keys: &[(&str, &str)]) -> Result<DataFrame> {
    let height = df.height();
    let key_series: Vec<Series> = keys
        .iter()
        .map(|(name, value)| Series::new((*name).into(), vec![*value; height]))
        .collect();
    let keys_df: DataFrame = key_series.into_iter().collect();
    Ok(keys_df.hstack(df.get_columns())?)
}
