use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeListArray, ListArray, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{Map, Number, Value as JsonValue};

use super::model::Trace;

/// Column / key holding the sample array.
const DATA_KEY: &str = "data";
/// Column / key holding the sampling interval in seconds.
const DELTA_KEY: &str = "delta";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load waveform windows from a file.  Dispatch by extension.
///
/// Every record carries a `data` sample array and either a `delta` or a
/// `sampling_rate`; all other fields become the window's stats.
///
/// Supported formats:
/// * `.json`    – `[{ "data": [...], "delta": 0.01, ...stats }, ...]`
/// * `.csv`     – a `data` column of semicolon-separated floats
/// * `.parquet` – a `data` list column
pub fn load_windows(path: &Path) -> Result<Vec<Trace>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let traces = match ext.as_str() {
        "json" => load_json(path),
        "csv" => load_csv(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }?;
    log::info!("Loaded {} windows from {}", traces.len(), path.display());
    Ok(traces)
}

/// Build a window from its samples and remaining stats, resolving `delta`.
fn record_to_trace(samples: Vec<f64>, mut stats: Map<String, JsonValue>, row: usize) -> Result<Trace> {
    if samples.is_empty() {
        bail!("Row {row}: empty '{DATA_KEY}' array");
    }
    let delta = match stats.remove(DELTA_KEY).and_then(|v| v.as_f64()) {
        Some(d) => d,
        None => {
            let rate = stats
                .get("sampling_rate")
                .and_then(JsonValue::as_f64)
                .with_context(|| format!("Row {row}: needs '{DELTA_KEY}' or 'sampling_rate'"))?;
            1.0 / rate
        }
    };
    if !(delta.is_finite() && delta > 0.0) {
        bail!("Row {row}: sampling interval {delta} is not positive");
    }
    Ok(Trace::new(samples, delta, stats))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   {
///     "data": [0.1, -0.3, ...],
///     "delta": 0.01,
///     "network": "AB", "station": "CD", "location": "", "channel": "Z",
///     "otime": "2019-07-06T03:19:53.040000Z"
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Vec<Trace>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut traces = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let samples = json_array_to_f64(obj.get(DATA_KEY), i)?;

        let stats: Map<String, JsonValue> = obj
            .iter()
            .filter(|(key, _)| key.as_str() != DATA_KEY)
            .map(|(key, val)| (key.clone(), val.clone()))
            .collect();

        traces.push(record_to_trace(samples, stats, i)?);
    }

    Ok(traces)
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{DATA_KEY}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {DATA_KEY}[{j}]: not a number"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout:  header row with column names.
/// The `data` column contains semicolon-separated floats:
///   `"0.12;-0.31;0.08"`
/// All other columns are treated as stats.
fn load_csv(path: &Path) -> Result<Vec<Trace>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let data_idx = headers
        .iter()
        .position(|h| h == DATA_KEY)
        .with_context(|| format!("CSV missing '{DATA_KEY}' column"))?;

    let mut traces = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let samples = parse_semicolon_floats(record.get(data_idx).unwrap_or(""), row_no)?;

        let mut stats = Map::new();
        for (col_idx, value) in record.iter().enumerate() {
            if col_idx == data_idx {
                continue;
            }
            stats.insert(headers[col_idx].clone(), guess_stats_type(value));
        }

        traces.push(record_to_trace(samples, stats, row_no)?);
    }

    Ok(traces)
}

fn parse_semicolon_floats(s: &str, row: usize) -> Result<Vec<f64>> {
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {DATA_KEY}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

fn guess_stats_type(s: &str) -> JsonValue {
    if s.is_empty() {
        return JsonValue::String(String::new());
    }
    if let Ok(i) = s.parse::<i64>() {
        return JsonValue::from(i);
    }
    if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
        return JsonValue::Number(n);
    }
    if s == "true" || s == "false" {
        return JsonValue::Bool(s == "true");
    }
    JsonValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of waveform windows.
///
/// Expected schema:
/// - `data`: List<Float64> or LargeList<Float64> – sample arrays
/// - Any other columns are treated as stats (strings, ints, floats, bools)
fn load_parquet(path: &Path) -> Result<Vec<Trace>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut traces = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let n_rows = batch.num_rows();

        let data_idx = schema
            .index_of(DATA_KEY)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{DATA_KEY}' column"))?;
        let data_col = batch.column(data_idx);

        let stats_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != data_idx)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        for row in 0..n_rows {
            let samples = extract_f64_list(data_col, row)
                .with_context(|| format!("Row {row}: failed to read '{DATA_KEY}'"))?;

            let mut stats = Map::new();
            for (col_idx, col_name) in &stats_cols {
                let value = extract_stats_value(batch.column(*col_idx), row);
                stats.insert(col_name.clone(), value);
            }

            traces.push(record_to_trace(samples, stats, traces.len())?);
        }
    }

    Ok(traces)
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    // Instruments often store samples as Float32
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// Extract a single stats value from an Arrow column at a given row.
fn extract_stats_value(col: &Arc<dyn Array>, row: usize) -> JsonValue {
    if col.is_null(row) {
        return JsonValue::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map_or(JsonValue::Null, |s| JsonValue::from(s.value(row))),
        DataType::LargeUtf8 => JsonValue::from(col.as_string::<i64>().value(row)),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map_or(JsonValue::Null, |a| JsonValue::from(a.value(row))),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(JsonValue::Null, |a| JsonValue::from(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map_or(JsonValue::Null, |a| JsonValue::from(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or(JsonValue::Null, |a| JsonValue::from(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map_or(JsonValue::Null, |a| JsonValue::Bool(a.value(row))),
        other => JsonValue::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("specmod-loader-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_json_records() {
        let path = scratch_file(
            "windows.json",
            r#"[
                {"data": [1.0, 2.0, 3.0], "delta": 0.01, "network": "AB",
                 "station": "CD", "location": "", "channel": "Z", "otime": "t0"},
                {"data": [0.5, 0.25], "sampling_rate": 50.0, "station": "EF"}
            ]"#,
        );
        let traces = load_windows(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].id(), "AB.CD..Z");
        assert_eq!(traces[0].samples, vec![1.0, 2.0, 3.0]);
        assert!(!traces[0].stats.contains_key("delta"));
        assert!((traces[1].delta - 0.02).abs() < 1e-12);
    }

    #[test]
    fn loads_csv_records() {
        let path = scratch_file(
            "windows.csv",
            "station,channel,delta,data,repi\nCD,Z,0.01,1.0;2.0;3.0,12.5\n",
        );
        let traces = load_windows(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].samples, vec![1.0, 2.0, 3.0]);
        assert_eq!(traces[0].stats["repi"], JsonValue::from(12.5));
        assert_eq!(traces[0].id(), ".CD..Z");
    }

    #[test]
    fn rejects_missing_sampling_information() {
        let path = scratch_file("nodelta.json", r#"[{"data": [1.0, 2.0]}]"#);
        let err = load_windows(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(format!("{err:#}").contains("sampling_rate"));
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(load_windows(Path::new("windows.mseed")).is_err());
    }
}
