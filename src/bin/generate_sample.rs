use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde_json::Value as JsonValue;

use specmod::data::model::Trace;
use specmod::synthetic::{arrival_window, channel_stats, noise_window, SimpleRng};

const SAMPLING_RATE: f64 = 100.0;
const NPTS: usize = 1000;
const ORIGIN_TIME: &str = "2019-07-06T03:19:53.040000Z";

fn string_column(traces: &[Trace], key: &str) -> StringArray {
    StringArray::from(
        traces
            .iter()
            .map(|t| match t.stats.get(key) {
                Some(JsonValue::String(s)) => s.clone(),
                _ => String::new(),
            })
            .collect::<Vec<_>>(),
    )
}

fn float_column(traces: &[Trace], key: &str) -> Float64Array {
    traces
        .iter()
        .map(|t| t.stats.get(key).and_then(JsonValue::as_f64))
        .collect()
}

/// One row per window: `data` list column plus the stats columns.
fn write_windows(path: &Path, traces: &[Trace]) -> Result<()> {
    let mut data_builder = ListBuilder::new(Float64Builder::new());
    for trace in traces {
        let values = data_builder.values();
        for &v in &trace.samples {
            values.append_value(v);
        }
        data_builder.append(true);
    }
    let data_array = data_builder.finish();

    let item = Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("data", DataType::List(item), false),
        Field::new("network", DataType::Utf8, false),
        Field::new("station", DataType::Utf8, false),
        Field::new("location", DataType::Utf8, false),
        Field::new("channel", DataType::Utf8, false),
        Field::new("otime", DataType::Utf8, false),
        Field::new("sampling_rate", DataType::Float64, true),
        Field::new("repi", DataType::Float64, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(data_array),
            Arc::new(string_column(traces, "network")),
            Arc::new(string_column(traces, "station")),
            Arc::new(string_column(traces, "location")),
            Arc::new(string_column(traces, "channel")),
            Arc::new(string_column(traces, "otime")),
            Arc::new(float_column(traces, "sampling_rate")),
            Arc::new(float_column(traces, "repi")),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    // (id, epicentral distance km, tones (Hz, amplitude))
    let stations: [(&str, f64, &[(f64, f64)]); 4] = [
        ("AB.CD..HHZ", 12.5, &[(2.0, 4.0), (6.0, 2.0), (11.0, 1.0)]),
        ("AB.CD..HHN", 12.5, &[(2.5, 3.0), (7.0, 1.5)]),
        ("AB.EF..HHZ", 48.0, &[(1.5, 1.0), (4.0, 0.4)]),
        ("AB.GH..HHZ", 95.0, &[(1.0, 0.02)]),
    ];

    let mut signals = Vec::with_capacity(stations.len());
    let mut noises = Vec::with_capacity(stations.len());
    for &(id, repi, tones) in &stations {
        let mut stats = channel_stats(id, Some(ORIGIN_TIME), SAMPLING_RATE);
        stats.insert("repi".into(), JsonValue::from(repi));

        let attenuation = (-repi / 80.0).exp();
        let scaled: Vec<(f64, f64)> = tones.iter().map(|&(f, a)| (f, a * attenuation)).collect();
        signals.push(arrival_window(&scaled, 0.01, NPTS, SAMPLING_RATE, stats.clone(), &mut rng));
        noises.push(noise_window(0.01, NPTS, SAMPLING_RATE, stats, &mut rng));
    }

    write_windows(Path::new("sample_signal.parquet"), &signals)?;
    write_windows(Path::new("sample_noise.parquet"), &noises)?;

    println!(
        "Wrote {} signal and noise windows ({NPTS} samples at {SAMPLING_RATE} Hz) to sample_signal.parquet / sample_noise.parquet",
        stations.len()
    );
    Ok(())
}
