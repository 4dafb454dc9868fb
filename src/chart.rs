use serde::Serialize;

use crate::diff::{self, escape_html};
use crate::format::RenderMode;
use crate::series::{OutputSeries, SeriesIndex};

/// Everything needed to draw one benchmark's chart.
#[derive(Debug, Clone, Serialize)]
pub struct Chart {
    pub benchmark: String,
    pub axis_title: &'static str,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Series {
    pub name: String,
    pub data: Vec<Point>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Point {
    pub x: i64,
    pub y: f64,
    /// Pre-rendered tooltip HTML: the value, then what changed since the
    /// previous sample.
    pub tooltip: String,
}

/// One chart per benchmark, one series per output.
pub fn build_charts(index: &SeriesIndex, mode: RenderMode) -> Vec<Chart> {
    index
        .benchmarks
        .iter()
        .map(|bench| Chart {
            benchmark: bench.name.clone(),
            axis_title: mode.axis_title(),
            series: bench
                .outputs
                .iter()
                .map(|output| build_series(&bench.name, output, mode))
                .collect(),
        })
        .collect()
}

fn build_series(benchmark: &str, output: &OutputSeries, mode: RenderMode) -> Series {
    let baseline = output.samples.first().map(|s| s.bytes).unwrap_or(0);
    let mut data = Vec::with_capacity(output.samples.len());

    for (i, sample) in output.samples.iter().enumerate() {
        let y = mode.value(sample.bytes, baseline);
        let mut tooltip = format!("<b>{}</b><br>{}", escape_html(&output.name), mode.format(y));

        if let Some(prev) = i.checked_sub(1).map(|p| &output.samples[p]) {
            match diff::diff_inputs(&prev.inputs, &sample.inputs) {
                Ok(changes) => tooltip.push_str(&changes),
                Err(e) => tracing::warn!(
                    benchmark,
                    output = %output.name,
                    timestamp = sample.timestamp_ms,
                    "cannot summarize input changes: {e}"
                ),
            }
        }

        data.push(Point {
            x: sample.timestamp_ms,
            y,
            tooltip,
        });
    }

    Series {
        name: output.name.clone(),
        data,
    }
}
