use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate};
use std::collections::HashMap;
use weight_protocol::{Build, InputRecord};

/// One measurement of one output.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub bytes: u64,
    /// Inputs of the benchmark build that produced this sample.
    pub inputs: Vec<InputRecord>,
}

#[derive(Debug, Clone)]
pub struct OutputSeries {
    pub name: String,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone)]
pub struct BenchmarkSeries {
    pub name: String,
    pub outputs: Vec<OutputSeries>,
}

/// Feed regrouped as benchmark -> output -> samples, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct SeriesIndex {
    pub benchmarks: Vec<BenchmarkSeries>,
}

impl SeriesIndex {
    pub fn from_builds(builds: &[Build]) -> Result<Self> {
        let mut index = SeriesIndex::default();
        let mut output_positions: HashMap<(usize, String), usize> = HashMap::new();
        let mut bench_positions: HashMap<String, usize> = HashMap::new();

        for build in builds {
            let timestamp_ms = parse_date_ms(&build.date)
                .with_context(|| format!("parsing build date {:?}", build.date))?;

            for bench in &build.data {
                let b = *bench_positions
                    .entry(bench.name.clone())
                    .or_insert_with(|| {
                        index.benchmarks.push(BenchmarkSeries {
                            name: bench.name.clone(),
                            outputs: Vec::new(),
                        });
                        index.benchmarks.len() - 1
                    });

                for output in &bench.outputs {
                    let o = *output_positions
                        .entry((b, output.name.clone()))
                        .or_insert_with(|| {
                            let outputs = &mut index.benchmarks[b].outputs;
                            outputs.push(OutputSeries {
                                name: output.name.clone(),
                                samples: Vec::new(),
                            });
                            outputs.len() - 1
                        });
                    index.benchmarks[b].outputs[o].samples.push(Sample {
                        timestamp_ms,
                        bytes: output.bytes,
                        inputs: bench.inputs.clone(),
                    });
                }
            }
        }

        tracing::debug!(
            builds = builds.len(),
            benchmarks = index.benchmarks.len(),
            "indexed feed"
        );
        Ok(index)
    }
}

/// RFC 3339 timestamp or plain `YYYY-MM-DD` (midnight UTC), as epoch millis.
pub fn parse_date_ms(date: &str) -> Result<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Ok(dt.timestamp_millis());
    }
    if let Ok(day) = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        && let Some(midnight) = day.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight.and_utc().timestamp_millis());
    }
    bail!("not an ISO 8601 date: {date:?}")
}
