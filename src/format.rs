use serde::{Deserialize, Serialize};

/// How chart values are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Raw byte counts.
    #[default]
    Absolute,
    /// Ratio against the first sample of each series.
    Relative,
}

impl RenderMode {
    pub fn format(self, value: f64) -> String {
        match self {
            RenderMode::Absolute => format_bytes(value),
            RenderMode::Relative => format_percent(value),
        }
    }

    /// Value plotted for `sample` given the first sample of its series.
    pub fn value(self, sample: u64, baseline: u64) -> f64 {
        match self {
            RenderMode::Absolute => sample as f64,
            RenderMode::Relative => relative(sample, baseline),
        }
    }

    pub fn axis_title(self) -> &'static str {
        match self {
            RenderMode::Absolute => "Size (in bytes)",
            RenderMode::Relative => "Size (relative to first build)",
        }
    }
}

/// 1024-based size with at most two decimals: `2048.0` -> `"2KB"`.
pub fn format_bytes(value: f64) -> String {
    if value < 1024.0 {
        return format!("{value}B");
    }
    let mut value = round2(value / 1024.0);
    for unit in ["KB", "MB"] {
        if value < 1024.0 {
            return format!("{value}{unit}");
        }
        value = round2(value / 1024.0);
    }
    format!("{value}GB")
}

/// `1.5` -> `"150%"`
pub fn format_percent(ratio: f64) -> String {
    let pct = (ratio * 10000.0).round() / 100.0;
    format!("{pct}%")
}

pub fn relative(sample: u64, baseline: u64) -> f64 {
    if baseline == 0 {
        return 0.0;
    }
    sample as f64 / baseline as f64
}

pub fn format_relative(sample: u64, baseline: u64) -> String {
    format_percent(relative(sample, baseline))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
