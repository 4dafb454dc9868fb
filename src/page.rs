use anyhow::{Context, Result};
use serde::Serialize;

use crate::chart::{self, Chart};
use crate::diff::escape_html;
use crate::format::RenderMode;
use crate::series::SeriesIndex;

#[derive(Serialize)]
struct Charts {
    absolute: Vec<Chart>,
    relative: Vec<Chart>,
}

/// Render a standalone HTML page with a chart per benchmark.
///
/// Both display modes are pre-computed; the `#absolute` checkbox swaps
/// between them client-side. `initial` decides which one shows first.
pub fn render_page(index: &SeriesIndex, initial: RenderMode, chart_script: &str) -> Result<String> {
    let charts = Charts {
        absolute: chart::build_charts(index, RenderMode::Absolute),
        relative: chart::build_charts(index, RenderMode::Relative),
    };
    let json = serde_json::to_string(&charts).context("serializing charts")?;
    // Keep the payload from closing its own <script> element.
    let json = json.replace("</", "<\\/");

    let mut containers = String::new();
    for bench in &index.benchmarks {
        containers.push_str(&format!(
            "<div class=\"chart\" id=\"{}\"></div>\n",
            escape_html(&bench.name)
        ));
    }

    let checked = match initial {
        RenderMode::Absolute => " checked",
        RenderMode::Relative => "",
    };

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>wasm weight tracker</title>
<script src="{script}"></script>
</head>
<body>
<div id="controls">
<label><input type="checkbox" id="absolute"{checked}> absolute sizes</label>
</div>
{containers}<script>
const CHARTS = {json};
{page_script}
</script>
</body>
</html>
"#,
        script = escape_html(chart_script),
        page_script = PAGE_SCRIPT,
    ))
}

/// Axis ticks are only known client-side, so `bytes` mirrors
/// `format::format_bytes` (same units, same two-decimal rounding per step).
const PAGE_SCRIPT: &str = r#"function bytes(val) {
  const units = ['B', 'KB', 'MB', 'GB'];
  let i = 0;
  while (val >= 1024 && i < units.length - 1) {
    val = Math.round((val * 100) / 1024) / 100;
    i += 1;
  }
  return `${val}${units[i]}`;
}

function render() {
  const absolute = document.getElementById('absolute').checked;
  const charts = absolute ? CHARTS.absolute : CHARTS.relative;
  for (const chart of charts) {
    Highcharts.chart(chart.benchmark, {
      title: { text: chart.benchmark },
      xAxis: { type: 'datetime', title: { text: 'Date' } },
      yAxis: {
        title: { text: chart.axis_title },
        labels: {
          formatter: function() {
            return absolute ? bytes(this.value) : `${Math.round(this.value * 10000) / 100}%`;
          },
        },
      },
      tooltip: {
        headerFormat: '',
        pointFormatter: function() { return this.tooltip; },
        useHTML: true,
      },
      series: chart.series,
    });
  }
}

document.getElementById('absolute').onclick = render;
render();"#;
