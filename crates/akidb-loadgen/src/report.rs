//! Report generation for load test runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::metrics::{duration_secs, PhaseMetrics};
use crate::orchestrator::RunConfig;

/// Output format for a rendered report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Table,
    Markdown,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" | "text" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown report format `{other}`")),
        }
    }
}

/// Wall-clock time spent in each setup and teardown stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    #[serde(with = "duration_secs")]
    pub connect: Duration,
    #[serde(with = "duration_secs")]
    pub ensure_clean: Duration,
    #[serde(with = "duration_secs")]
    pub create_collection: Duration,
    #[serde(with = "duration_secs")]
    pub flush: Duration,
    #[serde(with = "duration_secs")]
    pub create_index: Duration,
    #[serde(with = "duration_secs")]
    pub load: Duration,
    #[serde(with = "duration_secs")]
    pub cleanup: Duration,

    /// Connect through cleanup.
    #[serde(with = "duration_secs")]
    pub total: Duration,
}

/// Run parameters echoed into the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEcho {
    pub address: String,
    pub collection: String,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    #[serde(with = "duration_secs")]
    pub search_duration: Duration,
    pub pressure: String,
    pub workers: usize,
    pub batch_size: usize,
    pub ramp_up: bool,
    pub dimension: usize,
    pub seed: u64,
}

impl ConfigEcho {
    #[must_use]
    pub fn from_run(config: &RunConfig) -> Self {
        Self {
            address: config.address.clone(),
            collection: config.collection.clone(),
            duration: config.duration,
            search_duration: config.effective_search_duration(),
            pressure: config.profile.label(),
            workers: config.profile.workers,
            batch_size: config.profile.batch_size,
            ramp_up: config.ramp_up,
            dimension: config.dimension,
            seed: config.seed,
        }
    }
}

/// Final summary of a run. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub generated_at: DateTime<Utc>,
    pub config: ConfigEcho,
    pub timings: StageTimings,
    pub insert: PhaseMetrics,
    pub search: PhaseMetrics,

    /// Raw vector payload inserted, in MiB.
    pub data_size_mb: f64,
}

/// Size of `vectors` float32 vectors of `dimension`, in MiB.
#[must_use]
pub fn data_size_mb(vectors: u64, dimension: usize) -> f64 {
    (vectors as f64 * dimension as f64 * 4.0) / (1024.0 * 1024.0)
}

impl TestReport {
    #[must_use]
    pub fn new(
        config: &RunConfig,
        timings: StageTimings,
        insert: PhaseMetrics,
        search: PhaseMetrics,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            data_size_mb: data_size_mb(insert.units, config.dimension),
            config: ConfigEcho::from_run(config),
            timings,
            insert,
            search,
        }
    }

    /// Renders the report in `format`.
    pub fn render(&self, format: ReportFormat) -> serde_json::Result<String> {
        match format {
            ReportFormat::Table => Ok(self.render_table()),
            ReportFormat::Markdown => Ok(self.render_markdown()),
            ReportFormat::Json => serde_json::to_string_pretty(self),
        }
    }

    /// Writes the rendered report to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>, format: ReportFormat) -> std::io::Result<()> {
        let content = self
            .render(format)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    fn render_table(&self) -> String {
        let c = &self.config;
        let t = &self.timings;
        let mut out = String::new();

        let _ = writeln!(out, "==================== Load Test Report ====================");
        let _ = writeln!(out, "Generated:          {}", self.generated_at.to_rfc3339());
        let _ = writeln!(out, "Address:            {}", c.address);
        let _ = writeln!(out, "Collection:         {}", c.collection);
        let _ = writeln!(out, "Pressure level:     {}", c.pressure.to_uppercase());
        let _ = writeln!(out, "Workers:            {}", c.workers);
        let _ = writeln!(out, "Batch size:         {}", c.batch_size);
        let _ = writeln!(out, "Ramp-up:            {}", if c.ramp_up { "enabled" } else { "disabled" });
        let _ = writeln!(out, "Dimension:          {}", c.dimension);
        let _ = writeln!(out, "Seed:               {}", c.seed);
        let _ = writeln!(out, "Insert duration:    {:?}", c.duration);
        let _ = writeln!(out, "Search duration:    {:?}", c.search_duration);
        let _ = writeln!(out, "----------------------------------------------------------");
        let _ = writeln!(out, "{:<20} {:>12}", "Stage", "Time");
        let rows = [
            ("Connection", t.connect),
            ("Prepare collection", t.ensure_clean + t.create_collection),
            ("Insertion", self.insert.elapsed),
            ("Flush", t.flush),
            ("Index build", t.create_index),
            ("Load", t.load),
            ("Search", self.search.elapsed),
            ("Cleanup", t.cleanup),
            ("Total", t.total),
        ];
        for (name, elapsed) in rows {
            let _ = writeln!(out, "{:<20} {:>11.3}s", name, elapsed.as_secs_f64());
        }
        let _ = writeln!(out, "----------------------------------------------------------");
        let _ = writeln!(out, "Vectors inserted:   {}", self.insert.units);
        let _ = writeln!(out, "Insert batches:     {}", self.insert.batches);
        let _ = writeln!(out, "Insert errors:      {}", self.insert.errors);
        let _ = writeln!(out, "Insert throughput:  {:.1} vectors/sec", self.insert.throughput());
        let _ = writeln!(out, "Data inserted:      {:.2} MB", self.data_size_mb);
        if c.ramp_up {
            let _ = writeln!(out, "Peak ramp workers:  {}", self.insert.peak_ramp_workers);
        }
        let _ = writeln!(out, "Searches:           {}", self.search.units);
        let _ = writeln!(out, "Search errors:      {}", self.search.errors);
        let _ = writeln!(out, "Search throughput:  {:.1} searches/sec", self.search.throughput());
        let _ = writeln!(out, "==========================================================");
        out
    }

    fn render_markdown(&self) -> String {
        let c = &self.config;
        let t = &self.timings;

        format!(
            r#"# Load Test Report: {}

**Generated**: {}

---

## Configuration

- **Address**: {}
- **Collection**: {}
- **Pressure**: {} ({} workers, batch {})
- **Ramp-up**: {}
- **Dimension**: {}
- **Seed**: {}
- **Insert duration**: {:.1}s
- **Search duration**: {:.1}s

---

## Stage Timings

| Stage | Time |
|-------|------|
| Connection | {:.3}s |
| Prepare collection | {:.3}s |
| Insertion | {:.3}s |
| Flush | {:.3}s |
| Index build | {:.3}s |
| Load | {:.3}s |
| Search | {:.3}s |
| Cleanup | {:.3}s |
| **Total** | {:.3}s |

---

## Throughput

| Phase | Units | Batches | Errors | Error Rate | Throughput |
|-------|-------|---------|--------|------------|------------|
| Insert | {} | {} | {} | {:.4}% | {:.1}/s |
| Search | {} | {} | {} | {:.4}% | {:.1}/s |

- **Data inserted**: {:.2} MB
- **Peak ramp workers**: {}
"#,
            c.pressure,
            self.generated_at.to_rfc3339(),
            c.address,
            c.collection,
            c.pressure,
            c.workers,
            c.batch_size,
            if c.ramp_up { "enabled" } else { "disabled" },
            c.dimension,
            c.seed,
            c.duration.as_secs_f64(),
            c.search_duration.as_secs_f64(),
            t.connect.as_secs_f64(),
            (t.ensure_clean + t.create_collection).as_secs_f64(),
            self.insert.elapsed.as_secs_f64(),
            t.flush.as_secs_f64(),
            t.create_index.as_secs_f64(),
            t.load.as_secs_f64(),
            self.search.elapsed.as_secs_f64(),
            t.cleanup.as_secs_f64(),
            t.total.as_secs_f64(),
            self.insert.units,
            self.insert.batches,
            self.insert.errors,
            self.insert.error_rate() * 100.0,
            self.insert.throughput(),
            self.search.units,
            self.search.batches,
            self.search.errors,
            self.search.error_rate() * 100.0,
            self.search.throughput(),
            self.data_size_mb,
            self.insert.peak_ramp_workers,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> TestReport {
        let config = RunConfig {
            dimension: 8,
            duration: Duration::from_secs(8),
            ..Default::default()
        };
        let insert = PhaseMetrics {
            phase: "insert".to_string(),
            units: 131_072,
            batches: 64,
            elapsed: Duration::from_secs(8),
            workers: 20,
            ..Default::default()
        };
        let search = PhaseMetrics {
            phase: "search".to_string(),
            units: 400,
            batches: 400,
            elapsed: Duration::from_secs(2),
            workers: 20,
            ..Default::default()
        };
        TestReport::new(&config, StageTimings::default(), insert, search)
    }

    #[test]
    fn test_data_size_mb() {
        assert_eq!(data_size_mb(131_072, 8), 4.0);
        assert_eq!(data_size_mb(0, 128), 0.0);
    }

    #[test]
    fn test_config_echo() {
        let report = sample_report();

        assert_eq!(report.config.search_duration, Duration::from_secs(2));
        assert_eq!(report.config.pressure, "medium (default)");
        assert_eq!(report.data_size_mb, 4.0);
    }

    #[test]
    fn test_render_table_and_markdown() {
        let report = sample_report();

        let table = report.render(ReportFormat::Table).unwrap();
        assert!(table.contains("Vectors inserted:   131072"));
        assert!(table.contains("16384.0 vectors/sec"));
        assert!(table.contains("MEDIUM (DEFAULT)"));

        let markdown = report.render(ReportFormat::Markdown).unwrap();
        assert!(markdown.starts_with("# Load Test Report: medium (default)"));
        assert!(markdown.contains("| Search | 400 | 400 | 0 |"));
    }

    #[test]
    fn test_json_is_parseable() {
        let report = sample_report();
        let json = report.render(ReportFormat::Json).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["insert"]["units"], 131_072);
        assert_eq!(value["config"]["duration"], 8.0);

        let parsed: TestReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.search.units, 400);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert_eq!(" md ".parse::<ReportFormat>(), Ok(ReportFormat::Markdown));
        assert!("xml".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_write_to_file() {
        let path = std::env::temp_dir().join(format!("akidb-loadgen-report-{}.json", std::process::id()));
        sample_report().write_to(&path, ReportFormat::Json).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"data_size_mb\": 4.0"));
        let _ = std::fs::remove_file(&path);
    }
}
