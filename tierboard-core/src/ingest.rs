//! Raw backend rows to typed records.
//!
//! Identity is derived here and nowhere else: every row goes through
//! [`normalize`] once, and everything downstream works on [`AgentKey`]s.
//! Rows that cannot be used are skipped with a
//! [`IngestWarning::MalformedRecord`]; a bad row never fails a whole fetch.

use crate::backend::{QuartileResponse, RawDailyMetricRow, RawDailyQuartileRow};
use crate::error::{IngestWarning, RowSource};
use crate::identity::normalize;
use crate::quartile::Quartile;
use crate::record::{LabeledRecord, MetricRecord};
use crate::timeseries::{parse_date, DailyMetricRow, DailyQuartileRow};
use serde_json::Value;

/// Largest metric accepted from the backend. Anything above is treated as a
/// malformed row. Totals over accepted metrics saturate at `u64::MAX`.
pub const MAX_METRIC: u64 = 1 << 53;

/// Parsed rows together with what had to be skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested<T> {
    pub value: T,
    pub warnings: Vec<IngestWarning>,
}

impl<T> Ingested<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    fn skip(&mut self, source: RowSource, index: usize, reason: impl Into<String>) {
        self.warnings.push(IngestWarning::MalformedRecord {
            source,
            index,
            reason: reason.into(),
        });
    }
}

/// Parse a non-negative integer metric from a JSON number or numeric string.
/// Fractional values are rounded to the nearest integer. Values above
/// [`MAX_METRIC`] are rejected.
pub fn parse_metric(value: &Value) -> Result<u64, String> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return bounded_metric(v);
            }
            n.as_f64()
                .ok_or_else(|| format!("unrepresentable number {}", n))
                .and_then(float_metric)
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(v) = trimmed.parse::<u64>() {
                return bounded_metric(v);
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| format!("non-numeric metric '{}'", s))
                .and_then(float_metric)
        }
        Value::Null => Err("metric is null".to_string()),
        other => Err(format!("unexpected metric value {}", other)),
    }
}

fn bounded_metric(v: u64) -> Result<u64, String> {
    if v > MAX_METRIC {
        return Err(format!("metric {} exceeds {}", v, MAX_METRIC));
    }
    Ok(v)
}

fn float_metric(v: f64) -> Result<u64, String> {
    if !v.is_finite() || v < 0.0 {
        return Err(format!("metric {} is not a non-negative number", v));
    }
    let rounded = v.round();
    if rounded > MAX_METRIC as f64 {
        return Err(format!("metric {} exceeds {}", v, MAX_METRIC));
    }
    Ok(rounded as u64)
}

fn parse_quartile(value: &Value) -> Result<Quartile, String> {
    let ordinal = match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| format!("quartile {} is not an integer", n))?,
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("non-numeric quartile '{}'", s))?,
        other => return Err(format!("unexpected quartile value {}", other)),
    };
    Quartile::from_ordinal(ordinal).map_err(|e| e.to_string())
}

fn required_agent(agent: Option<&str>) -> Result<&str, String> {
    match agent.map(str::trim) {
        Some(a) if !a.is_empty() => Ok(a),
        _ => Err("missing agent".to_string()),
    }
}

/// Flatten the four backend buckets into labeled records.
pub fn quartile_records(response: &QuartileResponse) -> Ingested<Vec<LabeledRecord>> {
    let mut out = Ingested::new(Vec::new());
    let mut index = 0usize;
    for (bucket, quartile) in response.buckets().into_iter().zip(Quartile::ALL) {
        for row in bucket {
            let parsed = required_agent(row.agent.as_deref()).and_then(|agent| {
                let metric = row
                    .metric
                    .as_ref()
                    .ok_or_else(|| "missing metric".to_string())
                    .and_then(parse_metric)?;
                Ok(MetricRecord::from_ref(agent, metric).labeled(quartile))
            });
            match parsed {
                Ok(record) => out.value.push(record),
                Err(reason) => out.skip(RowSource::Quartiles, index, reason),
            }
            index += 1;
        }
    }
    if out.value.is_empty() {
        out.warnings.push(IngestWarning::EmptyPopulation);
    }
    out
}

pub fn daily_metric_rows(rows: &[RawDailyMetricRow]) -> Ingested<Vec<DailyMetricRow>> {
    let mut out = Ingested::new(Vec::with_capacity(rows.len()));
    for (index, row) in rows.iter().enumerate() {
        let parsed = (|| -> Result<DailyMetricRow, String> {
            let date = row.date.as_deref().ok_or("missing date")?;
            let date = parse_date(date).map_err(|e| e.to_string())?;
            let agent = row
                .agent
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(normalize);
            let total = row
                .total
                .as_ref()
                .ok_or_else(|| "missing total".to_string())
                .and_then(parse_metric)?;
            Ok(DailyMetricRow { date, agent, total })
        })();
        match parsed {
            Ok(r) => out.value.push(r),
            Err(reason) => out.skip(RowSource::DailyMetric, index, reason),
        }
    }
    out
}

pub fn daily_quartile_rows(rows: &[RawDailyQuartileRow]) -> Ingested<Vec<DailyQuartileRow>> {
    let mut out = Ingested::new(Vec::with_capacity(rows.len()));
    for (index, row) in rows.iter().enumerate() {
        let parsed = (|| -> Result<DailyQuartileRow, String> {
            let date = row.date.as_deref().ok_or("missing date")?;
            let date = parse_date(date).map_err(|e| e.to_string())?;
            let agent_key = normalize(required_agent(row.agent.as_deref())?);
            let quartile = row
                .quartile
                .as_ref()
                .ok_or_else(|| "missing quartile".to_string())
                .and_then(parse_quartile)?;
            Ok(DailyQuartileRow {
                date,
                agent_key,
                quartile,
            })
        })();
        match parsed {
            Ok(r) => out.value.push(r),
            Err(reason) => out.skip(RowSource::DailyQuartilePosition, index, reason),
        }
    }
    out
}
