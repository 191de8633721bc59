//! Data processing agent
//!
//! Cleaning, descriptive statistics, simple transforms and feature
//! extraction over JSON arrays carried in `task_data.data`.

use super::TaskProcessor;
use crate::actors::messages::Task;
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub const AGENT_TYPE: &str = "data_processing";

const CAPABILITIES: [&str; 6] = [
    "data_cleaning",
    "data_transformation",
    "statistical_analysis",
    "data_visualization",
    "feature_engineering",
    "data_validation",
];

const HISTOGRAM_BINS: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct DataProcessingProcessor;

impl DataProcessingProcessor {
    pub fn new() -> Self {
        Self
    }

    /// The processor takes no options yet; the per-agent config is accepted
    /// so it can be built through the registry like any other variant.
    pub fn from_config(_config: &Value) -> Self {
        Self
    }
}

#[async_trait]
impl TaskProcessor for DataProcessingProcessor {
    fn agent_type(&self) -> &str {
        AGENT_TYPE
    }

    fn capabilities(&self) -> Vec<String> {
        CAPABILITIES.iter().map(|c| c.to_string()).collect()
    }

    async fn process_task(&self, task: &Task) -> Result<Value> {
        let data = task.task_data.get("data");
        match task.task_type.as_str() {
            "data_cleaning" => Ok(clean_data(data)),
            "statistical_analysis" => Ok(statistical_analysis(data)),
            "data_transformation" => {
                let transform_type = task
                    .task_data
                    .get("transform_type")
                    .and_then(Value::as_str)
                    .unwrap_or("normalize");
                Ok(transform_data(data, transform_type))
            }
            "feature_engineering" => Ok(feature_engineering(data)),
            other => bail!("Unsupported task type: {}", other),
        }
    }
}

fn items(data: Option<&Value>) -> &[Value] {
    data.and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn clean_data(data: Option<&Value>) -> Value {
    let raw = items(data);
    let mut cleaned = Vec::new();
    let mut removed_count = 0;

    for item in raw {
        if is_valid_item(item) {
            cleaned.push(clean_item(item));
        } else {
            removed_count += 1;
        }
    }

    json!({
        "cleaned_data": cleaned,
        "removed_count": removed_count,
        "total_processed": raw.len(),
    })
}

/// Records must be non-null; objects must carry `id` and `value`
fn is_valid_item(item: &Value) -> bool {
    match item {
        Value::Null => false,
        Value::Object(fields) => fields.contains_key("id") && fields.contains_key("value"),
        _ => true,
    }
}

fn clean_item(item: &Value) -> Value {
    match item {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

fn numeric_values(raw: &[Value]) -> Vec<f64> {
    let mut numbers = Vec::new();
    for item in raw {
        match item {
            Value::Object(fields) => numbers.extend(fields.values().filter_map(Value::as_f64)),
            Value::Number(n) => numbers.extend(n.as_f64()),
            _ => {}
        }
    }
    numbers
}

fn statistical_analysis(data: Option<&Value>) -> Value {
    let raw = items(data);
    if raw.is_empty() {
        return json!({ "error": "No data to analyze" });
    }

    let numbers = numeric_values(raw);
    if numbers.is_empty() {
        return json!({ "error": "No numeric data found" });
    }

    let count = numbers.len();
    let mean = mean(&numbers);
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let std_dev = if count > 1 {
        let variance =
            numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };

    let (histogram, bin_edges) = histogram(&numbers, min, max);

    json!({
        "statistics": {
            "count": count,
            "mean": mean,
            "median": median(&numbers),
            "mode": mode(&numbers),
            "std_dev": std_dev,
            "min": min,
            "max": max,
            "range": max - min,
        },
        "data_distribution": {
            "histogram": histogram,
            "bin_edges": bin_edges,
            "skewness": standardized_moment(&numbers, 3),
            "kurtosis": standardized_moment(&numbers, 4) - 3.0,
        }
    })
}

fn mean(numbers: &[f64]) -> f64 {
    numbers.iter().sum::<f64>() / numbers.len() as f64
}

fn median(numbers: &[f64]) -> f64 {
    let mut sorted = numbers.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Most frequent value (first seen wins ties); only reported when some
/// value repeats.
fn mode(numbers: &[f64]) -> Option<f64> {
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for &x in numbers {
        match counts.iter_mut().find(|(value, _)| *value == x) {
            Some((_, count)) => *count += 1,
            None => counts.push((x, 1)),
        }
    }
    if counts.len() == numbers.len() {
        return None;
    }

    let mut best: Option<(f64, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

fn population_std(numbers: &[f64]) -> f64 {
    let m = mean(numbers);
    (numbers.iter().map(|x| (x - m).powi(2)).sum::<f64>() / numbers.len() as f64).sqrt()
}

/// E[(x - mean)^k] / std^k with the population std. Zero for constant data.
fn standardized_moment(numbers: &[f64], k: i32) -> f64 {
    let std = population_std(numbers);
    if std == 0.0 {
        return 0.0;
    }
    let m = mean(numbers);
    let moment = numbers.iter().map(|x| (x - m).powi(k)).sum::<f64>() / numbers.len() as f64;
    moment / std.powi(k)
}

/// Equal-width bins over [min, max]; the last bin is closed on the right.
fn histogram(numbers: &[f64], min: f64, max: f64) -> (Vec<usize>, Vec<f64>) {
    let (low, high) = if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };
    let width = (high - low) / HISTOGRAM_BINS as f64;

    let edges: Vec<f64> = (0..=HISTOGRAM_BINS)
        .map(|i| low + width * i as f64)
        .collect();

    let mut counts = vec![0usize; HISTOGRAM_BINS];
    for &x in numbers {
        let bin = (((x - low) / width).floor() as usize).min(HISTOGRAM_BINS - 1);
        counts[bin] += 1;
    }

    (counts, edges)
}

fn transform_data(data: Option<&Value>, transform_type: &str) -> Value {
    let raw = items(data);
    if raw.is_empty() {
        return json!({ "transformed_data": [] });
    }

    match transform_type {
        "normalize" => {
            let numbers = top_level_numbers(raw);
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let span = max - min;
            let transformed = map_numbers(raw, |x| if span > 0.0 { (x - min) / span } else { 0.0 });
            json!({ "transformed_data": transformed, "method": "min_max_normalization" })
        }
        "standardize" => {
            let numbers = top_level_numbers(raw);
            let (m, std) = if numbers.is_empty() {
                (0.0, 0.0)
            } else {
                (mean(&numbers), population_std(&numbers))
            };
            let transformed = map_numbers(raw, |x| if std > 0.0 { (x - m) / std } else { 0.0 });
            json!({ "transformed_data": transformed, "method": "z_score_standardization" })
        }
        "log_transform" => {
            let transformed = map_numbers(raw, |x| if x > 0.0 { x.ln() } else { 0.0 });
            json!({ "transformed_data": transformed, "method": "logarithmic_transformation" })
        }
        other => json!({ "error": format!("Unknown transform type: {}", other) }),
    }
}

/// Scale inputs for the transforms; must match what `map_numbers` rewrites
fn top_level_numbers(raw: &[Value]) -> Vec<f64> {
    raw.iter().filter_map(Value::as_f64).collect()
}

/// Apply `f` to top-level numbers, passing every other item through
fn map_numbers(raw: &[Value], f: impl Fn(f64) -> f64) -> Vec<Value> {
    raw.iter()
        .map(|item| match item.as_f64() {
            Some(x) => json!(f(x)),
            None => item.clone(),
        })
        .collect()
}

fn feature_engineering(data: Option<&Value>) -> Value {
    let features: Vec<Vec<f64>> = items(data)
        .iter()
        .filter_map(Value::as_object)
        .map(|fields| fields.values().map(feature_value).collect())
        .collect();

    let feature_count = features.first().map_or(0, Vec::len);
    json!({ "features": features, "feature_count": feature_count })
}

fn feature_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.chars().count() as f64,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}
