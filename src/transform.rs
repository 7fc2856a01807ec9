//! Declarative record transformation engine.
//!
//! Both pipelines reshape record batches through [`transform`], a pure
//! function over `serde_json::Value` driven by a [`TransformSpec`]. Stage
//! order is fixed and semantically load-bearing:
//!
//! 1. `toArray` — coerce a keyed structure into a sequence of its values
//! 2. `toObjects` — zip inner sequences against a field-name list
//! 3. normalize to a sequence (a lone record is wrapped)
//! 4. `filter` — retain records matching a [`crate::matcher`] predicate
//! 5. `mapping` — move values between paths, with optional value lookup
//! 6. `unitMapping` — per-path value conversion (dates, strings, numbers,
//!    units of measure)
//! 7. `pick` / `omit` / `merge` — structural allow-list, deny-list, and
//!    shallow default application, in that order
//! 8. re-flatten to a lone record when the input was one
//!
//! A spec stage that is absent is a no-op, so an empty spec is the identity
//! (modulo the array normalization round trip). Any stage failure aborts
//! the whole batch with a [`TransferError::Transform`] carrying the
//! offending path and record index.
//!
//! Callers that need arbitrary logic instead of a declarative spec supply a
//! [`Transform::Callback`]; the pipelines branch on the variant once per
//! transfer, not per record.

use crate::error::{Result, TransferError};
use crate::{matcher, path, units};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Declarative description of a batch reshaping.
///
/// Field names follow the wire spelling (`toArray`, `unitMapping`, …) so a
/// spec can be deserialized straight from a request payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformSpec {
    /// Coerce a keyed structure into the sequence of its values.
    pub to_array: bool,
    /// Zip each inner sequence against these field names, one record per
    /// inner sequence.
    pub to_objects: Option<Vec<String>>,
    /// Predicate filter; records that do not match are dropped.
    pub filter: Option<Value>,
    /// Path mapping entries, applied in declaration order. The value is
    /// either an output path string or `{path, delete, values}`.
    pub mapping: Option<Map<String, Value>>,
    /// Per-path value conversions, applied in declaration order.
    pub unit_mapping: Option<Map<String, Value>>,
    /// Top-level keys to keep.
    pub pick: Option<Vec<String>>,
    /// Top-level keys to drop.
    pub omit: Option<Vec<String>>,
    /// Shallow defaults merged onto every record (entries overwrite).
    pub merge: Option<Map<String, Value>>,
    /// Keep sequence output even when the input was a lone record.
    pub as_array: bool,
    /// Collapse sequence output to its first element.
    pub as_object: bool,
}

/// How a pipeline reshapes batches: a declarative spec or a user callback.
pub enum Transform {
    /// Run the batch through [`transform`] with this spec.
    Declarative(TransformSpec),
    /// Hand the owned batch to arbitrary user logic.
    Callback(Box<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>),
}

impl Transform {
    /// Apply this transform to an owned batch.
    pub fn apply(&self, batch: Value) -> Result<Value> {
        match self {
            Self::Declarative(spec) => transform(batch, spec),
            Self::Callback(f) => f(batch).map_err(|err| TransferError::Transform {
                path: "<callback>".to_string(),
                index: 0,
                message: format!("{err:#}"),
            }),
        }
    }
}

impl From<TransformSpec> for Transform {
    fn from(spec: TransformSpec) -> Self {
        Self::Declarative(spec)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declarative(spec) => f.debug_tuple("Declarative").field(spec).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Apply `spec` to `batch`, producing the reshaped batch.
pub fn transform(batch: Value, spec: &TransformSpec) -> Result<Value> {
    let mut value = batch;

    if spec.to_array {
        if let Value::Object(map) = value {
            value = Value::Array(map.into_iter().map(|(_, v)| v).collect());
        }
    }

    if let Some(names) = &spec.to_objects {
        value = zip_objects(value, names);
    }

    let was_array = value.is_array();
    let mut records: Vec<Value> = match value {
        Value::Array(items) => items,
        lone => vec![lone],
    };

    if let Some(filter) = &spec.filter {
        records.retain(|record| matcher::matches(record, filter));
    }

    if let Some(mapping) = &spec.mapping {
        apply_mapping(&mut records, mapping)?;
    }

    if let Some(unit_mapping) = &spec.unit_mapping {
        apply_unit_mapping(&mut records, unit_mapping)?;
    }

    for record in &mut records {
        if let Some(keys) = &spec.pick {
            if let Value::Object(map) = record {
                map.retain(|k, _| keys.iter().any(|keep| keep == k));
            }
        }
        if let Some(keys) = &spec.omit {
            if let Value::Object(map) = record {
                for key in keys {
                    map.shift_remove(key);
                }
            }
        }
        if let Some(defaults) = &spec.merge {
            if let Value::Object(map) = record {
                for (k, v) in defaults {
                    map.insert(k.clone(), v.clone());
                }
            }
        }
    }

    let collapse = if was_array { spec.as_object } else { !spec.as_array };
    Ok(if collapse {
        records.into_iter().next().unwrap_or_else(|| json!({}))
    } else {
        Value::Array(records)
    })
}

/// Zip each inner array against `names`, producing one object per inner
/// array. Non-array input (or inner elements) pass through untouched.
fn zip_objects(value: Value, names: &[String]) -> Value {
    let Value::Array(rows) = value else {
        return value;
    };
    Value::Array(
        rows.into_iter()
            .map(|row| match row {
                Value::Array(cells) => {
                    let mut object = Map::new();
                    for (cell, name) in cells.into_iter().zip(names) {
                        object.insert(name.clone(), cell);
                    }
                    Value::Object(object)
                }
                other => other,
            })
            .collect(),
    )
}

/// One parsed `mapping` entry.
struct MappingTarget<'a> {
    output: &'a str,
    delete: bool,
    values: Option<&'a Map<String, Value>>,
}

fn parse_mapping_target<'a>(input: &str, target: &'a Value) -> Result<MappingTarget<'a>> {
    match target {
        Value::String(output) => Ok(MappingTarget {
            output,
            delete: true,
            values: None,
        }),
        Value::Object(map) => {
            let output = map
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    TransferError::Configuration(format!(
                        "mapping entry '{input}' is missing a 'path'"
                    ))
                })?;
            Ok(MappingTarget {
                output,
                delete: map.get("delete").and_then(Value::as_bool).unwrap_or(true),
                values: map.get("values").and_then(Value::as_object),
            })
        }
        _ => Err(TransferError::Configuration(format!(
            "mapping entry '{input}' must be a path or an object"
        ))),
    }
}

fn apply_mapping(records: &mut [Value], mapping: &Map<String, Value>) -> Result<()> {
    for (input, target) in mapping {
        let target = parse_mapping_target(input, target)?;
        for record in records.iter_mut() {
            let Some(found) = path::get(record, input) else {
                continue;
            };
            let mut value = found.clone();
            if let Some(table) = target.values {
                value = table.get(&lookup_key(&value)).cloned().unwrap_or(Value::Null);
            }
            path::set(record, target.output, value);
        }
        if target.delete {
            for record in records.iter_mut() {
                path::unset(record, input);
            }
        }
    }
    Ok(())
}

/// Lookup-table key for a value, matching JS object-key coercion.
fn lookup_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// One parsed `unitMapping` entry.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UnitSpec {
    /// `"utc"` or `"local"`; parses the value as a date.
    as_date: Option<String>,
    /// `true` for plain stringification, or an integer radix (2..=36).
    as_string: Option<Value>,
    /// Numeric coercion, stripping spaces used as thousands separators.
    as_number: bool,
    /// Case conversion applied to string results: `lower`, `upper`,
    /// `capitalize` (lodash `toLower`/`toUpper` accepted).
    as_case: Option<String>,
    /// Source unit or date format.
    from: Option<String>,
    /// Target unit or date format.
    to: Option<String>,
    /// Default written when the path is absent on a record.
    empty: Option<Value>,
}

fn apply_unit_mapping(records: &mut [Value], unit_mapping: &Map<String, Value>) -> Result<()> {
    for (target_path, raw) in unit_mapping {
        let spec: UnitSpec = serde_json::from_value(raw.clone()).map_err(|err| {
            TransferError::Configuration(format!(
                "invalid unitMapping entry for '{target_path}': {err}"
            ))
        })?;
        for (index, record) in records.iter_mut().enumerate() {
            match path::get(record, target_path) {
                Some(found) => {
                    let converted = convert_value(found.clone(), &spec)
                        .map_err(|message| TransferError::transform(target_path, index, message))?;
                    path::set(record, target_path, converted);
                }
                None => {
                    if let Some(default) = &spec.empty {
                        path::set(record, target_path, default.clone());
                    }
                }
            }
        }
    }
    Ok(())
}

/// Run a single value through a [`UnitSpec`]. Errors are plain messages;
/// the caller attaches path and record index.
fn convert_value(value: Value, spec: &UnitSpec) -> std::result::Result<Value, String> {
    let mut value = if let Some(mode) = &spec.as_date {
        convert_date(&value, mode, spec.from.as_deref(), spec.to.as_deref())?
    } else if let Some(as_string) = &spec.as_string {
        convert_string(&value, as_string)?
    } else if spec.as_number {
        convert_number(&value)?
    } else if let (Some(from), Some(to)) = (spec.from.as_deref(), spec.to.as_deref()) {
        let number = value
            .as_f64()
            .ok_or_else(|| format!("expected a number for unit conversion, got {value}"))?;
        let converted = units::convert(number, from, to)
            .ok_or_else(|| format!("cannot convert '{from}' to '{to}'"))?;
        json!(converted)
    } else if spec.from.is_some() || spec.to.is_some() {
        return Err("unit conversion needs both 'from' and 'to'".to_string());
    } else {
        value
    };

    if let Some(case) = &spec.as_case {
        if let Value::String(s) = &value {
            value = Value::String(convert_case(s, case)?);
        }
    }
    Ok(value)
}

fn convert_date(
    value: &Value,
    mode: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> std::result::Result<Value, String> {
    let utc = match mode {
        "utc" => true,
        "local" => false,
        other => return Err(format!("unknown asDate mode '{other}'")),
    };
    let parsed: DateTime<Utc> = match value {
        // Numbers are epoch milliseconds.
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .ok_or_else(|| format!("epoch timestamp out of range: {n}"))?;
            DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| format!("epoch timestamp out of range: {millis}"))?
        }
        Value::String(s) => parse_date_str(s, from, utc)?,
        other => return Err(format!("expected a date string or timestamp, got {other}")),
    };
    Ok(match to {
        Some(format) => {
            // Bad specifiers surface as Item::Error; rendering one
            // panics inside Display, so reject the format up front.
            let items: Vec<chrono::format::Item<'_>> =
                chrono::format::StrftimeItems::new(format).collect();
            if items.contains(&chrono::format::Item::Error) {
                return Err(format!("invalid date format '{format}'"));
            }
            if utc {
                Value::String(parsed.format_with_items(items.into_iter()).to_string())
            } else {
                Value::String(
                    parsed
                        .with_timezone(&Local)
                        .format_with_items(items.into_iter())
                        .to_string(),
                )
            }
        }
        None => Value::String(parsed.to_rfc3339()),
    })
}

fn parse_date_str(
    s: &str,
    from: Option<&str>,
    utc: bool,
) -> std::result::Result<DateTime<Utc>, String> {
    if let Some(format) = from {
        let naive = NaiveDateTime::parse_from_str(s, format)
            .or_else(|_| NaiveDate::parse_from_str(s, format).map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid")))
            .map_err(|err| format!("cannot parse date '{s}' with format '{format}': {err}"))?;
        return Ok(if utc {
            Utc.from_utc_datetime(&naive)
        } else {
            Local
                .from_local_datetime(&naive)
                .earliest()
                .ok_or_else(|| format!("ambiguous local date '{s}'"))?
                .with_timezone(&Utc)
        });
    }
    // No source format: RFC 3339, then common ISO shapes.
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid")))
        .map_err(|_| format!("cannot parse date '{s}'"))?;
    Ok(if utc {
        Utc.from_utc_datetime(&naive)
    } else {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| format!("ambiguous local date '{s}'"))?
            .with_timezone(&Utc)
    })
}

fn convert_string(value: &Value, as_string: &Value) -> std::result::Result<Value, String> {
    if let Some(radix) = as_string.as_u64() {
        if !(2..=36).contains(&radix) {
            return Err(format!("radix {radix} out of range (2..=36)"));
        }
        let number = value
            .as_i64()
            .ok_or_else(|| format!("expected an integer for radix conversion, got {value}"))?;
        return Ok(Value::String(to_radix(number, radix as u32)));
    }
    Ok(Value::String(match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }))
}

fn to_radix(number: i64, radix: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if number == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    let mut n = number.unsigned_abs();
    while n > 0 {
        out.push(DIGITS[(n % u64::from(radix)) as usize]);
        n /= u64::from(radix);
    }
    if number < 0 {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).expect("radix digits are ASCII")
}

fn convert_number(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        // Large numbers are sometimes written with space separators,
        // like '120 000'; strip them before parsing.
        Value::String(s) => {
            let cleaned = s.replace(' ', "");
            let parsed: f64 = cleaned
                .parse()
                .map_err(|_| format!("cannot parse '{s}' as a number"))?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| format!("'{s}' is not a finite number"))
        }
        other => Err(format!("expected a number or numeric string, got {other}")),
    }
}

fn convert_case(s: &str, case: &str) -> std::result::Result<String, String> {
    Ok(match case {
        "lower" | "lowercase" | "toLower" => s.to_lowercase(),
        "upper" | "uppercase" | "toUpper" => s.to_uppercase(),
        "capitalize" => {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str(),
                None => String::new(),
            }
        }
        other => return Err(format!("unknown asCase '{other}'")),
    })
}
