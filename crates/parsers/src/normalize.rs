use regex::Regex;
use serde_json::{Map, Value};

/// Result of normalizing raw parser stdout into structured records. Never
/// fails on malformed input (§4.3) — degraded spots are recorded as
/// warnings alongside a best-effort partial record.
pub struct NormalizedOutput {
    pub payload: Value,
    pub warnings: Vec<String>
}

/// First non-empty line is a header; later lines are records aligned to it
/// by position. Short rows pad with empty strings instead of failing.
pub fn normalize_csv(raw: &str) -> NormalizedOutput {
    let mut warnings = Vec::new();
    let mut lines = raw.lines().filter(|l| !l.trim().is_empty());

    let Some(header_line) = lines.next() else {
        return NormalizedOutput { payload: Value::Array(vec![]), warnings: vec!["parse_degraded: empty input".to_string()] };
    };
    let headers: Vec<&str> = header_line.split(',').map(str::trim).collect();

    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split(',').collect();
        let mut row = Map::new();
        for (col, header) in headers.iter().enumerate() {
            let value = fields.get(col).map(|s| s.trim()).unwrap_or("");
            row.insert((*header).to_string(), Value::String(value.to_string()));
        }
        if fields.len() != headers.len() {
            warnings.push(format!("parse_degraded: row {i} has {} fields, expected {}", fields.len(), headers.len()));
        }
        rows.push(Value::Object(row));
    }

    NormalizedOutput { payload: Value::Array(rows), warnings }
}

/// Lines of `key: value`; a repeated key accumulates into a JSON array.
pub fn normalize_key_value(raw: &str) -> NormalizedOutput {
    let mut warnings = Vec::new();
    let mut map: Map<String, Value> = Map::new();

    for (i, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            warnings.push(format!("parse_degraded: line {i} is not key: value"));
            continue;
        };
        let key = key.trim().to_string();
        let value = Value::String(value.trim().to_string());

        match map.get_mut(&key) {
            Some(Value::Array(existing)) => existing.push(value),
            Some(existing) => {
                let prior = existing.clone();
                map.insert(key, Value::Array(vec![prior, value]));
            }
            None => {
                map.insert(key, value);
            }
        }
    }

    NormalizedOutput { payload: Value::Object(map), warnings }
}

/// Blocks separated by a header line matching `block_pattern`; each block's
/// body is parsed as key_value.
pub fn normalize_structured_blocks(raw: &str, block_pattern: &Regex) -> NormalizedOutput {
    let mut warnings = Vec::new();
    let mut blocks = Vec::new();
    let mut current_header: Option<String> = None;
    let mut current_body = String::new();

    let flush = |header: &Option<String>, body: &str, blocks: &mut Vec<Value>, warnings: &mut Vec<String>| {
        if let Some(header) = header {
            let body_normalized = normalize_key_value(body);
            warnings.extend(body_normalized.warnings);
            let mut block = Map::new();
            block.insert("header".to_string(), Value::String(header.clone()));
            block.insert("fields".to_string(), body_normalized.payload);
            blocks.push(Value::Object(block));
        }
    };

    for line in raw.lines() {
        if block_pattern.is_match(line) {
            flush(&current_header, &current_body, &mut blocks, &mut warnings);
            current_header = Some(line.trim().to_string());
            current_body.clear();
        } else if current_header.is_some() {
            current_body.push_str(line);
            current_body.push('\n');
        } else if !line.trim().is_empty() {
            warnings.push("parse_degraded: content before first block header is dropped".to_string());
        }
    }
    flush(&current_header, &current_body, &mut blocks, &mut warnings);

    NormalizedOutput { payload: Value::Array(blocks), warnings }
}

/// At most `line_cap` lines plus a total count (§4.3 default `N = 1000`).
pub fn normalize_free_text(raw: &str, line_cap: usize) -> NormalizedOutput {
    let all_lines: Vec<&str> = raw.lines().collect();
    let total = all_lines.len();
    let truncated: Vec<Value> = all_lines.iter().take(line_cap).map(|l| Value::String((*l).to_string())).collect();

    let mut warnings = Vec::new();
    if total > line_cap {
        warnings.push(format!("parse_degraded: truncated to {line_cap} of {total} lines"));
    }

    let mut payload = Map::new();
    payload.insert("lines".to_string(), Value::Array(truncated));
    payload.insert("total_line_count".to_string(), Value::Number(total.into()));
    NormalizedOutput { payload: Value::Object(payload), warnings }
}

/// Type-coerces a declared CSV column in place; coercion failure yields
/// `null` for that cell plus a warning rather than failing the whole row.
pub fn coerce_csv_column(output: &mut NormalizedOutput, column: &str, to_number: bool) {
    let Value::Array(rows) = &mut output.payload else { return };
    for (i, row) in rows.iter_mut().enumerate() {
        let Value::Object(row) = row else { continue };
        let Some(cell) = row.get_mut(column) else { continue };
        let Value::String(raw) = cell else { continue };

        if to_number {
            match raw.parse::<f64>() {
                Ok(n) => {
                    *cell = serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null);
                }
                Err(_) => {
                    output.warnings.push(format!("parse_degraded: row {i} column {column} is not numeric"));
                    *cell = Value::Null;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_pads_short_rows_and_warns() {
        let raw = "a,b,c\n1,2,3\n4,5\n";
        let result = normalize_csv(raw);
        assert_eq!(result.warnings.len(), 1);
        let Value::Array(rows) = result.payload else { panic!() };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["c"], Value::String(String::new()));
    }

    #[test]
    fn key_value_collects_repeated_keys_into_array() {
        let raw = "tag: a\ntag: b\nname: x\n";
        let result = normalize_key_value(raw);
        assert_eq!(result.payload["tag"], serde_json::json!(["a", "b"]));
        assert_eq!(result.payload["name"], Value::String("x".to_string()));
    }

    #[test]
    fn structured_blocks_splits_on_header_pattern() {
        let pattern = Regex::new(r"^Modem \d+").unwrap();
        let raw = "Modem 1\nstatus: up\nModem 2\nstatus: down\n";
        let result = normalize_structured_blocks(raw, &pattern);
        let Value::Array(blocks) = result.payload else { panic!() };
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["header"], Value::String("Modem 1".to_string()));
        assert_eq!(blocks[1]["fields"]["status"], Value::String("down".to_string()));
    }

    #[test]
    fn free_text_truncates_to_cap_and_reports_total() {
        let raw = (0..1500).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let result = normalize_free_text(&raw, 1000);
        assert_eq!(result.payload["total_line_count"], serde_json::json!(1500));
        let Value::Array(lines) = &result.payload["lines"] else { panic!() };
        assert_eq!(lines.len(), 1000);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn coerce_failure_yields_null_and_warning() {
        let mut result = normalize_csv("a\nnot_a_number\n");
        coerce_csv_column(&mut result, "a", true);
        let Value::Array(rows) = &result.payload else { panic!() };
        assert_eq!(rows[0]["a"], Value::Null);
        assert!(result.warnings.iter().any(|w| w.contains("not numeric")));
    }
}
