//! Schema sampler capability.
//!
//! The dispatcher treats schemas as opaque: it asks a [`SchemaSampler`] for
//! a conforming sample or for a validation verdict and never looks inside
//! the schema itself. [`JsonSchemaSampler`] is the implementation used by
//! the binary; validation is delegated to the `jsonschema` crate and samples
//! come from a small random generator over the common JSON-schema keywords.
//! `pattern` strings are generated by `rand_regex`; `format` values get a
//! conforming shape for the common formats and are otherwise treated as an
//! annotation.

use crate::controls::Controls;
use crate::error::{HarnessError, Result};
use crate::types::Action;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};

const MAX_DEPTH: usize = 16;
const DEFAULT_EXTRA_ITEMS: u64 = 3;
const DEFAULT_EXTRA_CHARS: u64 = 8;
const DEFAULT_NUMBER_SPAN: f64 = 100.0;
const PATTERN_MAX_REPEAT: u32 = 8;
const PATTERN_ATTEMPTS: usize = 64;
/// 2^63: the first integral `f64` past `i64::MAX`.
const I64_EDGE: f64 = 9_223_372_036_854_775_808.0;

// ---------------------------------------------------------------------------
// SchemaSampler
// ---------------------------------------------------------------------------

pub trait SchemaSampler: Send {
    /// Produce one value that conforms to `schema`.
    fn sample(&mut self, schema: &Value) -> Result<Value>;

    /// `Ok(())` if `value` conforms to `schema`, otherwise
    /// [`HarnessError::InvalidPayload`] listing the violations.
    fn validate(&self, value: &Value, schema: &Value) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JsonSchemaSampler
// ---------------------------------------------------------------------------

pub struct JsonSchemaSampler {
    rng: StdRng,
}

impl JsonSchemaSampler {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// A sampler whose output is fully determined by `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for JsonSchemaSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaSampler for JsonSchemaSampler {
    fn sample(&mut self, schema: &Value) -> Result<Value> {
        Generator { rng: &mut self.rng }.value(schema, 0)
    }

    fn validate(&self, value: &Value, schema: &Value) -> Result<()> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| HarnessError::InvalidPayload(format!("invalid schema: {e}")))?;
        let errors: Vec<String> = validator
            .iter_errors(value)
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::InvalidPayload(errors.join("; ")))
        }
    }
}

// ---------------------------------------------------------------------------
// Payload preparation
// ---------------------------------------------------------------------------

/// Work out the `data` string to send with `action`.
///
/// - no schema: no data, whatever was supplied
/// - schema, nothing supplied: a fresh sample
/// - schema, payload supplied: it must be JSON and, when
///   `controls.validate_schema` is set, conform to the schema. The payload is
///   forwarded as written.
pub fn prepare_payload(
    action: &Action,
    supplied: Option<String>,
    controls: &Controls,
    sampler: &mut dyn SchemaSampler,
) -> Result<Option<String>> {
    let Some(schema) = action.schema.as_ref() else {
        return Ok(None);
    };

    match supplied {
        None => {
            let sample = sampler.sample(schema)?;
            Ok(Some(serde_json::to_string(&sample)?))
        }
        Some(text) => {
            let value: Value = serde_json::from_str(&text)
                .map_err(|e| HarnessError::InvalidPayload(format!("JSON decode error: {e}")))?;
            if controls.validate_schema {
                sampler.validate(&value, schema)?;
            }
            Ok(Some(text))
        }
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

struct Generator<'r> {
    rng: &'r mut StdRng,
}

impl Generator<'_> {
    fn value(&mut self, schema: &Value, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(HarnessError::Sampler(format!(
                "schema nesting deeper than {MAX_DEPTH}"
            )));
        }

        let obj = match schema {
            Value::Bool(true) => return Ok(Value::Null),
            Value::Bool(false) => {
                return Err(HarnessError::Sampler("schema `false` accepts nothing".into()))
            }
            Value::Object(obj) => obj,
            other => {
                return Err(HarnessError::Sampler(format!(
                    "expected a schema object, found {other}"
                )))
            }
        };

        for keyword in ["multipleOf", "allOf", "$ref", "not"] {
            if obj.contains_key(keyword) {
                return Err(HarnessError::Sampler(format!(
                    "keyword `{keyword}` is not supported"
                )));
            }
        }

        if let Some(c) = obj.get("const") {
            return Ok(c.clone());
        }
        if let Some(options) = obj.get("enum") {
            let options = options
                .as_array()
                .ok_or_else(|| HarnessError::Sampler("`enum` must be an array".into()))?;
            return options
                .choose(self.rng)
                .cloned()
                .ok_or_else(|| HarnessError::Sampler("`enum` is empty".into()));
        }
        for keyword in ["oneOf", "anyOf"] {
            if let Some(branches) = obj.get(keyword) {
                let first = branches
                    .as_array()
                    .and_then(|b| b.first())
                    .ok_or_else(|| HarnessError::Sampler(format!("`{keyword}` is empty")))?;
                return self.value(first, depth + 1);
            }
        }

        match self.type_of(obj)? {
            "object" => self.object(obj, depth),
            "array" => self.array(obj, depth),
            "string" => self.string(obj).map(Value::String),
            "integer" => self.integer(obj),
            "number" => self.number(obj),
            "boolean" => Ok(Value::Bool(self.rng.gen())),
            "null" => Ok(Value::Null),
            other => Err(HarnessError::Sampler(format!("unknown type `{other}`"))),
        }
    }

    fn type_of<'s>(&mut self, obj: &'s Map<String, Value>) -> Result<&'s str> {
        match obj.get("type") {
            Some(Value::String(t)) => Ok(t.as_str()),
            Some(Value::Array(types)) => {
                let names: Vec<&str> = types.iter().filter_map(|t| t.as_str()).collect();
                names
                    .choose(self.rng)
                    .copied()
                    .ok_or_else(|| HarnessError::Sampler("empty `type` list".into()))
            }
            Some(other) => Err(HarnessError::Sampler(format!("bad `type` value {other}"))),
            None if obj.contains_key("properties") => Ok("object"),
            None if obj.contains_key("items") => Ok("array"),
            None => Ok("null"),
        }
    }

    fn object(&mut self, obj: &Map<String, Value>, depth: usize) -> Result<Value> {
        let required: Vec<&str> = obj
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|n| n.as_str()).collect())
            .unwrap_or_default();

        let mut out = Map::new();
        if let Some(Value::Object(props)) = obj.get("properties") {
            for (name, prop) in props {
                if required.contains(&name.as_str()) || self.rng.gen_bool(0.5) {
                    out.insert(name.clone(), self.value(prop, depth + 1)?);
                }
            }
        }
        for name in required {
            out.entry(name.to_string()).or_insert(Value::Null);
        }
        Ok(Value::Object(out))
    }

    fn array(&mut self, obj: &Map<String, Value>, depth: usize) -> Result<Value> {
        if let Some(Value::Array(tuple)) = obj.get("items") {
            let items = tuple
                .iter()
                .map(|s| self.value(s, depth + 1))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Value::Array(items));
        }

        let min = u64_keyword(obj, "minItems").unwrap_or(0);
        let max = u64_keyword(obj, "maxItems").unwrap_or(min + DEFAULT_EXTRA_ITEMS);
        if max < min {
            return Err(HarnessError::Sampler("maxItems < minItems".into()));
        }
        let len = self.rng.gen_range(min..=max);
        let item_schema = obj.get("items").cloned().unwrap_or(Value::Bool(true));
        let items = (0..len)
            .map(|_| self.value(&item_schema, depth + 1))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Array(items))
    }

    fn string(&mut self, obj: &Map<String, Value>) -> Result<String> {
        if let Some(pattern) = obj.get("pattern").and_then(|p| p.as_str()) {
            let min = u64_keyword(obj, "minLength").unwrap_or(0);
            let max = u64_keyword(obj, "maxLength").unwrap_or(u64::MAX);
            return self.pattern(pattern, min, max);
        }
        if let Some(formatted) = obj
            .get("format")
            .and_then(|f| f.as_str())
            .and_then(|f| self.format(f))
        {
            return Ok(formatted);
        }

        let min = u64_keyword(obj, "minLength").unwrap_or(1);
        let max = u64_keyword(obj, "maxLength")
            .unwrap_or(min + DEFAULT_EXTRA_CHARS)
            .max(min);
        let len = self.rng.gen_range(min..=max);
        Ok(self.alphanumeric(len))
    }

    /// A string matching `pattern`, retried until it also fits the length
    /// bounds. Leading `^` and trailing `$` are dropped: generated strings
    /// always match in full.
    fn pattern(&mut self, pattern: &str, min: u64, max: u64) -> Result<String> {
        let mut body = pattern.strip_prefix('^').unwrap_or(pattern);
        if body.ends_with('$') && !body.ends_with("\\$") {
            body = &body[..body.len() - 1];
        }
        let regex = rand_regex::Regex::compile(body, PATTERN_MAX_REPEAT).map_err(|e| {
            HarnessError::Sampler(format!("cannot generate strings for pattern `{pattern}`: {e}"))
        })?;

        for _ in 0..PATTERN_ATTEMPTS {
            let candidate: String = self.rng.sample(&regex);
            let len = candidate.chars().count() as u64;
            if (min..=max).contains(&len) {
                return Ok(candidate);
            }
        }
        Err(HarnessError::Sampler(format!(
            "no string of length {min}..={max} found for pattern `{pattern}`"
        )))
    }

    /// A value shaped like `format`, or `None` for formats left unchecked.
    fn format(&mut self, format: &str) -> Option<String> {
        let date = |rng: &mut StdRng| {
            format!(
                "{:04}-{:02}-{:02}",
                rng.gen_range(2000..=2030),
                rng.gen_range(1..=12),
                rng.gen_range(1..=28)
            )
        };
        let time = |rng: &mut StdRng| {
            format!(
                "{:02}:{:02}:{:02}Z",
                rng.gen_range(0..24),
                rng.gen_range(0..60),
                rng.gen_range(0..60)
            )
        };

        let value = match format {
            "email" => format!("{}@example.com", self.alphanumeric(6).to_lowercase()),
            "hostname" => format!("{}.example.com", self.alphanumeric(6).to_lowercase()),
            "uri" => format!("https://example.com/{}", self.alphanumeric(6)),
            "date" => date(&mut *self.rng),
            "time" => time(&mut *self.rng),
            "date-time" => format!("{}T{}", date(&mut *self.rng), time(&mut *self.rng)),
            "ipv4" => {
                let octets: [u8; 4] = self.rng.gen();
                format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
            }
            "uuid" => {
                let hex: String = (0..32)
                    .map(|_| format!("{:x}", self.rng.gen_range(0..16u8)))
                    .collect();
                format!(
                    "{}-{}-4{}-a{}-{}",
                    &hex[0..8],
                    &hex[8..12],
                    &hex[13..16],
                    &hex[17..20],
                    &hex[20..32]
                )
            }
            _ => return None,
        };
        Some(value)
    }

    fn alphanumeric(&mut self, len: u64) -> String {
        (0..len)
            .map(|_| self.rng.sample(Alphanumeric) as char)
            .collect()
    }

    fn integer(&mut self, obj: &Map<String, Value>) -> Result<Value> {
        let empty = || HarnessError::Sampler("integer range is empty".into());
        let lo = match (f64_keyword(obj, "minimum"), f64_keyword(obj, "exclusiveMinimum")) {
            (_, Some(ex)) => Some(
                lower_bound(ex.floor())
                    .and_then(|n| n.checked_add(1))
                    .ok_or_else(empty)?,
            ),
            (Some(min), None) => Some(lower_bound(min.ceil()).ok_or_else(empty)?),
            (None, None) => None,
        };
        let hi = match (f64_keyword(obj, "maximum"), f64_keyword(obj, "exclusiveMaximum")) {
            (_, Some(ex)) => Some(
                upper_bound(ex.ceil())
                    .and_then(|n| n.checked_sub(1))
                    .ok_or_else(empty)?,
            ),
            (Some(max), None) => Some(upper_bound(max.floor()).ok_or_else(empty)?),
            (None, None) => None,
        };
        let span = DEFAULT_NUMBER_SPAN as i64;
        let (lo, hi) = match (lo, hi) {
            (Some(lo), Some(hi)) => (lo, hi),
            (Some(lo), None) => (lo, lo.saturating_add(span)),
            (None, Some(hi)) => (hi.saturating_sub(span), hi),
            (None, None) => (0, span),
        };
        if hi < lo {
            return Err(empty());
        }
        Ok(Value::from(self.rng.gen_range(lo..=hi)))
    }

    fn number(&mut self, obj: &Map<String, Value>) -> Result<Value> {
        let ex_lo = f64_keyword(obj, "exclusiveMinimum");
        let ex_hi = f64_keyword(obj, "exclusiveMaximum");
        let lo = ex_lo.or_else(|| f64_keyword(obj, "minimum"));
        let hi = ex_hi.or_else(|| f64_keyword(obj, "maximum"));
        let (lo, hi) = match (lo, hi) {
            (Some(lo), Some(hi)) => (lo, hi),
            (Some(lo), None) => (lo, lo + DEFAULT_NUMBER_SPAN),
            (None, Some(hi)) => (hi - DEFAULT_NUMBER_SPAN, hi),
            (None, None) => (0.0, DEFAULT_NUMBER_SPAN),
        };
        if hi < lo || (hi == lo && (ex_lo.is_some() || ex_hi.is_some())) {
            return Err(HarnessError::Sampler("number range is empty".into()));
        }

        if !(lo.is_finite() && hi.is_finite()) {
            return Err(HarnessError::Sampler("number bounds are not finite".into()));
        }

        // Interpolate instead of `gen_range`: `hi - lo` can overflow.
        let t: f64 = self.rng.gen();
        let mut x = (lo * (1.0 - t) + hi * t).clamp(lo, hi);
        if (ex_lo.is_some() && x <= lo) || (ex_hi.is_some() && x >= hi) {
            x = lo / 2.0 + hi / 2.0;
            if x <= lo || x >= hi {
                return Err(HarnessError::Sampler("number range is empty".into()));
            }
        }
        serde_json::Number::from_f64(x)
            .map(Value::Number)
            .ok_or_else(|| HarnessError::Sampler("number bounds are not finite".into()))
    }
}

/// An integral lower bound as `i64`; `None` when no `i64` reaches it.
fn lower_bound(x: f64) -> Option<i64> {
    (x < I64_EDGE).then_some(x as i64)
}

/// An integral upper bound as `i64`; `None` when every `i64` exceeds it.
fn upper_bound(x: f64) -> Option<i64> {
    (x >= -I64_EDGE).then_some(x as i64)
}

fn u64_keyword(obj: &Map<String, Value>, key: &str) -> Option<u64> {
    obj.get(key).and_then(|v| v.as_u64())
}

fn f64_keyword(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(|v| v.as_f64())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conforms(schema: Value) {
        let mut sampler = JsonSchemaSampler::seeded(42);
        for _ in 0..50 {
            let v = sampler.sample(&schema).unwrap();
            sampler
                .validate(&v, &schema)
                .unwrap_or_else(|e| panic!("{v} does not match {schema}: {e}"));
        }
    }

    #[test]
    fn samples_object_with_required_string() {
        conforms(json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        }));
    }

    #[test]
    fn samples_nested_structures() {
        conforms(json!({
            "type": "object",
            "properties": {
                "target": {"enum": ["left", "right", "up"]},
                "count": {"type": "integer", "minimum": 1, "maximum": 3},
                "ratio": {"type": "number", "exclusiveMinimum": 0, "exclusiveMaximum": 1},
                "tags": {"type": "array", "items": {"type": "string", "maxLength": 4}, "minItems": 1, "maxItems": 2},
                "confirm": {"type": "boolean"},
                "note": {"type": ["string", "null"]}
            },
            "required": ["target", "count", "ratio", "tags", "confirm"]
        }));
    }

    #[test]
    fn samples_const_and_one_of() {
        conforms(json!({"const": 5}));
        conforms(json!({"oneOf": [{"type": "integer", "minimum": 10, "maximum": 10}, {"type": "string"}]}));
    }

    #[test]
    fn seeded_samplers_agree() {
        let schema = json!({"type": "array", "items": {"type": "integer"}, "maxItems": 10});
        let a = JsonSchemaSampler::seeded(9).sample(&schema).unwrap();
        let b = JsonSchemaSampler::seeded(9).sample(&schema).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn samples_patterns_and_formats() {
        conforms(json!({"type": "string", "pattern": "^[a-z]{3}-[0-9]{2}$"}));
        conforms(json!({"type": "string", "pattern": "ab+c", "maxLength": 6}));
        conforms(json!({
            "type": "object",
            "properties": {
                "to": {"type": "string", "format": "email"},
                "on": {"type": "string", "format": "date"},
                "at": {"type": "string", "format": "date-time"},
                "id": {"type": "string", "format": "uuid"},
                "host": {"type": "string", "format": "ipv4"},
                "misc": {"type": "string", "format": "x-custom"}
            },
            "required": ["to", "on", "at", "id", "host", "misc"]
        }));
    }

    #[test]
    fn unsatisfiable_pattern_length_is_an_error() {
        let mut sampler = JsonSchemaSampler::seeded(1);
        let err = sampler
            .sample(&json!({"type": "string", "pattern": "^a{10}$", "maxLength": 3}))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Sampler(ref m) if m.contains("pattern")));
    }

    #[test]
    fn unsupported_keyword_is_an_error() {
        let mut sampler = JsonSchemaSampler::seeded(1);
        let err = sampler
            .sample(&json!({"type": "integer", "multipleOf": 3}))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Sampler(ref m) if m.contains("multipleOf")));
    }

    #[test]
    fn extreme_number_bounds_stay_in_range() {
        conforms(json!({"type": "number", "minimum": -1e308, "maximum": 1e308}));
        conforms(json!({"type": "number", "exclusiveMinimum": -1.7e308, "exclusiveMaximum": 1.7e308}));
        conforms(json!({"type": "number", "minimum": 1.7e308}));
    }

    #[test]
    fn integer_bounds_beyond_i64_are_handled() {
        let mut sampler = JsonSchemaSampler::seeded(1);
        for schema in [
            json!({"type": "integer", "exclusiveMinimum": 1e19}),
            json!({"type": "integer", "minimum": 1e19}),
            json!({"type": "integer", "exclusiveMaximum": -9.223372036854775808e18}),
        ] {
            let err = sampler.sample(&schema).unwrap_err();
            assert!(matches!(err, HarnessError::Sampler(ref m) if m == "integer range is empty"));
        }
        conforms(json!({"type": "integer", "minimum": -1e30, "maximum": 5}));
        conforms(json!({"type": "integer", "exclusiveMaximum": 1e30}));
    }

    #[test]
    fn empty_integer_range_is_an_error() {
        let mut sampler = JsonSchemaSampler::seeded(1);
        assert!(sampler
            .sample(&json!({"type": "integer", "minimum": 5, "maximum": 4}))
            .is_err());
    }

    #[test]
    fn validate_reports_violations() {
        let sampler = JsonSchemaSampler::seeded(1);
        let schema = json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]});
        let err = sampler.validate(&json!({"text": 3}), &schema).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidPayload(_)));
        assert!(sampler.validate(&json!({"text": "ok"}), &schema).is_ok());
    }

    fn say_action() -> Action {
        Action::new("say", "Say something").with_schema(json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        }))
    }

    #[test]
    fn prepare_payload_without_schema_is_none() {
        let mut sampler = JsonSchemaSampler::seeded(1);
        let payload = prepare_payload(
            &Action::new("jump", "Jump"),
            Some("{\"ignored\":true}".into()),
            &Controls::default(),
            &mut sampler,
        )
        .unwrap();
        assert_eq!(payload, None);
    }

    #[test]
    fn prepare_payload_samples_when_nothing_supplied() {
        let mut sampler = JsonSchemaSampler::seeded(1);
        let action = say_action();
        let payload = prepare_payload(&action, None, &Controls::default(), &mut sampler)
            .unwrap()
            .unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();
        assert!(value["text"].is_string());
    }

    #[test]
    fn prepare_payload_forwards_supplied_text_verbatim() {
        let mut sampler = JsonSchemaSampler::seeded(1);
        let text = "{ \"text\" : \"hello\" }".to_string();
        let payload =
            prepare_payload(&say_action(), Some(text.clone()), &Controls::default(), &mut sampler)
                .unwrap();
        assert_eq!(payload, Some(text));
    }

    #[test]
    fn prepare_payload_validation_follows_control() {
        let mut sampler = JsonSchemaSampler::seeded(1);
        let bad = Some("{\"text\": 1}".to_string());

        let err = prepare_payload(&say_action(), bad.clone(), &Controls::default(), &mut sampler)
            .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidPayload(_)));

        let lenient = Controls {
            validate_schema: false,
            ..Controls::default()
        };
        assert!(prepare_payload(&say_action(), bad, &lenient, &mut sampler).is_ok());
    }

    #[test]
    fn prepare_payload_rejects_non_json() {
        let mut sampler = JsonSchemaSampler::seeded(1);
        let err = prepare_payload(
            &say_action(),
            Some("not json".into()),
            &Controls::default(),
            &mut sampler,
        )
        .unwrap_err();
        assert!(err.to_string().contains("JSON decode error"));
    }
}
