//! Host record accessors.
//!
//! The host exposes one typed getter per storage class and the writer picks
//! the getter that matches each field's declared type. Every getter returns
//! `None` for a null or absent value.

use std::borrow::Cow;

/// Read-only view of one incoming record.
pub trait Record {
    fn get_int32(&self, index: usize) -> Option<i32>;
    fn get_int64(&self, index: usize) -> Option<i64>;
    fn get_double(&self, index: usize) -> Option<f64>;
    fn get_bool(&self, index: usize) -> Option<bool>;
    fn get_string(&self, index: usize) -> Option<Cow<'_, str>>;
}

/// Render a double in shortest round-trip form.
///
/// Decimal exponents from -4 to 15 print positionally with at least one
/// fractional digit (`1.0`, `0.0001`); anything else prints in scientific form
/// with a signed two-digit exponent (`1e+16`, `1.5e-07`). Non-finite values are
/// `nan`, `inf` and `-inf`.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{value:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return sci;
    };
    if !(-4..16).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exp.unsigned_abs());
    }

    let (sign, unsigned) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = unsigned.chars().filter(|c| *c != '.').collect();
    let int_len = exp + 1;
    if int_len <= 0 {
        let zeros = "0".repeat(int_len.unsigned_abs() as usize);
        return format!("{sign}0.{zeros}{digits}");
    }
    let int_len = int_len as usize;
    if digits.len() <= int_len {
        let zeros = "0".repeat(int_len - digits.len());
        format!("{sign}{digits}{zeros}.0")
    } else {
        format!("{sign}{}.{}", &digits[..int_len], &digits[int_len..])
    }
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// A loosely typed field value, coerced on access.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Int(i64),
    Double(f64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    /// Convert a JSON value. Arrays and objects are kept as their JSON text.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => n.as_f64().map_or(FieldValue::Null, FieldValue::Double),
            },
            Value::String(s) => FieldValue::Text(s),
            other @ (Value::Array(_) | Value::Object(_)) => FieldValue::Text(other.to_string()),
        }
    }

    fn as_int64(&self) -> Option<i64> {
        match self {
            FieldValue::Null => None,
            FieldValue::Int(i) => Some(*i),
            FieldValue::Double(d) if d.is_finite() => {
                let truncated = d.trunc();
                if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
                    Some(truncated as i64)
                } else {
                    None
                }
            }
            FieldValue::Double(_) => None,
            FieldValue::Bool(b) => Some(i64::from(*b)),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_double(&self) -> Option<f64> {
        match self {
            FieldValue::Null => None,
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Double(d) => Some(*d),
            FieldValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Null => None,
            FieldValue::Int(i) => Some(*i != 0),
            FieldValue::Double(d) => Some(*d != 0.0),
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(s) => match s.trim() {
                "true" | "True" | "TRUE" | "1" => Some(true),
                "false" | "False" | "FALSE" | "0" => Some(false),
                _ => None,
            },
        }
    }

    fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            FieldValue::Null => None,
            FieldValue::Int(i) => Some(Cow::Owned(i.to_string())),
            FieldValue::Double(d) => Some(Cow::Owned(format_double(*d))),
            FieldValue::Bool(b) => Some(Cow::Borrowed(format_bool(*b))),
            FieldValue::Text(s) => Some(Cow::Borrowed(s)),
        }
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

impl Record for [FieldValue] {
    fn get_int32(&self, index: usize) -> Option<i32> {
        self.get(index)?
            .as_int64()
            .and_then(|v| i32::try_from(v).ok())
    }

    fn get_int64(&self, index: usize) -> Option<i64> {
        self.get(index)?.as_int64()
    }

    fn get_double(&self, index: usize) -> Option<f64> {
        self.get(index)?.as_double()
    }

    fn get_bool(&self, index: usize) -> Option<bool> {
        self.get(index)?.as_bool()
    }

    fn get_string(&self, index: usize) -> Option<Cow<'_, str>> {
        self.get(index)?.as_text()
    }
}

impl Record for Vec<FieldValue> {
    fn get_int32(&self, index: usize) -> Option<i32> {
        self.as_slice().get_int32(index)
    }

    fn get_int64(&self, index: usize) -> Option<i64> {
        self.as_slice().get_int64(index)
    }

    fn get_double(&self, index: usize) -> Option<f64> {
        self.as_slice().get_double(index)
    }

    fn get_bool(&self, index: usize) -> Option<bool> {
        self.as_slice().get_bool(index)
    }

    fn get_string(&self, index: usize) -> Option<Cow<'_, str>> {
        self.as_slice().get_string(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn double_rendering() {
        assert_eq!(format_double(1.0), "1.0");
        assert_eq!(format_double(2.5), "2.5");
        assert_eq!(format_double(-0.0), "-0.0");
        assert_eq!(format_double(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_double(f64::NAN), "nan");
        assert_eq!(format_double(f64::INFINITY), "inf");
        assert_eq!(format_double(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn double_rendering_switches_to_exponent_form() {
        assert_eq!(format_double(0.0001), "0.0001");
        assert_eq!(format_double(0.00001), "1e-05");
        assert_eq!(format_double(1e-7), "1e-07");
        assert_eq!(format_double(1.5e-7), "1.5e-07");
        assert_eq!(format_double(123456.789), "123456.789");
        assert_eq!(format_double(1e15), "1000000000000000.0");
        assert_eq!(format_double(9_999_999_999_999_998.0), "9999999999999998.0");
        assert_eq!(format_double(1e16), "1e+16");
        assert_eq!(format_double(-2.5e20), "-2.5e+20");
        assert_eq!(format_double(1e100), "1e+100");
        assert_eq!(format_double(-0.015), "-0.015");
    }

    #[test]
    fn bool_rendering() {
        assert_eq!(format_bool(true), "True");
        assert_eq!(format_bool(false), "False");
    }

    #[test]
    fn typed_getters_coerce() {
        let record: Vec<FieldValue> = vec![
            FieldValue::Int(7),
            FieldValue::Double(3.9),
            FieldValue::Text(" 42 ".into()),
            FieldValue::Bool(true),
            FieldValue::Int(i64::from(i32::MAX) + 1),
        ];

        assert_eq!(record.get_int32(0), Some(7));
        assert_eq!(record.get_double(0), Some(7.0));
        assert_eq!(record.get_int64(1), Some(3));
        assert_eq!(record.get_int32(2), Some(42));
        assert_eq!(record.get_bool(2), None);
        assert_eq!(record.get_int32(3), Some(1));
        assert_eq!(record.get_string(3).as_deref(), Some("True"));
        assert_eq!(record.get_int32(4), None);
        assert_eq!(record.get_int64(4), Some(2_147_483_648));
    }

    #[test]
    fn null_and_out_of_range_are_none() {
        let record = vec![FieldValue::Null];
        assert_eq!(record.get_int32(0), None);
        assert_eq!(record.get_double(0), None);
        assert_eq!(record.get_bool(0), None);
        assert_eq!(record.get_string(0), None);
        assert_eq!(record.get_string(5), None);
    }

    #[test]
    fn text_is_borrowed() {
        let record = vec![FieldValue::from("abc")];
        assert!(matches!(record.get_string(0), Some(Cow::Borrowed("abc"))));
    }

    #[test]
    fn json_conversion() {
        assert_eq!(FieldValue::from_json(json!(null)), FieldValue::Null);
        assert_eq!(FieldValue::from_json(json!(5)), FieldValue::Int(5));
        assert_eq!(FieldValue::from_json(json!(1.5)), FieldValue::Double(1.5));
        assert_eq!(
            FieldValue::from_json(json!(u64::MAX)),
            FieldValue::Double(u64::MAX as f64)
        );
        assert_eq!(FieldValue::from_json(json!("x")), FieldValue::Text("x".into()));
        assert_eq!(
            FieldValue::from_json(json!([1, 2])),
            FieldValue::Text("[1,2]".into())
        );
    }

    #[test]
    fn option_conversion() {
        assert_eq!(FieldValue::from(None::<i32>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("a")), FieldValue::Text("a".into()));
    }
}
