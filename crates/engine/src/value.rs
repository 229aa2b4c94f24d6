use crate::ObjectId;

/// A value read out of the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    /// Big integers are carried as their decimal text.
    BigInt(String),
    Object(ObjectId),
}

impl Value {
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Object(_))
    }

    /// The script-level `typeof` name of a primitive.
    ///
    /// Objects report `"object"`; callers wanting a class name ask the engine.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null | Self::Object(_) => "object",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::BigInt(_) => "bigint",
        }
    }

    /// Display text for a primitive, as a script console would print it.
    ///
    /// Returns `None` for objects.
    pub fn render(&self) -> Option<String> {
        let text = match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => render_number(*n),
            Self::String(s) => s.clone(),
            Self::BigInt(digits) => format!("{digits}n"),
            Self::Object(_) => return None,
        };
        Some(text)
    }
}

fn render_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.abs() >= 1e21 {
        format!("{n:e}").replacen('e', "e+", 1)
    } else if n == n.trunc() {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Self::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_numbers_like_a_console() {
        assert_eq!(Value::Number(3.0).render().unwrap(), "3");
        assert_eq!(Value::Number(-0.5).render().unwrap(), "-0.5");
        assert_eq!(Value::Number(f64::NAN).render().unwrap(), "NaN");
        assert_eq!(Value::Number(f64::NEG_INFINITY).render().unwrap(), "-Infinity");
        assert_eq!(Value::Number(-0.0).render().unwrap(), "0");
    }

    #[test]
    fn large_whole_numbers_keep_their_digits() {
        assert_eq!(Value::Number(1e20).render().unwrap(), "100000000000000000000");
        assert_eq!(
            Value::Number(9223372036854775808.0).render().unwrap(),
            "9223372036854775808"
        );
        assert_eq!(Value::Number(-4e18).render().unwrap(), "-4000000000000000000");
        assert_eq!(Value::Number(1e21).render().unwrap(), "1e+21");
        assert_eq!(Value::Number(-2.5e22).render().unwrap(), "-2.5e+22");
    }

    #[test]
    fn renders_other_primitives() {
        assert_eq!(Value::BigInt("12".into()).render().unwrap(), "12n");
        assert_eq!(Value::from("text").render().unwrap(), "text");
        assert_eq!(Value::Undefined.type_name(), "undefined");
        assert!(Value::Object(ObjectId(1)).render().is_none());
    }
}
