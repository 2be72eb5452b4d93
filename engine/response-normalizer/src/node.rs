use serde_json::Value;

/// Untyped tree decoded from an upstream response
///
/// Maps keep the key order of the payload so that searches visit entries in
/// the same order the upstream wrote them.
#[derive(Debug, Clone, PartialEq)]
pub enum RawNode {
    /// Ordered key -> value entries
    Map(Vec<(String, RawNode)>),

    /// Ordered elements
    List(Vec<RawNode>),

    /// Leaf value
    Scalar(Scalar),
}

/// Leaf values carried by a [`RawNode`]
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl RawNode {
    /// Parse a JSON document into a tree
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::from(value))
    }

    /// Shorthand for a text leaf
    pub fn text(value: impl Into<String>) -> Self {
        RawNode::Scalar(Scalar::Text(value.into()))
    }

    /// Shorthand for the null leaf
    pub fn null() -> Self {
        RawNode::Scalar(Scalar::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawNode::Scalar(Scalar::Null))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, RawNode::Map(_))
    }

    /// Direct child lookup on a map (first entry wins); `None` for lists and leaves
    pub fn get(&self, key: &str) -> Option<&RawNode> {
        match self {
            RawNode::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Render a leaf as text
    ///
    /// Integral numbers render without a fractional part so that `12.0` and
    /// `"12"` compare equal as stat ids. Maps, lists and null yield `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawNode::Scalar(Scalar::Text(s)) => Some(s.clone()),
            RawNode::Scalar(Scalar::Number(n)) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
            RawNode::Scalar(Scalar::Bool(b)) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Convert back into a JSON value (used for debug dumps and raw attributes)
    pub fn to_value(&self) -> Value {
        match self {
            RawNode::Map(entries) => Value::Object(
                entries.iter().map(|(k, v)| (k.clone(), v.to_value())).collect(),
            ),
            RawNode::List(items) => Value::Array(items.iter().map(RawNode::to_value).collect()),
            RawNode::Scalar(Scalar::Null) => Value::Null,
            RawNode::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            RawNode::Scalar(Scalar::Number(n)) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Value::from(*n as i64)
            }
            RawNode::Scalar(Scalar::Number(n)) => {
                serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null)
            }
            RawNode::Scalar(Scalar::Text(s)) => Value::String(s.clone()),
        }
    }
}

impl From<Value> for RawNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                RawNode::Map(map.into_iter().map(|(k, v)| (k, RawNode::from(v))).collect())
            }
            Value::Array(items) => RawNode::List(items.into_iter().map(RawNode::from).collect()),
            Value::Null => RawNode::Scalar(Scalar::Null),
            Value::Bool(b) => RawNode::Scalar(Scalar::Bool(b)),
            Value::Number(n) => match n.as_f64() {
                Some(f) => RawNode::Scalar(Scalar::Number(f)),
                None => RawNode::Scalar(Scalar::Text(n.to_string())),
            },
            Value::String(s) => RawNode::Scalar(Scalar::Text(s)),
        }
    }
}

/// Recover a display name from the shapes the upstream uses for names
///
/// Accepts `{"full": ..}`, `{"first": .., "last": ..}` or a plain string.
pub fn display_name(node: &RawNode) -> Option<String> {
    let name = match node {
        RawNode::Map(_) => match node.get("full").and_then(RawNode::as_text) {
            Some(full) => full,
            None => {
                let first = node.get("first").and_then(RawNode::as_text).unwrap_or_default();
                let last = node.get("last").and_then(RawNode::as_text).unwrap_or_default();
                format!("{first} {last}")
            }
        },
        other => other.as_text()?,
    };

    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conversion_keeps_key_order() {
        let node = RawNode::from(json!({"zeta": 1, "alpha": 2, "mid": 3}));
        let RawNode::Map(entries) = node else { panic!("expected map") };
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_as_text_renders_integral_numbers() {
        assert_eq!(RawNode::from(json!(12)).as_text().as_deref(), Some("12"));
        assert_eq!(RawNode::from(json!(12.5)).as_text().as_deref(), Some("12.5"));
        assert_eq!(RawNode::from(json!("7")).as_text().as_deref(), Some("7"));
        assert_eq!(RawNode::null().as_text(), None);
        assert_eq!(RawNode::from(json!({"a": 1})).as_text(), None);
    }

    #[test]
    fn test_display_name_shapes() {
        assert_eq!(
            display_name(&RawNode::from(json!({"full": "Jalen Brunson", "first": "Jalen"}))),
            Some("Jalen Brunson".to_string())
        );
        assert_eq!(
            display_name(&RawNode::from(json!({"first": "Jalen", "last": "Brunson"}))),
            Some("Jalen Brunson".to_string())
        );
        assert_eq!(display_name(&RawNode::text("Knicks")), Some("Knicks".to_string()));
        assert_eq!(display_name(&RawNode::from(json!({"ascii_first": "x"}))), None);
    }

    #[test]
    fn test_round_trip_to_value() {
        let value = json!({"players": {"0": {"player": [[{"player_key": "466.p.1"}]]}, "count": 1}});
        assert_eq!(RawNode::from(value.clone()).to_value(), value);
    }
}
