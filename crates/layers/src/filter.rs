use formats::{Feature, FeatureCollection};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Dotted path into feature properties, e.g. `model.routeName`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PropertyPath(Vec<String>);

impl PropertyPath {
    pub fn parse(dotted: &str) -> Self {
        Self(dotted.split('.').map(str::to_string).collect())
    }

    pub fn nested(parent: &str, child: &str) -> Self {
        Self(vec![parent.to_string(), child.to_string()])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Renderer expression reading this property: `["get", "routeName", ["get", "model"]]`.
    pub fn get_expression(&self) -> Value {
        let mut expr: Option<Value> = None;
        for seg in &self.0 {
            expr = Some(match expr {
                None => json!(["get", seg]),
                Some(obj) => json!(["get", seg, obj]),
            });
        }
        expr.unwrap_or(Value::Null)
    }
}

impl From<String> for PropertyPath {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<PropertyPath> for String {
    fn from(p: PropertyPath) -> Self {
        p.0.join(".")
    }
}

impl std::fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Attribute predicate over feature properties.
///
/// A predicate naming a property the dataset does not carry is not an error:
/// `Equals`/`In` simply match nothing and the layer renders empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterPredicate {
    Equals { path: PropertyPath, value: Value },
    NotEquals { path: PropertyPath, value: Value },
    In { path: PropertyPath, values: Vec<Value> },
    /// The "others" bucket: features whose property is not one of `values`.
    NotIn { path: PropertyPath, values: Vec<Value> },
    All { parts: Vec<FilterPredicate> },
}

impl FilterPredicate {
    pub fn equals(property: &str, value: impl Into<Value>) -> Self {
        Self::Equals {
            path: PropertyPath::parse(property),
            value: value.into(),
        }
    }

    pub fn matches(&self, feature: &Feature) -> bool {
        match self {
            FilterPredicate::Equals { path, value } => feature
                .property_at(path.segments())
                .is_some_and(|v| values_equal(v, value)),
            FilterPredicate::NotEquals { path, value } => !feature
                .property_at(path.segments())
                .is_some_and(|v| values_equal(v, value)),
            FilterPredicate::In { path, values } => feature
                .property_at(path.segments())
                .is_some_and(|v| values.iter().any(|x| values_equal(v, x))),
            FilterPredicate::NotIn { path, values } => !feature
                .property_at(path.segments())
                .is_some_and(|v| values.iter().any(|x| values_equal(v, x))),
            FilterPredicate::All { parts } => parts.iter().all(|p| p.matches(feature)),
        }
    }

    /// Subset of `data` accepted by the predicate. `data` is never modified.
    pub fn apply(&self, data: &FeatureCollection) -> FeatureCollection {
        data.filtered(|f| self.matches(f))
    }

    /// Declarative renderer filter expression.
    pub fn to_expression(&self) -> Value {
        match self {
            FilterPredicate::Equals { path, value } => {
                json!(["==", path.get_expression(), value])
            }
            FilterPredicate::NotEquals { path, value } => {
                json!(["!=", path.get_expression(), value])
            }
            FilterPredicate::In { path, values } => {
                json!(["in", path.get_expression(), ["literal", values]])
            }
            FilterPredicate::NotIn { path, values } => {
                json!(["!", ["in", path.get_expression(), ["literal", values]]])
            }
            FilterPredicate::All { parts } => {
                let mut expr = vec![json!("all")];
                expr.extend(parts.iter().map(FilterPredicate::to_expression));
                Value::Array(expr)
            }
        }
    }
}

/// JSON equality that treats `5` and `5.0` as the same number.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterPredicate, PropertyPath};
    use formats::{Feature, FeatureCollection, Geometry, Position};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn route(name: &str) -> Feature {
        Feature::new(Geometry::LineString(vec![
            Position::new(121.5, 25.0),
            Position::new(121.6, 25.1),
        ]))
        .with_property("model", json!({ "routeName": name }))
    }

    #[test]
    fn equality_expression_matches_renderer_shape() {
        let p = FilterPredicate::equals("district", "Daan");
        assert_eq!(p.to_expression(), json!(["==", ["get", "district"], "Daan"]));
    }

    #[test]
    fn nested_paths_read_through_objects() {
        let path = PropertyPath::parse("model.routeName");
        assert_eq!(
            path.get_expression(),
            json!(["get", "routeName", ["get", "model"]])
        );

        let p = FilterPredicate::In {
            path,
            values: vec![json!("307")],
        };
        assert!(p.matches(&route("307")));
        assert!(!p.matches(&route("262")));
    }

    #[test]
    fn not_in_builds_the_others_bucket() {
        let data = FeatureCollection::new(vec![route("307"), route("262"), route("5")]);
        let others = FilterPredicate::NotIn {
            path: PropertyPath::nested("model", "routeName"),
            values: vec![json!("307"), json!("262")],
        };
        let filtered = others.apply(&data);
        assert_eq!(filtered.len(), 1);
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn absent_property_yields_empty_result() {
        let data = FeatureCollection::new(vec![route("307")]);
        let p = FilterPredicate::equals("no_such_field", 1);
        assert!(p.apply(&data).is_empty());
    }

    #[test]
    fn integer_and_float_compare_equal() {
        let f = route("x").with_property("Hour", 5);
        let p = FilterPredicate::All {
            parts: vec![
                FilterPredicate::equals("Hour", 5.0),
                FilterPredicate::NotEquals {
                    path: PropertyPath::parse("Day"),
                    value: json!("placeholder"),
                },
            ],
        };
        assert!(p.matches(&f));
    }

    #[test]
    fn serde_uses_dotted_paths() {
        let p: FilterPredicate = serde_json::from_value(json!({
            "op": "equals", "path": "model.routeName", "value": "307"
        }))
        .expect("parse predicate");
        assert_eq!(
            p,
            FilterPredicate::Equals {
                path: PropertyPath::nested("model", "routeName"),
                value: json!("307"),
            }
        );
    }
}
