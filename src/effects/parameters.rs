//! Typed, introspectable effect parameters.
//!
//! Floats are accepted without range checks; effects are expected to cope
//! with out-of-range values. Enums, colors and color lists are validated and
//! a rejected value never replaces the current one.

use serde_json::{Map, Value};

use crate::color::{Color, Interpolation};
use crate::error::{Result, ScalesError};
use crate::models::effects::{ParameterDescriptor, ParameterType};

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Float(f64),
    Enum(String),
    Color(Color),
    ColorList(Vec<Color>),
}

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Float(f64),
    Enum {
        value: String,
        values: &'static [&'static str],
    },
    Color(Color),
    ColorList(Vec<Color>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    description: &'static str,
    kind: Kind,
}

impl Parameter {
    pub fn float(default: f64, description: &'static str) -> Self {
        Self {
            description,
            kind: Kind::Float(default),
        }
    }

    /// `default` must be one of `values`.
    pub fn enumeration(
        default: &'static str,
        values: &'static [&'static str],
        description: &'static str,
    ) -> Self {
        debug_assert!(values.contains(&default));
        Self {
            description,
            kind: Kind::Enum {
                value: default.to_string(),
                values,
            },
        }
    }

    pub fn color(default: Color, description: &'static str) -> Self {
        Self {
            description,
            kind: Kind::Color(default),
        }
    }

    pub fn color_list(default: Vec<Color>, description: &'static str) -> Self {
        Self {
            description,
            kind: Kind::ColorList(default),
        }
    }

    pub fn get(&self) -> ParameterValue {
        match &self.kind {
            Kind::Float(v) => ParameterValue::Float(*v),
            Kind::Enum { value, .. } => ParameterValue::Enum(value.clone()),
            Kind::Color(c) => ParameterValue::Color(*c),
            Kind::ColorList(list) => ParameterValue::ColorList(list.clone()),
        }
    }

    /// Replace the value from an external JSON payload.
    pub fn set(&mut self, name: &str, raw: &Value) -> Result<()> {
        let next = self.parse(name, raw)?;
        self.kind = next;
        Ok(())
    }

    fn parse(&self, name: &str, raw: &Value) -> Result<Kind> {
        match &self.kind {
            Kind::Float(_) => raw
                .as_f64()
                .map(Kind::Float)
                .ok_or_else(|| ScalesError::invalid(name, format!("expected a number, got {}", raw))),
            Kind::Enum { values, .. } => {
                let candidate = raw.as_str().ok_or_else(|| {
                    ScalesError::invalid(name, format!("expected a string, got {}", raw))
                })?;
                if !values.iter().any(|v| *v == candidate) {
                    return Err(ScalesError::invalid(
                        name,
                        format!("'{}' is not one of {:?}", candidate, values),
                    ));
                }
                Ok(Kind::Enum {
                    value: candidate.to_string(),
                    values: *values,
                })
            }
            Kind::Color(_) => serde_json::from_value::<Color>(raw.clone())
                .map(Kind::Color)
                .map_err(|e| ScalesError::invalid(name, format!("malformed color: {}", e))),
            Kind::ColorList(_) => {
                let list = serde_json::from_value::<Vec<Color>>(raw.clone()).map_err(|e| {
                    ScalesError::invalid(name, format!("malformed color list: {}", e))
                })?;
                if list.is_empty() {
                    return Err(ScalesError::invalid(name, "color list must not be empty"));
                }
                Ok(Kind::ColorList(list))
            }
        }
    }

    pub fn describe(&self) -> ParameterDescriptor {
        let (kind, value, enum_values) = match &self.kind {
            Kind::Float(v) => (ParameterType::Float, Value::from(*v), None),
            Kind::Enum { value, values } => (
                ParameterType::Enum,
                Value::from(value.clone()),
                Some(values.iter().map(|v| v.to_string()).collect()),
            ),
            Kind::Color(c) => (ParameterType::Color, color_json(c), None),
            Kind::ColorList(list) => (
                ParameterType::ColorList,
                Value::Array(list.iter().map(color_json).collect()),
                None,
            ),
        };
        ParameterDescriptor {
            kind,
            description: self.description.to_string(),
            value,
            enum_values,
        }
    }

    /// Current value in the same JSON shape `set` accepts.
    pub fn to_json(&self) -> Value {
        self.describe().value
    }
}

fn color_json(color: &Color) -> Value {
    serde_json::to_value(color).unwrap_or(Value::Null)
}

/// Ordered, named parameters of one effect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(&'static str, Parameter)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, parameter: Parameter) -> Self {
        self.entries.push((name, parameter));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, p)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Parameter)> {
        self.entries.iter().map(|(n, p)| (*n, p))
    }

    /// Set one parameter. Unknown names are an error here; see `apply` for
    /// the lenient bulk form.
    pub fn set(&mut self, name: &str, raw: &Value) -> Result<()> {
        let parameter = self
            .entries
            .iter_mut()
            .find(|(n, _)| *n == name)
            .map(|(_, p)| p)
            .ok_or_else(|| ScalesError::invalid(name, "no such parameter"))?;
        parameter.set(name, raw)
    }

    /// Check a partial update without applying it.
    pub fn validate(&self, updates: &Map<String, Value>) -> Result<()> {
        for (name, parameter) in &self.entries {
            if let Some(raw) = updates.get(*name) {
                parameter.parse(name, raw)?;
            }
        }
        Ok(())
    }

    /// Apply a partial update. Names this set does not know are ignored and
    /// parameters absent from `updates` keep their value. Either every named
    /// parameter is updated or none is.
    pub fn apply(&mut self, updates: &Map<String, Value>) -> Result<()> {
        let mut staged = Vec::new();
        for (i, (name, parameter)) in self.entries.iter().enumerate() {
            if let Some(raw) = updates.get(*name) {
                staged.push((i, parameter.parse(name, raw)?));
            }
        }
        for (i, kind) in staged {
            self.entries[i].1.kind = kind;
        }
        Ok(())
    }

    pub fn describe(&self) -> Vec<(&'static str, ParameterDescriptor)> {
        self.entries
            .iter()
            .map(|(name, parameter)| (*name, parameter.describe()))
            .collect()
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(name, parameter)| (name.to_string(), parameter.to_json()))
            .collect()
    }

    fn lookup(&self, name: &str) -> Result<&Parameter> {
        self.get(name)
            .ok_or_else(|| ScalesError::invalid(name, "no such parameter"))
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match &self.lookup(name)?.kind {
            Kind::Float(v) => Ok(*v),
            _ => Err(ScalesError::invalid(name, "not a float parameter")),
        }
    }

    pub fn choice(&self, name: &str) -> Result<&str> {
        match &self.lookup(name)?.kind {
            Kind::Enum { value, .. } => Ok(value.as_str()),
            _ => Err(ScalesError::invalid(name, "not an enum parameter")),
        }
    }

    pub fn color(&self, name: &str) -> Result<Color> {
        match &self.lookup(name)?.kind {
            Kind::Color(c) => Ok(*c),
            _ => Err(ScalesError::invalid(name, "not a color parameter")),
        }
    }

    pub fn colors(&self, name: &str) -> Result<&[Color]> {
        match &self.lookup(name)?.kind {
            Kind::ColorList(list) => Ok(list.as_slice()),
            _ => Err(ScalesError::invalid(name, "not a color list parameter")),
        }
    }

    pub fn interpolation(&self, name: &str) -> Result<Interpolation> {
        let value = self.choice(name)?;
        Interpolation::from_name(value)
            .ok_or_else(|| ScalesError::invalid(name, format!("unknown interpolation '{}'", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ParameterSet {
        ParameterSet::new()
            .with("speed", Parameter::float(0.6, "Speed of the effect (0-1)"))
            .with(
                "direction",
                Parameter::enumeration("out", &["in", "out"], "Direction of the effect"),
            )
            .with("color", Parameter::color(Color::rgb(255, 0, 0), "Color"))
            .with(
                "colors",
                Parameter::color_list(vec![Color::rgb(0, 0, 255)], "Colors"),
            )
    }

    #[test]
    fn enum_outside_declared_set_is_rejected_and_value_kept() {
        let mut set = sample();
        let err = set.set("direction", &json!("sideways")).unwrap_err();
        assert!(matches!(err, ScalesError::InvalidParameterValue { .. }));
        assert_eq!(set.choice("direction").unwrap(), "out");
        assert_eq!(
            set.get("direction").unwrap().get(),
            ParameterValue::Enum("out".into())
        );
    }

    #[test]
    fn floats_are_not_clamped() {
        let mut set = sample();
        set.set("speed", &json!(5.0)).unwrap();
        assert_eq!(set.float("speed").unwrap(), 5.0);
        set.set("speed", &json!(-1)).unwrap();
        assert_eq!(set.float("speed").unwrap(), -1.0);
        assert!(set.set("speed", &json!("fast")).is_err());
    }

    #[test]
    fn malformed_color_is_rejected() {
        let mut set = sample();
        assert!(set.set("color", &json!({"r": 10})).is_err());
        assert!(set.set("color", &json!({"r": 256, "g": 0, "b": 0})).is_err());
        assert_eq!(set.color("color").unwrap(), Color::rgb(255, 0, 0));

        set.set("color", &json!({"r": 1, "g": 2, "b": 3, "w": 4}))
            .unwrap();
        assert_eq!(set.color("color").unwrap(), Color::new(1, 2, 3, 4));
    }

    #[test]
    fn empty_color_list_is_rejected() {
        let mut set = sample();
        assert!(set.set("colors", &json!([])).is_err());
        assert_eq!(set.colors("colors").unwrap().len(), 1);
    }

    #[test]
    fn partial_update_touches_only_named_parameters() {
        let mut set = sample();
        let updates = json!({"speed": 0.2, "unknown": 1});
        set.apply(updates.as_object().unwrap()).unwrap();
        assert_eq!(set.float("speed").unwrap(), 0.2);
        assert_eq!(set.choice("direction").unwrap(), "out");
    }

    #[test]
    fn failing_partial_update_changes_nothing() {
        let mut set = sample();
        let updates = json!({"speed": 0.1, "direction": "up"});
        assert!(set.apply(updates.as_object().unwrap()).is_err());
        assert_eq!(set.float("speed").unwrap(), 0.6);
    }

    #[test]
    fn describe_reports_type_and_enum_values() {
        let set = sample();
        let described = set.describe();
        let (name, direction) = &described[1];
        assert_eq!(*name, "direction");
        assert_eq!(direction.kind, ParameterType::Enum);
        assert_eq!(direction.value, json!("out"));
        assert_eq!(
            direction.enum_values.as_deref(),
            Some(&["in".to_string(), "out".to_string()][..])
        );

        let json = serde_json::to_value(&described[2].1).unwrap();
        assert_eq!(json["type"], "color");
        assert_eq!(json["value"], json!({"r": 255, "g": 0, "b": 0, "w": 0}));
        assert!(json.get("enum_values").is_none());
    }

    #[test]
    fn json_round_trips_through_apply() {
        let mut set = sample();
        set.set("speed", &json!(0.25)).unwrap();
        let saved = set.to_json();

        let mut fresh = sample();
        fresh.apply(&saved).unwrap();
        assert_eq!(fresh, set);
    }
}
