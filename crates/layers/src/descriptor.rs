use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::layer::{LayerKey, RenderType};
use crate::symbology::StyleRecord;

/// A property shown in the detail view, `key` in the data, `name` on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopupField {
    pub key: String,
    pub name: String,
}

/// One selectable sub-group of a layer (a month, a route, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupOption {
    pub label: String,
    pub value: Value,
}

/// Selectable sub-children of a layer, addressed by a (possibly nested)
/// property such as `model.routeName`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    pub field: String,
    #[serde(default)]
    pub children: Vec<GroupOption>,
}

/// Configuration of one dashboard layer, as supplied by the UI.
///
/// Immutable once registered; filter operations may supply a revised
/// descriptor, which must carry the same [`LayerKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub index: String,
    #[serde(rename = "type")]
    pub render_type: RenderType,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub paint: StyleRecord,
    #[serde(default)]
    pub layout: StyleRecord,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "property")]
    pub popup_fields: Vec<PopupField>,
    #[serde(default)]
    pub grouping: Option<Grouping>,
}

impl LayerDescriptor {
    pub fn new(index: impl Into<String>, render_type: RenderType) -> Self {
        Self {
            index: index.into(),
            render_type,
            icon: None,
            size: None,
            paint: StyleRecord::new(),
            layout: StyleRecord::new(),
            title: None,
            popup_fields: Vec::new(),
            grouping: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn with_paint(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.paint.insert(property.into(), value.into());
        self
    }

    pub fn with_layout(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.layout.insert(property.into(), value.into());
        self
    }

    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = Some(grouping);
        self
    }

    pub fn key(&self) -> LayerKey {
        LayerKey::new(self.index.clone(), self.render_type)
    }
}

#[cfg(test)]
mod tests {
    use super::LayerDescriptor;
    use crate::layer::{LayerKey, RenderType};
    use serde_json::json;

    #[test]
    fn deserializes_component_map_config() {
        let d: LayerDescriptor = serde_json::from_value(json!({
            "index": "metro_route",
            "type": "arc",
            "paint": { "arc-color": ["#5a0e0e", "#ff7a7a"], "arc-width": 3 },
            "property": [{ "key": "name", "name": "Route" }],
            "grouping": { "field": "month", "children": [{ "label": "Jan", "value": 1 }] }
        }))
        .expect("parse descriptor");

        assert_eq!(d.key(), LayerKey::new("metro_route", RenderType::Arc));
        assert_eq!(d.icon, None);
        assert_eq!(d.popup_fields[0].name, "Route");
        assert_eq!(d.grouping.as_ref().map(|g| g.children.len()), Some(1));
        assert_eq!(d.paint.get("arc-width"), Some(&json!(3)));
    }
}
