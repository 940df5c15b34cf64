use serde_json::Value;

/// Label used when a record carries neither `class_name` nor `class`.
pub const DEFAULT_LABEL: &str = "Object";

/// Bounding box in center form, as detection backends report it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Bounding box anchored at its top-left corner, as it is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CenterBox {
    pub fn to_corner(&self) -> CornerRect {
        CornerRect {
            left: self.x - self.width / 2.0,
            top: self.y - self.height / 2.0,
            width: self.width,
            height: self.height,
        }
    }

    fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl CornerRect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Typed view of one detection record.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Center-form geometry; `None` when any of `x`, `y`, `width`,
    /// `height` is missing or not a finite number.
    pub geometry: Option<CenterBox>,
    pub label: String,
    pub confidence: Option<f64>,
}

impl Detection {
    /// Build a view over a raw record, using [`DEFAULT_LABEL`] when it is
    /// unlabelled.
    pub fn from_value(record: &Value) -> Self {
        Self::from_value_with_fallback(record, DEFAULT_LABEL)
    }

    pub fn from_value_with_fallback(record: &Value, fallback_label: &str) -> Self {
        let geometry = match (
            number(record, "x"),
            number(record, "y"),
            number(record, "width"),
            number(record, "height"),
        ) {
            (Some(x), Some(y), Some(width), Some(height)) => Some(CenterBox {
                x,
                y,
                width,
                height,
            }),
            _ => None,
        }
        .filter(CenterBox::is_finite);

        Self {
            geometry,
            label: label(record).unwrap_or_else(|| fallback_label.to_string()),
            confidence: number(record, "confidence"),
        }
    }

    /// Views for a whole sequence, in order.
    pub fn from_records(records: &[Value], fallback_label: &str) -> Vec<Self> {
        records
            .iter()
            .map(|record| Self::from_value_with_fallback(record, fallback_label))
            .collect()
    }

    pub fn corner_rect(&self) -> Option<CornerRect> {
        self.geometry.map(|g| g.to_corner())
    }
}

fn number(record: &Value, key: &str) -> Option<f64> {
    record.get(key).and_then(Value::as_f64)
}

fn label(record: &Value) -> Option<String> {
    ["class_name", "class"]
        .iter()
        .find_map(|key| match record.get(*key)? {
            Value::String(name) if !name.is_empty() => Some(name.clone()),
            Value::Number(id) if id.as_f64() != Some(0.0) => Some(id.to_string()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn center_box_converts_to_corner() {
        let center = CenterBox {
            x: 100.0,
            y: 100.0,
            width: 40.0,
            height: 20.0,
        };

        let corner = center.to_corner();
        assert_eq!(corner.left, 80.0);
        assert_eq!(corner.top, 90.0);
        assert_eq!(corner.width, 40.0);
        assert_eq!(corner.height, 20.0);
        assert_eq!(corner.right(), 120.0);
        assert_eq!(corner.bottom(), 110.0);
    }

    #[test]
    fn full_record_is_parsed() {
        let det = Detection::from_value(&json!({
            "x": 12.5, "y": 40, "width": 5, "height": 8,
            "confidence": 0.87, "class": "faucet", "class_id": 0
        }));

        assert_eq!(
            det.geometry,
            Some(CenterBox {
                x: 12.5,
                y: 40.0,
                width: 5.0,
                height: 8.0
            })
        );
        assert_eq!(det.label, "faucet");
        assert_eq!(det.confidence, Some(0.87));
    }

    #[test]
    fn class_name_wins_over_class() {
        let det = Detection::from_value(&json!({"class_name": "tap", "class": "faucet"}));
        assert_eq!(det.label, "tap");
    }

    #[test]
    fn missing_label_uses_fallback() {
        assert_eq!(Detection::from_value(&json!({"x": 1})).label, DEFAULT_LABEL);
        assert_eq!(
            Detection::from_value_with_fallback(&json!({"class": ""}), "Faucet").label,
            "Faucet"
        );
        assert_eq!(Detection::from_value(&json!({"class": 3})).label, "3");
    }

    #[test]
    fn confidence_only_record_has_no_geometry() {
        let det = Detection::from_value(&json!({"confidence": 0.4}));
        assert!(det.geometry.is_none());
        assert!(det.corner_rect().is_none());
        assert_eq!(det.confidence, Some(0.4));
    }

    #[test]
    fn partial_geometry_is_discarded() {
        let det = Detection::from_value(&json!({"x": 1, "y": 2, "width": 3}));
        assert!(det.geometry.is_none());

        let det = Detection::from_value(&json!({"x": "1", "y": 2, "width": 3, "height": 4}));
        assert!(det.geometry.is_none());
    }

    #[test]
    fn non_object_record_is_tolerated() {
        let det = Detection::from_value(&json!(17));
        assert!(det.geometry.is_none());
        assert_eq!(det.label, DEFAULT_LABEL);
    }

    #[test]
    fn from_records_keeps_order() {
        let records = vec![json!({"class": "a"}), json!({"class": "b"})];
        let labels: Vec<_> = Detection::from_records(&records, DEFAULT_LABEL)
            .into_iter()
            .map(|d| d.label)
            .collect();
        assert_eq!(labels, vec!["a", "b"]);
    }
}
