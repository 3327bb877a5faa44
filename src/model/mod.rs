use serde::{Deserialize, Serialize};

/// Anything with a display color that a selection can hold.
pub trait Swatch {
    fn color(&self) -> &str;
}

/// A single selectable color entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    /// Acts as a label
    pub name: String,
    /// Hex code, `#RRGGBB`
    pub color: String,
    pub background_color: String,
    /// CSS gradient description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    /// Gradient stop in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
}

impl Item {
    /// A plain color item whose background is its own color.
    pub fn from_color(id: i64, name: impl Into<String>, color: impl Into<String>) -> Self {
        let color = color.into();
        Self {
            id,
            name: name.into(),
            background_color: color.clone(),
            color,
            background_image: None,
            position: None,
        }
    }

    pub fn with_position(mut self, position: f64) -> Self {
        self.position = Some(position);
        self
    }
}

impl Swatch for Item {
    fn color(&self) -> &str {
        &self.color
    }
}

/// A named, persisted list of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: i64,
    pub name: String,
    pub list: Vec<Item>,
    pub background_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
}

impl Swatch for Collection {
    /// First item's color, or the background when the list is empty.
    fn color(&self) -> &str {
        self.list
            .first()
            .map(|i| i.color.as_str())
            .unwrap_or(self.background_color.as_str())
    }
}

/// Everything persisted under one store key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRecord {
    pub item_lists: Vec<Collection>,
}

impl StorageRecord {
    pub fn find(&self, id: i64) -> Option<&Collection> {
        self.item_lists.iter().find(|c| c.id == id)
    }
}

/// Time-based id source. Strictly increasing per instance even when called
/// several times within one millisecond.
#[derive(Debug, Default)]
pub struct IdGen {
    last: i64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> i64 {
        let now = now_millis();
        self.last = now.max(self.last + 1);
        self.last
    }
}

fn now_millis() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    (nanos / 1_000_000) as i64
}
