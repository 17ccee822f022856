//! Widget specifications for input defaults
//!
//! Widgets belong to the editor. The core keeps only the widget kind, its
//! configuration bag and the last value it produced, and checks new values
//! against the kind's predicate before storing them.

use crate::types::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every widget kind an input socket can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    StringEntry,
    LiteralEntry,
    IntFloatEntry,
    Checkbutton,
    Colorbutton,
    SortingButtonWithStrings,
    SortingButtonWithIntfloats,
    TextDisplay,
    LiteralDisplay,
    PathPreview,
    TextPreview,
    ImagePreview,
    FontPreview,
    AudioPreview,
    VideoPreview,
    OptionMenuWithStrings,
    OptionMenuWithIntfloats,
    OptionTrayWithStrings,
    OptionTrayWithIntfloats,
}

impl WidgetKind {
    pub fn name(self) -> &'static str {
        match self {
            WidgetKind::StringEntry => "string_entry",
            WidgetKind::LiteralEntry => "literal_entry",
            WidgetKind::IntFloatEntry => "int_float_entry",
            WidgetKind::Checkbutton => "checkbutton",
            WidgetKind::Colorbutton => "colorbutton",
            WidgetKind::SortingButtonWithStrings => "sorting_button_with_strings",
            WidgetKind::SortingButtonWithIntfloats => "sorting_button_with_intfloats",
            WidgetKind::TextDisplay => "text_display",
            WidgetKind::LiteralDisplay => "literal_display",
            WidgetKind::PathPreview => "path_preview",
            WidgetKind::TextPreview => "text_preview",
            WidgetKind::ImagePreview => "image_preview",
            WidgetKind::FontPreview => "font_preview",
            WidgetKind::AudioPreview => "audio_preview",
            WidgetKind::VideoPreview => "video_preview",
            WidgetKind::OptionMenuWithStrings => "option_menu_with_strings",
            WidgetKind::OptionMenuWithIntfloats => "option_menu_with_intfloats",
            WidgetKind::OptionTrayWithStrings => "option_tray_with_strings",
            WidgetKind::OptionTrayWithIntfloats => "option_tray_with_intfloats",
        }
    }

    fn is_preview(self) -> bool {
        matches!(
            self,
            WidgetKind::PathPreview
                | WidgetKind::TextPreview
                | WidgetKind::ImagePreview
                | WidgetKind::FontPreview
                | WidgetKind::AudioPreview
                | WidgetKind::VideoPreview
        )
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A widget kind plus the parameter bag the editor interprets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetSpec {
    #[serde(rename = "widget_name", alias = "kind")]
    pub kind: WidgetKind,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub config: IndexMap<String, Value>,
}

impl WidgetSpec {
    pub fn new(kind: WidgetKind) -> Self {
        Self {
            kind,
            config: IndexMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Check a value this widget is about to store
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        use WidgetKind::*;

        match self.kind {
            LiteralEntry | LiteralDisplay => Ok(()),
            StringEntry | TextDisplay => expect_kind(value, "a string", |v| {
                matches!(v, Value::Str(_))
            }),
            Checkbutton => expect_kind(value, "a boolean", |v| matches!(v, Value::Bool(_))),
            IntFloatEntry => {
                if value.is_none() && self.flag("allow_none") {
                    return Ok(());
                }
                let number = match value {
                    Value::Int(i) => *i as f64,
                    Value::Float(x) => *x,
                    other => return Err(format!("expected a number, got {}", other.type_name())),
                };
                if let Some(min) = self.config.get("min_value").and_then(Value::as_float) {
                    if number < min {
                        return Err(format!("{} is below the minimum {}", value, min));
                    }
                }
                if let Some(max) = self.config.get("max_value").and_then(Value::as_float) {
                    if number > max {
                        return Err(format!("{} is above the maximum {}", value, max));
                    }
                }
                Ok(())
            }
            Colorbutton => validate_color(value),
            SortingButtonWithStrings | SortingButtonWithIntfloats => {
                let strings = self.kind == SortingButtonWithStrings;
                let items = value
                    .as_list()
                    .ok_or_else(|| format!("expected a list, got {}", value.type_name()))?;
                for item in items {
                    check_item_kind(item, strings)?;
                }
                if let Some(available) = self.config.get("available_items").and_then(Value::as_list) {
                    if let Some(item) = items.iter().find(|i| !available.contains(i)) {
                        return Err(format!("{} is not an available item", item));
                    }
                }
                Ok(())
            }
            OptionMenuWithStrings | OptionMenuWithIntfloats | OptionTrayWithStrings
            | OptionTrayWithIntfloats => {
                let strings = matches!(self.kind, OptionMenuWithStrings | OptionTrayWithStrings);
                check_item_kind(value, strings)?;
                match self.config.get("options").and_then(Value::as_list) {
                    Some(options) if !options.contains(value) => {
                        Err(format!("{} is not one of the options", value))
                    }
                    _ => Ok(()),
                }
            }
            kind if kind.is_preview() => match value {
                Value::Str(_) | Value::Path(_) | Value::None => Ok(()),
                Value::List(items)
                    if items.iter().all(|i| matches!(i, Value::Str(_) | Value::Path(_))) =>
                {
                    Ok(())
                }
                other => Err(format!("expected a path, got {}", other.type_name())),
            },
            _ => Ok(()),
        }
    }

    fn flag(&self, key: &str) -> bool {
        self.config.get(key).is_some_and(Value::is_truthy)
    }
}

fn expect_kind(value: &Value, expected: &str, pred: impl Fn(&Value) -> bool) -> Result<(), String> {
    if pred(value) {
        Ok(())
    } else {
        Err(format!("expected {}, got {}", expected, value.type_name()))
    }
}

fn check_item_kind(item: &Value, strings: bool) -> Result<(), String> {
    let ok = if strings {
        matches!(item, Value::Str(_))
    } else {
        matches!(item, Value::Int(_) | Value::Float(_))
    };
    if ok {
        Ok(())
    } else {
        let expected = if strings { "str" } else { "int or float" };
        Err(format!("expected {}, got {}", expected, item.type_name()))
    }
}

fn validate_color(value: &Value) -> Result<(), String> {
    match value {
        Value::Str(s) => {
            let hex = s.strip_prefix('#').unwrap_or(s);
            if (hex.len() == 6 || hex.len() == 8) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                Ok(())
            } else {
                Err(format!("'{}' is not a hex colour", s))
            }
        }
        Value::List(channels)
            if (channels.len() == 3 || channels.len() == 4)
                && channels
                    .iter()
                    .all(|c| c.as_int().is_some_and(|c| (0..=255).contains(&c))) =>
        {
            Ok(())
        }
        other => Err(format!("expected a colour, got {}", other)),
    }
}
