//! Rendering of command results

use comfy_table::Table;
use serde::Serialize;
use serde_json::Value;

/// What a command hands back to the driver for printing
pub enum Output {
    /// Pretty-printed JSON
    Json(Value),
    /// Plain text, printed as is
    Text(String),
    Table(Table),
    /// Nothing to print
    Empty,
}

impl Output {
    /// JSON rendering of any serializable value
    pub fn json<T: Serialize>(value: &T) -> anyhow::Result<Self> {
        Ok(Output::Json(serde_json::to_value(value)?))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Output::Text(text.into())
    }

    pub fn print(&self) {
        match self {
            Output::Json(value) => match serde_json::to_string_pretty(value) {
                Ok(pretty) => println!("{}", pretty),
                Err(_) => println!("{}", value),
            },
            Output::Text(text) => println!("{}", text),
            Output::Table(table) => println!("{}", table),
            Output::Empty => {}
        }
    }
}
