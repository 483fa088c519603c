//! UCI `option` declarations and value checking.
//!
//! Engines announce options during the handshake, e.g.
//! `option name Hash type spin default 16 min 1 max 4096`.

use crate::engine::types::ChessError;

const KEYWORDS: [&str; 6] = ["name", "type", "default", "min", "max", "var"];

/// Declared type of an engine option, with its constraints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionKind {
    Check { default: bool },
    Spin { default: i64, min: i64, max: i64 },
    Combo { default: String, vars: Vec<String> },
    String { default: String },
    Button,
}

/// One option announced by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UciOption {
    pub name: String,
    pub kind: OptionKind,
}

impl UciOption {
    /// Parse an `option name ... type ...` line.
    pub fn parse(line: &str) -> Result<Self, ChessError> {
        let bad = |why: &str| ChessError::EngineProtocol(format!("{why}: '{line}'"));

        let mut words = line.split_whitespace();
        if words.next() != Some("option") {
            return Err(bad("not an option line"));
        }

        // Keyword followed by its (possibly multi-word) value.
        let mut fields: Vec<(&str, Vec<&str>)> = Vec::new();
        for word in words {
            if KEYWORDS.contains(&word) {
                fields.push((word, Vec::new()));
            } else if let Some((_, value)) = fields.last_mut() {
                value.push(word);
            } else {
                return Err(bad("value before keyword"));
            }
        }

        let field = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.join(" "))
        };
        let number = |key: &str| -> Result<i64, ChessError> {
            field(key)
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| bad(&format!("missing or bad '{key}'")))
        };

        let name = field("name")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| bad("missing name"))?;
        let kind_name = field("type").ok_or_else(|| bad("missing type"))?;

        let kind = match kind_name.as_str() {
            "check" => OptionKind::Check {
                default: match field("default").as_deref() {
                    Some("true") => true,
                    Some("false") => false,
                    _ => return Err(bad("check option needs default true|false")),
                },
            },
            "spin" => OptionKind::Spin {
                default: number("default")?,
                min: number("min")?,
                max: number("max")?,
            },
            "combo" => OptionKind::Combo {
                default: field("default").unwrap_or_default(),
                vars: fields
                    .iter()
                    .filter(|(k, _)| *k == "var")
                    .map(|(_, v)| v.join(" "))
                    .collect(),
            },
            "string" => OptionKind::String {
                default: match field("default") {
                    Some(v) if v != "<empty>" => v,
                    _ => String::new(),
                },
            },
            "button" => OptionKind::Button,
            other => return Err(bad(&format!("unknown option type '{other}'"))),
        };

        Ok(UciOption { name, kind })
    }

    /// Check a value against this option's type. Returns the value to send
    /// (`None` for buttons).
    pub fn validate(&self, value: Option<&str>) -> Result<Option<String>, ChessError> {
        let reject = |why: String| {
            ChessError::EngineProtocol(format!("option '{}': {why}", self.name))
        };

        match (&self.kind, value) {
            (OptionKind::Button, None) => Ok(None),
            (OptionKind::Button, Some(_)) => Err(reject("button takes no value".into())),
            (_, None) => Err(reject("value required".into())),
            (OptionKind::Check { .. }, Some(v)) => match v.to_ascii_lowercase().as_str() {
                b @ ("true" | "false") => Ok(Some(b.to_string())),
                _ => Err(reject(format!("'{v}' is not true or false"))),
            },
            (OptionKind::Spin { min, max, .. }, Some(v)) => match v.trim().parse::<i64>() {
                Ok(n) if (*min..=*max).contains(&n) => Ok(Some(n.to_string())),
                Ok(n) => Err(reject(format!("{n} outside {min}..={max}"))),
                Err(_) => Err(reject(format!("'{v}' is not an integer"))),
            },
            (OptionKind::Combo { vars, .. }, Some(v)) => vars
                .iter()
                .find(|var| var.eq_ignore_ascii_case(v))
                .map(|var| Some(var.clone()))
                .ok_or_else(|| reject(format!("'{v}' is not one of [{}]", vars.join(", ")))),
            (OptionKind::String { .. }, Some(v)) => Ok(Some(v.to_string())),
        }
    }
}

/// `setoption name <name> [value <value>]`.
pub fn setoption_command(name: &str, value: Option<&str>) -> String {
    match value {
        Some(v) => format!("setoption name {name} value {v}"),
        None => format!("setoption name {name}"),
    }
}
