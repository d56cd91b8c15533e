//! Traversal direction.

use serde::{Deserialize, Serialize};

/// Which way a traversal walks relative to data flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalDirection {
    /// Against data flow, towards producers
    Up,
    /// With data flow, towards consumers
    Down,
    #[default]
    Both,
}

impl TraversalDirection {
    /// Normalize a textual direction.
    ///
    /// Case-insensitive; `upstream`/`downstream` are synonyms of `up`/`down`.
    /// Anything unrecognized means `both`.
    pub fn normalize(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "up" | "upstream" => Self::Up,
            "down" | "downstream" => Self::Down,
            _ => Self::Both,
        }
    }

    pub fn includes_up(self) -> bool {
        matches!(self, Self::Up | Self::Both)
    }

    pub fn includes_down(self) -> bool {
        matches!(self, Self::Down | Self::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Both => "both",
        }
    }
}

impl std::fmt::Display for TraversalDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for TraversalDirection {
    fn from(value: &str) -> Self {
        Self::normalize(value)
    }
}

/// One-way direction for layered listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerDirection {
    Upstream,
    Downstream,
}

impl LayerDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Downstream => "downstream",
        }
    }
}

impl std::str::FromStr for LayerDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match TraversalDirection::normalize(s) {
            TraversalDirection::Up => Ok(Self::Upstream),
            TraversalDirection::Down => Ok(Self::Downstream),
            TraversalDirection::Both => Err(format!(
                "Unknown layer direction: '{}'. Valid values: upstream, downstream",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_synonyms() {
        assert_eq!(TraversalDirection::normalize("up"), TraversalDirection::Up);
        assert_eq!(
            TraversalDirection::normalize("Upstream"),
            TraversalDirection::Up
        );
        assert_eq!(
            TraversalDirection::normalize(" DOWNSTREAM "),
            TraversalDirection::Down
        );
        assert_eq!(TraversalDirection::normalize("down"), TraversalDirection::Down);
        assert_eq!(TraversalDirection::normalize("both"), TraversalDirection::Both);
    }

    #[test]
    fn test_unknown_defaults_to_both() {
        assert_eq!(
            TraversalDirection::normalize("sideways"),
            TraversalDirection::Both
        );
        assert_eq!(TraversalDirection::normalize(""), TraversalDirection::Both);
    }

    #[test]
    fn test_includes() {
        assert!(TraversalDirection::Up.includes_up());
        assert!(!TraversalDirection::Up.includes_down());
        assert!(TraversalDirection::Both.includes_up());
        assert!(TraversalDirection::Both.includes_down());
    }

    #[test]
    fn test_layer_direction_parse() {
        assert_eq!(
            "up".parse::<LayerDirection>().unwrap(),
            LayerDirection::Upstream
        );
        assert_eq!(
            "downstream".parse::<LayerDirection>().unwrap(),
            LayerDirection::Downstream
        );
        assert!("both".parse::<LayerDirection>().is_err());
    }
}
