use std::{fmt, str::FromStr};

use crate::foundation::error::{SheetError, SheetResult};

/// Grid topology of a sprite sheet. Only square 4×4 and 5×5 grids are produced upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GridLayout {
    Grid4x4,
    Grid5x5,
}

impl GridLayout {
    pub const ALL: [GridLayout; 2] = [GridLayout::Grid4x4, GridLayout::Grid5x5];

    pub fn cols(self) -> u32 {
        match self {
            Self::Grid4x4 => 4,
            Self::Grid5x5 => 5,
        }
    }

    pub fn rows(self) -> u32 {
        match self {
            Self::Grid4x4 => 4,
            Self::Grid5x5 => 5,
        }
    }

    pub fn total_frames(self) -> usize {
        (self.cols() * self.rows()) as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid4x4 => "grid-4x4",
            Self::Grid5x5 => "grid-5x5",
        }
    }

    /// Parse a layout selector, failing closed on anything unrecognized.
    pub fn parse(s: &str) -> SheetResult<Self> {
        match s.trim() {
            "grid-4x4" => Ok(Self::Grid4x4),
            "grid-5x5" => Ok(Self::Grid5x5),
            other => Err(SheetError::unsupported_layout(format!(
                "'{other}' (expected one of: grid-4x4, grid-5x5)"
            ))),
        }
    }
}

impl fmt::Display for GridLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GridLayout {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for GridLayout {
    type Error = SheetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GridLayout> for String {
    fn from(value: GridLayout) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_layouts_parse_and_count_frames() {
        assert_eq!("grid-4x4".parse::<GridLayout>().unwrap().total_frames(), 16);
        assert_eq!("grid-5x5".parse::<GridLayout>().unwrap().total_frames(), 25);
    }

    #[test]
    fn unknown_layout_fails_closed() {
        for bad in ["grid-3x3", "", "4x4", "GRID-4X4"] {
            assert!(matches!(
                GridLayout::parse(bad),
                Err(SheetError::UnsupportedLayout(_))
            ));
        }
    }

    #[test]
    fn serde_uses_selector_strings() {
        let json = serde_json::to_string(&GridLayout::Grid5x5).unwrap();
        assert_eq!(json, "\"grid-5x5\"");
        let back: GridLayout = serde_json::from_str("\"grid-4x4\"").unwrap();
        assert_eq!(back, GridLayout::Grid4x4);
        assert!(serde_json::from_str::<GridLayout>("\"grid-6x6\"").is_err());
    }
}
