use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

pub const AGE_RANGE: RangeInclusive<u32> = 5..=100;
pub const DEFAULT_AGE: u32 = 60;
pub const DEFAULT_STYLE: &str = "Make them wear a cyberpunk jacket with glowing blue eyes.";
pub const DEFAULT_COUNTRIES: [&str; 2] = ["United States", "Japan"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Reverse,
    Age,
    Style,
    Country,
}

impl Mode {
    pub const ALL: [Self; 4] = [Self::Reverse, Self::Age, Self::Style, Self::Country];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reverse => "reverse",
            Self::Age => "age",
            Self::Style => "style",
            Self::Country => "country",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(value))
    }
}

/// A mode together with the value its prompt is rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum ModeParameter {
    Reverse,
    Age(u32),
    Style(String),
    Country(String),
}

impl ModeParameter {
    pub fn mode(&self) -> Mode {
        match self {
            Self::Reverse => Mode::Reverse,
            Self::Age(_) => Mode::Age,
            Self::Style(_) => Mode::Style,
            Self::Country(_) => Mode::Country,
        }
    }
}

pub fn build_prompt(parameter: &ModeParameter) -> String {
    match parameter {
        ModeParameter::Reverse => String::from(
            "Transform the person in this image to look like the opposite gender. \
             Keep the same pose, background, and facial expression identity. Photorealistic.",
        ),
        ModeParameter::Age(age) => format!(
            "Generate a photorealistic version of this person at age {age}. \
             Maintain their identity, pose, and background."
        ),
        ModeParameter::Style(description) => format!(
            "Edit this image based on the following description: {description}. \
             Maintain the original pose and composition. Photorealistic."
        ),
        ModeParameter::Country(country) => format!(
            "Generate a photorealistic portrait of this person as if they were born and raised in {country}. \
             Adapt their clothing, styling, and background to reflect {country} culture and heritage \
             while maintaining their facial features and identity."
        ),
    }
}
