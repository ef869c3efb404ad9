pub mod config;
pub mod error;
pub mod flags;
pub mod geo;
pub mod taxonomy;
pub mod types;

pub use config::Config;
pub use error::CityPulseError;
pub use flags::{Feature, FeatureFlags};
pub use geo::*;
pub use types::*;

/// Normalize a title for fuzzy comparison: lowercase, strip non-alphanumeric
/// (keeping spaces), collapse whitespace.
///
/// ```
/// assert_eq!(citypulse_common::comparable("The Blue Note!!"), "the blue note");
/// assert_eq!(citypulse_common::comparable("  Joe's   Café "), "joe s caf");
/// ```
pub fn comparable(name: &str) -> String {
    let lowered = name.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == ' ' {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<&str>>().join(" ")
}
