//! Typed reads of configuration values.
//!
//! A missing key yields the type's zero value; a present value that does not
//! parse is an error. Surrounding whitespace is ignored.

use conflux_core::{ConfigResult, ConfigurationError};

/// A type that can be read from a configuration value.
pub trait FromConfigValue: Sized + Default {
    /// Name used in [`ConfigurationError::MalformedTypedValue`].
    const TYPE_NAME: &'static str;

    /// Parses a raw value.
    fn parse_value(raw: &str) -> Option<Self>;
}

macro_rules! impl_from_str {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromConfigValue for $ty {
                const TYPE_NAME: &'static str = $name;

                fn parse_value(raw: &str) -> Option<Self> {
                    raw.trim().parse().ok()
                }
            }
        )*
    };
}

impl_from_str! {
    i32 => "integer",
    i64 => "long",
    u16 => "unsigned 16-bit integer",
    u32 => "unsigned 32-bit integer",
    u64 => "unsigned 64-bit integer",
    usize => "unsigned size",
    f32 => "float",
    f64 => "double",
}

impl FromConfigValue for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn parse_value(raw: &str) -> Option<Self> {
        parse_bool(raw.trim())
    }
}

impl FromConfigValue for String {
    const TYPE_NAME: &'static str = "string";

    fn parse_value(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

/// Converts an optional raw value for `key` into `T`.
///
/// # Errors
///
/// Returns [`ConfigurationError::MalformedTypedValue`] if the value is
/// present but does not parse.
///
/// # Example
///
/// ```
/// use conflux_config::typed::convert;
///
/// assert_eq!(convert::<u16>("port", Some("8080")).unwrap(), 8080);
/// assert_eq!(convert::<u16>("port", None).unwrap(), 0);
/// assert!(convert::<u16>("port", Some("eighty")).is_err());
/// ```
pub fn convert<T: FromConfigValue>(key: &str, raw: Option<&str>) -> ConfigResult<T> {
    match raw {
        None => Ok(T::default()),
        Some(raw) => {
            T::parse_value(raw).ok_or_else(|| ConfigurationError::malformed(key, raw, T::TYPE_NAME))
        }
    }
}

/// Parses a boolean value.
///
/// Accepts `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`, case-insensitive.
#[must_use]
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
