use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Option keys are one or two dashes followed by ASCII letters, digits or `_`.
pub fn validate_option_key(value: &str) -> Result<(), String> {
    let body = value
        .strip_prefix("--")
        .or_else(|| value.strip_prefix('-'))
        .ok_or_else(|| "option key must start with `-` or `--`".to_string())?;
    if body.is_empty() {
        return Err("option key must name at least one character after the dashes".to_string());
    }
    if body
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return Ok(());
    }
    Err("option key must use only ASCII letters, digits or '_' after the dashes".to_string())
}

/// Option values are restricted to ASCII letters, digits, `_`, `.`, `-` and the
/// path separator. Anything else is rejected, never escaped.
pub fn validate_option_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("option value must be non-empty".to_string());
    }
    if let Some(bad) = value.chars().find(|ch| !is_value_char(*ch)) {
        return Err(format!(
            "option value contains forbidden character {bad:?}; allowed are ASCII letters, digits, '_', '.', '-' and '/'"
        ));
    }
    Ok(())
}

fn is_value_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(ch, '_' | '.' | '-' | '/')
        || ch == std::path::MAIN_SEPARATOR
}

macro_rules! define_token_type {
    ($name:ident, $kind:literal, $validate:path) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                $validate(raw)?;
                Ok(Self(raw.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = String;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserialize_token(deserializer, $kind, Self::parse)
            }
        }
    };
}

fn deserialize_token<'de, D, T>(
    deserializer: D,
    kind: &str,
    parse: fn(&str) -> Result<T, String>,
) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(|reason| D::Error::custom(format!("{kind} `{raw}` rejected: {reason}")))
}

define_token_type!(OptionKey, "option key", validate_option_key);
define_token_type!(OptionValue, "option value", validate_option_value);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_keys_accept_single_and_double_dash_forms() {
        for key in ["-x", "-db", "--max_target_seqs", "-1a", "--N"] {
            assert!(OptionKey::parse(key).is_ok(), "expected `{key}` to be accepted");
        }
    }

    #[test]
    fn option_keys_reject_everything_else() {
        for key in [
            "", "x", "-", "--", "---x", "-a-b", "-a b", "-a;rm", "--out=1", "-é", "-a\n",
        ] {
            assert!(OptionKey::parse(key).is_err(), "expected `{key}` to be rejected");
        }
    }

    #[test]
    fn option_values_allow_paths_and_numbers() {
        for value in ["3", "-1.5", "BLOSUM62", "/tmp/db/nr.00", "a_b-c.d", "1e-5"] {
            assert!(
                OptionValue::parse(value).is_ok(),
                "expected `{value}` to be accepted"
            );
        }
    }

    #[test]
    fn option_values_reject_shell_metacharacters() {
        for value in [
            "", "a b", "a;b", "$(id)", "`id`", "a|b", "a&b", "x>y", "'q'", "\"q\"", "a*",
        ] {
            assert!(
                OptionValue::parse(value).is_err(),
                "expected `{value}` to be rejected"
            );
        }
    }

    #[test]
    fn option_key_deserializes_through_validation() {
        let key: OptionKey = serde_yaml::from_str("--threads").expect("valid key");
        assert_eq!(key.as_str(), "--threads");

        let err = serde_yaml::from_str::<OptionKey>("threads").expect_err("invalid key");
        assert!(err.to_string().contains("option key `threads` rejected"));
    }
}
