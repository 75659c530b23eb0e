use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(DocumentKind {
    Intake => "intake",
    Prescription => "prescription",
});

str_enum!(ContentQuality {
    Complete => "complete",
    Degraded => "degraded",
});

/// Patient gender as submitted. `M`/`F` are recognised codes; anything
/// else is kept verbatim so it can be passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Gender {
    Male,
    Female,
    Other(String),
}

impl Gender {
    pub fn from_code(code: &str) -> Self {
        let trimmed = code.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "m" | "male" => Gender::Male,
            "f" | "female" => Gender::Female,
            _ => Gender::Other(trimmed.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other(raw) => raw,
        }
    }
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Other(String::new())
    }
}

impl From<String> for Gender {
    fn from(value: String) -> Self {
        Gender::from_code(&value)
    }
}

impl From<Gender> for String {
    fn from(value: Gender) -> Self {
        value.code().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn document_kind_round_trips_through_str() {
        assert_eq!(DocumentKind::from_str("intake").unwrap(), DocumentKind::Intake);
        assert_eq!(DocumentKind::Prescription.as_str(), "prescription");
    }

    #[test]
    fn unknown_kind_is_invalid_enum() {
        let err = DocumentKind::from_str("lab").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn gender_codes_are_case_insensitive() {
        assert_eq!(Gender::from_code("m"), Gender::Male);
        assert_eq!(Gender::from_code(" F "), Gender::Female);
        assert_eq!(Gender::from_code("female"), Gender::Female);
    }

    #[test]
    fn unknown_gender_kept_verbatim() {
        let g = Gender::from_code("nonbinary");
        assert_eq!(g, Gender::Other("nonbinary".into()));
        assert_eq!(g.code(), "nonbinary");
    }

    #[test]
    fn gender_serializes_as_code() {
        let json = serde_json::to_string(&Gender::Female).unwrap();
        assert_eq!(json, "\"F\"");
        let back: Gender = serde_json::from_str("\"M\"").unwrap();
        assert_eq!(back, Gender::Male);
    }

    #[test]
    fn quality_serializes_snake_case() {
        let json = serde_json::to_string(&ContentQuality::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
    }
}
