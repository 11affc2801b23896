/// Database models and their queries
///
/// Ownership chain (every business row resolves to exactly one user):
///
/// ```text
/// users ─┬─ sessions
///        └─ customers ─┬─ orders ─┬─ payments
///                      │          └─ job_cards
///                      ├─ quotations
///                      └─ leads
/// ```
///
/// Every query that takes a `user_id` filters through that chain, so a
/// record owned by someone else behaves exactly like a missing one.
///
/// - `user`: accounts (the identity root)
/// - `session`: server-side sessions backing issued tokens
/// - `customer`, `order`, `quotation`, `lead`, `payment`, `job_card`:
///   business records
/// - `report`: dashboard aggregates

use chrono::Utc;

pub mod customer;
pub mod job_card;
pub mod lead;
pub mod order;
pub mod payment;
pub mod quotation;
pub mod report;
pub mod session;
pub mod user;

/// Returned when a status string from the database or a query string
/// matches no known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a text-backed status enum with serde names, `as_str`,
/// `Display` and `FromStr` that all agree on the same spelling.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::models::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use text_enum;

/// Human-facing document number such as `ORD-1718000000000-3FA2`
///
/// Millisecond timestamp keeps numbers roughly sortable; the random suffix
/// keeps two documents created in the same millisecond apart.
pub(crate) fn document_number(prefix: &str) -> String {
    format!(
        "{}-{}-{:04X}",
        prefix,
        Utc::now().timestamp_millis(),
        rand::random::<u16>()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    text_enum! {
        /// Test enum
        pub enum Shade {
            Light => "light",
            DeepBlue => "deep_blue",
        }
    }

    #[test]
    fn test_text_enum_agrees_everywhere() {
        for shade in Shade::ALL {
            let parsed: Shade = shade.as_str().parse().unwrap();
            assert_eq!(&parsed, shade);
            assert_eq!(shade.to_string(), shade.as_str());
            assert_eq!(
                serde_json::to_value(shade).unwrap(),
                serde_json::Value::String(shade.as_str().to_string())
            );
        }
    }

    #[test]
    fn test_text_enum_unknown_value() {
        let err = "navy".parse::<Shade>().unwrap_err();
        assert_eq!(err.kind, "Shade");
        assert_eq!(err.value, "navy");
    }

    #[test]
    fn test_document_number_format() {
        let number = document_number("ORD");
        let parts: Vec<&str> = number.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
