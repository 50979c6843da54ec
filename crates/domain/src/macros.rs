//! Macro for implementing Display and FromStr for status enums
//!
//! Remote services rarely agree on spelling ("Succeeded" vs "Complete",
//! "Canceled" vs "Cancelled"), so each variant takes a canonical string plus
//! optional aliases. Parsing is case-insensitive; display always emits the
//! canonical form.
//!
//! # Example
//!
//! ```rust
//! use meshport_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum UploadStatus {
//!     Pending,
//!     Done,
//! }
//!
//! impl_domain_status_conversions!(UploadStatus {
//!     Pending => "pending" | "waiting",
//!     Done => "done",
//! });
//!
//! assert_eq!("WAITING".parse::<UploadStatus>().unwrap(), UploadStatus::Pending);
//! assert_eq!(UploadStatus::Done.to_string(), "done");
//! ```

/// Implements Display and FromStr traits for status enums
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str | $alias...` - Canonical string followed by accepted
///   aliases (all lowercase)
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str $(| $alias)* => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
