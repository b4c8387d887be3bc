// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros shared across the `ctrlscan` workspace.
//!
//! - [`display_as!`] — maps enum variants to `Display` string literals.
//! - [`test_builder!`] — a builder struct for constructing fixtures in tests.

/// Implement `Display` for an enum by mapping each variant to a literal.
///
/// Variants carrying data are matched with `(..)` to ignore their fields.
///
/// ```ignore
/// ctrlscan_core::display_as! {
///     Severity {
///         Critical => "CRITICAL",
///         High => "HIGH",
///     }
/// }
/// ```
#[macro_export]
macro_rules! display_as {
    ($enum:ty { $( $variant:ident $(( $($ignore:tt)* ))? => $str:expr ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $( Self::$variant $(( $($ignore)* ))? => $str, )+
                })
            }
        }
    };
}

/// Generate a test-only builder for a struct: a companion `*Builder` type with
/// `Default`, chainable setters, and `build()`.
///
/// Gated behind `#[cfg(any(test, feature = "test-support"))]` on every
/// generated item, so production code never sees the builder.
///
/// Field groups:
/// - `required { field: Type = default }` — setter takes the value directly.
/// - `optional { field: Type }` — builder field is `Option<Type>`; setter
///   wraps the argument in `Some`; defaults to `None`.
///
/// ```ignore
/// ctrlscan_core::test_builder! {
///     pub struct ScanJobBuilder => ScanJob {
///         required {
///             id: ScanJobId = ScanJobId::new(),
///             status: ScanStatus = ScanStatus::Running,
///         }
///         optional {
///             error_msg: String,
///         }
///     }
/// }
/// ```
#[macro_export]
macro_rules! test_builder {
    (
        pub struct $builder:ident => $target:ident {
            $(required {
                $( $req_field:ident : $req_ty:ty = $req_default:expr ),* $(,)?
            })?
            $(optional {
                $( $opt_field:ident : $opt_ty:ty ),* $(,)?
            })?
        }
    ) => {
        #[cfg(any(test, feature = "test-support"))]
        pub struct $builder {
            $($( $req_field: $req_ty, )*)?
            $($( $opt_field: Option<$opt_ty>, )*)?
        }

        #[cfg(any(test, feature = "test-support"))]
        impl Default for $builder {
            fn default() -> Self {
                Self {
                    $($( $req_field: $req_default, )*)?
                    $($( $opt_field: None, )*)?
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $builder {
            $($(
                pub fn $req_field(mut self, v: impl Into<$req_ty>) -> Self {
                    self.$req_field = v.into();
                    self
                }
            )*)?

            $($(
                pub fn $opt_field(mut self, v: impl Into<$opt_ty>) -> Self {
                    self.$opt_field = Some(v.into());
                    self
                }
            )*)?
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $target {
            /// Start building a fixture with sensible test defaults.
            pub fn fixture() -> $builder {
                $builder::default()
            }
        }
    };
}
