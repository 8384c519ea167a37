//! Derive macro for the reflection codec of `hazelcast-compact`.
//!
//! # Example
//!
//! ```ignore
//! use hazelcast_compact::HazelcastCompact;
//!
//! #[derive(HazelcastCompact)]
//! #[hazelcast(type_name = "com.example.Person")]
//! struct Person {
//!     name: String,
//!     age: i32,
//!     #[hazelcast(rename = "emailAddress")]
//!     email: Option<String>,
//! }
//! ```

extern crate proc_macro;

mod compact;

use proc_macro::TokenStream;

/// Derives `Reflective` for a struct with named fields, or `CompactEnum` for
/// a fieldless enum. Either way the type also becomes usable as a member of
/// other derived structs.
///
/// # Attributes
///
/// ## Container-level
/// - `#[hazelcast(type_name = "...")]` sets the schema type name (defaults to
///   the Rust type name).
/// - `#[hazelcast(default)]` constructs through `Default` and assigns every
///   member afterwards.
/// - `#[hazelcast(constructor = "new(a, b)")]` declares a constructor taking
///   the named members; repeatable. Without any, the struct literal over all
///   members is used.
///
/// ## Field-level
/// - `#[hazelcast(rename = "...")]` overrides the member name.
/// - `#[hazelcast(skip)]` leaves the field out of the schema; it is filled
///   with `Default::default()` by the struct literal constructor.
///
/// # Member types
///
/// `bool`, `i8`, `i16`, `i32`, `i64`, `f32`, `f64`, `String`, `Decimal`,
/// `NaiveTime`, `NaiveDate`, `NaiveDateTime`, `DateTime<FixedOffset>`, other
/// derived types, and `Option<T>`, `Vec<T>`, `Option<Vec<T>>`,
/// `Vec<Option<T>>`, `Option<Vec<Option<T>>>` of those.
#[proc_macro_derive(HazelcastCompact, attributes(hazelcast))]
pub fn derive_compact(input: TokenStream) -> TokenStream {
    compact::derive_compact_impl(input)
}
