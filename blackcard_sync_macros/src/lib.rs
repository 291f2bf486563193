mod record;

use proc_macro::TokenStream;

/// Derive macro for the `Record` trait.
///
/// ```ignore
/// use blackcard_sync::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize, Record)]
/// #[record(table = "faqs")]
/// struct Faq {
///     #[record(id)]
///     pub id: String,
///     pub question: String,
/// }
/// ```
///
/// Without `#[record(table = "...")]` the table defaults to the pluralized
/// snake_case struct name (`SpecialService` becomes `special_services`).
/// Without `#[record(id)]` the field named `id` is used.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive_record(input)
}
