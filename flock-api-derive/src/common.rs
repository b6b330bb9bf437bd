// Common utility functions shared by the macros

/// Helper function for error handling in generated code
pub fn format_error_span<T: quote::ToTokens>(
    item: &T,
    message: &str
) -> proc_macro2::TokenStream {
    syn::Error::new_spanned(item, message)
        .to_compile_error()
}

/// `parse_csv_row` -> `ParseCsvRow`
pub fn to_camel_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
