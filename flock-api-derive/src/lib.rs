use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemFn};

mod common;
mod job;

/// Turns a free function into a named job function.
///
/// The annotated function is kept as written. Next to it the macro generates
/// a unit struct implementing `flock_api::JobFunction`, which decodes the
/// wire arguments, calls the function and encodes its return value.
///
/// # Features
///
/// ## 1. Plain functions
/// ```rust,ignore
/// #[job]
/// fn add(args: Pair) -> i64 {
///     args.one + args.two
/// }
/// // generates `AddJob`, registered as "add"
/// ```
///
/// ## 2. Async and fallible functions
/// A return type whose last path segment is `Result` is treated as fallible;
/// the error's `Display` output becomes the application error message.
/// ```rust,ignore
/// #[job]
/// async fn fetch_score(args: Lookup) -> Result<u32, ScoreError> {
///     scores::lookup(&args.user).await
/// }
/// ```
///
/// ## 3. Custom names
/// ```rust,ignore
/// #[job(name = "sum", handler = "Summation")]
/// fn add_all(values: Vec<i64>) -> i64 {
///     values.iter().sum()
/// }
/// ```
///
/// # Restrictions
///
/// - at most one argument, which must implement `serde::Deserialize`
/// - the success value must implement `serde::Serialize`
/// - no generics, no `self`
#[proc_macro_attribute]
pub fn job(args: TokenStream, input: TokenStream) -> TokenStream {
    let options = match job::parse_job_args(args.into()) {
        Ok(options) => options,
        Err(errors) => return errors.into(),
    };
    let item = parse_macro_input!(input as ItemFn);
    job::expand_job(options, item).into()
}
