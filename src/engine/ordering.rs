//! Provider execution order
//!
//! Some providers read files that others write: `steampipe` enumerates the
//! SSO profiles `aws` puts into the AWS config, and kubeconfig users run
//! `aws eks get-token` with those profiles. Providers named in [`PRIORITY`]
//! therefore run first, in list order; every other provider keeps its
//! encounter order.

/// Providers that must run before all others, in order
pub const PRIORITY: &[&str] = &["aws"];

fn rank(name: &str) -> usize {
    PRIORITY
        .iter()
        .position(|priority| *priority == name)
        .unwrap_or(PRIORITY.len())
}

/// Stable reorder of `items` by priority rank.
pub fn prioritize<T>(mut items: Vec<T>, name_of: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by_key(|item| rank(name_of(item)));
    items
}
