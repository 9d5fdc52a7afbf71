//! Small helpers shared by the resources

use std::collections::HashSet;
use std::hash::Hash;

use crate::ProviderError;

/// Terraform ID joining two parts with `_`
pub fn id(first: &str, second: &str) -> String {
    format!("{first}_{second}")
}

/// Split an ID built by [`id`] back into its two parts
pub fn id_parts(id: &str) -> Result<(String, String), ProviderError> {
    let parts: Vec<&str> = id.split('_').collect();
    match parts.as_slice() {
        [first, second] => Ok((first.to_string(), second.to_string())),
        _ => Err(ProviderError::InvalidId(id.to_string())),
    }
}

/// Drop repeated items, keeping the first occurrence of each
pub fn deduplicate<T: Eq + Hash + Clone>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
