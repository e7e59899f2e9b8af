/// String utility functions

/// Convert a CamelCase identifier to snake_case
///
/// Registry names come out of `Debug` as `CookedBeef`; the dashboard and the
/// food allow-list work with `cooked_beef`.
pub fn camel_to_snake(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);

    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }

    result
}
