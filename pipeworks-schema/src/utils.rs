//! Utility functions

/// Convert `snake_case`, `kebab-case` or dotted words to PascalCase.
///
/// Any character that is not ASCII alphanumeric acts as a word break and is
/// dropped; letters already upper-case inside a word are preserved.
pub fn to_pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize = true;

    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            if capitalize {
                result.extend(c.to_uppercase());
            } else {
                result.push(c);
            }
            capitalize = c.is_ascii_digit();
        } else {
            capitalize = true;
        }
    }

    result
}

/// Derive the outer container name generated code uses for a schema file.
///
/// `acme/customer_svc.proto` becomes `CustomerSvc`. If that collides with a
/// top-level declaration of the same file, `OuterClass` is appended.
pub fn derive_outer_container(file_name: &str, top_level_names: &[&str]) -> String {
    let base = file_name.rsplit('/').next().unwrap_or(file_name);
    let stem = base.strip_suffix(".proto").unwrap_or(base);
    let candidate = to_pascal_case(stem);

    if top_level_names.iter().any(|name| *name == candidate) {
        format!("{}OuterClass", candidate)
    } else {
        candidate
    }
}
