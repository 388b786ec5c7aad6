//! Client-facing invoice references: `<uppercase letters of name><NNN>`.

/// Every uppercase letter of `client_name`, in order.
pub fn abbreviation(client_name: &str) -> String {
    client_name.chars().filter(|c| c.is_ascii_uppercase()).collect()
}

/// First `abbr + zero_padded(n, 3)` for n = 1, 2, … not in `used`.
pub fn allocate<S: AsRef<str>>(client_name: &str, used: &[S]) -> String {
    let abbr = abbreviation(client_name);
    let mut n = 1u32;
    loop {
        let candidate = format!("{}{:03}", abbr, n);
        if !used.iter().any(|u| u.as_ref() == candidate) {
            return candidate;
        }
        n += 1;
    }
}
