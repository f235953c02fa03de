/// Map a raw transaction identifier to its canonical form.
///
/// The canonical form is the identifier lowercased with every `-` removed.
/// Returns `None` for empty input and for input that is empty once hyphens are stripped, so that applying the function twice never changes the result.
///
/// The store enforces the same normalization; this copy is only a local guard.
pub fn normalize(raw: &str) -> Option<String> {
    let canon: String = raw
        .chars()
        .filter(|c| *c != '-')
        .flat_map(char::to_lowercase)
        .collect();

    if canon.is_empty() { None } else { Some(canon) }
}
