use std::{
    collections::{HashMap, HashSet},
    sync::OnceLock,
};

use regex::Regex;

fn non_identifier_runs() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("[^0-9A-Za-z]+").expect("valid identifier pattern"))
}

/// Collapses every run of characters outside `[0-9A-Za-z]` into one `_`.
pub fn sanitize_header(header: &str) -> String {
    non_identifier_runs().replace_all(header, "_").into_owned()
}

/// Name for a column without an explicit `column_name`.
pub fn derive_name(headers: Option<&[String]>, index: usize) -> String {
    match headers.and_then(|headers| headers.get(index)) {
        Some(header) => sanitize_header(header),
        None => format!("column_{index}"),
    }
}

/// Makes a list of names pairwise distinct, keeping the first occurrence of
/// each name and suffixing later ones with `_<n>`.
///
/// Names compare ASCII case-insensitively, as SQLite identifiers do, so
/// `Name` and `name` collide. Names already present anywhere in the list are
/// never handed out as a suffixed name, so an explicit `id_1` pushes a second
/// `id` to `id_2`.
pub fn uniquify_names(names: &[String]) -> Vec<String> {
    let mut used: HashSet<String> = names.iter().map(|name| name.to_ascii_lowercase()).collect();
    let mut counters: HashMap<String, usize> = HashMap::new();
    let mut resolved = Vec::with_capacity(names.len());

    for name in names {
        let counter = counters.entry(name.to_ascii_lowercase()).or_insert(0);
        if *counter == 0 {
            *counter = 1;
            resolved.push(name.clone());
            continue;
        }
        let mut n = *counter;
        let mut candidate = format!("{name}_{n}");
        while used.contains(&candidate.to_ascii_lowercase()) {
            n += 1;
            candidate = format!("{name}_{n}");
        }
        *counter = n + 1;
        used.insert(candidate.to_ascii_lowercase());
        resolved.push(candidate);
    }
    resolved
}
