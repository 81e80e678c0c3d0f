//! Minimal name inflection for tables, entities and generated record names.
//!
//! Only the handful of English plural forms that show up in table names are
//! covered. Anything irregular should be mapped explicitly by the caller.

/// Singular form of a plural word: `web_sites` -> `web_site`.
pub fn singularize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    let strip = |n: usize| word[..word.len() - n].to_string();

    if lower.ends_with("ies") && word.len() > 3 {
        format!("{}y", strip(3))
    } else if ["sses", "shes", "ches", "xes", "zzes"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        strip(2)
    } else if lower.ends_with('s') && !lower.ends_with("ss") && !lower.ends_with("us") {
        strip(1)
    } else {
        word.to_string()
    }
}

/// `web_site` -> `WebSite`. Path separators become `::`.
pub fn camelize(word: &str) -> String {
    word.split('/')
        .map(|segment| {
            segment
                .split('_')
                .filter(|part| !part.is_empty())
                .map(|part| {
                    let mut chars = part.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect(),
                        None => String::new(),
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("::")
}

/// `WebSite` -> `web_site`, `Admin::User` -> `admin/user`.
pub fn underscore(word: &str) -> String {
    let word = word.replace("::", "/");
    let chars: Vec<char> = word.chars().collect();
    let mut out = String::with_capacity(word.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '-' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

/// Default entity name for a table: `web_sites` -> `WebSite`.
pub fn entity_for_table(table: &str) -> String {
    camelize(&singularize(table))
}
