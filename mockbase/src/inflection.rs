// English singular/plural forms for resource names and foreign keys

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("ox", "oxen"),
];

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "deer",
    "news",
    "data",
];

// Singulars ending in `e` whose plural would otherwise lose more than the `s`
const E_SINGULARS: &[&str] = &[
    "movie", "cookie", "pie", "tie", "lie", "zombie", "rookie", "selfie", "calorie", "brownie",
    "hippie", "goalie", "cache", "niche", "avalanche", "headache", "moustache", "psyche",
    "house", "warehouse", "greenhouse", "cause", "use", "pause", "clause", "blouse", "spouse",
    "excuse", "abuse", "fuse", "muse", "ruse",
];

// Singulars ending in `f`/`fe` that pluralize to `ves`
const F_SINGULARS: &[&str] = &[
    "leaf", "loaf", "thief", "wolf", "half", "calf", "shelf", "self", "elf", "sheaf", "scarf",
    "knife", "life", "wife",
];

/// Singular form of a resource name (`books` -> `book`). Inverse of
/// [`pluralize`] for every word `pluralize` produces.
pub fn singularize(word: &str) -> String {
    let w = word.to_lowercase();
    if UNCOUNTABLE.contains(&w.as_str()) {
        return w;
    }
    if let Some((singular, _)) = IRREGULAR.iter().find(|(_, plural)| *plural == w) {
        return singular.to_string();
    }
    if let Some(singular) = E_SINGULARS.iter().find(|s| w.strip_suffix('s') == Some(**s)) {
        return singular.to_string();
    }
    if let Some(singular) = F_SINGULARS.iter().find(|s| f_plural(s) == w) {
        return singular.to_string();
    }
    if w.ends_with("ies") && w.len() > 3 {
        format!("{}y", &w[..w.len() - 3])
    } else if w.ends_with("sses")
        || w.ends_with("uses")
        || w.ends_with("xes")
        || w.ends_with("zes")
        || w.ends_with("ches")
        || w.ends_with("shes")
    {
        w[..w.len() - 2].to_string()
    } else if w.ends_with('s') && !w.ends_with("ss") && !w.ends_with("us") {
        w[..w.len() - 1].to_string()
    } else {
        w
    }
}

/// Plural form of a resource name (`book` -> `books`).
pub fn pluralize(word: &str) -> String {
    let w = word.to_lowercase();
    if UNCOUNTABLE.contains(&w.as_str()) {
        return w;
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == w) {
        return plural.to_string();
    }
    if F_SINGULARS.contains(&w.as_str()) {
        return f_plural(&w);
    }
    let ends_with_consonant_y = w.ends_with('y')
        && !matches!(
            w.chars().rev().nth(1),
            Some('a') | Some('e') | Some('i') | Some('o') | Some('u')
        );
    if ends_with_consonant_y {
        format!("{}ies", &w[..w.len() - 1])
    } else if w.ends_with('s')
        || w.ends_with('x')
        || w.ends_with('z')
        || w.ends_with("ch")
        || w.ends_with("sh")
    {
        format!("{w}es")
    } else {
        format!("{w}s")
    }
}

fn f_plural(singular: &str) -> String {
    let stem = singular
        .strip_suffix("fe")
        .or_else(|| singular.strip_suffix('f'))
        .unwrap_or(singular);
    format!("{stem}ves")
}

/// The resource a foreign-key column points at (`user_id` -> `users`), or
/// `None` when the column is not a foreign key.
pub fn resource_for_foreign_key(column: &str) -> Option<String> {
    column
        .strip_suffix("_id")
        .filter(|prefix| !prefix.is_empty())
        .map(pluralize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("people"), "person");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("movies"), "movie");
        assert_eq!(singularize("statuses"), "status");
        assert_eq!(singularize("buses"), "bus");
        assert_eq!(singularize("caches"), "cache");
        assert_eq!(singularize("matches"), "match");
        assert_eq!(singularize("archives"), "archive");
        assert_eq!(singularize("wolves"), "wolf");
        assert_eq!(singularize("knives"), "knife");
        assert_eq!(singularize("houses"), "house");
        assert_eq!(singularize("cases"), "case");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("address"), "addresses");
        assert_eq!(pluralize("person"), "people");
        assert_eq!(pluralize("avatar"), "avatars");
        assert_eq!(pluralize("wolf"), "wolves");
        assert_eq!(pluralize("knife"), "knives");
    }

    #[test]
    fn test_singularize_inverts_pluralize() {
        for singular in [
            "user", "book", "movie", "review", "status", "ticket", "bus", "cache", "match",
            "archive", "wolf", "life", "house", "category", "day", "box", "address", "quiz",
            "person", "sheep", "case", "response", "wish", "campus",
        ] {
            assert_eq!(singularize(&pluralize(singular)), singular, "{singular}");
        }
    }

    #[test]
    fn test_foreign_keys() {
        assert_eq!(resource_for_foreign_key("user_id"), Some("users".to_string()));
        assert_eq!(resource_for_foreign_key("movie_id"), Some("movies".to_string()));
        assert_eq!(resource_for_foreign_key("status_id"), Some("statuses".to_string()));
        assert_eq!(resource_for_foreign_key("id"), None);
        assert_eq!(resource_for_foreign_key("_id"), None);
        assert_eq!(resource_for_foreign_key("name"), None);
    }
}
