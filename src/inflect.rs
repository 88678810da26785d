//! Small string inflections used for join keys, collection names and
//! canonical type names.

/// Pluralize an identifier the way join keys are pluralized in read DTOs
/// (`owner_id` -> `owner_ids`, `category` -> `categories`).
pub(crate) fn pluralize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

/// Inverse of [`pluralize`], good enough for mapping DTO keys back onto
/// entity fields (`owner_ids` -> `owner_id`, `statuses` -> `status`).
pub(crate) fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = word.strip_suffix("es") {
        if stem.ends_with('s') || stem.ends_with('x') || stem.ends_with('z')
            || stem.ends_with("ch")
            || stem.ends_with("sh")
        {
            return stem.to_string();
        }
    }
    word.strip_suffix('s').unwrap_or(word).to_string()
}

/// Camelize a snake-case or dotted identifier (`pet_shop.pet` -> `PetShopPet`).
pub(crate) fn camelize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut upper_next = true;
    for ch in input.chars() {
        if ch == '_' || ch == '.' || ch == ':' || ch == '-' || ch == ' ' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Slug an enum value into `_`-separated lowercase form.
pub(crate) fn parameterize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_sep = true;
    for ch in input.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("owner_id"), "owner_ids");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("pet"), "pets");
    }

    #[test]
    fn test_singularize_inverts_pluralize() {
        for word in ["owner_id", "category", "status", "pet"] {
            assert_eq!(singularize(&pluralize(word)), word);
        }
        assert_eq!(singularize("ids"), "id");
    }

    #[test]
    fn test_camelize() {
        assert_eq!(camelize("pet_shop.pet"), "PetShopPet");
        assert_eq!(camelize("owner"), "Owner");
        assert_eq!(camelize("pets__pet"), "PetsPet");
    }

    #[test]
    fn test_parameterize() {
        assert_eq!(parameterize("Active"), "active");
        assert_eq!(parameterize("ACTIVE"), "active");
        assert_eq!(parameterize("on hold"), "on_hold");
    }
}
