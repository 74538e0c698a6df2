//! Filename helpers shared across naming, automation, and folder.
//!
//! `spec.md` §3 fixes the on-disk naming scheme: sources are
//! `<uuid-v4>.<ext>`, derivatives are `<uuid>_<suffix>.<ext>`. Everything
//! here is a pure function over `&str` — no I/O.

use uuid::Uuid;

/// Splits `name` into `(stem, ext)`. `ext` excludes the leading dot and is
/// empty if `name` has no extension. `stem` is everything before the last
/// dot (or the whole name if there is no dot).
pub fn split_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx + 1..]),
        _ => (name, ""),
    }
}

/// Lowercased extension of `name`, without the leading dot.
pub fn ext_lower(name: &str) -> String {
    split_ext(name).1.to_ascii_lowercase()
}

/// `name` without its extension (the part before the last dot).
pub fn stem(name: &str) -> &str {
    split_ext(name).0
}

/// Invariant N1: a stored object is a source iff the basename (without
/// extension) is a valid v4 UUID.
pub fn is_source_name(name: &str) -> bool {
    is_valid_uuid_v4(stem(name))
}

pub fn is_valid_uuid_v4(s: &str) -> bool {
    match Uuid::parse_str(s) {
        Ok(u) => u.get_version_num() == 4,
        Err(_) => false,
    }
}

/// Generates a fresh source name: `<uuid-v4>.<ext>`, where `ext` is taken
/// (lowercased) from `original_name`.
pub fn new_source_name(original_name: &str) -> String {
    let ext = ext_lower(original_name);
    format!("{}.{}", Uuid::new_v4(), ext)
}

/// The derivative-sweep prefix for a source or derivative name: the stem
/// plus an underscore, used by `Folder::delete_one` and the synchronizer to
/// list every object that belongs to one source.
pub fn sweep_prefix(name: &str) -> String {
    format!("{}_", stem(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_ext_basic() {
        assert_eq!(split_ext("photo.jpg"), ("photo", "jpg"));
        assert_eq!(split_ext("photo"), ("photo", ""));
        assert_eq!(split_ext(".hidden"), (".hidden", ""));
        assert_eq!(split_ext("a.b.c"), ("a.b", "c"));
    }

    #[test]
    fn ext_lower_lowercases() {
        assert_eq!(ext_lower("IMG_0001.JPG"), "jpg");
    }

    #[test]
    fn source_detection() {
        let uuid = Uuid::new_v4();
        assert!(is_source_name(&format!("{uuid}.jpg")));
        assert!(!is_source_name(&format!("{uuid}_thumb.jpg")));
        assert!(!is_source_name("not-a-uuid.jpg"));
    }

    #[test]
    fn new_source_name_has_lowercase_ext_and_fresh_uuid() {
        let a = new_source_name("Photo.JPG");
        let b = new_source_name("Photo.JPG");
        assert_ne!(a, b);
        assert!(a.ends_with(".jpg"));
        assert!(is_source_name(&a));
    }

    #[test]
    fn sweep_prefix_strips_extension() {
        let uuid = Uuid::new_v4();
        let name = format!("{uuid}.jpg");
        assert_eq!(sweep_prefix(&name), format!("{uuid}_"));
    }
}
