// helpers.rs
use uuid::Uuid;

/// Fresh random identifier for documents, queries and QA entries.
pub fn gen_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// First segment of a UUID string, used in log lines.
pub fn short_uuid(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}

/// Deterministic UUIDv5 from an arbitrary string id
pub fn stable_uuid(id: &str) -> Uuid {
    // URL namespace is an arbitrary but stable choice
    Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = gen_uuid();
        let b = gen_uuid();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn short_id_is_first_segment() {
        assert_eq!(short_uuid("1234abcd-aaaa-bbbb"), "1234abcd");
        assert_eq!(short_uuid("plain"), "plain");
    }

    #[test]
    fn stable_ids_repeat() {
        assert_eq!(stable_uuid("doc-1:0"), stable_uuid("doc-1:0"));
        assert_ne!(stable_uuid("doc-1:0"), stable_uuid("doc-1:1"));
    }
}
