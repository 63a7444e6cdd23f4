//! Composite key scheme for the single entity table.
//!
//! These prefixes are the wire contract with existing stored data; change
//! them only together with a data migration.

use uuid::Uuid;

const USER_PREFIX: &str = "user:";
const POSTED_SUFFIX: &str = ":posted";
const REQUESTS_SUFFIX: &str = ":requests";
const REQUEST_INFIX: &str = ":request:";
const GENERATED_SUFFIX: &str = ":generated";

pub const PROFILE_SORT_KEY: &str = "profile";
pub const CREDENTIAL_SORT_KEY: &str = "credential";
pub const POSTED_SORT_PREFIX: &str = "format:";
const POSTED_ID_INFIX: &str = ":id:";
pub const REQUEST_SORT_PREFIX: &str = "request:";
pub const GENERATED_SORT_PREFIX: &str = "generated:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKey {
    pub pk: String,
    pub sk: String,
}

impl ItemKey {
    pub fn profile(user_id: &str) -> Self {
        ItemKey {
            pk: user_partition(user_id),
            sk: PROFILE_SORT_KEY.to_string(),
        }
    }

    pub fn credential(user_id: &str) -> Self {
        ItemKey {
            pk: user_partition(user_id),
            sk: CREDENTIAL_SORT_KEY.to_string(),
        }
    }

    pub fn posted(user_id: &str, format: &str, id: Uuid) -> Self {
        ItemKey {
            pk: posted_partition(user_id),
            sk: format!("{POSTED_SORT_PREFIX}{format}{POSTED_ID_INFIX}{id}"),
        }
    }

    pub fn content_request(user_id: &str, request_id: Uuid) -> Self {
        ItemKey {
            pk: requests_partition(user_id),
            sk: format!("{REQUEST_SORT_PREFIX}{request_id}"),
        }
    }

    pub fn generated(user_id: &str, request_id: Uuid, generated_id: Uuid) -> Self {
        ItemKey {
            pk: generated_partition(user_id, request_id),
            sk: generated_index_key(generated_id),
        }
    }
}

pub fn user_partition(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

pub fn posted_partition(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}{POSTED_SUFFIX}")
}

pub fn requests_partition(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}{REQUESTS_SUFFIX}")
}

pub fn generated_partition(user_id: &str, request_id: Uuid) -> String {
    format!("{USER_PREFIX}{user_id}{REQUEST_INFIX}{request_id}{GENERATED_SUFFIX}")
}

/// Secondary-index key for a generated piece. Identical to its sort key.
pub fn generated_index_key(generated_id: Uuid) -> String {
    format!("{GENERATED_SORT_PREFIX}{generated_id}")
}

// ────────────────────────────────────────────────────────────────────────────
// Decoding
// ────────────────────────────────────────────────────────────────────────────

pub fn parse_user_partition(pk: &str) -> Option<&str> {
    pk.strip_prefix(USER_PREFIX).filter(|id| !id.is_empty())
}

/// `format:{format}:id:{uuid}` → (format, uuid). The format may itself
/// contain colons, so the id is split off from the right.
pub fn parse_posted_sort_key(sk: &str) -> Option<(&str, Uuid)> {
    let rest = sk.strip_prefix(POSTED_SORT_PREFIX)?;
    let (format, id) = rest.rsplit_once(POSTED_ID_INFIX)?;
    Some((format, Uuid::parse_str(id).ok()?))
}

pub fn parse_request_sort_key(sk: &str) -> Option<Uuid> {
    Uuid::parse_str(sk.strip_prefix(REQUEST_SORT_PREFIX)?).ok()
}

pub fn parse_generated_sort_key(sk: &str) -> Option<Uuid> {
    Uuid::parse_str(sk.strip_prefix(GENERATED_SORT_PREFIX)?).ok()
}

/// `user:{userId}:request:{requestId}:generated` → (userId, requestId).
pub fn parse_generated_partition(pk: &str) -> Option<(&str, Uuid)> {
    let rest = pk.strip_prefix(USER_PREFIX)?.strip_suffix(GENERATED_SUFFIX)?;
    let (user_id, request_id) = rest.rsplit_once(REQUEST_INFIX)?;
    if user_id.is_empty() {
        return None;
    }
    Some((user_id, Uuid::parse_str(request_id).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefixes_are_stable() {
        let request_id = Uuid::nil();
        let generated_id = Uuid::new_v4();

        assert_eq!(ItemKey::profile("u1").pk, "user:u1");
        assert_eq!(ItemKey::profile("u1").sk, "profile");
        assert_eq!(ItemKey::credential("u1").sk, "credential");
        assert_eq!(posted_partition("u1"), "user:u1:posted");
        assert_eq!(requests_partition("u1"), "user:u1:requests");
        assert_eq!(
            ItemKey::content_request("u1", request_id).sk,
            format!("request:{request_id}")
        );
        assert_eq!(
            generated_partition("u1", request_id),
            format!("user:u1:request:{request_id}:generated")
        );
        assert_eq!(
            ItemKey::generated("u1", request_id, generated_id).sk,
            format!("generated:{generated_id}")
        );
    }

    #[test]
    fn test_posted_sort_key_with_colon_in_format() {
        let id = Uuid::new_v4();
        let key = ItemKey::posted("u1", "thread:x", id);
        assert_eq!(parse_posted_sort_key(&key.sk), Some(("thread:x", id)));
    }

    #[test]
    fn test_generated_partition_decodes_owner() {
        let request_id = Uuid::new_v4();
        let pk = generated_partition("auth0|abc", request_id);
        assert_eq!(parse_generated_partition(&pk), Some(("auth0|abc", request_id)));
    }

    #[test]
    fn test_malformed_keys_rejected() {
        assert_eq!(parse_request_sort_key("request:not-a-uuid"), None);
        assert_eq!(parse_generated_sort_key("gc#abc"), None);
        assert_eq!(parse_posted_sort_key("format:blog"), None);
        assert_eq!(parse_user_partition("user:"), None);
        assert_eq!(parse_generated_partition("user::request:x:generated"), None);
    }
}
