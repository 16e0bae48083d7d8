//! Cache key derivation for read operations.
//!
//! Keys have the shape `<prefix>:<namespace>:<module>:<operation>` followed by
//! `:<name>:<value>` for every argument that identifies the result. Injected
//! handles (services, sessions, raw requests) never take part in the key.

use std::fmt::Display;

/// Argument names that refer to injected collaborators rather than inputs.
pub const EXCLUDED_ARGS: &[&str] = &["service", "session", "request", "response"];

#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    key: String,
}

impl CacheKeyBuilder {
    pub fn new(prefix: &str, namespace: &str, module_path: &str, operation: &str) -> Self {
        Self {
            key: format!("{prefix}:{namespace}:{module_path}:{operation}"),
        }
    }

    /// Appends `:<name>:<value>` unless `name` is an injected handle.
    pub fn arg(mut self, name: &str, value: impl Display) -> Self {
        if !EXCLUDED_ARGS.contains(&name) {
            self.key.push(':');
            self.key.push_str(name);
            self.key.push(':');
            self.key.push_str(&value.to_string());
        }
        self
    }

    pub fn build(self) -> String {
        self.key.chars().filter(|ch| !ch.is_whitespace()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = "medrecords::infra::http::resource";

    #[test]
    fn list_key_is_scoped_by_namespace_only() {
        let key = CacheKeyBuilder::new("medrecords-cache", "patients", MODULE, "get_all").build();
        assert_eq!(
            key,
            "medrecords-cache:patients:medrecords::infra::http::resource:get_all"
        );
    }

    #[test]
    fn arguments_are_appended_in_call_order() {
        let key = CacheKeyBuilder::new("p", "documents", "m", "download")
            .arg("obj_id", 7)
            .arg("variant", "raw")
            .build();
        assert_eq!(key, "p:documents:m:download:obj_id:7:variant:raw");
    }

    #[test]
    fn injected_handles_are_excluded() {
        let with_handles = CacheKeyBuilder::new("p", "roles", "m", "get_by_id")
            .arg("service", "EntityService@0x1")
            .arg("obj_id", 3)
            .arg("session", "conn#9")
            .build();
        let plain = CacheKeyBuilder::new("p", "roles", "m", "get_by_id")
            .arg("obj_id", 3)
            .build();
        assert_eq!(with_handles, plain);
    }

    #[test]
    fn different_ids_and_namespaces_do_not_collide() {
        let a = CacheKeyBuilder::new("p", "roles", "m", "get_by_id").arg("obj_id", 1);
        let b = CacheKeyBuilder::new("p", "roles", "m", "get_by_id").arg("obj_id", 11);
        let c = CacheKeyBuilder::new("p", "users", "m", "get_by_id").arg("obj_id", 1);
        let (a, b, c) = (a.build(), b.build(), c.build());
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn whitespace_is_removed() {
        let key = CacheKeyBuilder::new("p", "patients", "m", "search")
            .arg("fio", "Иванов Иван\tИванович")
            .build();
        assert_eq!(key, "p:patients:m:search:fio:ИвановИванИванович");
    }
}
