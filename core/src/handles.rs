use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::GateError;

/// Handle format: `pgh_` + 16 random bytes hex-encoded (lowercase).
pub const HANDLE_PREFIX: &str = "pgh_";
const HANDLE_RANDOM_BYTES: usize = 16;
const HANDLE_LEN: usize = HANDLE_PREFIX.len() + HANDLE_RANDOM_BYTES * 2;

/// Description of one produced profiling artifact. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub service: String,
    pub environment: String,
    /// cpu, heap, mutex, goroutines, ... Empty when the producer did not label it.
    #[serde(default)]
    pub kind: String,
    /// As reported by the producer (RFC 3339 by convention); compared verbatim.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub path: PathBuf,
    pub size_bytes: u64,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl ArtifactMetadata {
    /// Produced by the same operation: same (profile id, event id) pair, or
    /// same (timestamp, service, environment) triple. Empty values never match.
    pub fn same_bundle(&self, other: &ArtifactMetadata) -> bool {
        if let (Some(pa), Some(ea), Some(pb), Some(eb)) = (
            non_empty(&self.profile_id),
            non_empty(&self.event_id),
            non_empty(&other.profile_id),
            non_empty(&other.event_id),
        ) {
            if pa == pb && ea == eb {
                return true;
            }
        }
        let complete = |m: &ArtifactMetadata| {
            !m.timestamp.is_empty() && !m.service.is_empty() && !m.environment.is_empty()
        };
        complete(self)
            && complete(other)
            && self.timestamp == other.timestamp
            && self.service == other.service
            && self.environment == other.environment
    }
}

/// Opaque token standing in for a registered artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    /// Lexical check only; says nothing about whether the token is registered.
    pub fn parse(value: &str) -> Option<Self> {
        is_handle(value).then(|| Handle(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn mint() -> Self {
        let bytes: [u8; HANDLE_RANDOM_BYTES] = rand::thread_rng().r#gen();
        Handle(format!("{HANDLE_PREFIX}{}", hex::encode(bytes)))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_handle(value: &str) -> bool {
    value.len() == HANDLE_LEN
        && value.strip_prefix(HANDLE_PREFIX).is_some_and(|body| {
            body.bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        })
}

#[derive(Debug, Clone)]
pub struct RegisteredArtifact {
    pub handle: Handle,
    pub metadata: ArtifactMetadata,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Entries {
    index: HashMap<Handle, usize>,
    ordered: Vec<RegisteredArtifact>,
}

/// Append-only token → artifact store shared by all request workers.
///
/// Entries are never evicted; the process lifetime bounds growth.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    entries: Mutex<Entries>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, metadata: ArtifactMetadata) -> Handle {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let handle = loop {
            let candidate = Handle::mint();
            if !entries.index.contains_key(&candidate) {
                break candidate;
            }
        };
        info!(
            handle = %handle,
            service = %metadata.service,
            environment = %metadata.environment,
            kind = %metadata.kind,
            size_bytes = metadata.size_bytes,
            "registered artifact"
        );
        let position = entries.ordered.len();
        entries.index.insert(handle.clone(), position);
        entries.ordered.push(RegisteredArtifact {
            handle: handle.clone(),
            metadata,
            registered_at: Utc::now(),
        });
        handle
    }

    pub fn resolve(&self, token: &str) -> Option<ArtifactMetadata> {
        self.lookup(token).map(|entry| entry.metadata)
    }

    pub fn lookup(&self, token: &str) -> Option<RegisteredArtifact> {
        let handle = Handle::parse(token)?;
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .index
            .get(&handle)
            .map(|&position| entries.ordered[position].clone())
    }

    /// Like [`HandleRegistry::resolve`], but an unknown token is an error.
    /// Callers must never fall back to treating the token as a path.
    pub fn require(&self, token: &str) -> Result<ArtifactMetadata, GateError> {
        self.resolve(token).ok_or_else(|| GateError::UnknownHandle {
            field: String::new(),
            handle: token.to_string(),
        })
    }

    /// Lexical check only; a handle-shaped token may still be unknown.
    pub fn is_handle(&self, value: &str) -> bool {
        is_handle(value)
    }

    /// Every registered artifact in the anchor's bundle, anchor included, in
    /// registration order.
    pub fn all_bundle_matches(&self, anchor: &str) -> Result<Vec<ArtifactMetadata>, GateError> {
        self.bundle_entries(anchor)
            .map(|entries| entries.into_iter().map(|entry| entry.metadata).collect())
    }

    pub fn bundle_entries(&self, anchor: &str) -> Result<Vec<RegisteredArtifact>, GateError> {
        let anchor_entry = self.lookup(anchor).ok_or_else(|| GateError::UnknownHandle {
            field: String::new(),
            handle: anchor.to_string(),
        })?;
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let matches: Vec<RegisteredArtifact> = entries
            .ordered
            .iter()
            .filter(|entry| {
                entry.handle == anchor_entry.handle
                    || anchor_entry.metadata.same_bundle(&entry.metadata)
            })
            .cloned()
            .collect();
        if matches.is_empty() {
            return Ok(vec![anchor_entry]);
        }
        Ok(matches)
    }

    /// Snapshot in registration order.
    pub fn list(&self) -> Vec<RegisteredArtifact> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.ordered.clone()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateErrorKind;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn artifact(service: &str, kind: &str) -> ArtifactMetadata {
        ArtifactMetadata {
            service: service.to_string(),
            environment: "prod".to_string(),
            kind: kind.to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            profile_id: None,
            event_id: None,
            path: PathBuf::from(format!("/profiles/{service}-{kind}.pprof")),
            size_bytes: 1024,
        }
    }

    #[test]
    fn register_then_resolve_roundtrip() {
        let registry = HandleRegistry::new();
        let metadata = artifact("api", "cpu");
        let handle = registry.register(metadata.clone());
        assert!(is_handle(handle.as_str()));
        assert_eq!(registry.resolve(handle.as_str()), Some(metadata));

        let stranger = format!("pgh_{}", "0".repeat(32));
        assert!(registry.is_handle(&stranger));
        assert_eq!(registry.resolve(&stranger), None);
    }

    #[test]
    fn handles_are_lexically_distinct_from_paths() {
        let handle = Handle::mint();
        assert!(is_handle(handle.as_str()));
        assert!(!is_handle("profiles/cpu.pprof"));
        assert!(!is_handle("pgh_short"));
        assert!(!is_handle(&handle.as_str().to_uppercase()));
        assert!(!is_handle(&format!("./{handle}")));
        assert!(!is_handle(&format!("{handle}/x")));
    }

    #[test]
    fn unknown_handle_is_a_distinct_error() {
        let registry = HandleRegistry::new();
        let stranger = Handle::mint();
        assert_eq!(registry.resolve(stranger.as_str()), None);
        let err = registry.require(stranger.as_str()).unwrap_err();
        assert_eq!(err.kind(), GateErrorKind::UnknownHandle);
        let err = registry.all_bundle_matches(stranger.as_str()).unwrap_err();
        assert_eq!(err.kind(), GateErrorKind::UnknownHandle);
    }

    #[test]
    fn tokens_are_never_reused() {
        let registry = HandleRegistry::new();
        let tokens: HashSet<Handle> = (0..500)
            .map(|i| registry.register(artifact(&format!("svc{i}"), "cpu")))
            .collect();
        assert_eq!(tokens.len(), 500);
        assert_eq!(registry.len(), 500);
    }

    #[test]
    fn bundle_groups_by_timestamp_service_and_environment() {
        let registry = HandleRegistry::new();
        let cpu = registry.register(artifact("api", "cpu"));
        let heap = registry.register(artifact("api", "heap"));
        let mutex = registry.register(artifact("api", "mutex"));
        registry.register(artifact("worker", "cpu"));

        for anchor in [&cpu, &heap, &mutex] {
            let kinds: Vec<String> = registry
                .all_bundle_matches(anchor.as_str())
                .unwrap()
                .into_iter()
                .map(|m| m.kind)
                .collect();
            assert_eq!(kinds, vec!["cpu", "heap", "mutex"]);
        }
    }

    #[test]
    fn bundle_groups_by_profile_and_event_ids() {
        let registry = HandleRegistry::new();
        let mut first = artifact("api", "cpu");
        first.timestamp = String::new();
        first.profile_id = Some("p-1".to_string());
        first.event_id = Some("e-1".to_string());
        let mut second = first.clone();
        second.kind = "heap".to_string();
        second.service = "other-name".to_string();
        let mut unrelated = first.clone();
        unrelated.event_id = Some("e-2".to_string());

        let anchor = registry.register(first);
        registry.register(second);
        registry.register(unrelated);
        let matches = registry.all_bundle_matches(anchor.as_str()).unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn lonely_anchor_returns_itself() {
        let registry = HandleRegistry::new();
        let mut bare = artifact("api", "cpu");
        bare.timestamp = String::new();
        let handle = registry.register(bare.clone());
        registry.register(artifact("api", "heap"));
        let matches = registry.all_bundle_matches(handle.as_str()).unwrap();
        assert_eq!(matches, vec![bare]);
    }

    #[test]
    fn empty_identifiers_never_match() {
        let mut a = artifact("api", "cpu");
        let mut b = artifact("api", "heap");
        a.timestamp = String::new();
        b.timestamp = String::new();
        a.profile_id = Some(String::new());
        a.event_id = Some(String::new());
        b.profile_id = Some(String::new());
        b.event_id = Some(String::new());
        assert!(!a.same_bundle(&b));
        assert!(!a.same_bundle(&a.clone()));
    }

    #[test]
    fn concurrent_registration_and_lookup() {
        let registry = Arc::new(HandleRegistry::new());
        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| {
                            let metadata = artifact(&format!("w{worker}-{i}"), "cpu");
                            let handle = registry.register(metadata.clone());
                            assert_eq!(registry.resolve(handle.as_str()), Some(metadata));
                            handle
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all = HashSet::new();
        for worker in workers {
            all.extend(worker.join().unwrap());
        }
        assert_eq!(all.len(), 400);
        assert_eq!(registry.len(), 400);
    }
}
