pub mod bundle;
pub mod config;
pub mod error;
pub mod gate;
pub mod handles;
pub mod redact;
pub mod rules;
pub mod sandbox;
pub mod schema;
pub mod value;

pub use bundle::{BundleEntry, BundleRequest, BundleResolver, ResolvedBundle};
pub use config::GateConfig;
pub use error::{ErrorPayload, GateError, GateErrorKind, ValidationError, Violation};
pub use gate::{PathFields, RequestGate};
pub use handles::{ArtifactMetadata, Handle, HandleRegistry, RegisteredArtifact, is_handle};
pub use rules::{CrossFieldRule, RuleTable};
pub use sandbox::PathSandbox;
pub use schema::{Schema, SchemaValidator};
pub use value::{ArgMap, ArgValue};
