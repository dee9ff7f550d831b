//! Asset staging, build contexts and Dockerfile synthesis for infuse.
//!
//! # Injection pipeline
//!
//! ```text
//! infuse inject
//!   1. Resolve   ── AssetResolver::resolve()      file / http(s) / inline text → bytes
//!   2. Stage     ── ContentStager::stage_all()    <staging>/<sha256 hex>, secrets stay in memory
//!   3. Context   ── ContextBuilder::build()       <root>/pulumi-<stack8>-<hash8>/ (hard links)
//!   4. Dockerfile ── DockerfileGenerator::render() two stages, secrets via --mount=type=secret
//!   5. Build     ── infuse-engine                  external build engine
//! ```
//!
//! # Determinism
//!
//! Staged files are named after the digest of their content, and the context
//! hash only covers the ordered digests. The same ordered asset set therefore
//! always produces the same context directory and the same Dockerfile text,
//! so the build engine sees no change when nothing changed.
//!
//! # Cleanup
//!
//! Every directory created along the way is owned by a [`Janitor`] that the
//! caller tears down once it is done with the build.

pub mod context;
pub mod dockerfile;
pub mod janitor;
pub mod resolve;
pub mod stage;
pub mod suffix;

pub use context::{BuildContext, ContextBuilder, ContextError};
pub use dockerfile::DockerfileGenerator;
pub use janitor::Janitor;
pub use resolve::{AssetResolver, ResolveError};
pub use stage::{ContentStager, ResolvedAsset, StageError};
pub use suffix::SuffixTemplate;
