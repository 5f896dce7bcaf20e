//! Extract / transform / load traits
//!
//! Blocking, batch-oriented stages. A [`Pipeline`] wires one of each
//! together; the mobility orchestrator and the NDJSON file readers and
//! writers all plug into these seams.

mod extract;
mod load;
mod pipeline;
mod transform;

pub use extract::Extractor;
pub use load::Loader;
pub use pipeline::Pipeline;
pub use transform::{IdentityTransformer, Transformer};
