//! generation_queue - fills pending assistant slots, one at a time
//!
//! The queue scans open conversation trees for assistant messages awaiting
//! generation and streams each one through a [`GenerationService`]. Exactly one
//! generation is in flight at any time.

pub mod echo;
pub mod listener;
pub mod queue;
pub mod service;
mod stream;

pub use echo::EchoGenerationService;
pub use listener::{CompletionEvent, CompletionListener, GenerationOutcome};
pub use queue::GenerationQueue;
pub use service::{
    GenerationChunk, GenerationError, GenerationParams, GenerationRequest, GenerationService,
    GenerationStream,
};
pub use stream::{CANCELLED_MARKER, ERROR_MARKER_PREFIX};
