//! Measurement lifecycle services and their collaborators

pub mod confirmation;
pub mod duplicate_guard;
pub mod gemini_client;
pub mod image_codec;
pub mod query;
pub mod recognition;
pub mod submission;

pub use confirmation::{ConfirmationError, ConfirmationRequest, ConfirmationWorkflow};
pub use duplicate_guard::{DuplicateGuard, DuplicateReport};
pub use gemini_client::GeminiRecognizer;
pub use image_codec::{CodecError, ImageCodec, StagedImage};
pub use query::{QueryError, QueryService};
pub use recognition::{RecognitionError, RecognitionService};
pub use submission::{SubmissionError, SubmissionOutcome, SubmissionRequest, SubmissionService};
