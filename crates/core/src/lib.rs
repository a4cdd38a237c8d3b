//! Core of the picture-description tutor.
//!
//! - `topic`: the static catalog of exercise topics.
//! - `generative` / `gemini`: request shapes for a multimodal `generateContent`
//!   API and the Gemini REST client that sends them.
//! - `tutor`: the orchestration layer (image, transcription, grading).
//! - `feedback`: the grading schema and its fallback result.
//! - `session`: the learner session state machine.

pub mod error;
pub mod feedback;
pub mod gemini;
pub mod generative;
pub mod prompts;
pub mod session;
pub mod topic;
pub mod tutor;
