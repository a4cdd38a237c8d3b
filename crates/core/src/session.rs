//! Learner Session State Machine
//!
//! A session walks through five phases: topic selection, image generation,
//! description, analysis and feedback. Each phase carries exactly the data
//! that is valid in it, so a session can never hold feedback without a
//! description or a description without a picture.
//!
//! `Session` itself is synchronous: every orchestration call is split into a
//! `begin_*` transition that returns what the call needs and a `finish_*`
//! transition that consumes its result. `SessionHandle` drives those halves
//! around the actual `TutorService` call.

use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

use crate::{
    error::TutorError,
    feedback::FeedbackResult,
    generative::InlineData,
    topic::Topic,
    tutor::TutorService,
};

/// Discriminant of `Phase`, for display and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PhaseKind {
    TopicSelection,
    GeneratingImage,
    Describing,
    Analyzing,
    Feedback,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::TopicSelection => write!(f, "topic selection"),
            PhaseKind::GeneratingImage => write!(f, "generating image"),
            PhaseKind::Describing => write!(f, "describing"),
            PhaseKind::Analyzing => write!(f, "analyzing"),
            PhaseKind::Feedback => write!(f, "feedback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    #[default]
    TopicSelection,
    GeneratingImage {
        topic: Topic,
    },
    Describing {
        topic: Topic,
        image: InlineData,
        /// Latest transcript, offered to the learner for editing.
        draft: Option<String>,
        transcribing: bool,
    },
    Analyzing {
        topic: Topic,
        image: InlineData,
        text: String,
    },
    Feedback {
        topic: Topic,
        image: InlineData,
        text: String,
        feedback: FeedbackResult,
    },
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::TopicSelection => PhaseKind::TopicSelection,
            Phase::GeneratingImage { .. } => PhaseKind::GeneratingImage,
            Phase::Describing { .. } => PhaseKind::Describing,
            Phase::Analyzing { .. } => PhaseKind::Analyzing,
            Phase::Feedback { .. } => PhaseKind::Feedback,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: PhaseKind,
    },
    #[error("The description is empty")]
    EmptyDescription,
    #[error("The session was reset while the request was in flight")]
    Discarded,
    #[error(transparent)]
    Tutor(#[from] TutorError),
}

/// What an evaluation call needs, captured when analysis begins.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub image: InlineData,
    pub text: String,
    pub topic_title: String,
}

/// One learner's pass through the exercise.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    phase: Phase,
    last_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Message of the most recent failed action, cleared by the next
    /// successful transition.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn topic(&self) -> Option<&Topic> {
        match &self.phase {
            Phase::TopicSelection => None,
            Phase::GeneratingImage { topic }
            | Phase::Describing { topic, .. }
            | Phase::Analyzing { topic, .. }
            | Phase::Feedback { topic, .. } => Some(topic),
        }
    }

    pub fn image(&self) -> Option<&InlineData> {
        match &self.phase {
            Phase::Describing { image, .. }
            | Phase::Analyzing { image, .. }
            | Phase::Feedback { image, .. } => Some(image),
            _ => None,
        }
    }

    pub fn feedback(&self) -> Option<&FeedbackResult> {
        match &self.phase {
            Phase::Feedback { feedback, .. } => Some(feedback),
            _ => None,
        }
    }

    /// Discards everything and returns to topic selection.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            phase: self.phase.kind(),
        }
    }

    /// TopicSelection → GeneratingImage.
    pub fn begin_image_generation(&mut self, topic: Topic) -> Result<String, SessionError> {
        if !matches!(self.phase, Phase::TopicSelection) {
            return Err(self.invalid("select a topic"));
        }
        let title = topic.title.clone();
        self.phase = Phase::GeneratingImage { topic };
        self.last_error = None;
        Ok(title)
    }

    /// GeneratingImage → Describing on success, back to TopicSelection on
    /// failure so the learner can pick again.
    pub fn finish_image_generation(
        &mut self,
        result: Result<InlineData, TutorError>,
    ) -> Result<(), SessionError> {
        let topic = match std::mem::take(&mut self.phase) {
            Phase::GeneratingImage { topic } => topic,
            other => {
                self.phase = other;
                return Err(self.invalid("finish image generation"));
            }
        };
        match result {
            Ok(image) => {
                self.phase = Phase::Describing {
                    topic,
                    image,
                    draft: None,
                    transcribing: false,
                };
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Marks a transcription as in flight; only one at a time.
    pub fn begin_transcription(&mut self) -> Result<(), SessionError> {
        let phase = self.phase.kind();
        match &mut self.phase {
            Phase::Describing { transcribing, .. } if !*transcribing => {
                *transcribing = true;
                self.last_error = None;
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition {
                action: "submit audio",
                phase,
            }),
        }
    }

    /// Stores the transcript as the editable draft. On failure the session
    /// stays in Describing with the error recorded.
    pub fn finish_transcription(
        &mut self,
        result: Result<String, TutorError>,
    ) -> Result<String, SessionError> {
        let phase = self.phase.kind();
        match &mut self.phase {
            Phase::Describing {
                draft,
                transcribing,
                ..
            } if *transcribing => {
                *transcribing = false;
                match result {
                    Ok(text) => {
                        *draft = Some(text.clone());
                        Ok(text)
                    }
                    Err(e) => {
                        self.last_error = Some(e.to_string());
                        Err(e.into())
                    }
                }
            }
            _ => Err(SessionError::InvalidTransition {
                action: "finish transcription",
                phase,
            }),
        }
    }

    /// Describing → Analyzing. Blank text is rejected; the text is stored
    /// trimmed.
    pub fn begin_analysis(&mut self, text: &str) -> Result<EvaluationRequest, SessionError> {
        if !matches!(
            self.phase,
            Phase::Describing {
                transcribing: false,
                ..
            }
        ) {
            return Err(self.invalid("submit a description"));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyDescription);
        }
        let (topic, image) = match std::mem::take(&mut self.phase) {
            Phase::Describing { topic, image, .. } => (topic, image),
            other => {
                self.phase = other;
                return Err(self.invalid("submit a description"));
            }
        };
        let request = EvaluationRequest {
            image: image.clone(),
            text: text.to_string(),
            topic_title: topic.title.clone(),
        };
        self.phase = Phase::Analyzing {
            topic,
            image,
            text: text.to_string(),
        };
        self.last_error = None;
        Ok(request)
    }

    /// Rolls back a call that was abandoned before its result arrived:
    /// GeneratingImage returns to TopicSelection, an in-flight transcription
    /// is cleared, and Analyzing returns to Describing with the submitted
    /// text kept as the draft. Other phases are left as they are.
    pub fn abandon_in_flight(&mut self) {
        match std::mem::take(&mut self.phase) {
            Phase::GeneratingImage { .. } => {}
            Phase::Describing {
                topic,
                image,
                draft,
                ..
            } => {
                self.phase = Phase::Describing {
                    topic,
                    image,
                    draft,
                    transcribing: false,
                };
            }
            Phase::Analyzing { topic, image, text } => {
                self.phase = Phase::Describing {
                    topic,
                    image,
                    draft: Some(text),
                    transcribing: false,
                };
            }
            other => self.phase = other,
        }
    }

    /// Analyzing → Feedback.
    pub fn finish_analysis(&mut self, feedback: FeedbackResult) -> Result<(), SessionError> {
        match std::mem::take(&mut self.phase) {
            Phase::Analyzing { topic, image, text } => {
                self.phase = Phase::Feedback {
                    topic,
                    image,
                    text,
                    feedback,
                };
                Ok(())
            }
            other => {
                self.phase = other;
                Err(self.invalid("finish analysis"))
            }
        }
    }
}

struct Tracked {
    session: Session,
    /// Bumped by every reset; in-flight results from an older epoch are
    /// dropped.
    epoch: u64,
}

/// Owns one `Session` and performs its orchestration calls.
///
/// The lock is only held for synchronous transitions and is released while a
/// backend call is in flight, so `reset` and reads never wait on the network.
/// A result that comes back after a reset is discarded, and a call whose
/// caller goes away before it completes is rolled back.
pub struct SessionHandle {
    inner: Mutex<Tracked>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Armed while a backend call is outstanding. Dropping it armed means the
/// caller's future was cancelled, so the session is rolled back out of its
/// in-flight state.
struct InFlight<'a> {
    handle: &'a SessionHandle,
    epoch: u64,
    armed: bool,
}

impl InFlight<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.handle.lock();
        if inner.epoch == self.epoch {
            warn!(
                phase = %inner.session.phase().kind(),
                "Request abandoned before completion, rolling back"
            );
            inner.session.abandon_in_flight();
        }
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Tracked {
                session: Session::new(),
                epoch: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight(&self, epoch: u64) -> InFlight<'_> {
        InFlight {
            handle: self,
            epoch,
            armed: true,
        }
    }

    /// A copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn reset(&self) -> Session {
        let mut inner = self.lock();
        inner.session.reset();
        inner.epoch += 1;
        info!(epoch = inner.epoch, "Session reset");
        inner.session.clone()
    }

    /// Picks a topic and waits for its picture.
    pub async fn select_topic(
        &self,
        tutor: &dyn TutorService,
        topic: Topic,
    ) -> Result<Session, SessionError> {
        let (title, epoch) = {
            let mut inner = self.lock();
            let title = inner.session.begin_image_generation(topic)?;
            (title, inner.epoch)
        };
        info!(topic = %title, "Topic selected");

        let mut guard = self.in_flight(epoch);
        let result = tutor.generate_image(&title).await;
        guard.disarm();

        let mut inner = self.lock();
        Self::ensure_current(&inner, epoch)?;
        if let Err(e) = inner.session.finish_image_generation(result) {
            error!(topic = %title, error = %e, "Image generation failed, back to topic selection");
            return Err(e);
        }
        Ok(inner.session.clone())
    }

    /// Transcribes a recorded answer into the session's draft.
    pub async fn submit_audio(
        &self,
        tutor: &dyn TutorService,
        audio: InlineData,
    ) -> Result<Session, SessionError> {
        let epoch = {
            let mut inner = self.lock();
            inner.session.begin_transcription()?;
            inner.epoch
        };

        let mut guard = self.in_flight(epoch);
        let result = tutor.transcribe_audio(&audio).await;
        guard.disarm();

        let mut inner = self.lock();
        Self::ensure_current(&inner, epoch)?;
        if let Err(e) = inner.session.finish_transcription(result) {
            error!(error = %e, "Transcription failed");
            return Err(e);
        }
        Ok(inner.session.clone())
    }

    /// Submits the description for grading. Always reaches Feedback unless
    /// the session was reset meanwhile.
    pub async fn submit_text(
        &self,
        tutor: &dyn TutorService,
        text: &str,
    ) -> Result<Session, SessionError> {
        let (request, epoch) = {
            let mut inner = self.lock();
            let request = inner.session.begin_analysis(text)?;
            (request, inner.epoch)
        };

        let mut guard = self.in_flight(epoch);
        let feedback = tutor
            .evaluate_description(&request.image, &request.text, &request.topic_title)
            .await;
        guard.disarm();

        let mut inner = self.lock();
        Self::ensure_current(&inner, epoch)?;
        inner.session.finish_analysis(feedback)?;
        info!(score = ?inner.session.feedback().map(|f| f.score), "Feedback ready");
        Ok(inner.session.clone())
    }

    fn ensure_current(inner: &Tracked, epoch: u64) -> Result<(), SessionError> {
        if inner.epoch != epoch {
            warn!(
                started = epoch,
                current = inner.epoch,
                "Discarding result of a request overtaken by a reset"
            );
            return Err(SessionError::Discarded);
        }
        Ok(())
    }
}
