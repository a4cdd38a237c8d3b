//! Evaluation Result Schema
//!
//! The structured feedback the examiner model must return, the JSON schema
//! sent along with the evaluation request, and the fallback result used when
//! the evaluation cannot be obtained.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::TutorError;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

const FALLBACK_COHERENCE_CHECK: &str = "No se pudo verificar la coherencia debido a un error.";
const FALLBACK_GENERAL_ADVICE: &str =
    "Hubo un error al procesar tu respuesta. Por favor, inténtalo de nuevo.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarCorrection {
    pub error: String,
    pub correction: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub grammar: f64,
    pub vocabulary: f64,
    pub coherence: f64,
}

/// Grading of one description attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResult {
    pub grammar_corrections: Vec<GrammarCorrection>,
    pub vocabulary_suggestions: Vec<String>,
    pub coherence_check: String,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub general_advice: String,
}

impl FeedbackResult {
    /// The result handed to the learner when grading failed.
    pub fn fallback() -> Self {
        Self {
            grammar_corrections: Vec::new(),
            vocabulary_suggestions: Vec::new(),
            coherence_check: FALLBACK_COHERENCE_CHECK.to_string(),
            score: 0.0,
            score_breakdown: ScoreBreakdown::default(),
            general_advice: FALLBACK_GENERAL_ADVICE.to_string(),
        }
    }

    /// Parses the examiner's JSON answer and checks every score lies in
    /// `[0, 10]`.
    pub fn from_json(text: &str) -> Result<Self, TutorError> {
        let result: FeedbackResult = serde_json::from_str(text)?;
        result.validate()?;
        Ok(result)
    }

    pub fn validate(&self) -> Result<(), TutorError> {
        let scores = [
            ("score", self.score),
            ("scoreBreakdown.grammar", self.score_breakdown.grammar),
            ("scoreBreakdown.vocabulary", self.score_breakdown.vocabulary),
            ("scoreBreakdown.coherence", self.score_breakdown.coherence),
        ];
        for (field, value) in scores {
            if !value.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&value) {
                return Err(TutorError::MalformedResponse(format!(
                    "{field} = {value} is outside [{MIN_SCORE}, {MAX_SCORE}]"
                )));
            }
        }
        Ok(())
    }
}

/// The response schema sent with every evaluation request, in the backend's
/// OpenAPI-subset dialect.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "grammarCorrections": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "error": { "type": "STRING", "description": "La parte incorrecta del texto original" },
                        "correction": { "type": "STRING", "description": "La versión corregida" },
                        "explanation": { "type": "STRING", "description": "Breve explicación gramatical del error" }
                    },
                    "required": ["error", "correction", "explanation"]
                },
                "description": "Lista de errores gramaticales encontrados"
            },
            "vocabularySuggestions": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Lista de 3-5 palabras o expresiones de nivel B2/C1 que mejorarían la descripción"
            },
            "coherenceCheck": {
                "type": "STRING",
                "description": "Evaluación de si la descripción coincide con la imagen visualmente"
            },
            "score": {
                "type": "NUMBER",
                "description": "Nota global numérica de 0 a 10"
            },
            "scoreBreakdown": {
                "type": "OBJECT",
                "properties": {
                    "grammar": { "type": "NUMBER", "description": "Nota de gramática (0-10)" },
                    "vocabulary": { "type": "NUMBER", "description": "Nota de riqueza léxica (0-10)" },
                    "coherence": { "type": "NUMBER", "description": "Nota de coherencia y fluidez (0-10)" }
                },
                "required": ["grammar", "vocabulary", "coherence"]
            },
            "generalAdvice": {
                "type": "STRING",
                "description": "Consejo general alentador para el estudiante"
            }
        },
        "required": [
            "grammarCorrections",
            "vocabularySuggestions",
            "coherenceCheck",
            "score",
            "scoreBreakdown",
            "generalAdvice"
        ]
    })
}
