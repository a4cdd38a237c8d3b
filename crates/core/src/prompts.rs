//! Prompt templates for the three tutor operations.
//!
//! Templates use `{topic}` and `{student_text}` placeholders. Built-in
//! defaults target a Spanish DELE B2 exercise; any of them can be replaced
//! by a template map loaded at startup.

use std::collections::HashMap;

pub const IMAGE_PROMPT_KEY: &str = "image";
pub const TRANSCRIPTION_PROMPT_KEY: &str = "transcription";
pub const EVALUATION_PROMPT_KEY: &str = "evaluation";

const DEFAULT_IMAGE_PROMPT: &str = "Una fotografía realista, clara y educativa sobre el tema: \"{topic}\". La imagen debe ser rica en detalles, adecuada para que un estudiante de español nivel B2 la describa en un examen. Sin texto en la imagen.";

const DEFAULT_TRANSCRIPTION_PROMPT: &str = "Transcribe el siguiente audio exactamente como se habla en español. Si hay pausas o muletillas, inclúyelas para que el texto sea fiel al habla del estudiante.";

const DEFAULT_EVALUATION_PROMPT: &str = r#"Actúa como un examinador oficial del examen DELE B2 de español.

Tarea:
El alumno debe describir la imagen adjunta relacionada con el tema "{topic}".
Analiza su respuesta: "{student_text}"

Devuelve un análisis detallado en formato JSON siguiendo estrictamente el esquema proporcionado.
Sé constructivo pero riguroso con la gramática y la coherencia visual.

IMPORTANTE: Desglosa la puntuación en Gramática, Vocabulario y Coherencia (0-10)."#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    image: String,
    transcription: String,
    evaluation: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE_PROMPT.to_string(),
            transcription: DEFAULT_TRANSCRIPTION_PROMPT.to_string(),
            evaluation: DEFAULT_EVALUATION_PROMPT.to_string(),
        }
    }
}

impl PromptSet {
    /// Builds a prompt set from a template map keyed by `"image"`,
    /// `"transcription"` and `"evaluation"`. Missing keys keep the default.
    pub fn from_templates(mut templates: HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            image: templates
                .remove(IMAGE_PROMPT_KEY)
                .unwrap_or(defaults.image),
            transcription: templates
                .remove(TRANSCRIPTION_PROMPT_KEY)
                .unwrap_or(defaults.transcription),
            evaluation: templates
                .remove(EVALUATION_PROMPT_KEY)
                .unwrap_or(defaults.evaluation),
        }
    }

    pub fn image_prompt(&self, topic: &str) -> String {
        self.image.replace("{topic}", topic)
    }

    pub fn transcription_prompt(&self) -> &str {
        &self.transcription
    }

    pub fn evaluation_prompt(&self, topic: &str, student_text: &str) -> String {
        // student_text last so a learner typing "{topic}" is left alone.
        self.evaluation
            .replace("{topic}", topic)
            .replace("{student_text}", student_text)
    }
}
