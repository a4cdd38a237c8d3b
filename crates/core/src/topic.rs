use serde::{Deserialize, Serialize};

/// A subject the learner is asked to describe.
///
/// Topics are loaded once at startup and never mutated; sessions hold their
/// own clone of the topic they picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    /// Vocabulary hints shown to the learner while describing.
    pub vocabulary: Vec<String>,
}

impl Topic {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        icon: impl Into<String>,
        vocabulary: &[&str],
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            icon: icon.into(),
            vocabulary: vocabulary.iter().map(|w| w.to_string()).collect(),
        }
    }
}

/// The static list of topics offered on the selection screen.
#[derive(Debug, Clone)]
pub struct TopicCatalog {
    topics: Vec<Topic>,
}

impl TopicCatalog {
    pub fn new(topics: Vec<Topic>) -> Self {
        Self { topics }
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Looks up a topic by its id.
    pub fn find(&self, id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == id)
    }
}

impl Default for TopicCatalog {
    fn default() -> Self {
        Self::new(vec![
            Topic::new(
                "familia",
                "La familia",
                "Describe una reunión familiar y las relaciones entre sus miembros.",
                "👨‍👩‍👧‍👦",
                &["los parientes", "criarse", "llevarse bien", "la sobremesa", "el vínculo"],
            ),
            Topic::new(
                "medio-ambiente",
                "El medio ambiente",
                "Habla sobre la naturaleza, la contaminación y el reciclaje.",
                "🌱",
                &["el reciclaje", "la contaminación", "sostenible", "los residuos", "el paisaje"],
            ),
            Topic::new(
                "ciudad",
                "La vida en la ciudad",
                "Describe una escena urbana: el tráfico, los comercios y la gente.",
                "🏙️",
                &["el atasco", "la acera", "el transeúnte", "el escaparate", "bullicioso"],
            ),
            Topic::new(
                "trabajo",
                "El mundo laboral",
                "Describe un entorno de trabajo y las tareas que se realizan.",
                "💼",
                &["la reunión", "el compañero", "la jornada", "el plazo", "el ambiente laboral"],
            ),
            Topic::new(
                "vacaciones",
                "Viajes y vacaciones",
                "Cuenta qué ocurre en un lugar de vacaciones o durante un viaje.",
                "✈️",
                &["el alojamiento", "la maleta", "hacer turismo", "el itinerario", "relajarse"],
            ),
            Topic::new(
                "tecnologia",
                "La tecnología",
                "Describe cómo usan las personas la tecnología en su día a día.",
                "💻",
                &["la pantalla", "estar conectado", "la aplicación", "el dispositivo", "la red"],
            ),
            Topic::new(
                "salud",
                "La salud y el deporte",
                "Habla sobre hábitos saludables, ejercicio y bienestar.",
                "🏃",
                &["entrenar", "el bienestar", "una dieta equilibrada", "el esfuerzo", "en forma"],
            ),
            Topic::new(
                "gastronomia",
                "La gastronomía",
                "Describe una comida, un mercado o un restaurante.",
                "🥘",
                &["el puesto", "los ingredientes", "probar", "el sabor", "la receta"],
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_catalog_ids_are_unique() {
        let catalog = TopicCatalog::default();
        let ids: HashSet<_> = catalog.topics().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), catalog.topics().len());
    }

    #[test]
    fn test_default_catalog_topics_have_vocabulary() {
        for topic in TopicCatalog::default().topics() {
            assert!(!topic.title.is_empty());
            assert!(!topic.vocabulary.is_empty(), "{} has no vocabulary", topic.id);
        }
    }

    #[test]
    fn test_find_topic_by_id() {
        let catalog = TopicCatalog::default();
        let familia = catalog.find("familia").expect("familia should exist");
        assert_eq!(familia.title, "La familia");
        assert!(catalog.find("no-existe").is_none());
    }
}
