//! Model catalog
//!
//! Built-in entries load from builtin_models.toml at compile time. A live
//! refresh from the gateway replaces the catalog wholesale, with live entries
//! taking precedence over built-ins sharing an identifier; built-ins missing
//! from the listing are re-appended so the selector never loses them.
//!
//! Persona and system-role metadata always resolve against the built-in
//! table (exact id, then family prefix), independent of the live listing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Text,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub kind: ModelKind,
    #[serde(default)]
    pub persona: Option<String>,
    /// Whether the backend reliably honors a dedicated system-role message.
    /// Models without this flag get persona text spliced into the first user
    /// message instead.
    #[serde(default)]
    pub strict_system_role: bool,
}

#[derive(Deserialize)]
struct BuiltinCatalogConfig {
    models: Vec<ModelDescriptor>,
}

/// Load the built-in model catalog from the embedded configuration.
pub fn load_builtin_models() -> Vec<ModelDescriptor> {
    const CONFIG_CONTENT: &str = include_str!("../builtin_models.toml");

    let config: BuiltinCatalogConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_models.toml");

    config.models
}

/// Derive a presentable name from a wire identifier:
/// `"perplexity-fast"` becomes `"Perplexity Fast"`.
pub fn humanize_model_id(id: &str) -> String {
    id.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The leading identifier segment, used to inherit metadata across model
/// variants (`"gemini-3-flash"` resolves to the `"gemini"` family).
fn family_of(id: &str) -> &str {
    id.split(['-', '_']).next().unwrap_or(id)
}

/// Heuristic for live models absent from the built-in table.
fn strict_system_role_heuristic(id: &str) -> bool {
    let lower = id.to_ascii_lowercase();
    lower.contains("openai") || lower.contains("gpt")
}

fn find_builtin(id: &str) -> Option<ModelDescriptor> {
    load_builtin_models()
        .into_iter()
        .find(|m| m.id.eq_ignore_ascii_case(id))
}

pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelCatalog {
    /// A catalog containing only the built-in entries.
    pub fn builtin() -> Self {
        Self {
            models: load_builtin_models(),
        }
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn find(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id.eq_ignore_ascii_case(id))
    }

    /// Replace the catalog with a live listing. An empty listing leaves the
    /// current catalog untouched; otherwise live entries win over built-ins
    /// with the same id and missing built-ins are re-appended.
    pub fn refresh(&mut self, live: Vec<ModelDescriptor>) {
        if live.is_empty() {
            return;
        }

        let mut models: Vec<ModelDescriptor> = Vec::with_capacity(live.len());
        for entry in live {
            if !models.iter().any(|m| m.id == entry.id) {
                models.push(entry);
            }
        }
        for builtin in load_builtin_models() {
            if !models.iter().any(|m| m.id == builtin.id) {
                models.push(builtin);
            }
        }
        self.models = models;
    }

    /// Capability kind of an identifier; unknown models are treated as text.
    pub fn kind_of(&self, id: &str) -> ModelKind {
        self.find(id).map(|m| m.kind).unwrap_or(ModelKind::Text)
    }

    /// Display name resolution: built-in metadata wins, then the live entry,
    /// then a humanized form of the id.
    pub fn display_name(&self, id: &str) -> String {
        if let Some(builtin) = find_builtin(id) {
            return builtin.display_name;
        }
        if let Some(entry) = self.find(id) {
            return entry.display_name.clone();
        }
        humanize_model_id(id)
    }

    /// Persona text for a model: exact built-in match, then family match.
    pub fn persona_for(&self, id: &str) -> Option<String> {
        if let Some(builtin) = find_builtin(id) {
            if builtin.persona.is_some() {
                return builtin.persona;
            }
        }
        find_builtin(family_of(id)).and_then(|m| m.persona)
    }

    /// Whether persona text for this model must ride in a system-role
    /// message. Falls back to the id heuristic for unlisted models.
    pub fn strict_system_role(&self, id: &str) -> bool {
        if let Some(builtin) = find_builtin(id) {
            return builtin.strict_system_role;
        }
        if let Some(family) = find_builtin(family_of(id)) {
            return family.strict_system_role;
        }
        strict_system_role_heuristic(id)
    }
}
