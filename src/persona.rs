use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::logging;
use crate::prompts::DEFAULT_PERSONA_PROMPT;
use crate::store::{self, KeyValueStore};

pub const DEFAULT_PERSONA_ID: &str = "default";
pub const DEFAULT_API_CONFIG_ID: &str = "official";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

pub const GEMINI_HOST: &str = "generativelanguage.googleapis.com";

// ============ Personas ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReplyStyle {
    #[default]
    Warm,
    Analytical,
    Concise,
    Humorous,
}

impl ReplyStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyStyle::Warm => "warm",
            ReplyStyle::Analytical => "analytical",
            ReplyStyle::Concise => "concise",
            ReplyStyle::Humorous => "humorous",
        }
    }
}

impl From<String> for ReplyStyle {
    fn from(label: String) -> Self {
        match label.trim().to_lowercase().as_str() {
            "analytical" => ReplyStyle::Analytical,
            "concise" => ReplyStyle::Concise,
            "humorous" => ReplyStyle::Humorous,
            _ => ReplyStyle::Warm,
        }
    }
}

impl From<ReplyStyle> for String {
    fn from(style: ReplyStyle) -> Self {
        style.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiaryStylePrompts {
    #[serde(default)]
    pub hide_ai: String,
    #[serde(default)]
    pub keep_chat: String,
}

/// Per-persona knobs for diary generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiarySettings {
    #[serde(default)]
    pub word_count: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub prompts: DiaryStylePrompts,
}

impl Default for DiarySettings {
    fn default() -> Self {
        Self {
            word_count: "300".to_string(),
            style: "Personal".to_string(),
            prompts: DiaryStylePrompts::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reply_style: ReplyStyle,
    #[serde(default)]
    pub custom_prompt: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diary_settings: Option<DiarySettings>,
}

impl Persona {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: description.into(),
            reply_style: ReplyStyle::Warm,
            custom_prompt: String::new(),
            is_default: false,
            diary_settings: Some(DiarySettings::default()),
        }
    }

    /// Custom prompt if set, else the description
    pub fn voice(&self) -> &str {
        if self.custom_prompt.trim().is_empty() {
            &self.description
        } else {
            &self.custom_prompt
        }
    }
}

pub fn default_personas() -> Vec<Persona> {
    vec![Persona {
        id: DEFAULT_PERSONA_ID.to_string(),
        name: "Empathetic Companion".to_string(),
        description: "User-centric, supportive friend who provides emotional value and casual guidance.".to_string(),
        reply_style: ReplyStyle::Warm,
        custom_prompt: DEFAULT_PERSONA_PROMPT.to_string(),
        is_default: true,
        diary_settings: None,
    }]
}

/// Editable persona fields. Built-in personas only take style and diary settings.
#[derive(Debug, Clone, Default)]
pub struct PersonaUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub reply_style: Option<ReplyStyle>,
    pub custom_prompt: Option<String>,
    pub diary_settings: Option<DiarySettings>,
}

// ============ API Configurations ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    Official,
    #[default]
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderKind {
    OpenAi,
    DeepSeek,
    Google,
    Custom,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Google => "google",
            ProviderKind::Custom => "custom",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::Google => "Google Gemini",
            ProviderKind::Custom => "Custom / Local",
        }
    }

    /// Fixed base URL for hosted providers; custom ones bring their own
    pub fn preset_base_url(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("https://api.openai.com/v1"),
            ProviderKind::DeepSeek => Some("https://api.deepseek.com"),
            ProviderKind::Google => Some("https://generativelanguage.googleapis.com"),
            ProviderKind::Custom => None,
        }
    }
}

impl From<String> for ProviderKind {
    fn from(label: String) -> Self {
        match label.trim().to_lowercase().as_str() {
            "openai" => ProviderKind::OpenAi,
            "deepseek" => ProviderKind::DeepSeek,
            "google" => ProviderKind::Google,
            _ => ProviderKind::Custom,
        }
    }
}

impl From<ProviderKind> for String {
    fn from(kind: ProviderKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub config_type: ConfigType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl ApiConfig {
    /// New config for a provider preset; custom providers need `base_url`
    pub fn for_provider(name: impl Into<String>, provider: ProviderKind, api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        let base_url = provider
            .preset_base_url()
            .or(base_url)
            .unwrap_or_default()
            .to_string();
        Self {
            id: String::new(),
            name: name.into(),
            config_type: if provider == ProviderKind::Custom { ConfigType::Custom } else { ConfigType::Official },
            provider: Some(provider),
            api_key: api_key.into(),
            base_url,
            model: Some(DEFAULT_MODEL.to_string()),
            is_default: false,
        }
    }

    /// Provider, inferring it for records saved before the field existed
    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.unwrap_or(match self.config_type {
            ConfigType::Official => ProviderKind::OpenAi,
            ConfigType::Custom => ProviderKind::Custom,
        })
    }

    pub fn model(&self) -> &str {
        match self.model.as_deref() {
            Some(m) if !m.trim().is_empty() => m,
            _ => DEFAULT_MODEL,
        }
    }

    pub fn is_google(&self) -> bool {
        self.provider_kind() == ProviderKind::Google || self.base_url.contains(GEMINI_HOST)
    }
}

pub fn default_api_configs() -> Vec<ApiConfig> {
    vec![ApiConfig {
        id: DEFAULT_API_CONFIG_ID.to_string(),
        name: "Official OpenAI".to_string(),
        config_type: ConfigType::Official,
        provider: None,
        api_key: String::new(),
        base_url: "https://api.openai.com/v1".to_string(),
        model: None,
        is_default: true,
    }]
}

#[derive(Debug, Clone, Default)]
pub struct ApiConfigUpdate {
    pub name: Option<String>,
    pub provider: Option<ProviderKind>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

// ============ Persona Service ============

/// Personas, API configurations and which of each is selected
pub struct PersonaService {
    store: Arc<dyn KeyValueStore>,
    personas: Vec<Persona>,
    current_persona_id: String,
    api_configs: Vec<ApiConfig>,
    current_api_config_id: String,
}

impl PersonaService {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let personas = store::read_json(store.as_ref(), store::PERSONAS_KEY).unwrap_or_else(default_personas);
        let api_configs = store::read_json(store.as_ref(), store::API_CONFIGS_KEY).unwrap_or_else(default_api_configs);
        let current_persona_id = read_selection(store.as_ref(), store::CURRENT_PERSONA_KEY, DEFAULT_PERSONA_ID);
        let current_api_config_id = read_selection(store.as_ref(), store::CURRENT_API_CONFIG_KEY, DEFAULT_API_CONFIG_ID);

        let mut service = Self {
            store,
            personas,
            current_persona_id,
            api_configs,
            current_api_config_id,
        };
        service.prune_obsolete_defaults();
        service
    }

    /// Drop personas flagged as built-in that are no longer shipped
    fn prune_obsolete_defaults(&mut self) {
        let valid: HashSet<String> = default_personas().into_iter().map(|p| p.id).collect();
        let is_obsolete = |p: &Persona| p.is_default && !valid.contains(&p.id);

        if !self.personas.iter().any(is_obsolete) {
            return;
        }

        let current_is_obsolete = self
            .personas
            .iter()
            .any(|p| p.id == self.current_persona_id && is_obsolete(p));

        self.personas.retain(|p| !is_obsolete(p));
        if self.personas.is_empty() {
            self.personas = default_personas();
        }
        if current_is_obsolete {
            self.current_persona_id = DEFAULT_PERSONA_ID.to_string();
        }

        logging::log_storage(Some(store::PERSONAS_KEY), "Pruned obsolete default personas");
        if let Err(e) = self.persist_personas() {
            logging::log_error(Some(store::PERSONAS_KEY), &format!("Failed to save pruned personas: {}", e));
        }
    }

    fn persist_personas(&self) -> Result<()> {
        store::write_json(self.store.as_ref(), store::PERSONAS_KEY, &self.personas)?;
        self.store.set(store::CURRENT_PERSONA_KEY, &self.current_persona_id)
    }

    fn persist_api_configs(&self) -> Result<()> {
        store::write_json(self.store.as_ref(), store::API_CONFIGS_KEY, &self.api_configs)?;
        self.store.set(store::CURRENT_API_CONFIG_KEY, &self.current_api_config_id)
    }

    // ---- personas ----

    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    pub fn current_persona_id(&self) -> &str {
        &self.current_persona_id
    }

    /// Selected persona, or the first one if the selection is stale
    pub fn current_persona(&self) -> Persona {
        self.personas
            .iter()
            .find(|p| p.id == self.current_persona_id)
            .or_else(|| self.personas.first())
            .cloned()
            .unwrap_or_else(|| default_personas().remove(0))
    }

    pub fn select_persona(&mut self, id: &str) -> Result<()> {
        if !self.personas.iter().any(|p| p.id == id) {
            return Err(Error::NotFound(format!("persona {}", id)));
        }
        self.current_persona_id = id.to_string();
        self.persist_personas()
    }

    /// Store a new persona and return its generated id
    pub fn add_persona(&mut self, mut persona: Persona) -> Result<String> {
        persona.id = unique_timestamp_id(self.personas.iter().map(|p| p.id.as_str()));
        persona.is_default = false;
        let id = persona.id.clone();
        self.personas.push(persona);
        self.persist_personas()?;
        Ok(id)
    }

    pub fn update_persona(&mut self, id: &str, update: PersonaUpdate) -> Result<()> {
        let persona = self
            .personas
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("persona {}", id)))?;

        if persona.is_default && (update.name.is_some() || update.description.is_some() || update.custom_prompt.is_some()) {
            return Err(Error::InvalidInput("built-in persona text cannot be edited".to_string()));
        }

        if let Some(name) = update.name {
            persona.name = name;
        }
        if let Some(description) = update.description {
            persona.description = description;
        }
        if let Some(style) = update.reply_style {
            persona.reply_style = style;
        }
        if let Some(prompt) = update.custom_prompt {
            persona.custom_prompt = prompt;
        }
        if let Some(settings) = update.diary_settings {
            persona.diary_settings = Some(settings);
        }
        self.persist_personas()
    }

    pub fn delete_persona(&mut self, id: &str) -> Result<()> {
        let persona = self
            .personas
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("persona {}", id)))?;
        if persona.is_default {
            return Err(Error::InvalidInput("built-in persona cannot be deleted".to_string()));
        }

        self.personas.retain(|p| p.id != id);
        if self.current_persona_id == id {
            self.current_persona_id = DEFAULT_PERSONA_ID.to_string();
        }
        self.persist_personas()
    }

    pub fn replace_personas(&mut self, personas: Vec<Persona>) -> Result<()> {
        self.personas = personas;
        self.persist_personas()
    }

    // ---- api configs ----

    pub fn api_configs(&self) -> &[ApiConfig] {
        &self.api_configs
    }

    pub fn current_api_config_id(&self) -> &str {
        &self.current_api_config_id
    }

    pub fn current_api_config(&self) -> ApiConfig {
        self.api_configs
            .iter()
            .find(|c| c.id == self.current_api_config_id)
            .or_else(|| self.api_configs.first())
            .cloned()
            .unwrap_or_else(|| default_api_configs().remove(0))
    }

    pub fn select_api_config(&mut self, id: &str) -> Result<()> {
        if !self.api_configs.iter().any(|c| c.id == id) {
            return Err(Error::NotFound(format!("api config {}", id)));
        }
        self.current_api_config_id = id.to_string();
        self.persist_api_configs()
    }

    pub fn add_api_config(&mut self, mut config: ApiConfig) -> Result<String> {
        config.id = unique_timestamp_id(self.api_configs.iter().map(|c| c.id.as_str()));
        config.is_default = false;
        let id = config.id.clone();
        self.api_configs.push(config);
        self.persist_api_configs()?;
        Ok(id)
    }

    pub fn update_api_config(&mut self, id: &str, update: ApiConfigUpdate) -> Result<()> {
        let config = self
            .api_configs
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("api config {}", id)))?;

        if let Some(name) = update.name {
            config.name = name;
        }
        if let Some(provider) = update.provider {
            config.provider = Some(provider);
            config.config_type = if provider == ProviderKind::Custom { ConfigType::Custom } else { ConfigType::Official };
            if let Some(url) = provider.preset_base_url() {
                config.base_url = url.to_string();
            }
        }
        if let Some(key) = update.api_key {
            config.api_key = key;
        }
        if let Some(url) = update.base_url {
            config.base_url = url;
        }
        if let Some(model) = update.model {
            config.model = Some(model);
        }
        self.persist_api_configs()
    }

    pub fn delete_api_config(&mut self, id: &str) -> Result<()> {
        let config = self
            .api_configs
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(format!("api config {}", id)))?;
        if config.is_default {
            return Err(Error::InvalidInput("built-in api config cannot be deleted".to_string()));
        }

        self.api_configs.retain(|c| c.id != id);
        if self.current_api_config_id == id {
            self.current_api_config_id = DEFAULT_API_CONFIG_ID.to_string();
        }
        self.persist_api_configs()
    }

    pub fn replace_api_configs(&mut self, configs: Vec<ApiConfig>) -> Result<()> {
        self.api_configs = configs;
        self.persist_api_configs()
    }

    /// Set selections verbatim, as a restored backup does
    pub fn restore_selection(&mut self, persona_id: Option<String>, api_config_id: Option<String>) -> Result<()> {
        if let Some(id) = persona_id {
            self.current_persona_id = id;
            self.store.set(store::CURRENT_PERSONA_KEY, &self.current_persona_id)?;
        }
        if let Some(id) = api_config_id {
            self.current_api_config_id = id;
            self.store.set(store::CURRENT_API_CONFIG_KEY, &self.current_api_config_id)?;
        }
        Ok(())
    }
}

/// Selections are stored as bare strings, not JSON
fn read_selection(store: &dyn KeyValueStore, key: &str, fallback: &str) -> String {
    match store.get(key) {
        Ok(Some(id)) if !id.is_empty() => id,
        _ => fallback.to_string(),
    }
}

fn unique_timestamp_id<'a>(existing: impl Iterator<Item = &'a str>) -> String {
    let taken: HashSet<&str> = existing.collect();
    let mut candidate = Utc::now().timestamp_millis();
    while taken.contains(candidate.to_string().as_str()) {
        candidate += 1;
    }
    candidate.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_defaults_on_empty_store() {
        let service = PersonaService::load(Arc::new(MemoryStore::new()));
        assert_eq!(service.current_persona().id, DEFAULT_PERSONA_ID);
        assert_eq!(service.current_api_config().id, DEFAULT_API_CONFIG_ID);
        assert_eq!(service.current_api_config().model(), DEFAULT_MODEL);
        assert_eq!(service.current_api_config().provider_kind(), ProviderKind::OpenAi);
    }

    #[test]
    fn test_obsolete_defaults_are_pruned() {
        let kv = Arc::new(MemoryStore::new());
        let mut coach = Persona::new("Coach", "old built-in");
        coach.id = "coach".to_string();
        coach.is_default = true;
        let mut mine = Persona::new("Mine", "custom");
        mine.id = "42".to_string();
        store::write_json(kv.as_ref(), store::PERSONAS_KEY, &vec![coach, mine]).unwrap();
        kv.set(store::CURRENT_PERSONA_KEY, "coach").unwrap();

        let service = PersonaService::load(kv.clone());
        let ids: Vec<&str> = service.personas().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["42"]);
        assert_eq!(service.current_persona_id(), DEFAULT_PERSONA_ID);
        // Falls back to the first persona since "default" is not in the list
        assert_eq!(service.current_persona().id, "42");
    }

    #[test]
    fn test_pruning_everything_restores_builtins() {
        let kv = Arc::new(MemoryStore::new());
        let mut coach = Persona::new("Coach", "old built-in");
        coach.id = "coach".to_string();
        coach.is_default = true;
        store::write_json(kv.as_ref(), store::PERSONAS_KEY, &vec![coach]).unwrap();

        let service = PersonaService::load(kv);
        assert_eq!(service.personas(), default_personas().as_slice());
    }

    #[test]
    fn test_persona_lifecycle() {
        let mut service = PersonaService::load(Arc::new(MemoryStore::new()));
        let first = service.add_persona(Persona::new("Cat", "aloof")).unwrap();
        let second = service.add_persona(Persona::new("Dog", "loyal")).unwrap();
        assert_ne!(first, second);

        service.select_persona(&second).unwrap();
        assert_eq!(service.current_persona().name, "Dog");

        service
            .update_persona(&second, PersonaUpdate { reply_style: Some(ReplyStyle::Humorous), ..Default::default() })
            .unwrap();
        assert_eq!(service.current_persona().reply_style, ReplyStyle::Humorous);

        service.delete_persona(&second).unwrap();
        assert_eq!(service.current_persona_id(), DEFAULT_PERSONA_ID);
        assert!(matches!(service.delete_persona(DEFAULT_PERSONA_ID), Err(Error::InvalidInput(_))));
        assert!(matches!(
            service.update_persona(DEFAULT_PERSONA_ID, PersonaUpdate { name: Some("x".into()), ..Default::default() }),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_api_config_lifecycle() {
        let kv = Arc::new(MemoryStore::new());
        let mut service = PersonaService::load(kv.clone());
        let gemini = ApiConfig::for_provider("Gemini", ProviderKind::Google, "g-key", None);
        let id = service.add_api_config(gemini).unwrap();
        service.select_api_config(&id).unwrap();

        let reloaded = PersonaService::load(kv);
        let current = reloaded.current_api_config();
        assert!(current.is_google());
        assert_eq!(current.base_url, "https://generativelanguage.googleapis.com");

        service.update_api_config(DEFAULT_API_CONFIG_ID, ApiConfigUpdate { api_key: Some("sk-1".into()), ..Default::default() }).unwrap();
        assert_eq!(service.api_configs()[0].api_key, "sk-1");

        service.delete_api_config(&id).unwrap();
        assert_eq!(service.current_api_config_id(), DEFAULT_API_CONFIG_ID);
        assert!(service.delete_api_config(DEFAULT_API_CONFIG_ID).is_err());
    }

    #[test]
    fn test_legacy_config_without_provider() {
        let raw = r#"[{"id":"x","name":"Proxy","type":"custom","apiKey":"k","baseUrl":"https://proxy.example/v1"}]"#;
        let configs: Vec<ApiConfig> = serde_json::from_str(raw).unwrap();
        assert_eq!(configs[0].provider_kind(), ProviderKind::Custom);
        assert!(!configs[0].is_google());
        assert_eq!(configs[0].model(), DEFAULT_MODEL);
    }
}
