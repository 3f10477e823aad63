use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::diary::{DiaryEntry, DiaryService};
use crate::error::{Error, Result};
use crate::logging;
use crate::persona::{ApiConfig, Persona, PersonaService};

pub const BACKUP_VERSION: &str = "1.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSettings {
    #[serde(default)]
    pub current_persona_id: Option<String>,
    #[serde(default)]
    pub current_api_config_id: Option<String>,
}

/// Everything worth keeping, in one JSON document. Sections missing from an
/// imported file leave the current data alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    #[serde(default)]
    pub diaries: Option<Vec<DiaryEntry>>,
    #[serde(default)]
    pub personas: Option<Vec<Persona>>,
    #[serde(default)]
    pub api_configs: Option<Vec<ApiConfig>>,
    #[serde(default)]
    pub settings: Option<BackupSettings>,
    #[serde(default)]
    pub export_date: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// What an import replaced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub diaries: Option<usize>,
    pub personas: Option<usize>,
    pub api_configs: Option<usize>,
}

/// `chatdairy-backup-2024-05-03.json`
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("chatdairy-backup-{}.json", date.format("%Y-%m-%d"))
}

pub fn export_backup(diaries: &DiaryService, personas: &PersonaService) -> Result<String> {
    let backup = Backup {
        diaries: Some(diaries.all().to_vec()),
        personas: Some(personas.personas().to_vec()),
        api_configs: Some(personas.api_configs().to_vec()),
        settings: Some(BackupSettings {
            current_persona_id: Some(personas.current_persona_id().to_string()),
            current_api_config_id: Some(personas.current_api_config_id().to_string()),
        }),
        export_date: Some(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        version: Some(BACKUP_VERSION.to_string()),
    };
    Ok(serde_json::to_string_pretty(&backup)?)
}

/// Restore a backup. The whole file is parsed before anything is written.
pub fn import_backup(raw: &str, diaries: &mut DiaryService, personas: &mut PersonaService) -> Result<ImportSummary> {
    let backup: Backup = serde_json::from_str(raw)
        .map_err(|e| Error::InvalidInput(format!("Failed to import data. Invalid file format: {}", e)))?;

    let mut summary = ImportSummary::default();

    if let Some(entries) = backup.diaries {
        summary.diaries = Some(entries.len());
        diaries.replace_all(entries)?;
    }
    if let Some(list) = backup.personas {
        summary.personas = Some(list.len());
        personas.replace_personas(list)?;
    }
    if let Some(configs) = backup.api_configs {
        summary.api_configs = Some(configs.len());
        personas.replace_api_configs(configs)?;
    }
    if let Some(settings) = backup.settings {
        let persona_id = settings.current_persona_id.filter(|id| !id.is_empty());
        let config_id = settings.current_api_config_id.filter(|id| !id.is_empty());
        personas.restore_selection(persona_id, config_id)?;
    }

    logging::log_storage(
        None,
        &format!(
            "Imported backup (version {}): {:?}",
            backup.version.as_deref().unwrap_or("unknown"),
            summary
        ),
    );
    Ok(summary)
}
