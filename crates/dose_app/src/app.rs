use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use dose_core::{
    display::{describe_next_dose, describe_recurrence},
    entity::ScheduledEntity,
    notifications::DEFAULT_LOOKAHEAD,
    wire::entities_from_json,
    ReminderService,
};
use tracing::{debug, info, warn};

use crate::catalog::EnglishCatalog;
use crate::center::LoggingNotificationCenter;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) schedule_files: Vec<PathBuf>,
    pub(crate) lookahead: usize,
    pub(crate) json_output: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Unparseable values
    /// are ignored and the defaults kept.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(file) = var("DOSE_SCHEDULE_FILE") {
            config.push_file(PathBuf::from(file));
        }
        if let Some(list) = var("DOSE_SCHEDULE_FILES") {
            for path in std::env::split_paths(&list) {
                config.push_file(path);
            }
        }
        if let Some(lookahead) = var("DOSE_LOOKAHEAD_OCCURRENCES") {
            if let Ok(value) = lookahead.trim().parse::<usize>() {
                if value > 0 {
                    config.lookahead = value;
                }
            }
        }
        if let Some(output) = var("DOSE_OUTPUT") {
            config.json_output = output.trim().eq_ignore_ascii_case("json");
        }
        Ok(config)
    }

    pub fn with_schedule_file(mut self, path: impl AsRef<Path>) -> Self {
        self.push_file(path.as_ref().to_path_buf());
        self
    }

    pub fn schedule_files(&self) -> &[PathBuf] {
        &self.schedule_files
    }

    pub fn lookahead(&self) -> usize {
        self.lookahead
    }

    pub(crate) fn push_file(&mut self, path: PathBuf) {
        if path.is_dir() {
            self.collect_directory(&path);
            return;
        }
        if !self.schedule_files.contains(&path) {
            info!(path = %path.display(), "registering schedule file");
            self.schedule_files.push(path);
        }
    }

    fn collect_directory(&mut self, dir: &Path) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            warn!(path = %dir.display(), "unable to read schedule directory");
            return;
        };
        let mut found: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_json_file(path))
            .collect();
        found.sort();
        for path in found {
            debug!(path = %path.display(), "discovered schedule file");
            self.push_file(path);
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schedule_files: Vec::new(),
            lookahead: DEFAULT_LOOKAHEAD,
            json_output: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub loaded: usize,
    pub rejected: usize,
    pub triggers: usize,
    pub lines: Vec<String>,
}

/// Load every configured schedule file, plan reminders, and print a summary.
pub async fn run(config: AppConfig) -> Result<RunReport> {
    let center = Arc::new(LoggingNotificationCenter::new());
    let service = ReminderService::builder()
        .with_notification_center(center.clone())
        .with_lookahead(config.lookahead)
        .build()?;

    let mut report = RunReport::default();
    for file in &config.schedule_files {
        let raw = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let entities = entities_from_json(&raw)
            .with_context(|| format!("failed to parse {}", file.display()))?;
        for wire in entities {
            let accepted = match ScheduledEntity::try_from(&wire) {
                Ok(entity) => service.upsert(entity).await.map(|_| ()),
                Err(err) => Err(err.into()),
            };
            match accepted {
                Ok(()) => report.loaded += 1,
                Err(err) => {
                    warn!(entity_id = %wire.id, error = %format!("{err:#}"), "skipping entity");
                    report.rejected += 1;
                }
            }
        }
    }

    let now = service.now();
    for entity in service.entities() {
        let next = describe_next_dose(&entity.schedule, now, &EnglishCatalog);
        report.lines.push(format!(
            "{}: {} | {}",
            entity.name,
            describe_recurrence(&entity.schedule, &EnglishCatalog),
            next.text
        ));
    }
    report.triggers = center.scheduled().len();

    if config.json_output {
        println!("{}", serde_json::to_string_pretty(&service.snapshot())?);
    } else {
        for line in &report.lines {
            println!("{line}");
        }
    }
    info!(
        loaded = report.loaded,
        rejected = report.rejected,
        triggers = report.triggers,
        "planned reminders"
    );
    Ok(report)
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
