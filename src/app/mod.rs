mod format;


use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::{Cli, Command};
use crate::config::{Config, VodConfig};
use crate::danmaku::comment::{self, CommentMode, CommentOptions};
use crate::db::{Database, UpgradeOutcome};
use crate::logging;
use crate::paths::database_file_path;
use crate::schema::episode::CanonicalEpisode;
use crate::schema::options::{self, ExtensionOptions, OPTIONS_KEY};
use crate::schema::policy;
use crate::schema::provider::check_episode_in_season;
use crate::schema::season::CanonicalSeason;
use crate::schema::{self, Entity, EntityKind};
use crate::vod;

use self::format::{format_last_checked, format_offset, format_updated_display, truncate};

pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    logging::init(config.log_level.as_deref());
    let db_override = cli.db.as_deref();

    match cli.command {
        Command::Import { kind, file } => {
            let db = open_db(db_override, &config)?;
            let raw = read_file(&file)?;
            let report = if kind == EntityKind::Policy && !raw.trim_start().starts_with('[') {
                import_policy(&db, &raw)?
            } else {
                let input = serde_json::from_str(&raw)
                    .with_context(|| format!("{} is not valid JSON", file.display()))?;
                import_records(&db, kind, input)?
            };
            print_import_report(kind, &report);
        }
        Command::Comments { episode, file } => {
            let mut db = open_db(db_override, &config)?;
            let count = replace_comments(
                &mut db,
                &episode,
                read_json_file(&file)?,
                Utc::now().timestamp_millis(),
            )?;
            println!("Stored {count} comment(s) for {episode}.");
        }
        Command::Show { kind, key } => {
            let db = open_db(db_override, &config)?;
            run_show(&db, kind, &key)?;
        }
        Command::List { kind } => run_list(&open_db(db_override, &config)?, kind)?,
        Command::Remove { kind, key } => {
            let db = open_db(db_override, &config)?;
            if db.remove_record(kind, &key)? {
                println!("Removed {kind} {key}.");
            } else {
                println!("No {kind} record stored under {key}.");
            }
        }
        Command::Migrate => {
            let mut db = open_db(db_override, &config)?;
            let report = migrate_all(&mut db)?;
            print_migration_report(&report);
        }
        Command::Decode { p } => run_decode(&p)?,
        Command::Encode {
            time,
            mode,
            color,
            uid,
        } => println!("{}", encode_p(time, mode, color, uid)?),
        Command::Danmaku { episode } => {
            let db = open_db(db_override, &config)?;
            run_danmaku(&db, &episode)?;
        }
        Command::SetOptions { file } => {
            let mut db = open_db(db_override, &config)?;
            let options = update_options(&mut db, &read_json_file(&file)?)?;
            println!("{}", serde_json::to_string_pretty(&options)?);
        }
        Command::Check { episode, season } => {
            let db = open_db(db_override, &config)?;
            check_membership(&db, &episode, &season)?;
            println!("Episode {episode} belongs to season {season}.");
        }
        Command::Vod { query } => run_vod(&config.vod, &query)?,
    }

    Ok(())
}

#[derive(Debug, Default)]
pub(crate) struct ImportReport {
    pub(crate) stored: Vec<String>,
    pub(crate) failed: Vec<(usize, String)>,
}

pub(crate) fn import_records(db: &Database, kind: EntityKind, input: Value) -> Result<ImportReport> {
    if kind == EntityKind::Comments {
        bail!(
            "comment lists are stored inside their episode; use `danmaku-store comments <episode-key> <file>`"
        );
    }
    let values = match input {
        Value::Array(values) => values,
        single => vec![single],
    };

    let mut report = ImportReport::default();
    for (index, result) in schema::load_batch(kind, values).into_iter().enumerate() {
        match result {
            Ok(entity) => report.stored.push(db.store_entity(&entity)?),
            Err(err) => {
                warn!(%kind, index, error = %err, "skipping record");
                report.failed.push((index, err.to_string()));
            }
        }
    }
    info!(%kind, stored = report.stored.len(), failed = report.failed.len(), "import finished");
    Ok(report)
}

pub(crate) fn import_policy(db: &Database, raw: &str) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    match policy::deserialize(raw) {
        Ok(entry) => report.stored.push(db.store_entity(&Entity::Policy(entry))?),
        Err(err) => report.failed.push((0, err.to_string())),
    }
    Ok(report)
}

pub(crate) fn replace_comments(
    db: &mut Database,
    episode_key: &str,
    input: Value,
    checked_at: i64,
) -> Result<usize> {
    let comments = match schema::load(EntityKind::Comments, input)
        .context("comment file cannot be loaded")?
    {
        Entity::Comments(comments) => comments,
        other => bail!("expected comments, loaded {}", other.kind()),
    };
    let count = comments.len();

    let updated = db.update_entity(EntityKind::Episode, episode_key, |entity| match entity {
        Entity::Episode(mut episode) => {
            episode.replace_comments(comments, checked_at);
            Ok(Entity::Episode(episode))
        }
        other => bail!("expected an episode, loaded {}", other.kind()),
    })?;
    if updated.is_none() {
        bail!("no episode stored under {episode_key:?}");
    }
    Ok(count)
}

#[derive(Debug, Default)]
pub(crate) struct MigrationReport {
    pub(crate) upgraded: usize,
    pub(crate) current: usize,
    pub(crate) failed: Vec<(String, String, String)>,
}

pub(crate) fn migrate_all(db: &mut Database) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();
    for summary in db.list_records(None)? {
        let kind = match summary.kind.parse::<EntityKind>() {
            Ok(kind) => kind,
            Err(err) => {
                report.failed.push((summary.kind, summary.key, err));
                continue;
            }
        };
        match db.upgrade_record(kind, &summary.key)? {
            UpgradeOutcome::Upgraded { .. } => report.upgraded += 1,
            UpgradeOutcome::Current | UpgradeOutcome::Missing => report.current += 1,
            UpgradeOutcome::Failed(err) => {
                warn!(%kind, key = summary.key.as_str(), error = %err, "record left at its stored version");
                report.failed.push((summary.kind, summary.key, err.to_string()));
            }
        }
    }
    Ok(report)
}

pub(crate) fn load_options(db: &Database) -> Result<ExtensionOptions> {
    match db.load_entity(EntityKind::Options, OPTIONS_KEY)? {
        Some(Entity::Options(options)) => Ok(options),
        Some(other) => bail!("expected options, loaded {}", other.kind()),
        None => {
            let options = ExtensionOptions::default();
            db.store_entity(&Entity::Options(options.clone()))?;
            Ok(options)
        }
    }
}

pub(crate) fn update_options(db: &mut Database, patch: &Value) -> Result<ExtensionOptions> {
    load_options(db)?;
    let updated = db.update_entity(EntityKind::Options, OPTIONS_KEY, |entity| match entity {
        Entity::Options(current) => Ok(Entity::Options(options::apply_patch(&current, patch)?)),
        other => bail!("expected options, loaded {}", other.kind()),
    })?;
    match updated {
        Some(Entity::Options(options)) => Ok(options),
        _ => bail!("options disappeared while being updated"),
    }
}

pub(crate) fn check_membership(db: &Database, episode_key: &str, season_key: &str) -> Result<()> {
    let episode = load_episode(db, episode_key)?;
    let season = load_season(db, season_key)?;
    check_episode_in_season(&episode.ids, &season.ids).with_context(|| {
        format!("episode {episode_key} does not belong to season {season_key}")
    })
}

pub(crate) fn encode_p(
    time: f64,
    mode: CommentMode,
    color: String,
    uid: Option<String>,
) -> Result<String> {
    let options = CommentOptions {
        time,
        mode,
        color,
        uid,
    };
    Ok(comment::encode(&options)?)
}

fn run_show(db: &Database, kind: EntityKind, key: &str) -> Result<()> {
    let entity = if kind == EntityKind::Options && key == OPTIONS_KEY {
        Entity::Options(load_options(db)?)
    } else {
        match db.load_entity(kind, key)? {
            Some(entity) => entity,
            None => {
                println!("No {kind} record stored under {key}.");
                return Ok(());
            }
        }
    };
    match entity {
        Entity::Policy(entry) => println!("{}", policy::serialize(&entry)?),
        other => println!("{}", serde_json::to_string_pretty(&other.to_record()?)?),
    }
    Ok(())
}

fn run_list(db: &Database, kind: Option<EntityKind>) -> Result<()> {
    let items = db.list_records(kind)?;
    if items.is_empty() {
        println!("No stored records yet. Run `danmaku-store import` first.");
        return Ok(());
    }

    println!("{:<10} {:<40} {:<8} {:<28}", "KIND", "KEY", "VERSION", "UPDATED");
    for item in items {
        println!(
            "{:<10} {:<40} {:<8} {:<28}",
            item.kind,
            truncate(&item.key, 40),
            item.version,
            format_updated_display(&item.updated_at)
        );
    }
    Ok(())
}

fn run_decode(p: &str) -> Result<()> {
    let options = comment::decode(p).with_context(|| format!("cannot decode {p:?}"))?;
    println!("{}", serde_json::to_string_pretty(&options)?);
    Ok(())
}

fn run_danmaku(db: &Database, episode_key: &str) -> Result<()> {
    let episode = load_episode(db, episode_key)?;
    let batch = episode.decode_comments();
    for (index, err) in &batch.rejected {
        warn!(episode = episode_key, index, error = %err, "skipping comment");
    }

    println!(
        "{} ({} comment(s), last checked {})",
        episode.title,
        episode.comment_count,
        format_last_checked(episode.last_checked)
    );
    println!("{:<10} {:<7} {:<8} {}", "TIME", "MODE", "COLOR", "TEXT");
    for decoded in batch.comments {
        println!(
            "{:<10} {:<7} {:<8} {}",
            format_offset(decoded.options.time),
            decoded.options.mode.as_str(),
            decoded.options.color,
            truncate(&decoded.text, 60)
        );
    }
    if !batch.rejected.is_empty() {
        println!("Skipped {} comment(s) with a malformed p field.", batch.rejected.len());
    }
    Ok(())
}

fn run_vod(config: &VodConfig, query: &str) -> Result<()> {
    let items = vod::search(config, query)?;
    if items.is_empty() {
        println!("No results for {query:?}.");
        return Ok(());
    }
    for item in items {
        println!("{} [{}]", item.name, item.id);
        for url in item.play_urls() {
            println!(
                "  {:<12} {:<24} {}",
                truncate(&url.source, 12),
                truncate(&url.original_title, 24),
                url.url
            );
        }
    }
    Ok(())
}

fn load_episode(db: &Database, key: &str) -> Result<CanonicalEpisode> {
    match db.load_entity(EntityKind::Episode, key)? {
        Some(Entity::Episode(episode)) => Ok(episode),
        Some(other) => bail!("expected an episode, loaded {}", other.kind()),
        None => bail!("no episode stored under {key:?}"),
    }
}

fn load_season(db: &Database, key: &str) -> Result<CanonicalSeason> {
    match db.load_entity(EntityKind::Season, key)? {
        Some(Entity::Season(season)) => Ok(season),
        Some(other) => bail!("expected a season, loaded {}", other.kind()),
        None => bail!("no season stored under {key:?}"),
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_json_file(path: &Path) -> Result<Value> {
    let raw = read_file(path)?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn open_db(db_override: Option<&Path>, config: &Config) -> Result<Database> {
    let db_path = match db_override.or(config.database_path.as_deref()) {
        Some(path) => path.to_path_buf(),
        None => database_file_path()?,
    };
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}

fn print_import_report(kind: EntityKind, report: &ImportReport) {
    println!("Imported {} {kind} record(s).", report.stored.len());
    for key in &report.stored {
        println!("  stored  {key}");
    }
    for (index, err) in &report.failed {
        println!("  failed  #{index}: {err}");
    }
}

fn print_migration_report(report: &MigrationReport) {
    println!(
        "Upgraded: {}  Current: {}  Failed: {}",
        report.upgraded,
        report.current,
        report.failed.len()
    );
    for (kind, key, err) in &report.failed {
        println!("  {kind} {key}: {err}");
    }
}
