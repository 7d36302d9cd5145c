//! Command handlers behind the `api-integrator` binary.
//!
//! Handlers write their human-readable (or `--json`) output to `out` so they
//! can be driven from tests as well as from `main`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Args, Subcommand};

use api_integrator::{
    FieldRef, Language, MappingKey, ReceiveMethod, Source, SourceDraft, SourceId, SourceKind,
    SourcePatch, UpdateMethod, Workspace,
};

use crate::probe::{ConnectionProber, ReportStatus};

/// Source attributes settable from the command line.
///
/// JSON-valued options accept inline text or `@path` to read a file.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Display name.
    #[arg(long)]
    pub name: Option<String>,

    /// Source type (only API is supported).
    #[arg(long = "type")]
    pub kind: Option<SourceKind>,

    /// URL data is fetched from.
    #[arg(long)]
    pub receive_endpoint: Option<String>,

    /// GET or POST.
    #[arg(long)]
    pub receive_method: Option<ReceiveMethod>,

    /// JSON body sent with POST receives.
    #[arg(long)]
    pub receive_payload: Option<String>,

    /// JSON object of headers for the receive call.
    #[arg(long)]
    pub receive_headers: Option<String>,

    /// Example JSON response; its fields become mapping sources.
    #[arg(long)]
    pub response_example: Option<String>,

    /// URL data is sent to.
    #[arg(long)]
    pub update_endpoint: Option<String>,

    /// POST, PUT or PATCH.
    #[arg(long)]
    pub update_method: Option<UpdateMethod>,

    /// JSON object of headers for the update call.
    #[arg(long)]
    pub update_headers: Option<String>,

    /// Example JSON payload; its fields become mapping targets.
    #[arg(long)]
    pub update_payload: Option<String>,
}

impl SourceArgs {
    pub fn into_patch(self) -> anyhow::Result<SourcePatch> {
        Ok(SourcePatch {
            name: self.name,
            kind: self.kind,
            receive_endpoint: self.receive_endpoint,
            receive_method: self.receive_method,
            receive_payload: read_text_arg(self.receive_payload)?,
            receive_headers: read_text_arg(self.receive_headers)?,
            receive_response_example: read_text_arg(self.response_example)?,
            update_endpoint: self.update_endpoint,
            update_method: self.update_method,
            update_headers: read_text_arg(self.update_headers)?,
            update_payload: read_text_arg(self.update_payload)?,
        })
    }
}

/// Resolve `@path` arguments to the file's contents.
fn read_text_arg(value: Option<String>) -> anyhow::Result<Option<String>> {
    match value {
        Some(v) => match v.strip_prefix('@') {
            Some(path) => std::fs::read_to_string(path)
                .map(Some)
                .with_context(|| format!("Failed to read {path}")),
            None => Ok(Some(v)),
        },
        None => Ok(None),
    }
}

#[derive(Subcommand, Debug)]
pub enum SourceCommand {
    /// Register a new source.
    Add {
        #[command(flatten)]
        fields: SourceArgs,

        /// Use this id instead of the next free one.
        #[arg(long)]
        id: Option<SourceId>,

        /// Import one source object or an array of them from a JSON file.
        #[arg(long, conflicts_with_all = ["name", "id"])]
        from_file: Option<PathBuf>,
    },

    /// List sources in registration order.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Print one source as JSON.
    Show { id: SourceId },

    /// Change fields of a source; unspecified fields are kept.
    Update {
        id: SourceId,

        #[command(flatten)]
        fields: SourceArgs,
    },

    /// Delete a source and every mapping that touches it.
    Remove { id: SourceId },

    /// Delete all sources and mappings.
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum MapCommand {
    /// Connect a response field of one source to an update field of another.
    Add {
        source_id: SourceId,
        source_field: String,
        target_id: SourceId,
        target_field: String,
    },

    /// Remove one mapping, e.g. `map remove 1->2 user.name fullName`.
    Remove {
        key: MappingKey,
        source_field: String,
        target_field: String,
    },

    /// List connections in display order.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Move a connection to a new position in the display order.
    Move { connection_id: String, index: usize },

    /// Delete every mapping.
    Clear,
}

pub fn run_source(ws: &mut Workspace, command: SourceCommand, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        SourceCommand::Add {
            fields,
            id,
            from_file,
        } => {
            if let Some(path) = from_file {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                for draft in parse_drafts(&text)? {
                    let id = add_draft(ws, draft)?;
                    writeln!(out, "Added source {id}")?;
                }
                return Ok(());
            }
            let patch = fields.into_patch()?;
            let id = add_draft(ws, SourceDraft { id, fields: patch })?;
            writeln!(out, "Added source {id}")?;
        }

        SourceCommand::List { json } => {
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(ws.sources())?)?;
            } else if ws.sources().is_empty() {
                writeln!(out, "No sources yet. Add one with `api-integrator source add --name <NAME>`.")?;
            } else {
                for source in ws.sources() {
                    writeln!(out, "{}", describe(source))?;
                }
            }
        }

        SourceCommand::Show { id } => {
            let source = ws.source(id).ok_or_else(|| anyhow!("Source not found: {id}"))?;
            writeln!(out, "{}", serde_json::to_string_pretty(source)?)?;
        }

        SourceCommand::Update { id, fields } => {
            let patch = fields.into_patch()?;
            if patch.is_empty() {
                bail!("Nothing to update: pass at least one field option");
            }
            ws.update_source(id, patch)?;
            writeln!(out, "Updated source {id}")?;
        }

        SourceCommand::Remove { id } => {
            let buckets = ws.remove_source(id)?;
            writeln!(out, "Removed source {id} ({buckets} mapping group(s) removed)")?;
        }

        SourceCommand::Clear => {
            ws.clear_sources()?;
            writeln!(out, "Cleared all sources and mappings")?;
        }
    }
    Ok(())
}

fn parse_drafts(text: &str) -> anyhow::Result<Vec<SourceDraft>> {
    let value: serde_json::Value = serde_json::from_str(text).context("Source file is not valid JSON")?;
    let drafts = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(drafts)
}

fn add_draft(ws: &mut Workspace, draft: SourceDraft) -> anyhow::Result<SourceId> {
    let mut patch = draft.fields;
    patch.kind.get_or_insert(SourceKind::Api);
    Ok(ws.add_source(draft.id, patch)?)
}

fn describe(source: &Source) -> String {
    let receive = source
        .receive_url()
        .map(|url| format!("{} {url}", source.receive_method))
        .unwrap_or_else(|| "-".to_string());
    let update = source
        .update_url()
        .map(|url| format!("{} {url}", source.update_method))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:>4}  {:<24} receive: {receive}  update: {update}",
        source.id, source.name
    )
}

/// Print the connectable fields of a source.
pub fn show_fields(ws: &Workspace, id: SourceId, update: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let fields = ws.source_fields(id)?;
    let (label, list) = if update {
        ("update payload", fields.update)
    } else {
        ("response", fields.response)
    };
    if list.is_empty() {
        writeln!(out, "No {label} fields (example missing or not a JSON object)")?;
        return Ok(());
    }
    for field in list {
        writeln!(out, "{:<40} {}", field.path, field.field_type)?;
    }
    Ok(())
}

pub fn run_map(ws: &mut Workspace, command: MapCommand, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        MapCommand::Add {
            source_id,
            source_field,
            target_id,
            target_field,
        } => {
            let source = lookup_field(ws, source_id, &source_field, false)?;
            let target = lookup_field(ws, target_id, &target_field, true)?;
            if ws.create_mapping(&source, &target)? {
                writeln!(out, "Mapped {source_id}:{source_field} -> {target_id}:{target_field}")?;
            } else if source_id == target_id {
                bail!("A source cannot be mapped to itself");
            } else {
                writeln!(out, "Mapping already exists")?;
            }
        }

        MapCommand::Remove {
            key,
            source_field,
            target_field,
        } => {
            if !ws.remove_mapping(&key, &source_field, &target_field)? {
                bail!("No mapping {key} {source_field} -> {target_field}");
            }
            writeln!(out, "Removed mapping {key} {source_field} -> {target_field}")?;
        }

        MapCommand::List { json } => {
            let connections = ws.connections()?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&connections)?)?;
            } else if connections.is_empty() {
                writeln!(out, "No mappings yet")?;
            } else {
                for (i, c) in connections.iter().enumerate() {
                    let name = |id| ws.source(id).map(|s| s.name.as_str()).unwrap_or("?");
                    writeln!(
                        out,
                        "{i:>3}  {}.{} -> {}.{}  [{}]",
                        name(c.key.source),
                        c.source_field,
                        name(c.key.target),
                        c.target_field,
                        c.connection_id
                    )?;
                }
            }
        }

        MapCommand::Move {
            connection_id,
            index,
        } => {
            if !ws.move_connection(&connection_id, index)? {
                bail!("Unknown connection: {connection_id}");
            }
            writeln!(out, "Moved {connection_id} to position {index}")?;
        }

        MapCommand::Clear => {
            ws.clear_mappings()?;
            writeln!(out, "Cleared all mappings")?;
        }
    }
    Ok(())
}

/// Resolve a field path against the source's current examples, picking up its type.
fn lookup_field(ws: &Workspace, id: SourceId, path: &str, update: bool) -> anyhow::Result<FieldRef> {
    let fields = ws.source_fields(id)?;
    let (list, label) = if update {
        (fields.update, "update payload")
    } else {
        (fields.response, "response example")
    };
    list.into_iter()
        .find(|f| f.path == path)
        .map(|f| FieldRef::new(id, f.path, f.field_type))
        .ok_or_else(|| anyhow!("Field {path:?} not found in the {label} of source {id}"))
}

/// Print generated code, or write it under `out_dir`.
///
/// Without a language every supported language is produced.
pub fn generate(
    ws: &Workspace,
    language: Option<Language>,
    out_dir: Option<&Path>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match (language, out_dir) {
        (Some(lang), None) => {
            write!(out, "{}", ws.generate(lang)?)?;
        }
        (Some(lang), Some(dir)) => {
            let code = ws.generate(lang)?;
            std::fs::create_dir_all(dir)?;
            let path = dir.join(lang.filename());
            std::fs::write(&path, &code)?;
            writeln!(out, "Wrote {} ({} bytes)", path.display(), code.len())?;
        }
        (None, Some(dir)) => {
            for file in ws.write_all(dir)? {
                writeln!(out, "Wrote {} ({} bytes)", dir.join(&file.filename).display(), file.size)?;
            }
        }
        (None, None) => {
            for file in ws.generate_all()? {
                writeln!(out, "==> {} <==", file.filename)?;
                writeln!(out, "{}", file.content)?;
            }
        }
    }
    Ok(())
}

/// Dry-run every mapping bucket against the stored response examples.
pub fn simulate(ws: &Workspace, json: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let results = ws.simulate()?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&results)?)?;
        return Ok(());
    }
    for result in results {
        writeln!(out, "{} -> {}", result.source_name, result.target_name)?;
        writeln!(out, "  {} {}", result.method, result.url)?;
        writeln!(out, "  {}", result.message)?;
        for line in serde_json::to_string_pretty(&result.payload)?.lines() {
            writeln!(out, "  {line}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Probe every configured endpoint and print a summary.
pub async fn test_connections(
    ws: &Workspace,
    prober: &ConnectionProber,
    json: bool,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if ws.sources().is_empty() {
        bail!("No sources to test. Please add at least one source.");
    }
    let reports = prober.test_all(ws.sources()).await;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&reports)?)?;
        return Ok(());
    }

    let count = |status: ReportStatus| reports.iter().filter(|r| r.status == status).count();
    writeln!(
        out,
        "{} successful, {} failed, {} notices",
        count(ReportStatus::Success),
        count(ReportStatus::Error),
        count(ReportStatus::Info)
    )?;
    for report in &reports {
        let mark = match report.status {
            ReportStatus::Success => "✓",
            ReportStatus::Error => "✗",
            ReportStatus::Info => "i",
        };
        let endpoint = report.endpoint.as_deref().unwrap_or("-");
        writeln!(
            out,
            "{mark} {} [{:?}] {endpoint}: {}",
            report.source, report.kind, report.message
        )?;
    }
    Ok(())
}

/// Workspace summary as JSON.
pub fn info(ws: &Workspace, state_dir: &Path, out: &mut dyn Write) -> anyhow::Result<()> {
    let info = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "state_dir": state_dir.display().to_string(),
        "sources": ws.sources().len(),
        "mapping_groups": ws.graph().bucket_count(),
        "mappings": ws.graph().mapping_count(),
        "languages": Language::all().iter().map(|l| l.as_str()).collect::<Vec<_>>(),
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&info)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_integrator::MemoryStore;

    fn workspace() -> Workspace {
        Workspace::open(MemoryStore::new()).unwrap()
    }

    fn output(f: impl FnOnce(&mut Vec<u8>) -> anyhow::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn add(ws: &mut Workspace, fields: SourceArgs) {
        let cmd = SourceCommand::Add {
            fields,
            id: None,
            from_file: None,
        };
        output(|out| run_source(ws, cmd, out));
    }

    #[test]
    fn test_read_text_arg_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.json");
        std::fs::write(&path, r#"{"a": 1}"#).unwrap();
        let arg = format!("@{}", path.display());
        assert_eq!(read_text_arg(Some(arg)).unwrap().as_deref(), Some(r#"{"a": 1}"#));
        assert_eq!(read_text_arg(Some("{}".into())).unwrap().as_deref(), Some("{}"));
        assert!(read_text_arg(Some("@/definitely/missing".into())).is_err());
    }

    #[test]
    fn test_add_defaults_to_api_type() {
        let mut ws = workspace();
        add(
            &mut ws,
            SourceArgs {
                name: Some("CRM".into()),
                ..Default::default()
            },
        );
        assert_eq!(ws.sources()[0].kind, SourceKind::Api);
    }

    #[test]
    fn test_import_array_of_drafts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.json");
        std::fs::write(
            &path,
            r#"[{"id": 5, "name": "A", "receiveEndpoint": "https://a"}, {"name": "B", "type": "API"}]"#,
        )
        .unwrap();
        let mut ws = workspace();
        let cmd = SourceCommand::Add {
            fields: SourceArgs::default(),
            id: None,
            from_file: Some(path),
        };
        let text = output(|out| run_source(&mut ws, cmd, out));
        assert_eq!(text, "Added source 5\nAdded source 6\n");
    }

    #[test]
    fn test_map_add_uses_extracted_types() {
        let mut ws = workspace();
        add(
            &mut ws,
            SourceArgs {
                name: Some("A".into()),
                response_example: Some(r#"{"user": {"age": 3}}"#.into()),
                ..Default::default()
            },
        );
        add(
            &mut ws,
            SourceArgs {
                name: Some("B".into()),
                update_payload: Some(r#"{"age": 0}"#.into()),
                ..Default::default()
            },
        );

        let cmd = MapCommand::Add {
            source_id: 1,
            source_field: "user.age".into(),
            target_id: 2,
            target_field: "age".into(),
        };
        output(|out| run_map(&mut ws, cmd, out));
        let mapping = ws.graph().mappings().next().unwrap();
        assert_eq!(mapping.source_type, api_integrator::FieldType::Number);

        let mut sink = Vec::new();
        let missing = MapCommand::Add {
            source_id: 1,
            source_field: "user.nope".into(),
            target_id: 2,
            target_field: "age".into(),
        };
        assert!(run_map(&mut ws, missing, &mut sink).is_err());
    }

    #[test]
    fn test_update_requires_a_field() {
        let mut ws = workspace();
        add(
            &mut ws,
            SourceArgs {
                name: Some("A".into()),
                ..Default::default()
            },
        );
        let mut sink = Vec::new();
        let cmd = SourceCommand::Update {
            id: 1,
            fields: SourceArgs::default(),
        };
        assert!(run_source(&mut ws, cmd, &mut sink).is_err());
    }

    #[test]
    fn test_info_reports_counts() {
        let ws = workspace();
        let text = output(|out| info(&ws, Path::new("/tmp/state"), out));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["sources"], 0);
        assert_eq!(value["languages"][2], "go");
    }
}
