// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use std::path::{Path, PathBuf};

use archivum_index::EntityType;
use archivum_model::{
    layout, ErrorKind, ModelError, PreservationRecord, Representation, RepresentationManifest,
};
use archivum_storage::{InMemoryBackend, StorageBackend, StoragePath};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::context::RepositoryContext;
use crate::error::PluginError;
use crate::parameter::{ParameterValues, PluginParameter, PluginParameterType, ResolvedParameters};
use crate::plugin::{Plugin, PluginType};
use crate::tool::ToolCommand;

pub const COMMAND: &str = "command";
pub const ARGUMENTS: &str = "arguments";
pub const OUTPUT_ARGUMENTS: &str = "output_arguments";
pub const OUTPUT_FORMAT: &str = "output_format";

const DEFAULT_COMMAND: &str = "convert {arguments} {input_file} {output_arguments} {output_file}";

/// Runs an external converter over every file of an AIP's original
/// representations. Each converted representation is ingested as a new,
/// non-original representation `{source}-{format}` and a conversion event
/// is recorded against it.
#[derive(Debug, Clone, Default)]
pub struct ConversionPlugin {
    parameters: ResolvedParameters,
}

impl ConversionPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn param(&self, name: &str) -> &str {
        self.parameters.get(name).unwrap_or_default()
    }

    fn output_format(&self) -> &str {
        self.param(OUTPUT_FORMAT)
    }

    fn command(&self) -> ToolCommand {
        ToolCommand::new(self.parameters.get(COMMAND).unwrap_or(DEFAULT_COMMAND))
    }

    /// Convert one representation into `staging`, returning the converted
    /// file ids.
    async fn convert_representation(
        &self,
        ctx: &RepositoryContext,
        representation: &Representation,
        workdir: &Path,
        staging: &InMemoryBackend,
        staging_root: &StoragePath,
    ) -> Result<Vec<String>, PluginError> {
        let manifest = RepresentationManifest {
            representation_type: representation.representation_type.clone(),
            original: false,
        };
        let manifest_path = staging_root
            .child("representation.json")
            .map_err(ModelError::from)?;
        let manifest_bytes = serde_json::to_vec(&manifest)
            .map_err(|e| PluginError::failed(ErrorKind::ValidationFailed, e.to_string()))?;
        staging.put(&manifest_path, &manifest_bytes).await?;

        let command = self.command();
        let data_root = layout::representation_data(&representation.aip_id, &representation.id)
            .map_err(ModelError::from)?;
        let mut converted = Vec::with_capacity(representation.files.len());
        for (n, file) in representation.files.iter().enumerate() {
            let segments = file.storage_path.strip_prefix(&data_root).ok_or_else(|| {
                PluginError::failed(
                    ErrorKind::ValidationFailed,
                    format!("file {} is not below {data_root}", file.storage_path),
                )
            })?;
            let target = converted_segments(segments, self.output_format());
            let content = ctx.model.retrieve_file_content(file).await?;
            let input = workdir.join(format!("{n}-in-{}", local_name(segments)));
            let output = workdir.join(format!("{n}-out-{}", local_name(&target)));
            tokio::fs::write(&input, &content).await?;

            let argv = command.render(
                &input,
                &output,
                self.param(ARGUMENTS),
                self.param(OUTPUT_ARGUMENTS),
            )?;
            let result = ctx.tools.run(&argv).await?;
            if !result.success {
                return Err(PluginError::Tool(format!(
                    "{} exited with {:?} converting {}: {}",
                    argv[0],
                    result.exit_code,
                    file.id,
                    result.stderr.trim()
                )));
            }
            let bytes = tokio::fs::read(&output).await.map_err(|e| {
                PluginError::Tool(format!("{} produced no output for {}: {e}", argv[0], file.id))
            })?;

            let file_id = target.join("/");
            let data_path = staging_root
                .child("data")
                .and_then(|data| data.join(target))
                .map_err(ModelError::from)?;
            staging.put(&data_path, &bytes).await?;
            debug!(file = %file.id, converted = %file_id, bytes = bytes.len(), "Converted file");
            converted.push(file_id);
        }
        Ok(converted)
    }
}

#[derive(Debug, Serialize)]
struct ConversionEvent<'a> {
    event_type: &'static str,
    datetime: String,
    source_representation: &'a str,
    output_format: &'a str,
    files: &'a [String],
}

#[async_trait]
impl Plugin for ConversionPlugin {
    fn id(&self) -> &str {
        "format-conversion"
    }

    fn name(&self) -> &str {
        "Format conversion"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "Converts original representations with an external tool"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::AipToAip
    }

    fn object_types(&self) -> Vec<EntityType> {
        vec![EntityType::Aip]
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        vec![
            PluginParameter::new(COMMAND, PluginParameterType::String, "Tool command template")
                .with_default(DEFAULT_COMMAND),
            PluginParameter::new(ARGUMENTS, PluginParameterType::String, "Arguments before the input file")
                .with_default(""),
            PluginParameter::new(
                OUTPUT_ARGUMENTS,
                PluginParameterType::String,
                "Arguments before the output file",
            )
            .with_default(""),
            PluginParameter::new(OUTPUT_FORMAT, PluginParameterType::String, "Output file extension")
                .with_default("png")
                .mandatory(),
        ]
    }

    fn set_parameter_values(&mut self, values: &ParameterValues) -> Result<(), PluginError> {
        let parameters = ResolvedParameters::resolve(&self.parameters(), values)?;
        let format = parameters.get(OUTPUT_FORMAT).unwrap_or_default();
        if format.is_empty() || format.contains(['/', '.']) || format.contains(char::is_whitespace) {
            return Err(PluginError::InvalidParameter(format!(
                "'{format}' is not a valid output format"
            )));
        }
        self.parameters = parameters;
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &RepositoryContext,
        _target: EntityType,
        object_id: &str,
    ) -> Result<(), PluginError> {
        let originals: Vec<Representation> = ctx
            .model
            .list_representations(object_id)
            .await?
            .into_iter()
            .filter(|rep| rep.original && !rep.files.is_empty())
            .collect();
        if originals.is_empty() {
            return Err(PluginError::failed(
                ErrorKind::NotFound,
                format!("{object_id} has no original representation with files"),
            ));
        }

        for representation in &originals {
            let workdir = tempfile::tempdir()?;
            let staging = InMemoryBackend::new();
            let staging_root = StoragePath::container_path("staging").map_err(ModelError::from)?;
            let files = self
                .convert_representation(ctx, representation, workdir.path(), &staging, &staging_root)
                .await?;

            let new_id = format!("{}-{}", representation.id, self.output_format());
            ctx.model
                .create_representation(object_id, &new_id, &staging, &staging_root)
                .await?;

            let event = ConversionEvent {
                event_type: "format conversion",
                datetime: Utc::now().to_rfc3339(),
                source_representation: &representation.id,
                output_format: self.output_format(),
                files: &files,
            };
            let content = serde_json::to_vec_pretty(&event)
                .map_err(|e| PluginError::failed(ErrorKind::ValidationFailed, e.to_string()))?;
            let record = PreservationRecord::event(
                format!("conversion-{}", uuid::Uuid::new_v4()),
                object_id,
            )
            .for_representation(new_id.as_str());
            ctx.model.record_preservation_metadata(record, &content).await?;
            info!(aip = %object_id, from = %representation.id, to = %new_id, files = files.len(), "Converted representation");
        }
        Ok(())
    }
}

/// A flat scratch file name for the last segment.
fn local_name(segments: &[String]) -> String {
    segments
        .last()
        .map(|name| name.replace(['/', '\\'], "_"))
        .unwrap_or_default()
}

fn with_extension(name: &str, format: &str) -> String {
    let mut path = PathBuf::from(name);
    path.set_extension(format);
    path.to_string_lossy().into_owned()
}

/// `[sub, scan.tif]` -> `[sub, scan.png]`. Only the last segment changes.
fn converted_segments(segments: &[String], format: &str) -> Vec<String> {
    let mut converted = segments.to_vec();
    if let Some(name) = converted.last_mut() {
        *name = with_extension(name, format);
    }
    converted
}
