//! Tasks: executables plus optional JSON metadata sharing one base name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use pcore_loader::InstantiationRequest;
use pcore_loader::entity::{Task, TaskImplementation, TaskParameter, Value};
use pcore_primitives::{Error, Result};
use serde::Deserialize;
use serde_json::error::Category;
use tracing::debug;

const METADATA_EXTENSION: &str = "json";
const INPUT_METHODS: [&str; 4] = ["stdin", "environment", "both", "powershell"];
const SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TaskMetadata {
    description: Option<String>,
    input_method: Option<String>,
    #[serde(default)]
    parameters: BTreeMap<String, ParameterMetadata>,
    puppet_task_version: Option<u32>,
    #[serde(default)]
    supports_noop: bool,
    implementations: Option<Vec<ImplementationMetadata>>,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    extensions: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    remote: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParameterMetadata {
    #[serde(rename = "type")]
    type_expr: Option<String>,
    description: Option<String>,
    #[serde(default)]
    sensitive: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImplementationMetadata {
    name: String,
    #[serde(default)]
    requirements: Vec<String>,
    input_method: Option<String>,
    #[serde(default)]
    files: Vec<String>,
}

/// Creates a task from the files sharing its base name.
///
/// A `.json` file, when present, holds the metadata; every other file is an
/// executable. With several executables the metadata must list them under
/// `implementations`.
///
/// # Errors
///
/// Returns [`Error::Parse`] tagged with the metadata file when the metadata
/// is not JSON, uses an unrecognized key, or declares an unparsable
/// parameter type. Returns [`Error::Instantiation`] when no executable
/// exists, when several exist without `implementations`, or when an
/// implementation names a missing file.
pub fn task(request: &InstantiationRequest<'_>) -> Result<Value> {
    let name = request.typed_name.name();
    let (metadata_files, executables): (Vec<&PathBuf>, Vec<&PathBuf>) = request
        .candidates
        .iter()
        .partition(|path| path.extension().is_some_and(|ext| ext == METADATA_EXTENSION));
    let metadata_path = metadata_files.first().copied();
    let metadata = match metadata_path {
        Some(path) => read_metadata(request, path)?,
        None => TaskMetadata::default(),
    };

    if executables.is_empty() {
        let directory = request
            .origin
            .parent()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();
        return Err(request.fail(format!(
            "is not a task: No source besides task metadata was found in directory {directory} for task {name}"
        )));
    }
    if let Some(version) = metadata
        .puppet_task_version
        .filter(|version| *version != SUPPORTED_VERSION)
    {
        return Err(request.fail(format!(
            "declares unsupported puppet_task_version {version}"
        )));
    }
    check_input_method(request, metadata.input_method.as_deref())?;

    let implementations = match &metadata.implementations {
        Some(declared) => declared
            .iter()
            .map(|implementation| {
                check_input_method(request, implementation.input_method.as_deref())?;
                let path = executables
                    .iter()
                    .find(|path| path.file_name().is_some_and(|file| file == implementation.name.as_str()))
                    .ok_or_else(|| {
                        request.fail(format!(
                            "lists implementation '{}' for task {name}, but no such file exists",
                            implementation.name
                        ))
                    })?;
                Ok(TaskImplementation {
                    path: (*path).clone(),
                    requirements: implementation.requirements.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => match executables.as_slice() {
            [executable] => vec![TaskImplementation {
                path: (*executable).clone(),
                requirements: Vec::new(),
            }],
            _ => {
                let names: Vec<String> = executables
                    .iter()
                    .filter_map(|path| path.file_name())
                    .map(|file| file.to_string_lossy().into_owned())
                    .collect();
                return Err(request.fail(format!(
                    "has multiple executables for task {name} but no 'implementations' in its metadata: {}",
                    names.join(", ")
                )));
            }
        },
    };

    let parameters = metadata
        .parameters
        .iter()
        .map(|(parameter, declared)| {
            let type_expr = match (&declared.type_expr, metadata_path) {
                (Some(text), Some(path)) => Some(request.parser.parse_type(text, path)?),
                _ => None,
            };
            Ok(TaskParameter {
                name: parameter.clone(),
                type_expr,
                description: declared.description.clone(),
                sensitive: declared.sensitive,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut files = metadata.files;
    for implementation in metadata.implementations.iter().flatten() {
        files.extend(implementation.files.iter().cloned());
    }
    debug!(
        task = name,
        implementations = implementations.len(),
        parameters = parameters.len(),
        extensions = metadata.extensions.len(),
        "created task"
    );
    Ok(Value::Task(Rc::new(Task {
        name: name.to_owned(),
        description: metadata.description,
        input_method: metadata.input_method,
        parameters,
        implementations,
        supports_noop: metadata.supports_noop,
        private: metadata.private,
        remote: metadata.remote,
        files,
        metadata_origin: metadata_path.cloned(),
    })))
}

fn read_metadata(request: &InstantiationRequest<'_>, path: &Path) -> Result<TaskMetadata> {
    let text = request
        .files
        .read(path)
        .map_err(|source| Error::io(path, source))?;
    serde_json::from_str(&text).map_err(|err| {
        let message = match err.classify() {
            Category::Syntax | Category::Eof => format!("unexpected token in task metadata: {err}"),
            Category::Data if err.to_string().starts_with("unknown field") => {
                format!("unrecognized key in task metadata: {err}")
            }
            Category::Data | Category::Io => format!("invalid task metadata: {err}"),
        };
        Error::parse(path.display().to_string(), message)
    })
}

fn check_input_method(request: &InstantiationRequest<'_>, method: Option<&str>) -> Result<()> {
    match method {
        Some(method) if !INPUT_METHODS.contains(&method) => Err(request.fail(format!(
            "declares unknown input_method '{method}', expected one of {}",
            INPUT_METHODS.join(", ")
        ))),
        _ => Ok(()),
    }
}
