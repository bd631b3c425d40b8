//! Line-oriented parser and request fixtures for unit tests.
//!
//! One statement per line: `function <name>`, `plan <name>`,
//! `type <Name> = <Type>`, `type <Name> inherits <Parent>`, `class <name>`,
//! `call <Receiver>.<method> <json>`, `!error`, or any other text as an
//! expression.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pcore_loader::entity::ScriptHandle;
use pcore_loader::{InstantiationRequest, Loader, LoaderKind, LoaderRef, NullLoader};
use pcore_primitives::ast::{Closure, Definition, Parser, Program, Statement, TypeExpr};
use pcore_primitives::{EntityKind, Error, MemoryFileSystem, Result, TypedName};

use crate::script::{Registration, ScriptEngine, ScriptObject, ScriptScope};

pub struct LineParser;

impl Parser for LineParser {
    fn parse_program(&self, source: &str, origin: &Path) -> Result<Program> {
        let mut program = Program::default();
        for line in source.lines().map(str::trim) {
            if line.is_empty() {
                program.body.push(Statement::Nop);
                continue;
            }
            if line == "!error" {
                return Err(Error::parse(origin.display().to_string(), "syntax error"));
            }
            let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));
            let definition = match keyword {
                "function" => Definition::Function {
                    name: rest.to_owned(),
                    closure: Closure::default(),
                },
                "plan" => Definition::Plan {
                    name: rest.to_owned(),
                    closure: Closure::default(),
                },
                "type" => type_definition(rest, origin, self)?,
                "class" => Definition::Other {
                    keyword: "class".into(),
                    name: rest.to_owned(),
                },
                "call" => {
                    let (target, json) = rest.split_once(' ').unwrap_or((rest, "null"));
                    let (receiver, method) = target.rsplit_once('.').unwrap_or((target, ""));
                    let arguments = serde_json::from_str(json)
                        .map_err(|err| Error::parse(origin.display().to_string(), err.to_string()))?;
                    program.body.push(Statement::Call {
                        receiver: receiver.to_owned(),
                        method: method.to_owned(),
                        arguments,
                    });
                    continue;
                }
                _ => {
                    program.body.push(Statement::Expression(line.to_owned()));
                    continue;
                }
            };
            program.body.push(Statement::Definition(program.definitions.len()));
            program.definitions.push(definition);
        }
        Ok(program)
    }

    fn parse_type(&self, source: &str, origin: &Path) -> Result<TypeExpr> {
        let source = source.trim();
        let invalid = || Error::parse(origin.display().to_string(), format!("syntax error in type `{source}`"));
        if source.is_empty() || source.contains(' ') {
            return Err(invalid());
        }
        if let Ok(number) = source.parse::<i64>() {
            return Ok(TypeExpr::Literal(number.into()));
        }
        let Some((name, args)) = source.split_once('[') else {
            return match source {
                "Object" => Ok(TypeExpr::Object {
                    parent: None,
                    attributes: BTreeMap::new(),
                }),
                _ => Ok(TypeExpr::reference(source)),
            };
        };
        let args = args.strip_suffix(']').ok_or_else(invalid)?;
        if name == "TypeSet" {
            let types = args
                .split(',')
                .map(|member| {
                    (
                        member.to_owned(),
                        TypeExpr::Object {
                            parent: None,
                            attributes: BTreeMap::new(),
                        },
                    )
                })
                .collect();
            return Ok(TypeExpr::TypeSet { types });
        }
        Ok(TypeExpr::Reference {
            name: name.to_owned(),
            args: args
                .split(',')
                .map(|arg| self.parse_type(arg, origin))
                .collect::<Result<_>>()?,
        })
    }
}

fn type_definition(rest: &str, origin: &Path, parser: &LineParser) -> Result<Definition> {
    if let Some((name, expr)) = rest.split_once(" = ") {
        return Ok(Definition::TypeAlias {
            name: name.trim().to_owned(),
            type_expr: parser.parse_type(expr, origin)?,
        });
    }
    let (name, parent) = match rest.split_once(" inherits ") {
        Some((name, parent)) => (name, Some(parent.trim().to_owned())),
        None => (rest, None),
    };
    Ok(Definition::TypeDefinition {
        name: name.trim().to_owned(),
        parent,
        attributes: BTreeMap::new(),
    })
}

/// Script engine that only reads the registered name.
pub struct NameScanEngine;

impl ScriptEngine for NameScanEngine {
    fn evaluate(
        &self,
        source: &str,
        registration: Registration,
        scope: &ScriptScope<'_>,
    ) -> Result<ScriptObject> {
        let name = registration.declared_name(source).ok_or_else(|| {
            Error::parse(scope.origin.display().to_string(), "no registered name")
        })?;
        Ok(ScriptObject {
            handle: ScriptHandle::new(name.clone()),
            name,
        })
    }
}

/// Owned inputs for one instantiation request.
pub struct Fixture {
    pub loader: LoaderRef,
    pub typed_name: TypedName,
    pub origin: PathBuf,
    pub source: Option<String>,
    pub candidates: Vec<PathBuf>,
    pub files: MemoryFileSystem,
    pub parser: LineParser,
}

impl Fixture {
    pub fn new(kind: EntityKind, name: &str, origin: &str, source: &str) -> Self {
        Self {
            loader: Loader::new(LoaderKind::Null(NullLoader::new())),
            typed_name: TypedName::new(kind, name),
            origin: PathBuf::from(origin),
            source: Some(source.to_owned()),
            candidates: vec![PathBuf::from(origin)],
            files: MemoryFileSystem::new().with_file(origin, source),
            parser: LineParser,
        }
    }

    /// Fixture for kinds assembled from several files.
    pub fn bundle(kind: EntityKind, name: &str, files: &[(&str, &str)]) -> Self {
        let mut tree = MemoryFileSystem::new();
        for (path, text) in files {
            tree.insert(*path, *text);
        }
        let candidates: Vec<PathBuf> = files.iter().map(|(path, _)| PathBuf::from(path)).collect();
        Self {
            loader: Loader::new(LoaderKind::Null(NullLoader::new())),
            typed_name: TypedName::new(kind, name),
            origin: candidates[0].clone(),
            source: None,
            candidates,
            files: tree,
            parser: LineParser,
        }
    }

    pub fn request(&self) -> InstantiationRequest<'_> {
        InstantiationRequest {
            loader: &self.loader,
            typed_name: &self.typed_name,
            origin: &self.origin,
            source: self.source.as_deref(),
            candidates: &self.candidates,
            files: &self.files,
            parser: &self.parser,
            environment: "production",
        }
    }
}
