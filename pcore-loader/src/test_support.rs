//! Stub collaborators for unit tests.
//!
//! Sources are one-line declarations: `function <name>`, `alias <Name>`,
//! `typeset <Name>: <Member>, <Member>`, or `plan <name>`.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use pcore_primitives::ast::{Closure, Parser, Program, TypeExpr};
use pcore_primitives::{EntityKind, Error, FileSystem, MemoryFileSystem, Result};

use crate::entity::{Callable, CallableBody, DataType, Task, TaskImplementation, Value};
use crate::instantiator::{InstantiationRequest, InstantiatorRegistry, SourceFormat};
use crate::module_loader::LoaderContext;

pub struct CountingFs {
    pub inner: MemoryFileSystem,
    pub reads: Cell<usize>,
}

impl CountingFs {
    pub fn new(inner: MemoryFileSystem) -> Rc<Self> {
        Rc::new(Self {
            inner,
            reads: Cell::new(0),
        })
    }
}

impl FileSystem for CountingFs {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.reads.set(self.reads.get() + 1);
        self.inner.read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn list_matching(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        self.inner.list_matching(pattern)
    }

    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        self.inner.subdirectories(path)
    }
}

pub struct RejectingParser;

impl Parser for RejectingParser {
    fn parse_program(&self, _source: &str, origin: &Path) -> Result<Program> {
        Err(Error::parse(origin.display().to_string(), "no parser in unit tests"))
    }

    fn parse_type(&self, _source: &str, origin: &Path) -> Result<TypeExpr> {
        Err(Error::parse(origin.display().to_string(), "no parser in unit tests"))
    }
}

fn declaration<'a>(request: &'a InstantiationRequest<'_>, keyword: &str) -> Result<&'a str> {
    let source = request.source()?.trim();
    source
        .strip_prefix(keyword)
        .map(str::trim)
        .ok_or_else(|| request.fail(format!("does not declare a {keyword}")))
}

fn check_name(request: &InstantiationRequest<'_>, declared: &str) -> Result<()> {
    if declared.to_lowercase() == request.typed_name.name() {
        return Ok(());
    }
    Err(request.fail(format!(
        "produced an entity with the wrong name, expected {}, actual {declared}",
        request.typed_name.name()
    )))
}

fn function(request: &InstantiationRequest<'_>) -> Result<Value> {
    let name = declaration(request, "function")?;
    check_name(request, name)?;
    Ok(Value::Function(Rc::new(Callable::new(
        request.typed_name.clone(),
        CallableBody::Closure(Closure::default()),
        &request.loader.private_loader(),
        Some(request.origin_label()),
    ))))
}

fn plan(request: &InstantiationRequest<'_>) -> Result<Value> {
    let [origin] = request.candidates else {
        return Err(request.fail("matches more than one plan file"));
    };
    let source = request
        .files
        .read(origin)
        .map_err(|source| Error::io(origin, source))?;
    let name = source
        .trim()
        .strip_prefix("plan")
        .map(str::trim)
        .ok_or_else(|| request.fail("does not declare a plan"))?;
    check_name(request, name)?;
    Ok(Value::Plan(Rc::new(Callable::new(
        request.typed_name.clone(),
        CallableBody::Closure(Closure::default()),
        &request.loader.private_loader(),
        Some(request.origin_label()),
    ))))
}

fn data_type(request: &InstantiationRequest<'_>) -> Result<Value> {
    if let Ok(name) = declaration(request, "alias") {
        check_name(request, name)?;
        return Ok(Value::DataType(Arc::new(DataType::Alias {
            name: name.to_owned(),
            type_expr: TypeExpr::reference("Integer"),
        })));
    }
    let spec = declaration(request, "typeset")?;
    let (name, members) = spec
        .split_once(':')
        .ok_or_else(|| request.fail("does not list type set members"))?;
    let name = name.trim();
    check_name(request, name)?;
    let types: BTreeMap<String, TypeExpr> = members
        .split(',')
        .map(|member| {
            (
                member.trim().to_owned(),
                TypeExpr::Object {
                    parent: None,
                    attributes: BTreeMap::new(),
                },
            )
        })
        .collect();
    Ok(Value::named_type(
        name,
        &TypeExpr::TypeSet { types },
        Some(request.origin_label()),
    ))
}

fn task(request: &InstantiationRequest<'_>) -> Result<Value> {
    Ok(Value::Task(Rc::new(Task {
        name: request.typed_name.name().to_owned(),
        description: None,
        input_method: None,
        parameters: Vec::new(),
        implementations: request
            .candidates
            .iter()
            .map(|path| TaskImplementation {
                path: path.clone(),
                requirements: Vec::new(),
            })
            .collect(),
        supports_noop: false,
        private: false,
        remote: false,
        files: Vec::new(),
        metadata_origin: None,
    })))
}

pub fn registry() -> InstantiatorRegistry {
    InstantiatorRegistry::new()
        .with(SourceFormat::Puppet, EntityKind::Function, function)
        .with(SourceFormat::Ruby, EntityKind::Function, function)
        .with(SourceFormat::Puppet, EntityKind::Type, data_type)
        .with(SourceFormat::Ruby, EntityKind::Type, data_type)
        .with(SourceFormat::Puppet, EntityKind::Plan, plan)
        .with(SourceFormat::Task, EntityKind::Task, task)
}

pub fn context(files: &Rc<CountingFs>) -> Rc<LoaderContext> {
    let files: Rc<dyn FileSystem> = files.clone();
    Rc::new(LoaderContext::new(files, Rc::new(RejectingParser), registry()).with_tasks(true))
}
