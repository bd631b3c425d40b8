//! Shared fixtures for the integration tests.
//!
//! `LineParser` understands one statement per line: `function <name>`,
//! `plan <name>`, `type <Name> = <Type>`, `type <Name> inherits <Parent>`,
//! `call <Receiver>.<method> <json>`, or any other text as an expression.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use pcore_loaders::config::LoaderSettings;
use pcore_loaders::instantiators::{Registration, ScriptEngine, ScriptObject, ScriptScope};
use pcore_loaders::loader::Loaders;
use pcore_loaders::loader::entity::ScriptHandle;
use pcore_loaders::primitives::ast::{Closure, Definition, Parser, Program, Statement, TypeExpr};
use pcore_loaders::primitives::{Error, MemoryFileSystem, Result};
use pcore_loaders::Bootstrap;

#[derive(Default)]
pub struct LineParser {
    programs: Cell<usize>,
}

impl LineParser {
    /// Number of programs parsed so far.
    pub fn programs(&self) -> usize {
        self.programs.get()
    }
}

impl Parser for LineParser {
    fn parse_program(&self, source: &str, origin: &Path) -> Result<Program> {
        self.programs.set(self.programs.get() + 1);
        let mut program = Program::default();
        for line in source.lines().map(str::trim) {
            if line.is_empty() {
                program.body.push(Statement::Nop);
                continue;
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
                "type" => match rest.split_once(" = ") {
                    Some((name, expr)) => Definition::TypeAlias {
                        name: name.to_owned(),
                        type_expr: self.parse_type(expr, origin)?,
                    },
                    None => {
                        let (name, parent) = match rest.split_once(" inherits ") {
                            Some((name, parent)) => (name, Some(parent.to_owned())),
                            None => (rest, None),
                        };
                        Definition::TypeDefinition {
                            name: name.to_owned(),
                            parent,
                            attributes: BTreeMap::new(),
                        }
                    }
                },
                "call" => {
                    let (target, json) = rest.split_once(' ').unwrap_or((rest, "null"));
                    let (receiver, method) = target.rsplit_once('.').unwrap_or((target, ""));
                    program.body.push(Statement::Call {
                        receiver: receiver.to_owned(),
                        method: method.to_owned(),
                        arguments: serde_json::from_str(json).map_err(|err| {
                            Error::parse(origin.display().to_string(), err.to_string())
                        })?,
                    });
                    continue;
                }
                _ => {
                    program.body.push(Statement::Expression(line.to_owned()));
                    continue;
                }
            };
            program
                .body
                .push(Statement::Definition(program.definitions.len()));
            program.definitions.push(definition);
        }
        Ok(program)
    }

    fn parse_type(&self, source: &str, origin: &Path) -> Result<TypeExpr> {
        let source = source.trim();
        let invalid = || {
            Error::parse(
                origin.display().to_string(),
                format!("syntax error in type `{source}`"),
            )
        };
        if source.is_empty() || source.contains(' ') {
            return Err(invalid());
        }
        if let Ok(number) = source.parse::<i64>() {
            return Ok(TypeExpr::Literal(number.into()));
        }
        let Some((name, args)) = source.split_once('[') else {
            return Ok(if source == "Object" {
                TypeExpr::Object {
                    parent: None,
                    attributes: BTreeMap::new(),
                }
            } else {
                TypeExpr::reference(source)
            });
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

/// Engine that registers whatever name the script declares.
pub struct NameScanEngine;

impl ScriptEngine for NameScanEngine {
    fn evaluate(
        &self,
        source: &str,
        registration: Registration,
        scope: &ScriptScope<'_>,
    ) -> Result<ScriptObject> {
        let name = registration
            .declared_name(source)
            .ok_or_else(|| Error::parse(scope.origin.display().to_string(), "nothing registered"))?;
        Ok(ScriptObject {
            handle: ScriptHandle::new(name.clone()),
            name,
        })
    }
}

pub const ENV: &str = "/envs/production";
pub const MODULES: &str = "/envs/production/modules";

/// Environment with three modules: `a` and `b` with types, functions, plans
/// and tasks, and `c` whose task directory holds broken metadata.
pub fn environment() -> MemoryFileSystem {
    let mut fs = MemoryFileSystem::new();
    let files: &[(&str, &str)] = &[
        ("types/global.pp", "type Global = Integer"),
        ("types/environment/env.pp", "type Environment::Env = String"),
        ("tasks/globtask", ""),
        ("tasks/environment/envtask", ""),
        ("functions/globfunc.pp", "function globfunc"),
        ("functions/environment/envfunc.pp", "function environment::envfunc"),
        (
            "lib/puppet/functions/globrubyfunc.rb",
            "Puppet::Functions.create_function(:globrubyfunc) { def globrubyfunc; end }",
        ),
        (
            "lib/puppet/functions/environment/envrubyfunc.rb",
            "Puppet::Functions.create_function(:'environment::envrubyfunc') { def envrubyfunc; end }",
        ),
        ("modules/a/types/atype.pp", "type A::Atype = Integer"),
        ("modules/a/tasks/atask", "# doing exactly nothing\n"),
        ("modules/a/functions/afunc.pp", "function a::afunc"),
        (
            "modules/a/lib/puppet/functions/a/arubyfunc.rb",
            "Puppet::Functions.create_function(:'a::arubyfunc') { def arubyfunc; end }",
        ),
        ("modules/a/plans/aplan.pp", "plan a::aplan"),
        ("modules/b/types/atype.pp", "type B::Atype = Integer"),
        (
            "modules/b/tasks/init.json",
            r#"{ "description": "test task b", "parameters": {} }"#,
        ),
        ("modules/b/tasks/init.sh", "# doing exactly nothing\n"),
        ("modules/b/tasks/atask", "# doing exactly nothing\n"),
        (
            "modules/b/tasks/atask.json",
            r#"{
              "description": "test task b::atask",
              "input_method": "stdin",
              "parameters": {
                "string_param": { "description": "A string parameter", "type": "String[1]" },
                "int_param": { "description": "An integer parameter", "type": "Integer" }
              }
            }"#,
        ),
        ("modules/b/functions/afunc.pp", "function b::afunc"),
        (
            "modules/b/lib/puppet/functions/b/arubyfunc.rb",
            "Puppet::Functions.create_function(:'b::arubyfunc') { def arubyfunc; end }",
        ),
        ("modules/b/plans/init.pp", "plan b"),
        ("modules/b/plans/aplan.pp", "plan b::aplan"),
        ("modules/c/types/atype.pp", "type C::Atype = Integer"),
        ("modules/c/tasks/foo.sh", "# This is a task that does nothing\n"),
        (
            "modules/c/tasks/fee.md",
            "This is not a task because it has .md extension\n",
        ),
        (
            "modules/c/tasks/fum.conf",
            "text=This is not a task because it has .conf extension\n",
        ),
        ("modules/c/tasks/bad_syntax.sh", ""),
        (
            "modules/c/tasks/bad_syntax.json",
            "text => This is not a task because JSON is unparsable\n",
        ),
        ("modules/c/tasks/bad_content.sh", ""),
        (
            "modules/c/tasks/bad_content.json",
            r#"{
              "description": "This is not a task because parameters is misspelled",
              "paramters": { "string_param": { "type": "String[1]" } }
            }"#,
        ),
        (
            "modules/c/tasks/missing_adjacent.json",
            r#"{
              "description": "This is not a task because there is no adjacent file with the same base name",
              "parameters": { "string_param": { "type": "String[1]" } }
            }"#,
        ),
    ];
    for (path, text) in files {
        fs.insert(Path::new(ENV).join(path), *text);
    }
    fs
}

pub fn settings() -> LoaderSettings {
    LoaderSettings::new("production")
        .with_environment_path(ENV)
        .with_module_path([MODULES])
        .with_tasks(true)
}

/// Builds the chain over `files`, returning the parser so tests can count parses.
pub fn loaders(files: MemoryFileSystem, settings: &LoaderSettings) -> (Rc<Loaders>, Rc<LineParser>) {
    let parser = Rc::new(LineParser::default());
    let loaders = Bootstrap::new(parser.clone())
        .with_files(Rc::new(files))
        .with_script_engine(Rc::new(NameScanEngine))
        .build(settings)
        .expect("loader chain builds");
    (loaders, parser)
}
