//! Plans, and the dispatch between plan source formats.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use pcore_loader::entity::{Callable, CallableBody, Value};
use pcore_loader::{InstantiationRequest, Instantiator};
use pcore_primitives::ast::Definition;
use pcore_primitives::{Error, Result};
use tracing::debug;

use crate::definition::{check_name, check_no_extra_logic, parse, sole_definition};

const PUPPET_EXTENSION: &str = "pp";

/// Creates a plan from a file that contains exactly one `plan` definition
/// with the requested name.
///
/// # Errors
///
/// Same contract as [`crate::puppet_function`], for plans.
pub fn puppet_plan(request: &InstantiationRequest<'_>) -> Result<Value> {
    let program = parse(request)?;
    let (name, closure) = sole_definition(request, &program, "plan", |definition| {
        match definition {
            Definition::Plan { name, closure } => Some((name, closure)),
            _ => None,
        }
    })?;
    check_name(request, "plan", name)?;
    check_no_extra_logic(request, &program, "plan")?;
    Ok(Value::Plan(Rc::new(Callable::new(
        request.typed_name.clone(),
        CallableBody::Closure(closure.clone()),
        &request.loader.private_loader(),
        Some(request.origin_label()),
    ))))
}

/// Routes a plan to an instantiator chosen by its file extension.
///
/// Plans are located by base name, so every candidate file is handed over;
/// a plan must come from exactly one of them. `.pp` files go to
/// [`puppet_plan`]; other extensions to the instantiator registered for them.
#[derive(Clone, Default)]
pub struct PlanDispatch {
    by_extension: HashMap<String, Rc<dyn Instantiator>>,
}

impl fmt::Debug for PlanDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extensions: Vec<_> = self.by_extension.keys().collect();
        extensions.sort();
        f.debug_struct("PlanDispatch")
            .field("extensions", &extensions)
            .finish()
    }
}

impl PlanDispatch {
    /// Creates a dispatch that only understands `.pp` plans.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the instantiator for plan files with `extension`.
    #[must_use]
    pub fn with_extension(
        mut self,
        extension: impl Into<String>,
        instantiator: impl Instantiator + 'static,
    ) -> Self {
        self.by_extension
            .insert(extension.into(), Rc::new(instantiator));
        self
    }
}

impl Instantiator for PlanDispatch {
    fn create(&self, request: &InstantiationRequest<'_>) -> Result<Value> {
        let [origin] = request.candidates else {
            let files: Vec<String> = request
                .candidates
                .iter()
                .map(|path| path.display().to_string())
                .collect();
            return Err(request.fail(format!(
                "defines the plan '{}' in more than one file: {}",
                request.typed_name.name(),
                files.join(", ")
            )));
        };
        let extension = origin
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let source = request
            .files
            .read(origin)
            .map_err(|source| Error::io(origin, source))?;
        let single = InstantiationRequest {
            origin,
            source: Some(&source),
            candidates: std::slice::from_ref(origin),
            ..*request
        };
        debug!(plan = %request.typed_name.name(), extension, "dispatching plan");
        if extension == PUPPET_EXTENSION {
            return puppet_plan(&single);
        }
        match self.by_extension.get(extension) {
            Some(instantiator) => instantiator.create(&single),
            None => Err(single.fail(format!(
                "is a plan in an unsupported format '{extension}'"
            ))),
        }
    }
}
