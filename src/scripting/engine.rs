//! Rhai Interpreter Implementation
//!
//! A module is a `.rhai` file. `import("pkg.filters")` looks for
//! `pkg/filters.rhai` in, in order:
//!
//! 1. `EngineSettings::module_paths`
//! 2. each entry of the `SCRIPTFILTER_PATH` environment variable
//! 3. the current directory
//!
//! Loading compiles the file and runs its top-level statements once into a
//! scope kept with the module. Its top-level constants are visible to every
//! hook, and every top-level name counts as a module attribute. Hooks are the
//! module's script functions, called with a per-module state map bound to
//! `this`.
//!
//! Scripts may `import` other modules from the same search path, and their
//! `print`/`debug` output is routed to `tracing` under the
//! `scriptfilter::script` target.

use crate::config::EngineSettings;
use crate::error::{BridgeError, Result};
use crate::scripting::plane::PlaneAccess;
use crate::scripting::{ArgumentList, Interpreter, Resolved, ScriptFault, ScriptValue};
use rhai::module_resolvers::{FileModuleResolver, ModuleResolversCollection};
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, Scope, AST};
use std::path::{Path, PathBuf};

/// File extension of script modules
pub const MODULE_EXTENSION: &str = "rhai";

/// Environment variable holding extra module directories
pub const MODULE_PATH_ENV: &str = "SCRIPTFILTER_PATH";

/// A loaded script module.
pub struct RhaiModule {
    name: String,
    path: PathBuf,
    ast: AST,
    /// Variables left by the module body.
    scope: Scope<'static>,
    /// Bound as `this` for every hook call.
    state: Dynamic,
}

impl RhaiModule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Top-level variables and constants of the module body.
    pub fn scope(&self) -> &Scope<'static> {
        &self.scope
    }

    /// Current value of the module's `this` state map.
    pub fn state(&self) -> &Dynamic {
        &self.state
    }
}

impl std::fmt::Debug for RhaiModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiModule")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("functions", &self.ast.iter_functions().count())
            .finish()
    }
}

/// A resolved script function.
#[derive(Debug, Clone)]
pub struct RhaiCallable {
    name: String,
    arity: usize,
}

impl RhaiCallable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

/// Packed arguments for one call.
#[derive(Debug)]
pub struct RhaiArgs(Vec<Dynamic>);

impl FuncArgs for &RhaiArgs {
    fn parse<ARGS: Extend<Dynamic>>(self, args: &mut ARGS) {
        args.extend(self.0.iter().cloned());
    }
}

/// The production interpreter: one Rhai engine per node.
pub struct RhaiInterpreter {
    engine: Engine,
    search_paths: Vec<PathBuf>,
    plane: PlaneAccess,
}

impl RhaiInterpreter {
    /// Directories searched for modules, in priority order.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    fn build_search_paths(settings: &EngineSettings) -> Vec<PathBuf> {
        let mut paths = settings.module_paths.clone();
        if let Some(extra) = std::env::var_os(MODULE_PATH_ENV) {
            paths.extend(std::env::split_paths(&extra).filter(|p| !p.as_os_str().is_empty()));
        }
        paths.push(PathBuf::from("."));
        paths
    }

    /// Configure the Rhai engine with limits, logging and the plane accessors
    fn configure_engine(
        engine: &mut Engine,
        settings: &EngineSettings,
        search_paths: &[PathBuf],
        plane: &PlaneAccess,
    ) {
        if settings.max_operations > 0 {
            engine.set_max_operations(settings.max_operations);
        }
        if settings.max_call_levels > 0 {
            engine.set_max_call_levels(settings.max_call_levels);
        }
        if settings.max_string_size > 0 {
            engine.set_max_string_size(settings.max_string_size);
        }
        if settings.max_array_size > 0 {
            engine.set_max_array_size(settings.max_array_size);
        }

        engine.on_print(|s| tracing::info!(target: "scriptfilter::script", "{}", s));
        engine.on_debug(|s, source, pos| {
            tracing::debug!(
                target: "scriptfilter::script",
                "{}{} {}",
                source.unwrap_or("<script>"),
                pos,
                s
            )
        });

        let mut resolvers = ModuleResolversCollection::new();
        for path in search_paths {
            resolvers.push(FileModuleResolver::new_with_path(path));
        }
        engine.set_module_resolver(resolvers);

        // ===== Plane accessors =====

        {
            let plane = plane.clone();
            engine.register_fn(
                "plane_len",
                move |handle: i64| -> std::result::Result<i64, Box<EvalAltResult>> {
                    plane.byte_len(handle).map_err(Into::into)
                },
            );
        }
        {
            let plane = plane.clone();
            engine.register_fn(
                "plane_stride",
                move |handle: i64| -> std::result::Result<i64, Box<EvalAltResult>> {
                    plane.stride(handle).map_err(Into::into)
                },
            );
        }
        {
            let plane = plane.clone();
            engine.register_fn(
                "plane_get",
                move |handle: i64, offset: i64| -> std::result::Result<i64, Box<EvalAltResult>> {
                    plane.read_byte(handle, offset).map_err(Into::into)
                },
            );
        }
        {
            let plane = plane.clone();
            engine.register_fn(
                "plane_set",
                move |handle: i64,
                      offset: i64,
                      value: i64|
                      -> std::result::Result<(), Box<EvalAltResult>> {
                    plane.write_byte(handle, offset, value).map_err(Into::into)
                },
            );
        }
        {
            let plane = plane.clone();
            engine.register_fn(
                "pixel_get",
                move |handle: i64,
                      x: i64,
                      y: i64|
                      -> std::result::Result<rhai::Array, Box<EvalAltResult>> {
                    let px = plane.read_pixel(handle, x, y)?;
                    Ok(px.iter().map(|&c| Dynamic::from_int(c as i64)).collect())
                },
            );
        }
        {
            let plane = plane.clone();
            engine.register_fn(
                "pixel_set",
                move |handle: i64,
                      x: i64,
                      y: i64,
                      r: i64,
                      g: i64,
                      b: i64|
                      -> std::result::Result<(), Box<EvalAltResult>> {
                    plane.write_pixel(handle, x, y, [r, g, b]).map_err(Into::into)
                },
            );
        }
    }

    /// Map a dotted module name to a relative file path.
    fn module_file(name: &str) -> Option<PathBuf> {
        let mut rel = PathBuf::new();
        for segment in name.split('.') {
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
            if !valid {
                return None;
            }
            rel.push(segment);
        }
        rel.set_extension(MODULE_EXTENSION);
        Some(rel)
    }

    fn locate(&self, name: &str) -> Result<PathBuf> {
        let rel = Self::module_file(name).ok_or_else(|| BridgeError::ModuleNotFound {
            module: name.to_string(),
            reason: "invalid module name".to_string(),
        })?;

        self.search_paths
            .iter()
            .map(|dir| dir.join(&rel))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| BridgeError::ModuleNotFound {
                module: name.to_string(),
                reason: format!(
                    "{} not found in search path {:?}",
                    rel.display(),
                    self.search_paths
                ),
            })
    }
}

impl Interpreter for RhaiInterpreter {
    type Settings = EngineSettings;
    type Module = RhaiModule;
    type Callable = RhaiCallable;
    type Args = RhaiArgs;
    type Value = Dynamic;

    fn start(settings: &EngineSettings) -> Result<Self> {
        let search_paths = Self::build_search_paths(settings);
        let plane = PlaneAccess::new();
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine, settings, &search_paths, &plane);

        tracing::debug!("Rhai runtime started, module search path {:?}", search_paths);

        Ok(Self {
            engine,
            search_paths,
            plane,
        })
    }

    fn import(&mut self, name: &str) -> Result<RhaiModule> {
        let path = self.locate(name)?;

        let ast = self
            .engine
            .compile_file(path.clone())
            .map_err(|e| BridgeError::ModuleNotFound {
                module: name.to_string(),
                reason: format!("compile error: {}", e),
            })?;

        let mut scope = Scope::new();
        self.engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|e| BridgeError::ModuleNotFound {
                module: name.to_string(),
                reason: format!("module body failed: {}", e),
            })?;

        tracing::debug!("Loaded module '{}' from {}", name, path.display());

        Ok(RhaiModule {
            name: name.to_string(),
            path,
            ast,
            scope,
            state: Dynamic::from_map(rhai::Map::new()),
        })
    }

    fn resolve(&mut self, module: &RhaiModule, name: &str, arity: usize) -> Resolved<RhaiCallable> {
        let overloads: Vec<usize> = module
            .ast
            .iter_functions()
            .filter(|f| f.name == name)
            .map(|f| f.params.len())
            .collect();

        if overloads.contains(&arity) {
            Resolved::Found(RhaiCallable {
                name: name.to_string(),
                arity,
            })
        } else if !overloads.is_empty() {
            tracing::debug!(
                "'{}' exists with arities {:?}, none taking {}",
                name,
                overloads,
                arity
            );
            Resolved::NotCallable
        } else if module.scope.contains(name) {
            Resolved::NotCallable
        } else {
            Resolved::MissingAttribute
        }
    }

    fn pack(&mut self, args: ArgumentList) -> RhaiArgs {
        let mut packed = Vec::with_capacity(args.len());
        for value in args.into_inner() {
            packed.push(match value {
                ScriptValue::Float(v) => Dynamic::from_float(v),
                ScriptValue::Int(v) => Dynamic::from_int(v),
                ScriptValue::Text(v) => Dynamic::from(v),
            });
        }
        RhaiArgs(packed)
    }

    fn call(
        &mut self,
        module: &mut RhaiModule,
        callable: &RhaiCallable,
        args: &RhaiArgs,
    ) -> std::result::Result<Dynamic, ScriptFault> {
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(&mut module.state);

        self.engine
            .call_fn_with_options::<Dynamic>(
                options,
                &mut module.scope,
                &module.ast,
                &callable.name,
                args,
            )
            .map_err(ScriptFault::from)
    }

    fn plane_access(&self) -> PlaneAccess {
        self.plane.clone()
    }

    fn finalize(self) {
        tracing::debug!("Rhai runtime finalized");
    }
}

impl std::fmt::Debug for RhaiInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiInterpreter")
            .field("search_paths", &self.search_paths)
            .finish()
    }
}
