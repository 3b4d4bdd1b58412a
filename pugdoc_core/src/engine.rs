use std::io::Write;
use std::process::Command;
use std::process::Stdio;

use thiserror::Error;

use crate::config::EngineConfig;
use crate::config::EngineKind;
use crate::metadata::Locals;

/// Program used by [`CommandEngine`] when none is configured.
pub const DEFAULT_COMMAND_PROGRAM: &str = "pug";

/// Options for a single compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions<'a> {
	/// Name reported in engine errors, usually the template's path.
	pub filename: &'a str,
	/// Ask the engine for richer, line-annotated error output.
	pub debug: bool,
}

/// A compile or render failure reported by a template engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
	/// One-line summary, including the filename and line where the engine
	/// reports them.
	pub message: String,
	/// Source excerpt around the failure, when the engine provides one.
	pub excerpt: Option<String>,
}

impl EngineError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			excerpt: None,
		}
	}
}

/// A template compiler. Implementations must be shareable across the worker
/// threads of a generation run.
pub trait TemplateEngine: Send + Sync {
	fn compile(
		&self,
		source: &str,
		options: &CompileOptions<'_>,
	) -> Result<Box<dyn CompiledTemplate>, EngineError>;
}

/// The result of [`TemplateEngine::compile`].
pub trait CompiledTemplate {
	fn render(&self, locals: &Locals) -> Result<String, EngineError>;
}

/// Build the engine selected by `config`.
pub fn engine_from_config(config: &EngineConfig) -> Box<dyn TemplateEngine> {
	match config.kind {
		EngineKind::Jinja => Box::new(JinjaEngine),
		EngineKind::Command => {
			let program = config
				.program
				.clone()
				.unwrap_or_else(|| DEFAULT_COMMAND_PROGRAM.to_string());
			Box::new(CommandEngine::new(program, config.args.clone()))
		}
	}
}

/// In-process engine backed by `minijinja`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JinjaEngine;

struct JinjaTemplate {
	filename: String,
	source: String,
	debug: bool,
}

impl JinjaTemplate {
	fn environment(&self) -> Result<minijinja::Environment<'_>, EngineError> {
		let mut env = minijinja::Environment::new();
		env.set_debug(self.debug);
		env.set_undefined_behavior(minijinja::UndefinedBehavior::Lenient);
		env.add_template(&self.filename, &self.source)
			.map_err(|e| jinja_error(&e, self.debug))?;

		Ok(env)
	}
}

impl TemplateEngine for JinjaEngine {
	fn compile(
		&self,
		source: &str,
		options: &CompileOptions<'_>,
	) -> Result<Box<dyn CompiledTemplate>, EngineError> {
		let template = JinjaTemplate {
			filename: options.filename.to_string(),
			source: source.to_string(),
			debug: options.debug,
		};

		// Surface syntax errors at compile time.
		template.environment()?;

		Ok(Box::new(template))
	}
}

impl CompiledTemplate for JinjaTemplate {
	fn render(&self, locals: &Locals) -> Result<String, EngineError> {
		let env = self.environment()?;
		let template = env
			.get_template(&self.filename)
			.map_err(|e| jinja_error(&e, self.debug))?;

		template
			.render(minijinja::Value::from_serialize(locals))
			.map_err(|e| jinja_error(&e, self.debug))
	}
}

fn jinja_error(error: &minijinja::Error, debug: bool) -> EngineError {
	let excerpt = debug
		.then(|| error.display_debug_info().to_string())
		.filter(|info| !info.trim().is_empty());

	EngineError {
		message: error.to_string(),
		excerpt,
	}
}

/// Runs an external compiler such as `pug` from `pug-cli`. The source is
/// written to stdin and the output read from stdout; the filename and locals
/// are passed as `--path <filename>` and `--obj <json>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEngine {
	program: String,
	args: Vec<String>,
}

impl CommandEngine {
	pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
		Self {
			program: program.into(),
			args,
		}
	}
}

struct CommandTemplate {
	engine: CommandEngine,
	filename: String,
	source: String,
	debug: bool,
}

impl TemplateEngine for CommandEngine {
	fn compile(
		&self,
		source: &str,
		options: &CompileOptions<'_>,
	) -> Result<Box<dyn CompiledTemplate>, EngineError> {
		Ok(Box::new(CommandTemplate {
			engine: self.clone(),
			filename: options.filename.to_string(),
			source: source.to_string(),
			debug: options.debug,
		}))
	}
}

impl CompiledTemplate for CommandTemplate {
	fn render(&self, locals: &Locals) -> Result<String, EngineError> {
		let locals = serde_json::to_string(locals).map_err(|e| EngineError::new(e.to_string()))?;

		let mut command = Command::new(&self.engine.program);
		command
			.args(&self.engine.args)
			.arg("--path")
			.arg(&self.filename)
			.arg("--obj")
			.arg(&locals);
		if !self.debug {
			command.arg("--no-debug");
		}

		tracing::debug!(program = %self.engine.program, filename = %self.filename, "running template command");

		let mut child = command
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(|e| EngineError::new(format!("failed to run `{}`: {e}", self.engine.program)))?;

		// A compiler that exits early closes the pipe; its stderr explains why.
		let source = self.source.clone();
		let writer = child.stdin.take().map(|mut stdin| {
			std::thread::spawn(move || {
				let _ = stdin.write_all(source.as_bytes());
			})
		});
		let output = child
			.wait_with_output()
			.map_err(|e| EngineError::new(format!("failed to run `{}`: {e}", self.engine.program)))?;
		if let Some(writer) = writer {
			let _ = writer.join();
		}

		if output.status.success() {
			return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
		}

		let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
		let message = stderr
			.lines()
			.find(|line| !line.trim().is_empty())
			.map_or_else(
				|| format!("`{}` exited with {}", self.engine.program, output.status),
				|line| format!("{}: {}", self.filename, line.trim()),
			);

		Err(EngineError {
			message,
			excerpt: (!stderr.is_empty()).then_some(stderr),
		})
	}
}
