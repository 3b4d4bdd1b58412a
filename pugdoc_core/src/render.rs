use crate::document::Fragment;
use crate::engine::CompileOptions;
use crate::engine::EngineError;
use crate::engine::TemplateEngine;
use crate::examples::Assembly;
use crate::metadata::Locals;

/// Output of one variant, or the engine failure that replaced it.
pub type RenderResult = Result<String, EngineError>;

/// A variant that failed to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
	pub label: String,
	pub error: EngineError,
}

/// Outputs of every variant in one block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockRender {
	/// Joined output of the block's successful variants. `None` when nothing
	/// rendered or rendering was suppressed.
	pub output: Option<String>,
	/// Fragments with at least one successful variant.
	pub fragments: Vec<Fragment>,
	pub failures: Vec<RenderFailure>,
}

/// Compile and render `source`. A failure is retried once with the engine's
/// debug mode enabled, only to obtain a more detailed error; the retry's
/// output is never used.
pub fn render_source(
	engine: &dyn TemplateEngine,
	source: &str,
	locals: &Locals,
	filename: &str,
) -> RenderResult {
	let attempt = |debug: bool| {
		engine
			.compile(source, &CompileOptions { filename, debug })
			.and_then(|template| template.render(locals))
	};

	let error = match attempt(false) {
		Ok(output) => return Ok(output),
		Err(error) => error,
	};

	match attempt(true) {
		Err(detailed) => {
			Err(EngineError {
				message: detailed.message,
				excerpt: detailed.excerpt.or(error.excerpt),
			})
		}
		Ok(_) => Err(error),
	}
}

/// Render every variant of `assembly` independently. Global locals sit
/// underneath each variant's own locals.
pub fn render_assembly(
	engine: &dyn TemplateEngine,
	assembly: &Assembly,
	globals: &Locals,
	filename: &str,
) -> BlockRender {
	let mut block_outputs = Vec::new();
	let mut fragment_outputs: Vec<Vec<String>> = vec![Vec::new(); assembly.fragments.len()];
	let mut failures = Vec::new();

	for variant in &assembly.variants {
		// Suppressed blocks only render for their fragments.
		if assembly.suppressed && variant.fragment.is_none() {
			continue;
		}

		let mut locals = globals.clone();
		locals.extend(variant.locals.clone());

		match render_source(engine, &variant.source, &locals, filename) {
			Ok(output) => {
				if let Some(outputs) = variant
					.fragment
					.and_then(|index| fragment_outputs.get_mut(index))
				{
					outputs.push(output.clone());
				}
				block_outputs.push(output);
			}
			Err(error) => {
				failures.push(RenderFailure {
					label: variant.label.clone(),
					error,
				});
			}
		}
	}

	let output = (!assembly.suppressed && !block_outputs.is_empty()).then(|| block_outputs.concat());
	let fragments = assembly
		.fragments
		.iter()
		.zip(fragment_outputs)
		.filter(|(_, outputs)| !outputs.is_empty())
		.map(|(meta, outputs)| {
			Fragment {
				meta: meta.clone(),
				output: outputs.concat(),
			}
		})
		.collect();

	BlockRender {
		output,
		fragments,
		failures,
	}
}
