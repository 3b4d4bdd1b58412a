use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use globset::GlobBuilder;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;
use rayon::prelude::*;
use serde::Serialize;

use crate::PugdocError;
use crate::PugdocResult;
use crate::config::DEFAULT_INPUT;
use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::config::PugdocConfig;
use crate::document::Document;
use crate::document::build_document;
use crate::document::relative_file;
use crate::engine::TemplateEngine;
use crate::examples::assemble;
use crate::extractor::ExtractOptions;
use crate::extractor::RawBlock;
use crate::extractor::extract_blocks;
use crate::lines::LineIndex;
use crate::lines::normalize_line_endings;
use crate::metadata::Locals;
use crate::metadata::Metadata;
use crate::metadata::parse_metadata;
use crate::mixins::MixinTable;
use crate::mixins::link_mixins;
use crate::render::render_assembly;

/// Options for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
	/// Project root. Document `file` paths are relative to it.
	pub root: PathBuf,
	/// Glob patterns, relative to `root`, of templates to scan.
	pub input: Vec<String>,
	/// Gitignore-style patterns to exclude from scanning.
	pub exclude_patterns: Vec<String>,
	pub disable_gitignore: bool,
	/// Files larger than this are skipped with a diagnostic.
	pub max_file_size: u64,
	pub extract: ExtractOptions,
	/// Global locals, underneath every block's own locals.
	pub locals: Locals,
	/// Worker threads processing files.
	pub jobs: usize,
	/// Checked between files; once set the run stops with
	/// [`PugdocError::Cancelled`].
	pub cancel: Option<Arc<AtomicBool>>,
}

impl GenerateOptions {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			input: DEFAULT_INPUT.iter().map(ToString::to_string).collect(),
			exclude_patterns: Vec::new(),
			disable_gitignore: false,
			max_file_size: DEFAULT_MAX_FILE_SIZE,
			extract: ExtractOptions::default(),
			locals: Locals::new(),
			jobs: 1,
			cancel: None,
		}
	}

	/// Construct options from a loaded config, reading its locals file.
	pub fn from_config(root: impl Into<PathBuf>, config: &PugdocConfig) -> PugdocResult<Self> {
		let root = root.into();
		let locals = config.load_locals(&root)?;

		Ok(Self {
			input: config.input.clone(),
			exclude_patterns: config.exclude.patterns.clone(),
			disable_gitignore: config.disable_gitignore,
			max_file_size: config.max_file_size,
			extract: config.extract_options(),
			locals,
			jobs: config.jobs.max(1),
			cancel: None,
			root,
		})
	}

	fn is_cancelled(&self) -> bool {
		self.cancel
			.as_ref()
			.is_some_and(|flag| flag.load(Ordering::Relaxed))
	}
}

/// The kind of a non-fatal problem found during generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DiagnosticKind {
	/// A block reused a name seen earlier in the run. Both are kept.
	DuplicateName { name: String, first_file: String },
	/// The annotation could not be read. The block is skipped.
	MetadataParse { message: String },
	/// One example failed to render. Sibling examples still render.
	Render {
		label: String,
		message: String,
		excerpt: Option<String>,
		/// The block metadata as pretty-printed JSON.
		meta: String,
	},
	/// An override object nested inside another override was skipped.
	NestingTooDeep { label: String },
	/// An `arguments` or `attributes` entry could not be parsed and was left
	/// out. The rest of the block is kept.
	InvalidParameter {
		key: String,
		text: String,
		reason: String,
	},
	/// The `capture` value was not `all`, `section` or a positive integer.
	/// The default capture was used.
	InvalidCapture { value: String },
	/// The file exceeded the size limit and was not scanned.
	FileTooLarge { size: u64, limit: u64 },
}

/// A non-fatal problem attributed to a file and, when known, a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
	pub file: String,
	pub block: Option<String>,
	/// 1-indexed line of the doc marker, or 0 for file-level diagnostics.
	pub line: usize,
	pub kind: DiagnosticKind,
}

impl Diagnostic {
	pub fn message(&self) -> String {
		match &self.kind {
			DiagnosticKind::DuplicateName { name, first_file } => {
				format!("duplicate doc block name `{name}` (first defined in {first_file})")
			}
			DiagnosticKind::MetadataParse { message } => message.clone(),
			DiagnosticKind::Render { label, message, .. } => {
				format!("failed to render `{label}`: {message}")
			}
			DiagnosticKind::NestingTooDeep { label } => {
				format!("example `{label}` is nested more than one level deep and was skipped")
			}
			DiagnosticKind::InvalidParameter { key, text, reason } => {
				format!("skipped invalid `{key}` entry `{text}`: {reason}")
			}
			DiagnosticKind::InvalidCapture { value } => {
				format!("invalid capture `{value}`, expected `all`, `section` or a positive number")
			}
			DiagnosticKind::FileTooLarge { size, limit } => {
				format!("file skipped: {size} bytes exceeds the {limit} byte limit")
			}
		}
	}

	/// Location in `file:line` form.
	pub fn location(&self) -> String {
		if self.line == 0 {
			self.file.clone()
		} else {
			format!("{}:{}", self.file, self.line)
		}
	}
}

/// Documents of one file or one run, with the diagnostics found on the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerateResult {
	pub documents: Vec<Document>,
	pub diagnostics: Vec<Diagnostic>,
}

impl GenerateResult {
	fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
		tracing::warn!(
			location = %diagnostic.location(),
			block = diagnostic.block.as_deref().unwrap_or_default(),
			"{}",
			diagnostic.message()
		);
		self.diagnostics.push(diagnostic);
	}
}

/// Run the whole pipeline for one template source. `file` is the path
/// reported in documents and diagnostics.
pub fn generate_source(
	source: &str,
	file: &str,
	engine: &dyn TemplateEngine,
	extract: &ExtractOptions,
	globals: &Locals,
) -> PugdocResult<GenerateResult> {
	let source = normalize_line_endings(source);
	let index = LineIndex::new(&source);
	let mut result = GenerateResult::default();

	let mixins = MixinTable::from_index(&index);
	let context = BlockContext {
		file,
		engine,
		globals,
		mixins: &mixins,
	};

	for block in extract_blocks(&index, extract) {
		tracing::debug!(file, line = block.marker.line, "found doc block");

		let meta = match parse_metadata(&block) {
			Ok(meta) => meta,
			Err(error) => {
				result.push_diagnostic(Diagnostic {
					file: file.to_string(),
					block: None,
					line: block.marker.line,
					kind: DiagnosticKind::MetadataParse {
						message: error.to_string(),
					},
				});
				continue;
			}
		};

		if let Some(document) = generate_block(&block, meta, &context, &mut result)? {
			result.documents.push(document);
		}
	}

	Ok(result)
}

struct BlockContext<'a> {
	file: &'a str,
	engine: &'a dyn TemplateEngine,
	globals: &'a Locals,
	mixins: &'a MixinTable,
}

fn generate_block(
	block: &RawBlock,
	meta: Metadata,
	context: &BlockContext<'_>,
	result: &mut GenerateResult,
) -> PugdocResult<Option<Document>> {
	let file = context.file;
	let diagnostic = |kind| {
		Diagnostic {
			file: file.to_string(),
			block: meta.name.clone(),
			line: block.marker.line,
			kind,
		}
	};

	for rejected in &meta.rejected {
		result.push_diagnostic(diagnostic(DiagnosticKind::InvalidParameter {
			key: rejected.key.clone(),
			text: rejected.text.clone(),
			reason: rejected.reason.clone(),
		}));
	}

	if let Err(value) = meta.capture_mode() {
		result.push_diagnostic(diagnostic(DiagnosticKind::InvalidCapture { value }));
	}

	let code = block.code_text();
	let mut assembly = assemble(&meta, &code);
	link_mixins(&mut assembly, context.mixins);
	for label in &assembly.too_deep {
		result.push_diagnostic(diagnostic(DiagnosticKind::NestingTooDeep {
			label: label.clone(),
		}));
	}

	let render = render_assembly(context.engine, &assembly, context.globals, file);
	if !render.failures.is_empty() {
		let meta_json = serde_json::to_string_pretty(&meta).unwrap_or_default();
		for failure in &render.failures {
			result.push_diagnostic(diagnostic(DiagnosticKind::Render {
				label: failure.label.clone(),
				message: failure.error.message.clone(),
				excerpt: failure.error.excerpt.clone(),
				meta: meta_json.clone(),
			}));
		}
	}

	let document = build_document(file, block, meta, render)?;
	if document.is_empty() {
		tracing::debug!(file, name = document.name(), "dropping block without output");
		return Ok(None);
	}

	Ok(Some(document))
}

/// Read and process one file on disk.
pub fn generate_file(
	path: &Path,
	options: &GenerateOptions,
	engine: &dyn TemplateEngine,
) -> PugdocResult<GenerateResult> {
	let file = relative_file(&options.root, path);
	tracing::debug!(file, "scanning");

	match read_source(path, options.max_file_size) {
		Ok(source) => generate_source(&source, &file, engine, &options.extract, &options.locals),
		Err(PugdocError::FileTooLarge { size, limit, .. }) => {
			let mut result = GenerateResult::default();
			result.push_diagnostic(Diagnostic {
				file,
				block: None,
				line: 0,
				kind: DiagnosticKind::FileTooLarge { size, limit },
			});
			Ok(result)
		}
		Err(error) => Err(error),
	}
}

/// Read a template, refusing files larger than `limit` bytes.
fn read_source(path: &Path, limit: u64) -> PugdocResult<String> {
	let size = std::fs::metadata(path)?.len();
	if size > limit {
		return Err(PugdocError::FileTooLarge {
			path: path.display().to_string(),
			size,
			limit,
		});
	}

	Ok(std::fs::read_to_string(path)?)
}

/// Collect the configured templates and process them.
pub fn generate(options: &GenerateOptions, engine: &dyn TemplateEngine) -> PugdocResult<GenerateResult> {
	let files = collect_files(options)?;
	generate_files(&files, options, engine)
}

/// Process `files`, in parallel when `options.jobs > 1`. Documents keep file
/// order, then marker order. Names are registered afterwards in that same
/// order, so the first occurrence of a duplicate is always the earlier one.
pub fn generate_files(
	files: &[PathBuf],
	options: &GenerateOptions,
	engine: &dyn TemplateEngine,
) -> PugdocResult<GenerateResult> {
	let jobs = options.jobs.clamp(1, files.len().max(1));
	let per_file = if jobs == 1 {
		files
			.iter()
			.map(|path| process_file(path, options, engine))
			.collect::<Vec<_>>()
	} else {
		process_in_parallel(files, jobs, options, engine)?
	};

	let mut result = GenerateResult::default();
	let mut names: HashMap<String, String> = HashMap::new();

	for file_result in per_file {
		let file_result = file_result?;
		result.diagnostics.extend(file_result.diagnostics);

		for document in file_result.documents {
			if let Some(first_file) = names.get(document.name()) {
				result.push_diagnostic(Diagnostic {
					file: document.file.clone(),
					block: Some(document.name().to_string()),
					line: document.line,
					kind: DiagnosticKind::DuplicateName {
						name: document.name().to_string(),
						first_file: first_file.clone(),
					},
				});
			} else {
				names.insert(document.name().to_string(), document.file.clone());
			}
			result.documents.push(document);
		}
	}

	tracing::info!(
		files = files.len(),
		documents = result.documents.len(),
		diagnostics = result.diagnostics.len(),
		"generation finished"
	);

	Ok(result)
}

fn process_file(
	path: &Path,
	options: &GenerateOptions,
	engine: &dyn TemplateEngine,
) -> PugdocResult<GenerateResult> {
	if options.is_cancelled() {
		return Err(PugdocError::Cancelled);
	}

	generate_file(path, options, engine)
}

/// Process files on a pool of `jobs` threads. The indexed collect keeps
/// results in file order.
fn process_in_parallel(
	files: &[PathBuf],
	jobs: usize,
	options: &GenerateOptions,
	engine: &dyn TemplateEngine,
) -> PugdocResult<Vec<PugdocResult<GenerateResult>>> {
	let pool = rayon::ThreadPoolBuilder::new()
		.num_threads(jobs)
		.build()
		.map_err(|e| PugdocError::ThreadPool(e.to_string()))?;

	Ok(pool.install(|| {
		files
			.par_iter()
			.map(|path| process_file(path, options, engine))
			.collect()
	}))
}

/// Collect the files matched by `options.input`, honouring `.gitignore`
/// (unless disabled) and the exclude patterns. Sorted for deterministic
/// output.
pub fn collect_files(options: &GenerateOptions) -> PugdocResult<Vec<PathBuf>> {
	let root = options.root.as_path();
	let include_set = build_glob_set(&options.input)?;
	let gitignore = if options.disable_gitignore {
		Gitignore::empty()
	} else {
		build_gitignore(root)
	};
	let custom_exclude = build_exclude_matcher(root, &options.exclude_patterns)?;

	let mut files = Vec::new();
	let mut visited_dirs = HashSet::new();
	let matchers = Matchers {
		include: &include_set,
		gitignore: &gitignore,
		exclude: &custom_exclude,
	};
	walk_dir(root, root, &matchers, &mut files, &mut visited_dirs)?;
	files.sort();

	Ok(files)
}

struct Matchers<'a> {
	include: &'a GlobSet,
	gitignore: &'a Gitignore,
	exclude: &'a Gitignore,
}

/// Build a `GlobSet` from input patterns. `*` does not cross directory
/// separators; `**` does.
fn build_glob_set(patterns: &[String]) -> PugdocResult<GlobSet> {
	let mut builder = GlobSetBuilder::new();

	for pattern in patterns {
		let glob = GlobBuilder::new(pattern.trim_start_matches("./"))
			.literal_separator(true)
			.build()
			.map_err(|e| {
				PugdocError::InvalidPattern {
					pattern: pattern.clone(),
					reason: e.to_string(),
				}
			})?;
		builder.add(glob);
	}

	builder.build().map_err(|e| {
		PugdocError::InvalidPattern {
			pattern: patterns.join(", "),
			reason: e.to_string(),
		}
	})
}

/// Build a `Gitignore` matcher from `[exclude]` patterns.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> PugdocResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			PugdocError::InvalidPattern {
				pattern: pattern.clone(),
				reason: e.to_string(),
			}
		})?;
	}

	builder.build().map_err(|e| {
		PugdocError::InvalidPattern {
			pattern: patterns.join(", "),
			reason: e.to_string(),
		}
	})
}

/// Build a `Gitignore` matcher from the project's `.gitignore` file (if any).
fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let gitignore_path = root.join(".gitignore");
	if gitignore_path.exists() {
		let _ = builder.add(gitignore_path);
	}

	builder.build().unwrap_or_else(|_| Gitignore::empty())
}

fn is_ignored_directory_name(name: &str) -> bool {
	name.starts_with('.') || name == "node_modules"
}

fn walk_dir(
	root: &Path,
	dir: &Path,
	matchers: &Matchers<'_>,
	files: &mut Vec<PathBuf>,
	visited_dirs: &mut HashSet<PathBuf>,
) -> PugdocResult<()> {
	// Symlinked directories are visited once.
	let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
	if !visited_dirs.insert(canonical) {
		return Ok(());
	}

	for entry in std::fs::read_dir(dir)? {
		let path = entry?.path();
		let is_dir = path.is_dir();

		if is_dir
			&& path
				.file_name()
				.and_then(|name| name.to_str())
				.is_some_and(is_ignored_directory_name)
		{
			continue;
		}

		if matchers.gitignore.matched(&path, is_dir).is_ignore()
			|| matchers.exclude.matched(&path, is_dir).is_ignore()
		{
			continue;
		}

		if is_dir {
			walk_dir(root, &path, matchers, files, visited_dirs)?;
		} else if path
			.strip_prefix(root)
			.is_ok_and(|relative| matchers.include.is_match(relative))
		{
			files.push(path);
		}
	}

	Ok(())
}
