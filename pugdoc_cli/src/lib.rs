use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;
use pugdoc_core::EngineKind;
use pugdoc_core::PugdocConfig;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Generate JSON documentation from doc blocks embedded in pug templates.",
	long_about = "pugdoc scans pug and jade templates for `//- @pugdoc` doc blocks, decodes their \
	              metadata, renders every example in isolation and prints one JSON record per \
	              block.\n\nA doc block is the marker line, an indented annotation and the code \
	              that follows it:\n\n  //- @pugdoc\n    name: button\n    examples:\n      - \
	              +button('Save')\n  mixin button(label)\n    button= label\n\nSettings are read \
	              from pugdoc.toml in the project root. Command line flags win over the file.\n\nThe \
	              default `jinja` engine renders examples with minijinja and leaves pug markup \
	              unrendered. Pass `--engine command` (pug-cli) to render pug."
)]
#[allow(clippy::struct_excessive_bools)]
pub struct PugdocCli {
	/// Glob patterns of templates to scan, relative to the project root.
	/// Replaces `input` from pugdoc.toml.
	pub input: Vec<String>,

	/// Path to the project root directory.
	#[arg(long, short)]
	pub path: Option<PathBuf>,

	/// Write the JSON array to this file instead of stdout.
	#[arg(long, short)]
	pub output: Option<PathBuf>,

	/// Do not print documents or the run summary. Diagnostics are still
	/// reported on stderr.
	#[arg(long, short, default_value_t = false)]
	pub silent: bool,

	/// Keyword following `//-` on doc marker lines.
	#[arg(long, short)]
	pub keyword: Option<String>,

	/// Template engine used to render examples. The default, `jinja`, does
	/// not understand pug syntax; use `command` with pug-cli installed to
	/// render pug.
	#[arg(long, value_enum)]
	pub engine: Option<EngineArg>,

	/// Number of worker threads processing files.
	#[arg(long, short)]
	pub jobs: Option<usize>,

	/// Watch for file changes and regenerate automatically.
	#[arg(long, short, default_value_t = false)]
	pub watch: bool,

	/// Enable verbose output.
	#[arg(long, short, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, default_value_t = false)]
	pub no_color: bool,
}

impl PugdocCli {
	/// Apply command line overrides on top of a loaded config.
	pub fn apply_to(&self, config: &mut PugdocConfig) {
		if !self.input.is_empty() {
			config.input.clone_from(&self.input);
		}

		if let Some(keyword) = &self.keyword {
			config.keyword.clone_from(keyword);
		}

		if let Some(jobs) = self.jobs {
			config.jobs = jobs.max(1);
		}

		if let Some(engine) = self.engine {
			config.engine.kind = engine.into();
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
	/// Render examples in-process with minijinja. Pug syntax is passed
	/// through unrendered.
	Jinja,
	/// Pipe examples through an external compiler, `pug` by default. Set
	/// `[engine] program` in pugdoc.toml to use another program.
	Command,
}

impl From<EngineArg> for EngineKind {
	fn from(engine: EngineArg) -> Self {
		match engine {
			EngineArg::Jinja => Self::Jinja,
			EngineArg::Command => Self::Command,
		}
	}
}
