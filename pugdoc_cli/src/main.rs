use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use owo_colors::OwoColorize;
use pugdoc_cli::PugdocCli;
use pugdoc_core::Diagnostic;
use pugdoc_core::DiagnosticKind;
use pugdoc_core::GenerateOptions;
use pugdoc_core::PugdocConfig;
use pugdoc_core::engine_from_config;
use pugdoc_core::generate;
use pugdoc_core::write_documents;
use pugdoc_core::write_documents_to_path;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "PUGDOC_LOG";

static USE_COLOR: AtomicBool = AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = PugdocCli::parse();

	// Respect NO_COLOR env var, --no-color flag and terminal support.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stderr).is_some();
	if !use_color {
		USE_COLOR.store(false, Ordering::Relaxed);
	}

	init_tracing(args.verbose, use_color);

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = if args.watch {
		run_watch(&args)
	} else {
		run_once(&args)
	};

	if let Err(e) = result {
		match e.downcast::<pugdoc_core::PugdocError>() {
			Ok(pugdoc_err) => {
				let report: miette::Report = (*pugdoc_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Logs go to stderr so stdout stays a clean JSON stream. Diagnostics are
/// rendered as reports, so only errors are logged unless asked otherwise.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_filter = if verbose { "debug" } else { "error" };
	let filter =
		EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.init();
}

fn resolve_root(args: &PugdocCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn load_config(args: &PugdocCli, root: &Path) -> Result<PugdocConfig, Box<dyn std::error::Error>> {
	let mut config = PugdocConfig::load_or_default(root)?;
	args.apply_to(&mut config);

	if args.verbose {
		match PugdocConfig::resolve_path(root) {
			Some(path) => eprintln!("Using config {}", path.display()),
			None => eprintln!("No pugdoc.toml found, using defaults"),
		}
	}

	Ok(config)
}

/// Where the JSON array goes. A command line path is taken as given; a
/// configured one is relative to the project root.
fn output_path(args: &PugdocCli, config: &PugdocConfig, root: &Path) -> Option<PathBuf> {
	args.output
		.clone()
		.or_else(|| config.output.as_ref().map(|output| root.join(output)))
}

fn run_once(args: &PugdocCli) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = load_config(args, &root)?;
	let options = GenerateOptions::from_config(&root, &config)?;
	let engine = engine_from_config(&config.engine);

	let result = generate(&options, engine.as_ref())?;

	for diagnostic in &result.diagnostics {
		let report = diagnostic_to_report(diagnostic);
		eprintln!("{report:?}");

		if args.verbose {
			if let DiagnosticKind::Render { meta, .. } = &diagnostic.kind {
				eprintln!("{meta}");
			}
		}
	}

	match output_path(args, &config, &root) {
		Some(path) => {
			write_documents_to_path(&path, &result.documents)?;
			if !args.silent {
				eprintln!(
					"{} wrote {} document(s) to {}",
					colored!("done:", green),
					result.documents.len(),
					path.display()
				);
			}
		}
		None if !args.silent => {
			let stdout = std::io::stdout();
			write_documents(&mut stdout.lock(), &result.documents)?;
		}
		None => {}
	}

	if !args.silent && !result.diagnostics.is_empty() {
		eprintln!(
			"{} {} diagnostic(s) reported",
			colored!("warning:", yellow),
			result.diagnostics.len()
		);
	}

	Ok(())
}

fn run_watch(args: &PugdocCli) -> Result<(), Box<dyn std::error::Error>> {
	// The initial run must succeed, later runs only report their errors.
	run_once(args)?;

	let root = resolve_root(args);
	let config = load_config(args, &root)?;
	let output = output_path(args, &config, &root);

	eprintln!("\nWatching for file changes... (press Ctrl+C to stop)");

	let (tx, rx) = mpsc::channel();

	let mut watcher =
		notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
			let Ok(event) = res else {
				return;
			};

			if !matches!(
				event.kind,
				notify::EventKind::Modify(_)
					| notify::EventKind::Create(_)
					| notify::EventKind::Remove(_)
			) {
				return;
			}

			// Writing the output file must not trigger another run.
			let is_output = |path: &PathBuf| output.as_ref().is_some_and(|output| path.ends_with(output));
			if !event.paths.iter().all(is_output) {
				tracing::debug!(paths = ?event.paths, "file change");
				let _ = tx.send(());
			}
		})?;

	use notify::Watcher;
	watcher.watch(&root, notify::RecursiveMode::Recursive)?;

	loop {
		rx.recv()?;
		// Debounce: drain additional events within 200ms.
		while rx.recv_timeout(Duration::from_millis(200)).is_ok() {}

		eprintln!("\nFile change detected, regenerating...");
		if let Err(e) = run_once(args) {
			eprintln!("{} {e}", colored!("error:", red));
		}
	}
}

/// Convert a generation `Diagnostic` into a warning `miette::Report` with an
/// error code and help text.
fn diagnostic_to_report(diagnostic: &Diagnostic) -> miette::Report {
	let message = format!("[{}] {}", diagnostic.location(), diagnostic.message());

	let help: Option<String> = match &diagnostic.kind {
		DiagnosticKind::DuplicateName { name, .. } => {
			Some(format!(
				"both `{name}` blocks are kept in the output; rename one to tell them apart"
			))
		}
		DiagnosticKind::MetadataParse { .. } => {
			Some("the block was skipped; check the indentation of its annotation".to_string())
		}
		DiagnosticKind::Render { excerpt, .. } => excerpt.clone(),
		DiagnosticKind::NestingTooDeep { .. } => {
			Some("examples inside an override object must be template source".to_string())
		}
		DiagnosticKind::InvalidParameter { .. } => {
			Some("parameters follow the form `{Type} name - description`".to_string())
		}
		DiagnosticKind::InvalidCapture { .. } => {
			Some("use `capture: all`, `capture: section` or a positive number".to_string())
		}
		DiagnosticKind::FileTooLarge { .. } => {
			Some("increase `max_file_size` in pugdoc.toml or exclude this file".to_string())
		}
		_ => None,
	};

	let code = match &diagnostic.kind {
		DiagnosticKind::DuplicateName { .. } => "pugdoc::duplicate_name",
		DiagnosticKind::MetadataParse { .. } => "pugdoc::metadata_parse",
		DiagnosticKind::Render { .. } => "pugdoc::render",
		DiagnosticKind::NestingTooDeep { .. } => "pugdoc::nesting_too_deep",
		DiagnosticKind::InvalidParameter { .. } => "pugdoc::invalid_parameter",
		DiagnosticKind::InvalidCapture { .. } => "pugdoc::invalid_capture",
		DiagnosticKind::FileTooLarge { .. } => "pugdoc::file_too_large",
		_ => "pugdoc::diagnostic",
	};

	let mut report = miette::MietteDiagnostic::new(message)
		.with_code(code)
		.with_severity(miette::Severity::Warning);
	if let Some(help) = help {
		report = report.with_help(help);
	}

	miette::Report::new(report)
}
