mod common;

use clap::Parser;
use pugdoc_cli::EngineArg;
use pugdoc_cli::PugdocCli;
use pugdoc_core::AnyEmptyResult;
use pugdoc_core::EngineKind;
use pugdoc_core::PugdocConfig;

const BLOCK: &str = "//- @pugdoc\n  name: greeting\n<p>{{ greeting }}</p>\n";

#[test]
fn reads_dot_pugdoc_toml() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("greeting.pug"), BLOCK)?;
	std::fs::write(tmp.path().join(".pugdoc.toml"), "[locals]\ngreeting = \"hidden\"\n")?;

	common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("<p>hidden</p>"));

	Ok(())
}

#[test]
fn reads_dot_config_pugdoc_toml() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join(".config"))?;
	std::fs::write(tmp.path().join("greeting.pug"), BLOCK)?;
	std::fs::write(
		tmp.path().join(".config/pugdoc.toml"),
		"[locals]\ngreeting = \"nested\"\n",
	)?;

	common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("<p>nested</p>"));

	Ok(())
}

#[test]
fn prefers_pugdoc_toml_over_other_candidates() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join(".config"))?;
	std::fs::write(tmp.path().join("greeting.pug"), BLOCK)?;
	std::fs::write(tmp.path().join("pugdoc.toml"), "[locals]\ngreeting = \"root\"\n")?;
	std::fs::write(tmp.path().join(".pugdoc.toml"), "[locals]\ngreeting = \"hidden\"\n")?;
	std::fs::write(
		tmp.path().join(".config/pugdoc.toml"),
		"[locals]\ngreeting = \"nested\"\n",
	)?;

	common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.arg("--verbose")
		.assert()
		.success()
		.stdout(predicates::str::contains("<p>root</p>"))
		.stderr(predicates::str::contains("Using config"));

	Ok(())
}

#[test]
fn inline_locals_win_over_locals_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("card.pug"),
		"//- @pugdoc\n  name: card\n<h1>{{ title }}</h1><p>{{ greeting }}</p>\n",
	)?;
	std::fs::write(
		tmp.path().join("locals.json"),
		"{\"title\": \"From file\", \"greeting\": \"file\"}",
	)?;
	std::fs::write(
		tmp.path().join("pugdoc.toml"),
		"locals_file = \"locals.json\"\n\n[locals]\ngreeting = \"inline\"\n",
	)?;

	common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("<h1>From file</h1><p>inline</p>"));

	Ok(())
}

#[test]
fn missing_locals_file_fails_the_run() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("pugdoc.toml"), "locals_file = \"missing.yaml\"\n")?;

	common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("failed to load locals file"));

	Ok(())
}

#[test]
fn flags_override_config_values() {
	let cli = PugdocCli::parse_from([
		"pugdoc",
		"src/**/*.pug",
		"--keyword",
		"@doc",
		"--jobs",
		"0",
		"--engine",
		"command",
	]);
	let mut config = PugdocConfig::default();
	cli.apply_to(&mut config);

	assert_eq!(config.input, vec!["src/**/*.pug"]);
	assert_eq!(config.keyword, "@doc");
	assert_eq!(config.jobs, 1);
	assert_eq!(config.engine.kind, EngineKind::Command);
}

#[test]
fn defaults_leave_config_untouched() {
	let cli = PugdocCli::parse_from(["pugdoc"]);
	let mut config = PugdocConfig::default();
	cli.apply_to(&mut config);

	assert!(!cli.watch);
	assert!(!cli.silent);
	assert_eq!(cli.engine, None::<EngineArg>);
	assert_eq!(config.input, vec!["**/*.pug", "**/*.jade"]);
	assert_eq!(config.engine.kind, EngineKind::Jinja);
}
