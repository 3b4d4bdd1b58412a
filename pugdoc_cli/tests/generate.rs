mod common;

use predicates::prelude::PredicateBooleanExt;
use pugdoc_core::AnyEmptyResult;
use serde_json::Value;

const BUTTON: &str = "//- @pugdoc\n  name: button\n  description: A call to action\n  arguments:\n    - {string} label - the button text\n  examples:\n    - \"<button>{{ label }}</button>\"\n<button>{{ label }}</button>\n";

fn stdout_json(output: &std::process::Output) -> Value {
	serde_json::from_slice(&output.stdout).unwrap_or_else(|e| panic!("stdout is not JSON: {e}"))
}

#[test]
fn prints_documents_as_json() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("button.pug"), BUTTON)?;
	std::fs::write(tmp.path().join("pugdoc.toml"), "[locals]\nlabel = \"Save\"\n")?;

	let assert = common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();
	let json = stdout_json(assert.get_output());

	assert_eq!(json[0]["file"], "button.pug");
	assert_eq!(json[0]["meta"]["name"], "button");
	assert_eq!(json[0]["meta"]["arguments"][0]["type"], "string");
	assert_eq!(json[0]["meta"]["arguments"][0]["name"], "label");
	assert_eq!(json[0]["output"], "<button>Save</button>");

	Ok(())
}

#[test]
fn empty_project_prints_empty_array() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("plain.pug"), "p no doc blocks here\n")?;

	common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout("[]\n");

	Ok(())
}

#[test]
fn writes_output_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("button.pug"), BUTTON)?;
	let output = tmp.path().join("dist/docs.json");

	common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.arg("--output")
		.arg(&output)
		.assert()
		.success()
		.stdout(predicates::str::is_empty())
		.stderr(predicates::str::contains("wrote 1 document(s)"));

	let json: Value = serde_json::from_str(&std::fs::read_to_string(&output)?)?;
	assert_eq!(json.as_array().map(Vec::len), Some(1));

	Ok(())
}

#[test]
fn configured_output_is_relative_to_root() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("button.pug"), BUTTON)?;
	std::fs::write(tmp.path().join("pugdoc.toml"), "output = \"out/docs.json\"\n")?;

	common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.arg("--silent")
		.assert()
		.success()
		.stdout(predicates::str::is_empty())
		.stderr(predicates::str::contains("wrote").not());

	assert!(tmp.path().join("out/docs.json").is_file());

	Ok(())
}

#[test]
fn silent_suppresses_stdout() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("button.pug"), BUTTON)?;

	common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.arg("--silent")
		.assert()
		.success()
		.stdout(predicates::str::is_empty());

	Ok(())
}

#[test]
fn render_failures_are_warnings() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("broken.pug"),
		"//- @pugdoc\n  name: broken\n  examples:\n    - \"{{ missing.attr }}\"\n    - \"<b>ok</b>\"\n<p>code</p>\n",
	)?;

	let assert = common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stderr(predicates::str::contains("failed to render"))
		.stderr(predicates::str::contains("pugdoc::render"));
	let json = stdout_json(assert.get_output());

	assert_eq!(json[0]["output"], "<b>ok</b>");

	Ok(())
}

#[test]
fn duplicate_names_keep_both_documents() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("a.pug"), "//- @pugdoc\n  name: foo\np a\n")?;
	std::fs::write(tmp.path().join("b.pug"), "//- @pugdoc\n  name: foo\np b\n")?;

	let assert = common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stderr(predicates::str::contains("duplicate doc block name `foo`"))
		.stderr(predicates::str::contains("[b.pug:1]"));
	let json = stdout_json(assert.get_output());

	assert_eq!(json[0]["file"], "a.pug");
	assert_eq!(json[1]["file"], "b.pug");

	Ok(())
}

#[test]
fn missing_name_fails_the_run() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("nameless.pug"),
		"//- @pugdoc\n  description: no name\np x\n",
	)?;

	common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stdout(predicates::str::is_empty())
		.stderr(predicates::str::contains("required key `name`"));

	Ok(())
}

#[test]
fn invalid_config_fails_the_run() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("pugdoc.toml"), "jobs = \"many\"\n")?;

	common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("failed to parse config file"));

	Ok(())
}

#[test]
fn input_globs_override_config() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join("components"))?;
	std::fs::write(
		tmp.path().join("components/card.pug"),
		"//- @pugdoc\n  name: card\np card\n",
	)?;
	std::fs::write(tmp.path().join("page.pug"), "//- @pugdoc\n  name: page\np page\n")?;

	let assert = common::pugdoc_cmd()
		.arg("components/*.pug")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();
	let json = stdout_json(assert.get_output());

	assert_eq!(json.as_array().map(Vec::len), Some(1));
	assert_eq!(json[0]["meta"]["name"], "card");

	Ok(())
}

#[test]
fn keyword_flag_overrides_config() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("pugdoc.toml"), "keyword = \"@doc\"\n")?;
	std::fs::write(
		tmp.path().join("mixed.pug"),
		"//- @doc\n  name: configured\np a\n//- @styleguide\n  name: flagged\np b\n",
	)?;

	let assert = common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();
	assert_eq!(stdout_json(assert.get_output())[0]["meta"]["name"], "configured");

	let assert = common::pugdoc_cmd()
		.arg("--path")
		.arg(tmp.path())
		.arg("--keyword")
		.arg("@styleguide")
		.assert()
		.success();
	let json = stdout_json(assert.get_output());
	assert_eq!(json.as_array().map(Vec::len), Some(1));
	assert_eq!(json[0]["meta"]["name"], "flagged");

	Ok(())
}

#[test]
fn help_explains_the_default_engine() {
	common::pugdoc_cmd()
		.arg("--help")
		.assert()
		.success()
		.stdout(predicates::str::contains("does not understand pug syntax"))
		.stdout(predicates::str::contains("--engine command"));
}
