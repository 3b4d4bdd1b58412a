use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn pugdoc_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("pugdoc"));
	cmd.env("NO_COLOR", "1").env_remove("PUGDOC_LOG");
	cmd
}
