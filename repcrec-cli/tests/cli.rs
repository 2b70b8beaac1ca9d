
#[cfg(test)]
mod test {
    use assert_cmd::prelude::*;
    use assert_fs::prelude::*;
    use predicates::prelude::*;
    use std::process::Command;

    fn repcli(log_dir: &std::path::Path) -> Result<Command, Box<dyn std::error::Error>> {
        let mut cmd = Command::cargo_bin("repcli")?;
        cmd.arg("--log-dir").arg(log_dir);
        Ok(cmd)
    }

    #[test]
    fn script_file_runs_to_commit() -> Result<(), Box<dyn std::error::Error>> {
        let logs = tempfile::tempdir()?;
        let file = assert_fs::NamedTempFile::new("single_commit.txt")?;
        file.write_str(
            "// comments and blank lines consume no tick\n\nbegin(T1)\nW(T1, x1, 101)\nend(T1)\ndump()\n",
        )?;

        let mut cmd = repcli(logs.path())?;
        cmd.arg(file.path());
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("T1 begins at time 1"))
            .stdout(predicate::str::contains("T1 wrote x1=101 to sites 2"))
            .stdout(predicate::str::contains("T1 committed at time 3"))
            .stdout(predicate::str::contains("2: x1:101"));

        Ok(())
    }

    #[test]
    fn unknown_command_terminates() -> Result<(), Box<dyn std::error::Error>> {
        let logs = tempfile::tempdir()?;
        let file = assert_fs::NamedTempFile::new("bad.txt")?;
        file.write_str("begin(T1)\nfrobnicate(2)\nend(T1)\n")?;

        let mut cmd = repcli(logs.path())?;
        cmd.arg(file.path());
        cmd.assert()
            .failure()
            .stdout(predicate::str::contains("T1 begins at time 1"))
            .stderr(predicate::str::contains("unknown command"));

        Ok(())
    }

    #[test]
    fn inline_query_with_quiet_skips_echo() -> Result<(), Box<dyn std::error::Error>> {
        let logs = tempfile::tempdir()?;
        let mut cmd = repcli(logs.path())?;
        cmd.arg("--quiet").arg("-e=begin(T1)");
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("T1 begins at time 1"))
            .stdout(predicate::str::contains("begin(T1)").not());

        Ok(())
    }

    #[test]
    fn failure_and_recovery_flow() -> Result<(), Box<dyn std::error::Error>> {
        let logs = tempfile::tempdir()?;
        let file = assert_fs::NamedTempFile::new("recovery.txt")?;
        file.write_str(
            "fail(2)\nbegin(T1)\nW(T1, x2, 200)\nend(T1)\nrecover(2)\ndump()\n",
        )?;

        let mut cmd = repcli(logs.path())?;
        cmd.arg(file.path());
        cmd.assert()
            .success()
            .stdout(predicate::str::contains("site 2 failed"))
            .stdout(predicate::str::contains(
                "T1 wrote x2=200 to sites 1,3,4,5,6,7,8,9,10",
            ))
            .stdout(predicate::str::contains("site 2 recovered"))
            // Site 2 missed the write and still reports the old committed value.
            .stdout(predicate::str::contains("2: x1:10, x2:20"));

        Ok(())
    }

    #[test]
    fn script_path_doesnt_exist() -> Result<(), Box<dyn std::error::Error>> {
        let logs = tempfile::tempdir()?;
        let mut cmd = repcli(logs.path())?;
        cmd.arg("script/file/doesnt/exist");
        cmd.assert()
            .failure()
            .stderr(predicate::str::contains("cannot open script"));

        Ok(())
    }
}
