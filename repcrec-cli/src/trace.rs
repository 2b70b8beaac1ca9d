use std::str::FromStr;

use anyhow::Result;
use log::LevelFilter;

/// Wires the `log` facade to a file under `dir` plus a stderr sink for
/// warnings. The engine library logs through the facade; nothing here touches
/// stdout, which belongs to the command output.
pub fn init_logging(dir: &str, level: &str) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let dispatch_file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] - {} - [{}] {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::from_str(level)?)
        .chain(fern::log_file(format!("{}/repcli.log", dir))?);

    let dispatch_stderr = fern::Dispatch::new()
        .level(LevelFilter::Warn)
        .format(|out, message, _| {
            out.finish(format_args!(
                "\x1B[{}m{}\x1B[0m",
                fern::colors::Color::Yellow.to_fg_str(),
                message
            ))
        })
        .chain(std::io::stderr());

    if fern::Dispatch::new()
        .chain(dispatch_file)
        .chain(dispatch_stderr)
        .apply()
        .is_err()
    {
        eprintln!("logger has already been set");
    }

    Ok(())
}
