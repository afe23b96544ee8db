// Logging setup for the runner binary
// The library only talks to the `log` facade; nothing on the audio path logs.

/// Initialize the logger at INFO level.
/// The RUST_LOG environment variable overrides the default level.
/// Calling it twice is harmless.
pub fn init_logger() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {:5} {}] {}",
                buf.timestamp(),
                record.level(),
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        })
        .try_init();
}
