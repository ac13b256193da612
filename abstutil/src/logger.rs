/// Intercept messages using the `log` crate and print them to STDERR. Defaults to `info`, but
/// `RUST_LOG` overrides that.
pub fn setup() {
    use env_logger::{Builder, Env};
    // Tests and multiple entry points may call this more than once; only the first wins.
    let _ = Builder::from_env(Env::default().default_filter_or("info")).try_init();
}
