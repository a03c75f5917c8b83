fn main() {
    #[cfg(feature = "cli")]
    bagunpack::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("bagunpack: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
