use idfexp::cli;
use idfexp::config::Settings;
use idfexp::logging;
use idfexp::script::Interpreter;

fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("idfexp: {e}");
            eprintln!("{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    // ── Settings: file first, then command-line flags ─────────────────────────
    let (mut settings, config_errors) = match &args.config {
        Some(path) => match Settings::load_file(path) {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("idfexp: cannot read settings {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => (Settings::new(), Vec::new()),
    };
    args.apply(&mut settings);

    logging::init(settings.debug);
    for e in &config_errors {
        tracing::warn!("settings: {e}");
    }

    // ── Run ───────────────────────────────────────────────────────────────────
    let mut interp = Interpreter::new(settings);
    match interp.run_file(&args.script) {
        Ok(_) => {}
        Err(e) if e.is_quiet_abort() => eprintln!("idfexp: {e}"),
        Err(e) => {
            eprintln!("idfexp: {e}");
            std::process::exit(1);
        }
    }
}
