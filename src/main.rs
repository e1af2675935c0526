mod app;
mod cli;
mod hooks;
mod layout;
mod locks;
mod logging;
mod manifest;
mod ollama;
mod provision;
mod settings;
mod ui;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), app::AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

fn run() -> Result<(), app::AppError> {
    use clap::Parser;
    use cli::Commands;

    let cli = cli::Cli::parse();
    logging::init(cli.verbose);
    let config_dir = cli.config_dir.as_deref();

    match cli.command {
        Commands::Install(args) => {
            let options = app::InstallOptions {
                layout: app::resolve_layout(args.scope.project.as_deref(), config_dir)?,
                source: args.source,
                focus: args.focus.focus(),
                dry_run: args.dry_run,
                probe_ollama: !args.no_ollama,
            };
            app::run_install(&options, &mut ui::Progress::stdout())?;
        }
        Commands::Uninstall(args) => {
            let options = app::UninstallOptions {
                layout: app::resolve_layout(args.scope.project.as_deref(), config_dir)?,
                focus: args.focus.focus(),
                complete: args.complete,
                dry_run: args.dry_run,
            };
            app::run_uninstall(&options, &mut ui::Progress::stdout())?;
        }
        Commands::Status(args) => {
            let layout = app::resolve_layout(args.scope.project.as_deref(), config_dir)?;
            let report = app::collect_status(&layout, !args.no_ollama)?;
            if args.json {
                print_json(&report)?;
            } else {
                app::print_status(&report, &mut ui::Progress::stdout())?;
            }
        }
    }
    Ok(())
}
