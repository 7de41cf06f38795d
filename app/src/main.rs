use callout_wizard::models::selection::Side;
use callout_wizard::storage::CalloutQuery;

const USAGE: &str = "Usage: callout-wizard [--tui-smoke[=<step>]] [--list [--map <id>] [--hero <id>] [--side attack|defense]]";

/// Value of `--name <value>` or `--name=<value>`.
fn flag_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    args.iter().enumerate().find_map(|(i, a)| {
        if a == name {
            args.get(i + 1).filter(|v| !v.starts_with("--")).cloned()
        } else {
            a.strip_prefix(prefix.as_str()).map(str::to_string)
        }
    })
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return;
    }

    // Non-interactive TUI smoke test mode (for automated checks).
    // Renders a single frame for a specific step and exits 0.
    // Usage: --tui-smoke or --tui-smoke=map|hero|side|ability|details|invalid|cancel|browse
    if let Some(arg) = args
        .iter()
        .find(|a| a.as_str() == "--tui-smoke" || a.starts_with("--tui-smoke="))
    {
        let target = arg
            .split_once('=')
            .map(|(_, v)| v.to_string())
            .filter(|v| !v.trim().is_empty());
        callout_wizard::run_tui_smoke(target);
        return;
    }

    // Browse saved callouts.
    if args.iter().any(|a| a == "--list") {
        let side = match flag_value(&args, "--side") {
            Some(raw) => match Side::parse(&raw) {
                Some(s) => Some(s),
                None => {
                    eprintln!("Unknown side '{}' (expected attack or defense).", raw);
                    eprintln!("{}", USAGE);
                    std::process::exit(2);
                }
            },
            None => None,
        };
        callout_wizard::run_list(CalloutQuery {
            map: flag_value(&args, "--map"),
            hero: flag_value(&args, "--hero"),
            side,
        });
        return;
    }

    callout_wizard::run_tui();
}
