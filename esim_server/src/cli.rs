use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 16] = [
        "RUST_LOG",
        "ESIM_HOST",
        "ESIM_PORT",
        "ESIM_DATABASE_URL",
        "ESIM_CATALOG_SYNC_INTERVAL",
        "ESIM_ORDER_POLL_INTERVAL",
        "ESIM_USAGE_NOTIFY_INTERVAL",
        "ESIM_ORDER_GRACE_PERIOD",
        "ESIM_ORDER_MAX_RETRIES",
        "ESIM_ADAPTER_TIMEOUT",
        "ESIM_DISABLE_SCHEDULERS",
        "ESIM_AIRALO_BASE_URL",
        "ESIM_AIRALO_CLIENT_ID",
        "ESIM_STRIPE_BASE_URL",
        "ESIM_FCM_BASE_URL",
        "ESIM_FCM_PROJECT_ID",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
