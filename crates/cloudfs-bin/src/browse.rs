use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use cloudfs_core::browser::{Applied, BrowserPhase, DirectoryBrowser, RetryPolicy};
use cloudfs_platform::storage::{CloudStorage, Scope};

const HELP: &str = "commands: cd <name> | scope <visible|hidden> | retry | ls | help | quit";

/// Interactive browser over stdin. Listings print as they arrive.
pub async fn run_browse(storage: Arc<dyn CloudStorage>, retry: RetryPolicy, scope: Scope) -> Result<()> {
    let mut browser = DirectoryBrowser::new(storage, retry, scope);
    browser.initialize(scope);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);

    loop {
        tokio::select! {
            outcome = browser.next_outcome() => {
                match browser.apply(outcome) {
                    Applied::Loaded => print_listing(&browser),
                    Applied::Failed => print_phase(&browser),
                    Applied::Stale => {}
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !handle_command(&mut browser, line.trim()) {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, leaving browser");
                break;
            }
        }
    }

    Ok(())
}

/// Returns false when the user asked to quit
fn handle_command(browser: &mut DirectoryBrowser, line: &str) -> bool {
    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    };

    match cmd {
        "" => {}
        "cd" if !arg.is_empty() => {
            if let Err(e) = browser.on_directory_selected(arg) {
                println!("{}", e);
            }
        }
        "scope" => match arg.parse::<Scope>() {
            Ok(scope) => {
                if browser.on_scope_changed(scope).is_none() {
                    println!("scope: {}", browser.scope());
                }
            }
            Err(e) => println!("{}", e),
        },
        "retry" => {
            if let Err(e) = browser.retry() {
                println!("{}", e);
            }
        }
        "ls" => print_phase(browser),
        "help" => println!("{}", HELP),
        "quit" | "exit" | "q" => return false,
        other => {
            warn!("unknown command {:?}", other);
            println!("{}", HELP);
        }
    }
    true
}

pub fn print_listing(browser: &DirectoryBrowser) {
    let Some(rows) = browser.rows() else {
        println!("(loading)");
        return;
    };
    println!("{} [{}]", browser.current_path(), browser.scope());
    for row in rows {
        println!("  {}", row);
    }
}

fn print_phase(browser: &DirectoryBrowser) {
    match browser.phase() {
        BrowserPhase::Idle => println!("(nothing listed yet)"),
        BrowserPhase::Loading { path, .. } => println!("(loading {})", path),
        BrowserPhase::Loaded => print_listing(browser),
        BrowserPhase::Failed { path, error } => {
            println!("listing {} failed: {}", path, error);
            println!("type `retry` to try again");
        }
    }
}
