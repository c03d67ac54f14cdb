//!
//! talentgate CLI binary
//! ---------------------
//! Signs in against the contest REST backend, keeps the bearer token on disk
//! between runs, and exercises the session, route guard and polling layers.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use talentgate::cli;
use talentgate::client::ContestClient;
use talentgate::config::ClientConfig;
use talentgate::identity::{nav_links, post_login_redirect, role_label, Session};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} <command> [args]\n\nCommands:\n  login <email> <password>   sign in and store the token\n  whoami                     show the current identity\n  logout                     end the session and forget the token\n  guard <path> [role...]     decide whether <path> may render for the current session\n  redirect [from]            where the login flow sends the current user\n  notifications              list notifications and unread counters\n  rooms                      list chat rooms, most recent first\n  watch [seconds]            poll notifications and re-validate the session (default 60s)\n  help                       show this help\n\nEnvironment:\n  TALENTGATE_CONFIG          optional JSON config file\n  TALENTGATE_API_URL         backend base URL (default http://localhost:8000)\n  TALENTGATE_TOKEN_PATH      token file (default .talentgate/token)\n  TALENTGATE_POLL_MS         poll period in milliseconds (default 30000)\n  RUST_LOG                   log filter (default info)"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays clean on stdout.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "talentgate".to_string());
    let Some(command) = args.get(1).map(String::as_str) else {
        print_usage(&program);
        bail!("missing command");
    };
    if matches!(command, "help" | "-h" | "--help") {
        print_usage(&program);
        return Ok(());
    }
    let rest = &args[2..];

    let config = ClientConfig::load().context("loading configuration")?;
    let client = ContestClient::new(config).context("building client")?;

    match command {
        "login" => login(&client, rest).await,
        "whoami" => whoami(&client).await,
        "logout" => {
            client.auth.logout().await;
            println!("logged out");
            Ok(())
        }
        "guard" => guard(&client, rest).await,
        "redirect" => redirect(&client, rest).await,
        "notifications" => notifications(&client).await,
        "rooms" => rooms(&client).await,
        "watch" => watch(&client, rest).await,
        other => {
            print_usage(&program);
            Err(anyhow!("unknown command: {}", other))
        }
    }
}

async fn login(client: &ContestClient, args: &[String]) -> Result<()> {
    let (Some(email), Some(password)) = (args.first(), args.get(1)) else {
        bail!("usage: login <email> <password>");
    };
    let identity = client.auth.login(email, password).await.map_err(|e| anyhow!(e.message().to_string()))?;
    let session = client.sessions.get_session();
    println!("signed in as {} ({})", identity.display_name, role_label(&session));
    let to = post_login_redirect(&session, None, &client.config.routes);
    println!("home: {}", to.to);
    Ok(())
}

async fn whoami(client: &ContestClient) -> Result<()> {
    match client.auth.check_auth().await {
        Session::Authenticated(identity) => {
            cli::print_identity(&identity);
            let links: Vec<&str> = nav_links(&client.sessions.get_session()).iter().map(|l| l.path).collect();
            println!("navigation: {}", links.join(" "));
        }
        _ if client.sessions.token().is_some() => println!("not signed in (backend unreachable, token kept)"),
        _ => println!("not signed in"),
    }
    Ok(())
}

async fn guard(client: &ContestClient, args: &[String]) -> Result<()> {
    let Some(path) = args.first() else { bail!("usage: guard <path> [role...]"); };
    client.auth.check_auth().await;
    let decision = client.guard(path, &args[1..]);
    cli::print_decision(&decision);
    Ok(())
}

async fn redirect(client: &ContestClient, args: &[String]) -> Result<()> {
    let session = client.auth.check_auth().await;
    let to = post_login_redirect(&session, args.first().map(String::as_str), &client.config.routes);
    println!("{}", to.to);
    Ok(())
}

async fn require_session(client: &ContestClient) -> Result<()> {
    if client.auth.check_auth().await.is_authenticated() {
        Ok(())
    } else {
        Err(anyhow!("not signed in; run `login <email> <password>` first"))
    }
}

async fn notifications(client: &ContestClient) -> Result<()> {
    require_session(client).await?;
    client.notifications.refresh().await.context("fetching notifications")?;
    cli::print_notifications(&client.notifications.state());
    Ok(())
}

async fn rooms(client: &ContestClient) -> Result<()> {
    require_session(client).await?;
    let rooms = client.chat.list_rooms().await.context("fetching chat rooms")?;
    cli::print_rooms(&rooms);
    Ok(())
}

async fn watch(client: &ContestClient, args: &[String]) -> Result<()> {
    let secs: u64 = match args.first() {
        Some(s) => s.parse().with_context(|| format!("invalid seconds: {}", s))?,
        None => 60,
    };
    require_session(client).await?;
    let period = client.config.poll_interval();
    info!(target: "talentgate", "watching for {}s, poll period {:?}", secs, period);

    let mut updates = client.notifications.subscribe();
    let mut sessions = client.sessions.subscribe();
    let auth = client.auth.clone();
    let notifier = client.notifications.start(period);
    let revalidate = talentgate::poller::spawn_poller("session_refresh", period, move || {
        let auth = auth.clone();
        async move {
            auth.refresh().await;
        }
    });

    let deadline = tokio::time::sleep(Duration::from_secs(secs));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() { break; }
                let state = updates.borrow_and_update().clone();
                println!(
                    "unread notifications: {}, unread messages: {}",
                    state.unread_notifications, state.unread_messages
                );
            }
            changed = sessions.changed() => {
                if changed.is_err() { break; }
                if !sessions.borrow_and_update().is_authenticated() {
                    warn!(target: "talentgate", "session ended while watching");
                    break;
                }
            }
        }
    }
    info!(target: "talentgate", "notifications polled {} times", notifier.runs());
    notifier.stop();
    revalidate.stop();
    Ok(())
}
