//! Local development launcher
//!
//! Runs the server, exposes it through an ngrok tunnel and points the
//! account's WhatsApp numbers at the tunnel.

use std::ffi::OsStr;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bt_core::{Config, DevConfig, Store};
use bt_whatsapp::webhook::public_url;
use bt_whatsapp::{TwilioClient, WEBHOOK_PATH, WhatsAppBot};
use nu_ansi_term::{Color, Style};
use serde::Deserialize;
use tokio::process::{Child, Command};

const HOST_FILE: &str = "ngrok_host.txt";
const URL_FILE: &str = "ngrok_url.txt";
const NGROK_PATTERN: &str = "ngrok http";
const NGROK_DOWNLOAD_URL: &str = "https://ngrok.com/download";
const SANDBOX_CONSOLE_URL: &str = "https://www.twilio.com/console/sms/whatsapp/sandbox";

/// Successive ports tried when the configured one stays busy
pub const PORT_SCAN_ATTEMPTS: u16 = 10;

#[derive(Clone, Copy)]
enum Status {
    Ok,
    Info,
    Warn,
    Fail,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Ok => "[ok]",
            Status::Info => "[..]",
            Status::Warn => "[!!]",
            Status::Fail => "[xx]",
        }
    }

    fn style(self) -> Style {
        match self {
            Status::Ok => Color::Green.bold(),
            Status::Info => Color::Cyan.normal(),
            Status::Warn => Color::Yellow.bold(),
            Status::Fail => Color::Red.bold(),
        }
    }
}

fn report(status: Status, message: impl Display) {
    println!("{} {}", status.style().paint(status.label()), message);
}

fn print_banner() {
    let rule = "=".repeat(80);
    println!();
    println!("{}", rule);
    println!(
        "{}",
        Color::Cyan
            .bold()
            .paint(format!("{:^80}", "BREADERS TWILIO BOT - DEVELOPMENT ENVIRONMENT"))
    );
    println!("{}", rule);
    println!();
    println!("This launcher sets up a local environment for the WhatsApp bot:");
    println!("  1. Applies the database migrations");
    println!("  2. Starts the webhook server");
    println!("  3. Opens an ngrok tunnel to expose it to the Internet");
    println!("  4. Points the Twilio WhatsApp webhooks at the tunnel when possible");
    println!();
    println!("Commands:");
    println!("  bt-gateway dev       Start the development environment");
    println!("  bt-gateway --stop    Stop every process it started");
    println!();
    println!("Press Ctrl+C to stop all processes");
    println!("{}", rule);
    println!();
}

/// Locate `name` in the directories of a `PATH`-style list
pub fn find_in_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    if name.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(name);
        return path.is_file().then_some(path);
    }
    std::env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn find_executable(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    find_in_path(name, &path_var)
}

/// One line of the environment report
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl Diagnostic {
    fn new(name: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok,
            detail: detail.into(),
        }
    }
}

/// Tools and credentials the launcher relies on
pub fn diagnostics(config: &Config) -> Vec<Diagnostic> {
    let twilio = &config.twilio;
    let tool = |name: &'static str, bin: &str, missing: &str| match find_executable(bin) {
        Some(path) => Diagnostic::new(name, true, path.display().to_string()),
        None => Diagnostic::new(name, false, missing),
    };

    let mut items = vec![
        tool(
            "ngrok",
            &config.dev.ngrok_bin,
            &format!("not found, install it from {}", NGROK_DOWNLOAD_URL),
        ),
        tool("lsof", "lsof", "not found, busy ports cannot be freed"),
        Diagnostic::new(
            "Twilio credentials",
            twilio.has_credentials(),
            if twilio.has_credentials() {
                "configured"
            } else {
                "TWILIO_ACCOUNT_SID / TWILIO_AUTH_TOKEN missing"
            },
        ),
        Diagnostic::new(
            "WhatsApp number",
            !twilio.whatsapp_number.is_empty(),
            if twilio.whatsapp_number.is_empty() {
                "TWILIO_WHATSAPP_NUMBER missing"
            } else {
                twilio.whatsapp_number.as_str()
            },
        ),
        Diagnostic::new(
            "AI assistant",
            twilio.assistant_id.is_some(),
            twilio
                .assistant_id
                .as_deref()
                .unwrap_or("TWILIO_ASSISTANT_ID missing, fallback replies only"),
        ),
        Diagnostic::new(
            "Admin API key",
            config.server.secret_key.is_some(),
            if config.server.secret_key.is_some() {
                "configured"
            } else {
                "SECRET_KEY missing, the admin API is open"
            },
        ),
    ];

    if twilio.validate_signature && twilio.auth_token.is_empty() {
        items.push(Diagnostic::new(
            "Signature validation",
            false,
            "enabled without TWILIO_AUTH_TOKEN",
        ));
    }

    items
}

/// Print the environment report
pub fn check(config: &Config) {
    let items = diagnostics(config);
    for item in &items {
        let status = if item.ok { Status::Ok } else { Status::Warn };
        report(status, format!("{}: {}", item.name, item.detail));
    }

    let issues = items.iter().filter(|d| !d.ok).count();
    if issues == 0 {
        report(Status::Ok, "Environment ready");
    } else {
        report(Status::Warn, format!("{} issue(s) found", issues));
    }
}

fn port_in_use(port: u16) -> bool {
    std::net::TcpListener::bind(("0.0.0.0", port)).is_err()
}

/// First port from `start` on that `in_use` reports free, trying `attempts` ports
pub fn scan_ports(start: u16, attempts: u16, in_use: impl Fn(u16) -> bool) -> Option<u16> {
    (0..attempts)
        .map_while(|offset| start.checked_add(offset))
        .find(|port| !in_use(*port))
}

/// PIDs printed one per line by `lsof -t` / `pgrep`
pub fn parse_pids(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

async fn kill_pid(pid: &str) -> bool {
    match Command::new("kill").arg(pid).status().await {
        Ok(status) => status.success(),
        Err(e) => {
            tracing::warn!("Failed to kill {}: {}", pid, e);
            false
        }
    }
}

async fn free_port(port: u16) -> bool {
    let output = match Command::new("lsof")
        .args(["-t", "-i", &format!(":{}", port)])
        .output()
        .await
    {
        Ok(output) if output.status.success() => output,
        Ok(_) => return false,
        Err(e) => {
            report(Status::Warn, format!("Could not run lsof: {}", e));
            return false;
        }
    };

    let pids = parse_pids(&output.stdout);
    if pids.is_empty() {
        return false;
    }
    for pid in &pids {
        report(
            Status::Info,
            format!("Stopping the process on port {} (PID {})", port, pid),
        );
        kill_pid(pid).await;
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    !port_in_use(port)
}

async fn pick_port(preferred: u16) -> anyhow::Result<u16> {
    if !port_in_use(preferred) {
        return Ok(preferred);
    }

    report(Status::Warn, format!("Port {} is already in use", preferred));
    if free_port(preferred).await {
        report(Status::Ok, format!("Port {} freed", preferred));
        return Ok(preferred);
    }

    report(Status::Info, "Looking for an alternative port...");
    let start = preferred
        .checked_add(1)
        .context("No port above the configured one")?;
    let port = scan_ports(start, PORT_SCAN_ATTEMPTS, port_in_use).with_context(|| {
        format!(
            "No free port found after {} attempts",
            PORT_SCAN_ATTEMPTS
        )
    })?;
    report(Status::Ok, format!("Alternative port found: {}", port));
    Ok(port)
}

/// Kill every `ngrok http` process, returning how many were signalled
async fn kill_ngrok() -> usize {
    let output = match Command::new("pgrep")
        .args(["-f", NGROK_PATTERN])
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!("pgrep unavailable: {}", e);
            return 0;
        }
    };

    let mut killed = 0;
    for pid in parse_pids(&output.stdout) {
        report(Status::Info, format!("Stopping ngrok (PID {})", pid));
        if kill_pid(&pid).await {
            killed += 1;
        }
    }
    killed
}

async fn start_ngrok(dev: &DevConfig, port: u16) -> Option<Child> {
    if kill_ngrok().await > 0 {
        report(Status::Warn, "ngrok was already running, the old tunnel was stopped");
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    if find_executable(&dev.ngrok_bin).is_none() {
        report(
            Status::Fail,
            format!("ngrok is not installed. Install it from {}", NGROK_DOWNLOAD_URL),
        );
        return None;
    }

    report(Status::Info, "Starting ngrok tunnel...");
    match Command::new(&dev.ngrok_bin)
        .args(["http", &port.to_string(), "--log=stdout"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => Some(child),
        Err(e) => {
            report(Status::Fail, format!("Failed to start ngrok: {}", e));
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct TunnelList {
    #[serde(default)]
    tunnels: Vec<Tunnel>,
}

#[derive(Debug, Deserialize)]
struct Tunnel {
    #[serde(default)]
    proto: String,
    public_url: String,
}

/// Public URL of the `https` tunnel in an ngrok `/api/tunnels` response
pub fn select_https_tunnel(body: &str) -> serde_json::Result<Option<String>> {
    let list: TunnelList = serde_json::from_str(body)?;
    Ok(list
        .tunnels
        .into_iter()
        .find(|tunnel| tunnel.proto == "https")
        .map(|tunnel| tunnel.public_url))
}

/// Polling schedule for the ngrok local API
#[derive(Debug, Clone)]
pub struct TunnelPoll {
    pub api_url: String,
    pub retries: u32,
    pub initial_wait: Duration,
    pub retry_wait: Duration,
    pub retry_step: Duration,
}

impl TunnelPoll {
    pub fn from_config(dev: &DevConfig) -> Self {
        Self {
            api_url: dev.ngrok_api_url.clone(),
            retries: dev.tunnel_retries,
            initial_wait: Duration::from_secs(dev.tunnel_initial_wait_secs),
            retry_wait: Duration::from_secs(2),
            retry_step: Duration::from_secs(1),
        }
    }

    /// Pause after failed attempt `attempt` (0-based): 2s, 3s, 4s, ...
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_wait + self.retry_step * attempt
    }

    /// Wait for ngrok and return the https tunnel URL, if one shows up
    pub async fn public_url(&self, client: &reqwest::Client) -> Option<String> {
        report(Status::Info, "Waiting for ngrok to start...");
        tokio::time::sleep(self.initial_wait).await;

        for attempt in 0..self.retries {
            report(
                Status::Info,
                format!(
                    "Fetching ngrok tunnel information (attempt {}/{})",
                    attempt + 1,
                    self.retries
                ),
            );
            match self.fetch(client).await {
                Ok(Some(url)) => return Some(url),
                Ok(None) => report(Status::Warn, "No HTTPS tunnel yet, retrying..."),
                Err(e) => report(Status::Warn, format!("ngrok API not ready: {:#}", e)),
            }
            if attempt + 1 < self.retries {
                tokio::time::sleep(self.retry_delay(attempt)).await;
            }
        }
        None
    }

    async fn fetch(&self, client: &reqwest::Client) -> anyhow::Result<Option<String>> {
        let body = client.get(&self.api_url).send().await?.text().await?;
        if body.trim().is_empty() {
            anyhow::bail!("empty response");
        }
        Ok(select_https_tunnel(&body)?)
    }
}

/// Host part of a tunnel URL
pub fn tunnel_host(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
        .trim_end_matches('/')
}

/// Webhook address Twilio should call for a public base URL
pub fn webhook_url(public: &str) -> String {
    format!("{}{}", public.trim_end_matches('/'), WEBHOOK_PATH)
}

/// Save the tunnel host and URL for other local tools
pub fn write_tunnel_files(dir: &Path, url: &str) -> std::io::Result<()> {
    std::fs::write(dir.join(HOST_FILE), tunnel_host(url))?;
    std::fs::write(dir.join(URL_FILE), url)?;
    Ok(())
}

/// Delete the tunnel files, returning the names that existed
pub fn remove_tunnel_files(dir: &Path) -> Vec<&'static str> {
    [HOST_FILE, URL_FILE]
        .into_iter()
        .filter(|name| std::fs::remove_file(dir.join(name)).is_ok())
        .collect()
}

/// Point every account number whose friendly name mentions WhatsApp at `webhook_url`
pub async fn configure_twilio_webhooks(
    client: &TwilioClient,
    webhook_url: &str,
) -> bt_whatsapp::Result<usize> {
    let numbers: Vec<_> = client
        .list_incoming_numbers()
        .await?
        .into_iter()
        .filter(|number| number.friendly_name.to_lowercase().contains("whatsapp"))
        .collect();

    for number in &numbers {
        report(
            Status::Info,
            format!("Updating webhook for {}...", number.friendly_name),
        );
        client.update_sms_webhook(&number.sid, webhook_url).await?;
    }
    Ok(numbers.len())
}

fn print_manual_instructions(webhook_url: &str) {
    report(Status::Info, "To configure the Twilio webhook manually:");
    println!("   1. Open {}", SANDBOX_CONSOLE_URL);
    println!("   2. Under 'When a message comes in', set: {}", webhook_url);
    println!("   3. Make sure HTTP POST is selected");
}

async fn update_twilio(config: &Config, webhook_url: &str) {
    let client = match TwilioClient::from_config(&config.twilio) {
        Ok(client) => client,
        Err(_) => {
            report(Status::Warn, "No Twilio credentials configured");
            print_manual_instructions(webhook_url);
            return;
        }
    };

    report(
        Status::Info,
        format!("Updating Twilio webhook to: {}", webhook_url),
    );
    match configure_twilio_webhooks(&client, webhook_url).await {
        Ok(0) => {
            report(Status::Warn, "No WhatsApp numbers found on the account");
            print_manual_instructions(webhook_url);
        }
        Ok(count) => report(
            Status::Ok,
            format!("{} Twilio webhook(s) updated", count),
        ),
        Err(e) => {
            report(Status::Warn, format!("Automatic webhook update failed: {}", e));
            print_manual_instructions(webhook_url);
        }
    }
}

async fn wait_for_shutdown() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Run the development environment until Ctrl+C or SIGTERM
pub async fn run(config: Config) -> anyhow::Result<()> {
    print_banner();
    check(&config);
    println!();

    report(Status::Info, "Applying database migrations...");
    let store = Store::open(&config.database.path)
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;
    report(Status::Ok, "Migrations complete");

    let port = pick_port(config.server.port).await?;
    let shared_url = public_url(config.server.public_url.clone());
    let work_dir = std::env::current_dir()?;

    let bot = WhatsAppBot::from_config(&config, Arc::new(store));
    let server = crate::spawn_server(bot, &config, port, Arc::clone(&shared_url));
    report(
        Status::Ok,
        format!("Server started at http://localhost:{}/", port),
    );
    println!("   Webhook:   http://localhost:{}{}", port, WEBHOOK_PATH);
    println!("   Admin API: http://localhost:{}/api/", port);

    let mut ngrok = start_ngrok(&config.dev, port).await;
    if ngrok.is_some() {
        let poll = TunnelPoll::from_config(&config.dev);
        match poll.public_url(&reqwest::Client::new()).await {
            Some(url) => {
                if let Err(e) = write_tunnel_files(&work_dir, &url) {
                    report(Status::Warn, format!("Could not save the ngrok URL: {}", e));
                }
                *shared_url.write().await = Some(url.clone());
                report(Status::Ok, format!("Server reachable at {}", url));

                let webhook = webhook_url(&url);
                println!("   Webhook:   {}", webhook);
                update_twilio(&config, &webhook).await;
            }
            None => {
                report(
                    Status::Fail,
                    format!(
                        "Could not get the ngrok URL after {} attempts",
                        poll.retries
                    ),
                );
            }
        }
    }
    if shared_url.read().await.is_none() {
        report(
            Status::Info,
            format!("The server is only reachable locally at http://localhost:{}/", port),
        );
    }

    wait_for_shutdown().await?;

    println!();
    report(Status::Info, "Stopping all processes...");
    server.abort();
    if let Some(child) = ngrok.as_mut() {
        if let Err(e) = child.kill().await {
            report(Status::Warn, format!("Failed to stop ngrok: {}", e));
        }
    }
    kill_ngrok().await;
    for name in remove_tunnel_files(&work_dir) {
        report(Status::Info, format!("Removed {}", name));
    }
    report(Status::Ok, "All processes stopped");
    Ok(())
}

/// Stop leftover ngrok tunnels and remove the tunnel files
pub async fn stop() -> anyhow::Result<()> {
    report(Status::Info, "Stopping all processes...");
    let killed = kill_ngrok().await;
    if killed == 0 {
        report(Status::Info, "No ngrok process running");
    }

    let work_dir = std::env::current_dir()?;
    for name in remove_tunnel_files(&work_dir) {
        report(Status::Info, format!("Removed {}", name));
    }
    report(Status::Ok, "All processes stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TUNNELS: &str = r#"{
        "tunnels": [
            {"name": "command_line (http)", "proto": "http", "public_url": "http://abc.ngrok.io"},
            {"name": "command_line", "proto": "https", "public_url": "https://abc.ngrok.io"}
        ],
        "uri": "/api/tunnels"
    }"#;

    fn quick_poll(api_url: String, retries: u32) -> TunnelPoll {
        TunnelPoll {
            api_url,
            retries,
            initial_wait: Duration::ZERO,
            retry_wait: Duration::ZERO,
            retry_step: Duration::ZERO,
        }
    }

    #[test]
    fn test_scan_ports_skips_busy_ports() {
        let busy = [8001, 8002, 8003];
        assert_eq!(scan_ports(8001, 10, |p| busy.contains(&p)), Some(8004));
        assert_eq!(scan_ports(8001, 10, |_| false), Some(8001));
    }

    #[test]
    fn test_scan_ports_gives_up() {
        assert_eq!(scan_ports(8001, PORT_SCAN_ATTEMPTS, |_| true), None);
        // Ten attempts cover 8001..=8010 only
        assert_eq!(scan_ports(8001, PORT_SCAN_ATTEMPTS, |p| p < 8011), None);
        assert_eq!(scan_ports(u16::MAX, 3, |_| false), Some(u16::MAX));
        assert_eq!(scan_ports(u16::MAX, 3, |_| true), None);
    }

    #[test]
    fn test_select_https_tunnel() {
        assert_eq!(
            select_https_tunnel(TUNNELS).unwrap().as_deref(),
            Some("https://abc.ngrok.io")
        );
        assert_eq!(select_https_tunnel(r#"{"tunnels": []}"#).unwrap(), None);
        assert_eq!(
            select_https_tunnel(r#"{"tunnels": [{"proto": "http", "public_url": "http://x"}]}"#)
                .unwrap(),
            None
        );
        assert!(select_https_tunnel("<html>").is_err());
    }

    #[test]
    fn test_parse_pids() {
        assert_eq!(parse_pids(b"123\n 456 \n\nabc\n"), vec!["123", "456"]);
        assert!(parse_pids(b"").is_empty());
    }

    #[test]
    fn test_retry_delay_grows() {
        let poll = TunnelPoll::from_config(&DevConfig::default());
        assert_eq!(poll.retries, 5);
        assert_eq!(poll.retry_delay(0), Duration::from_secs(2));
        assert_eq!(poll.retry_delay(1), Duration::from_secs(3));
        assert_eq!(poll.retry_delay(3), Duration::from_secs(5));
    }

    #[test]
    fn test_tunnel_files() {
        let dir = tempfile::tempdir().unwrap();
        write_tunnel_files(dir.path(), "https://abc.ngrok.io").unwrap();

        let host = std::fs::read_to_string(dir.path().join(HOST_FILE)).unwrap();
        let url = std::fs::read_to_string(dir.path().join(URL_FILE)).unwrap();
        assert_eq!(host, "abc.ngrok.io");
        assert_eq!(url, "https://abc.ngrok.io");

        assert_eq!(remove_tunnel_files(dir.path()), vec![HOST_FILE, URL_FILE]);
        assert!(remove_tunnel_files(dir.path()).is_empty());
    }

    #[test]
    fn test_webhook_url() {
        assert_eq!(
            webhook_url("https://abc.ngrok.io/"),
            "https://abc.ngrok.io/webhook/whatsapp/"
        );
        assert_eq!(tunnel_host("http://localhost:8000/"), "localhost:8000");
    }

    #[test]
    fn test_find_in_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ngrok"), "").unwrap();
        let path_var = std::env::join_paths([dir.path()]).unwrap();

        assert_eq!(
            find_in_path("ngrok", &path_var),
            Some(dir.path().join("ngrok"))
        );
        assert_eq!(find_in_path("missing-tool", &path_var), None);
    }

    #[test]
    fn test_diagnostics_flag_missing_credentials() {
        let config = Config::default();
        let items = diagnostics(&config);
        let credentials = items
            .iter()
            .find(|d| d.name == "Twilio credentials")
            .unwrap();
        assert!(!credentials.ok);
        assert!(items.iter().all(|d| d.name != "Signature validation"));
    }

    #[tokio::test]
    async fn test_poll_retries_until_https_tunnel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"tunnels": []}"#))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TUNNELS))
            .mount(&server)
            .await;

        let poll = quick_poll(format!("{}/api/tunnels", server.uri()), 5);
        let url = poll.public_url(&reqwest::Client::new()).await;
        assert_eq!(url.as_deref(), Some("https://abc.ngrok.io"));
    }

    #[tokio::test]
    async fn test_poll_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tunnels"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(3)
            .mount(&server)
            .await;

        let poll = quick_poll(format!("{}/api/tunnels", server.uri()), 3);
        assert_eq!(poll.public_url(&reqwest::Client::new()).await, None);
    }

    #[tokio::test]
    async fn test_configure_twilio_webhooks_updates_whatsapp_numbers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2010-04-01/Accounts/AC123/IncomingPhoneNumbers.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "incoming_phone_numbers": [
                    {"sid": "PN1", "phone_number": "+14155238886", "friendly_name": "Breaders WhatsApp"},
                    {"sid": "PN2", "phone_number": "+14155550000", "friendly_name": "Voice line"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/IncomingPhoneNumbers/PN1.json"))
            .and(body_string_contains("SmsMethod=POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = TwilioClient::new(
            "AC123".to_string(),
            "token".to_string(),
            "+14155238886".to_string(),
        )
        .with_base_url(&server.uri());

        let updated = configure_twilio_webhooks(&client, "https://abc.ngrok.io/webhook/whatsapp/")
            .await
            .unwrap();
        assert_eq!(updated, 1);
    }
}
