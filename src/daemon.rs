//! The polling loop: periodically recomputes the enabled feeds and
//! materializes them as a JSON snapshot file, which is the daemon's whole
//! observable surface. A failed cycle is logged and the previous snapshot
//! stays in place until the next interval.

use std::path::Path;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::client::GrampsClient;
use crate::config::AppConfig;
use crate::occurrence::{Anniversary, Birthday, Deathday};

/// One cycle's worth of feeds, as written to the state path.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub generated_at: String,
    pub birthdays: Vec<Birthday>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deathdays: Option<Vec<Deathday>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anniversaries: Option<Vec<Anniversary>>,
}

/// Run the engine forever at the configured scan interval.
pub fn run(mut client: GrampsClient, config: &AppConfig) -> anyhow::Result<()> {
    let interval = Duration::from_secs(config.daemon.scan_interval_hours * 3600);
    info!(
        interval_hours = config.daemon.scan_interval_hours,
        state_path = %config.daemon.state_path,
        "Starting poll loop"
    );

    loop {
        match poll_once(&mut client, config) {
            Ok(snapshot) => {
                if let Err(e) = write_snapshot(Path::new(&config.daemon.state_path), &snapshot) {
                    error!("Failed to write snapshot: {:#}", e);
                } else {
                    info!(
                        birthdays = snapshot.birthdays.len(),
                        deathdays = snapshot.deathdays.as_ref().map_or(0, Vec::len),
                        anniversaries = snapshot.anniversaries.as_ref().map_or(0, Vec::len),
                        "Snapshot written"
                    );
                }
            }
            // The poll failed wholesale (people fetch); keep the previous
            // snapshot and retry next interval.
            Err(e) => error!("Poll cycle failed (will retry next interval): {:#}", e),
        }

        thread::sleep(interval);
    }
}

/// One poll cycle: recompute every enabled feed.
pub fn poll_once(client: &mut GrampsClient, config: &AppConfig) -> anyhow::Result<Snapshot> {
    let limit = config.feeds.entries;

    let birthdays = client.get_birthdays(limit)?;
    let deathdays = if config.feeds.show_deathdays {
        Some(client.get_deathdays(limit)?)
    } else {
        None
    };
    let anniversaries = if config.feeds.show_anniversaries {
        Some(client.get_anniversaries(limit)?)
    } else {
        None
    };

    Ok(Snapshot {
        generated_at: chrono::Utc::now().to_rfc3339(),
        birthdays,
        deathdays,
        anniversaries,
    })
}

/// Write-then-rename so readers never observe a half-written snapshot.
pub fn write_snapshot(path: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Generate and write a systemd service file (Linux).
#[cfg(target_os = "linux")]
pub fn install_service() -> anyhow::Result<()> {
    let exe = std::env::current_exe()?;
    let working_dir = std::env::current_dir()?;

    let unit = format!(
        r#"[Unit]
Description=kinfeed - Gramps Web occurrence feeds
After=network.target

[Service]
Type=simple
ExecStart={} run
WorkingDirectory={}
Restart=on-failure
RestartSec=10

[Install]
WantedBy=multi-user.target
"#,
        exe.display(),
        working_dir.display()
    );

    let path = "/etc/systemd/system/kinfeed.service";
    std::fs::write(path, unit)?;
    println!("Service file written to {}", path);
    println!("Run: sudo systemctl daemon-reload && sudo systemctl enable --now kinfeed");
    Ok(())
}

/// Generate and write a launchd plist file (macOS).
#[cfg(target_os = "macos")]
pub fn install_service() -> anyhow::Result<()> {
    let exe = std::env::current_exe()?;
    let working_dir = std::env::current_dir()?;

    let plist = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>org.kinfeed.daemon</string>
    <key>ProgramArguments</key>
    <array>
        <string>{}</string>
        <string>run</string>
    </array>
    <key>WorkingDirectory</key>
    <string>{}</string>
    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <true/>
    <key>StandardOutPath</key>
    <string>/tmp/kinfeed.stdout.log</string>
    <key>StandardErrorPath</key>
    <string>/tmp/kinfeed.stderr.log</string>
</dict>
</plist>
"#,
        exe.display(),
        working_dir.display()
    );

    let home = std::env::var("HOME")?;
    let path = format!("{}/Library/LaunchAgents/org.kinfeed.daemon.plist", home);
    std::fs::write(&path, plist)?;
    println!("Plist written to {}", path);
    println!("Run: launchctl load {}", path);
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn install_service() -> anyhow::Result<()> {
    anyhow::bail!("Service installation is only supported on Linux and macOS");
}
