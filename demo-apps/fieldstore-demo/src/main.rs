use anyhow::{bail, Context, Result};
use fieldstore_core::Store;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Session TTL used when `FIELDSTORE_DEMO_TTL` is unset
const DEFAULT_SESSION_TTL: i64 = 2;

/// The demo sleeps past the session TTL, so keep it short
const MAX_SESSION_TTL: i64 = 60;

/// Demo settings read from the environment
struct DemoConfig {
    /// TTL given to the sample sessions
    session_ttl: i64,
    /// Where to persist the backup, if anywhere
    backup_path: Option<PathBuf>,
}

impl DemoConfig {
    /// Reads:
    /// - `FIELDSTORE_DEMO_TTL` - session TTL in seconds (defaults to 2)
    /// - `FIELDSTORE_BACKUP_PATH` - optional file for the backup round trip
    fn from_env() -> Result<Self> {
        let raw_ttl = std::env::var("FIELDSTORE_DEMO_TTL").ok();
        let session_ttl = parse_session_ttl(raw_ttl.as_deref())?;
        let backup_path = std::env::var_os("FIELDSTORE_BACKUP_PATH").map(PathBuf::from);

        Ok(Self {
            session_ttl,
            backup_path,
        })
    }
}

/// Parses the session TTL, rejecting values the demo would wait on for too long
fn parse_session_ttl(raw: Option<&str>) -> Result<i64> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_SESSION_TTL);
    };
    let ttl: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("FIELDSTORE_DEMO_TTL is not an integer: {:?}", raw))?;
    if !(0..=MAX_SESSION_TTL).contains(&ttl) {
        bail!(
            "FIELDSTORE_DEMO_TTL must be between 0 and {} seconds, got {}",
            MAX_SESSION_TTL,
            ttl
        );
    }
    Ok(ttl)
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldstore_demo=info,fieldstore_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = DemoConfig::from_env()?;
    let mut store = Store::new();

    tracing::info!("Fieldstore demo");
    tracing::info!("   Session TTL: {}s", config.session_ttl);

    basic_operations(&mut store)?;
    filtering(&store);
    expiration(&mut store, config.session_ttl)?;
    backup_and_restore(&mut store, config.backup_path.as_deref())?;

    println!();
    println!("{}", store);
    tracing::info!("Demo complete");

    Ok(())
}

/// Create, read and trim a few employee records
fn basic_operations(store: &mut Store) -> Result<()> {
    tracing::info!("Basic operations");

    let employees = [
        ("user_001", "Alice Johnson", "alice@company.com", "Engineering", "Senior Developer"),
        ("user_002", "Bob Smith", "bob@company.com", "Engineering", "Team Lead"),
        ("user_003", "Carol Wilson", "carol@company.com", "Marketing", "Marketing Manager"),
    ];
    for (id, name, email, department, role) in employees {
        store.set(id, "name", name);
        store.set(id, "email", email);
        store.set(id, "department", department);
        store.set(id, "role", role);
    }

    println!("{}", store);

    let name = store.get("user_001", "name");
    let email = store.get("user_001", "email");
    println!("user_001 name: {}", name.as_deref().unwrap_or("NOT FOUND"));
    println!("user_001 email: {}", email.as_deref().unwrap_or("NOT FOUND"));

    if !store.delete_field("user_001", "email") {
        bail!("user_001 should have had an email field");
    }
    let email = store.get("user_001", "email");
    println!(
        "user_001 email after deletion: {}",
        email.as_deref().unwrap_or("NOT FOUND")
    );

    Ok(())
}

/// Look records up by department and role
fn filtering(store: &Store) {
    tracing::info!("Filtering");

    println!("Engineering department:");
    for id in store.get_records_by_field_value("department", "Engineering") {
        let name = store.get(&id, "name");
        let role = store.get(&id, "role");
        println!(
            "- {}: {} ({})",
            id,
            name.as_deref().unwrap_or("N/A"),
            role.as_deref().unwrap_or("N/A")
        );
    }

    println!("Team leads:");
    for id in store.get_records_by_field_value("role", "Team Lead") {
        let name = store.get(&id, "name");
        println!("- {}: {}", id, name.as_deref().unwrap_or("N/A"));
    }
}

/// Create short-lived sessions and wait for them to lapse
fn expiration(store: &mut Store, session_ttl: i64) -> Result<()> {
    tracing::info!("TTL");

    let sessions = [
        ("session_001", "user_001", "2024-01-01 09:00:00"),
        ("session_002", "user_002", "2024-01-01 09:30:00"),
    ];
    for (id, user, login_time) in sessions {
        store.set(id, "user_id", user);
        store.set(id, "login_time", login_time);
        store.set(id, "status", "active");
        store.set_ttl(id, session_ttl);
    }

    let active = store.get_records_by_field_value("status", "active");
    println!("Active sessions: {}", active.len());
    for id in &active {
        let user = store.get(id, "user_id");
        println!("- {} (user: {})", id, user.as_deref().unwrap_or("N/A"));
    }

    let wait = Duration::from_secs(session_ttl.unsigned_abs() + 1);
    tracing::info!("Waiting {:?} for sessions to expire", wait);
    thread::sleep(wait);

    let expired = store.expire_sweep();
    println!("Expired {} records", expired);

    let active = store.get_records_by_field_value("status", "active");
    if !active.is_empty() {
        bail!("sessions still active after their TTL: {:?}", active);
    }
    println!("Active sessions after expiry: {}", active.len());

    Ok(())
}

/// Back the store up, wipe it and bring it back
fn backup_and_restore(store: &mut Store, backup_path: Option<&std::path::Path>) -> Result<()> {
    tracing::info!("Backup and restore");

    let before = store.get_all_record_ids();
    println!("Records in store: {}", before.len());
    for id in &before {
        println!("- {}", id);
    }

    let backup = store.backup();
    println!("Backup created ({} bytes)", backup.len());
    if let Some(path) = backup_path {
        std::fs::write(path, &backup)
            .with_context(|| format!("failed to write backup to {}", path.display()))?;
        tracing::info!("Backup written to {}", path.display());
    }

    store.set("temp_record", "temp_field", "temp_value");
    let cleared = store.clear();
    println!("Cleared {} records, {} left", cleared, store.len());

    let backup = match backup_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read backup from {}", path.display()))?,
        None => backup,
    };
    store.restore(&backup).context("restore failed")?;

    let after = store.get_all_record_ids();
    println!("Records after restore: {}", after.len());
    for id in &after {
        println!("- {}", id);
    }
    if after != before {
        bail!("restored records {:?} differ from backup {:?}", after, before);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ttl_defaults() {
        assert_eq!(parse_session_ttl(None).unwrap(), DEFAULT_SESSION_TTL);
    }

    #[test]
    fn test_session_ttl_parses_in_range() {
        assert_eq!(parse_session_ttl(Some("0")).unwrap(), 0);
        assert_eq!(parse_session_ttl(Some(" 5 ")).unwrap(), 5);
        assert_eq!(parse_session_ttl(Some("60")).unwrap(), MAX_SESSION_TTL);
    }

    #[test]
    fn test_session_ttl_rejects_long_waits() {
        assert!(parse_session_ttl(Some("61")).is_err());
        assert!(parse_session_ttl(Some("9223372036854775807")).is_err());
        assert!(parse_session_ttl(Some("-1")).is_err());
        assert!(parse_session_ttl(Some("soon")).is_err());
    }
}
