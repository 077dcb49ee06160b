//! CLI command implementations

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::authz::SessionKeys;
use crate::config::ConsoleConfig;
use crate::http_server::{ConsoleState, HttpServer};
use crate::tenancy::{DirectoryError, Role, TenantDirectory, TenantId, UserId};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Tenant provisioned by `init` on an empty directory
const INITIAL_TENANT: &str = "Default";

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config, admin } => init(&config, &admin),
        Command::Serve { config } => serve(&config),
        Command::MakeSuperadmin { config, username } => make_superadmin(&config, &username),
        Command::SetHoster { config, tenant } => set_hoster(&config, TenantId(tenant)),
        Command::IssueSession { config, username } => issue_session(&config, &username),
    }
}

fn write_response(value: Value) {
    println!("{}", value);
}

/// Write a config next to `config_path` if none exists, then make sure a
/// hoster tenant exists with `admin` as its admin.
pub fn init(config_path: &Path, admin: &str) -> CliResult<()> {
    let config = if config_path.exists() {
        ConsoleConfig::load(config_path)?
    } else {
        let config = ConsoleConfig {
            data_dir: Some(default_data_dir(config_path)),
            ..ConsoleConfig::generated()
        };
        config.save(config_path)?;
        tracing::info!(path = %config_path.display(), "configuration written");
        config
    };

    if let Some(data_dir) = &config.data_dir {
        std::fs::create_dir_all(data_dir).map_err(CliError::BootFailed)?;
    }
    let directory = TenantDirectory::open(config.data_dir.as_deref())?;
    let admin = UserId::new(admin.trim());
    let hoster = provision_hoster(&directory, &admin)?;

    write_response(json!({
        "initialized": true,
        "config": config_path.display().to_string(),
        "hoster_tenant": hoster,
        "admin": admin,
    }));
    Ok(())
}

fn default_data_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("data")
}

fn provision_hoster(directory: &TenantDirectory, admin: &UserId) -> CliResult<TenantId> {
    if directory.default_tenant().is_none() && directory.hoster_tenant()?.is_none() {
        directory.create_tenant(INITIAL_TENANT, true)?;
    }
    let hoster = match directory.hoster_tenant()? {
        Some(tenant) => tenant,
        None => directory.ensure_hoster_tenant()?,
    };

    let first_membership = directory.tenants_for(admin).is_empty();
    match directory.assign_user(admin, hoster.id, Role::Admin, first_membership) {
        Ok(_) => {}
        Err(DirectoryError::MembershipExists { .. }) => {
            directory.update_role(admin, hoster.id, Role::Admin)?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(hoster.id)
}

/// Serve the console until interrupted
pub fn serve(config_path: &Path) -> CliResult<()> {
    let config = ConsoleConfig::load(config_path)?;
    let state = ConsoleState::from_config(&config)?;

    match state.directory.hoster_tenant()? {
        Some(hoster) => tracing::info!(tenant_id = %hoster.id, "hoster tenant"),
        None => tracing::warn!("no hoster tenant designated, global authority falls back to the legacy flag"),
    }

    let server = HttpServer::new(state, config.listen_addr());
    let rt = tokio::runtime::Runtime::new().map_err(CliError::BootFailed)?;
    rt.block_on(server.start()).map_err(CliError::BootFailed)
}

/// Set the legacy global-admin flag
pub fn make_superadmin(config_path: &Path, username: &str) -> CliResult<()> {
    let config = ConsoleConfig::load(config_path)?;
    let directory = TenantDirectory::open(config.data_dir.as_deref())?;
    let user = UserId::new(username.trim());

    directory.set_legacy_super_admin(&user, true)?;
    if let Some(hoster) = directory.hoster_tenant()? {
        tracing::warn!(
            user = %user,
            hoster_tenant = %hoster.id,
            "legacy flag set but a hoster tenant exists; grant the admin role in the hoster tenant instead"
        );
    }

    write_response(json!({ "user": user, "legacy_super_admin": true }));
    Ok(())
}

/// Move the hoster flag to `tenant_id`
pub fn set_hoster(config_path: &Path, tenant_id: TenantId) -> CliResult<()> {
    let config = ConsoleConfig::load(config_path)?;
    let directory = TenantDirectory::open(config.data_dir.as_deref())?;
    directory.set_hoster_tenant(tenant_id)?;

    write_response(json!({ "hoster_tenant": tenant_id }));
    Ok(())
}

/// Mint a session token signed with the configured secret
pub fn issue_session(config_path: &Path, username: &str) -> CliResult<()> {
    let config = ConsoleConfig::load(config_path)?;
    let user = UserId::new(username.trim());
    let token = SessionKeys::new(config.session_secret.as_bytes()).issue(&user, config.session_ttl())?;
    tracing::info!(user = %user, ttl_hours = config.session_ttl_hours, "session issued");

    write_response(json!({
        "user": user,
        "token": token,
        "expires_in_hours": config.session_ttl_hours,
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{AuthorizationResolver, GlobalAuthority};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_init_provisions_hoster_admin() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("fleet-console.json");

        init(&config_path, "root").unwrap();
        // Second run is harmless
        init(&config_path, "root").unwrap();

        let config = ConsoleConfig::load(&config_path).unwrap();
        assert_eq!(config.data_dir, Some(dir.path().join("data")));

        let directory = Arc::new(TenantDirectory::open(config.data_dir.as_deref()).unwrap());
        assert_eq!(directory.list_tenants().len(), 1);
        let resolver = AuthorizationResolver::new(directory);
        assert!(matches!(
            resolver.global_authority(&UserId::new("root")).unwrap(),
            GlobalAuthority::HosterAdmin { hoster: TenantId(1) }
        ));
    }

    #[test]
    fn test_set_hoster_and_legacy_flag() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("fleet-console.json");
        init(&config_path, "root").unwrap();

        let config = ConsoleConfig::load(&config_path).unwrap();
        TenantDirectory::open(config.data_dir.as_deref())
            .unwrap()
            .create_tenant("Acme", false)
            .unwrap();

        set_hoster(&config_path, TenantId(2)).unwrap();
        make_superadmin(&config_path, "ops").unwrap();
        assert!(set_hoster(&config_path, TenantId(99)).is_err());

        let directory = TenantDirectory::open(config.data_dir.as_deref()).unwrap();
        assert_eq!(directory.hoster_tenant().unwrap().unwrap().id, TenantId(2));
        assert!(directory.legacy_super_admin(&UserId::new("ops")));
    }

    #[test]
    fn test_issue_session_requires_valid_config() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("fleet-console.json");
        assert!(matches!(
            issue_session(&config_path, "root"),
            Err(CliError::Config(_))
        ));

        init(&config_path, "root").unwrap();
        issue_session(&config_path, "root").unwrap();
    }
}
