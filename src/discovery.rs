use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use sysinfo::{Process, ProcessesToUpdate, System};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{config::CompanionConfig, error::CompanionError};

const LOCKFILE_NAME: &str = "lockfile";
const APP_PORT_ARG: &str = "--app-port=";
const AUTH_TOKEN_ARG: &str = "--remoting-auth-token=";

/// Where the local client API listens and the token it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub port: u16,
    pub password: String,
}

impl ClientCredentials {
    pub fn base_url(&self) -> String {
        format!("https://127.0.0.1:{}", self.port)
    }

    pub fn ws_url(&self) -> String {
        format!("wss://127.0.0.1:{}/", self.port)
    }
}

/// Parses the `name:pid:port:password:protocol` lockfile record.
pub fn parse_lockfile(content: &str) -> Result<ClientCredentials, CompanionError> {
    let fields: Vec<&str> = content.trim().split(':').collect();
    if fields.len() < 4 {
        return Err(CompanionError::Discovery(format!(
            "lockfile has {} fields, expected at least 4",
            fields.len()
        )));
    }
    let port = fields[2]
        .parse::<u16>()
        .map_err(|err| CompanionError::Discovery(format!("invalid lockfile port: {err}")))?;
    let password = fields[3].to_owned();
    if password.is_empty() {
        return Err(CompanionError::Discovery("lockfile has no password".to_owned()));
    }
    Ok(ClientCredentials { port, password })
}

/// Reads credentials off the client's command line, which carries the same
/// port and token as the lockfile.
pub fn credentials_from_args<S: AsRef<str>>(args: &[S]) -> Option<ClientCredentials> {
    let mut port = None;
    let mut password = None;
    for arg in args {
        let arg = arg.as_ref().trim_matches('"');
        if let Some(value) = arg.strip_prefix(APP_PORT_ARG) {
            port = value.parse::<u16>().ok();
        } else if let Some(value) = arg.strip_prefix(AUTH_TOKEN_ARG) {
            password = Some(value.to_owned()).filter(|value| !value.is_empty());
        }
    }
    Some(ClientCredentials {
        port: port?,
        password: password?,
    })
}

pub fn read_lockfile(path: &Path) -> Result<ClientCredentials, CompanionError> {
    let content = fs::read_to_string(path).map_err(|err| {
        CompanionError::Discovery(format!("failed reading {}: {err}", path.display()))
    })?;
    parse_lockfile(&content)
}

fn watch_list(config: &CompanionConfig) -> Vec<String> {
    config
        .client_process_names
        .iter()
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

fn is_client_process(process: &Process, watch_list: &[String]) -> bool {
    let process_name = process.name().to_string_lossy().to_ascii_lowercase();
    let exe_name = process
        .exe()
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().to_ascii_lowercase());
    watch_list.iter().any(|candidate| {
        *candidate == process_name || exe_name.as_deref() == Some(candidate.as_str())
    })
}

fn credentials_from_process(process: &Process) -> Result<ClientCredentials, CompanionError> {
    let args: Vec<String> = process
        .cmd()
        .iter()
        .map(|arg: &OsString| arg.to_string_lossy().into_owned())
        .collect();
    if let Some(credentials) = credentials_from_args(&args) {
        return Ok(credentials);
    }

    let lockfile: PathBuf = process
        .exe()
        .and_then(Path::parent)
        .map(|dir| dir.join(LOCKFILE_NAME))
        .ok_or_else(|| {
            CompanionError::Discovery("client executable path is unavailable".to_owned())
        })?;
    read_lockfile(&lockfile)
}

/// One discovery pass. A configured lockfile path wins over the process scan.
pub fn discover(system: &mut System, config: &CompanionConfig) -> Result<ClientCredentials, CompanionError> {
    if let Some(path) = config.lockfile_path.as_deref() {
        return read_lockfile(Path::new(path));
    }

    system.refresh_processes(ProcessesToUpdate::All, true);
    let watch_list = watch_list(config);
    let mut last_err = CompanionError::Discovery("client process is not running".to_owned());
    for process in system.processes().values() {
        if !is_client_process(process, &watch_list) {
            continue;
        }
        match credentials_from_process(process) {
            Ok(credentials) => return Ok(credentials),
            Err(err) => last_err = err,
        }
    }
    Err(last_err)
}

/// Polls until the local client is running and its credentials are readable.
pub async fn wait_for_client(config: &CompanionConfig) -> ClientCredentials {
    let poll = Duration::from_millis(config.discovery_poll_ms());
    let mut system = System::new();
    let mut announced = false;
    loop {
        match discover(&mut system, config) {
            Ok(credentials) => {
                info!(port = credentials.port, "discovered local client");
                return credentials;
            }
            Err(err) if !announced => {
                warn!(%err, "waiting for local client");
                announced = true;
            }
            Err(err) => debug!(%err, "local client still unavailable"),
        }
        sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{credentials_from_args, discover, parse_lockfile, ClientCredentials};
    use crate::{config::CompanionConfig, error::CompanionError};

    #[test]
    fn parses_lockfile_record() {
        let credentials =
            parse_lockfile("LeagueClient:11440:52437:Xz9-abcDEF_123:https\n").expect("parse");
        assert_eq!(
            credentials,
            ClientCredentials {
                port: 52437,
                password: "Xz9-abcDEF_123".to_owned(),
            }
        );
        assert_eq!(credentials.base_url(), "https://127.0.0.1:52437");
        assert_eq!(credentials.ws_url(), "wss://127.0.0.1:52437/");
    }

    #[test]
    fn rejects_short_or_bad_lockfiles() {
        assert!(matches!(
            parse_lockfile("LeagueClient:1:2"),
            Err(CompanionError::Discovery(_))
        ));
        assert!(matches!(
            parse_lockfile("LeagueClient:1:notaport:pw:https"),
            Err(CompanionError::Discovery(_))
        ));
        assert!(parse_lockfile("LeagueClient:1:2999::https").is_err());
    }

    #[test]
    fn reads_credentials_from_command_line() {
        let args = [
            "LeagueClientUx.exe",
            "\"--remoting-auth-token=secret\"",
            "--app-port=60123",
            "--locale=en_US",
        ];
        assert_eq!(
            credentials_from_args(&args),
            Some(ClientCredentials {
                port: 60123,
                password: "secret".to_owned(),
            })
        );
        assert_eq!(credentials_from_args(&["--app-port=60123"]), None);
    }

    #[test]
    fn configured_lockfile_path_wins() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("lockfile");
        fs::write(&path, "LeagueClient:1:4000:token:https").expect("write lockfile");

        let config = CompanionConfig {
            lockfile_path: Some(path.to_string_lossy().into_owned()),
            client_process_names: Vec::new(),
            ..Default::default()
        };
        let found = discover(&mut sysinfo::System::new(), &config);
        assert_eq!(found.expect("credentials").port, 4000);
    }

    #[test]
    fn empty_watch_list_reports_missing_client() {
        let config = CompanionConfig {
            client_process_names: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(
            discover(&mut sysinfo::System::new(), &config),
            Err(CompanionError::Discovery(_))
        ));
    }
}
