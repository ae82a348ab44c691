use std::{
    io,
    sync::{Arc, Mutex},
};

use super::*;

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    (value, buffer.contents())
}

fn write_config(home: &Path, contents: &str) {
    let path = config_path(home);
    fs::create_dir_all(path.parent().expect("config dir")).expect("create config dir");
    fs::write(path, contents).expect("write config");
}

#[test]
fn defaults_without_env_or_file() {
    let home = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(Some(home.path()), None);
    assert_eq!(settings.server_url.as_str(), "http://127.0.0.1:8080/");
}

#[test]
fn reads_server_url_from_config_file() {
    let home = tempfile::tempdir().expect("tempdir");
    write_config(
        home.path(),
        "server_url: https://kanban.example.com\nbackend:\n  sqlite_path: /tmp/x.db\ncli:\n  output: json\n",
    );
    let settings = load_settings_from(Some(home.path()), None);
    assert_eq!(settings.server_url.as_str(), "https://kanban.example.com/");
}

#[test]
fn env_override_wins_over_file() {
    let home = tempfile::tempdir().expect("tempdir");
    write_config(home.path(), "server_url: https://kanban.example.com\n");
    let settings = load_settings_from(Some(home.path()), Some("  http://10.0.0.5:9000  "));
    assert_eq!(settings.server_url.as_str(), "http://10.0.0.5:9000/");
}

#[test]
fn invalid_values_fall_back() {
    let home = tempfile::tempdir().expect("tempdir");
    write_config(home.path(), "server_url: not a url\n");
    let settings = load_settings_from(Some(home.path()), Some("also-not-a-url"));
    assert_eq!(settings, ClientSettings::default());
}

#[test]
fn unusable_file_url_is_logged_before_fallback() {
    let home = tempfile::tempdir().expect("tempdir");
    write_config(home.path(), "server_url: ftp-less-garbage\n");

    let (settings, logs) = with_captured_logs(|| load_settings_from(Some(home.path()), None));

    assert_eq!(settings, ClientSettings::default());
    assert!(logs.contains("WARN"), "logs: {logs}");
    assert!(logs.contains("ignoring server url in client config"), "logs: {logs}");
}

#[test]
fn websocket_url_follows_scheme_and_drops_path() {
    let secure = ClientSettings::with_server_url("https://kanban.example.com/api?x=1").expect("url");
    assert_eq!(
        secure.websocket_url().expect("ws url").as_str(),
        "wss://kanban.example.com/ws"
    );

    let plain = ClientSettings::with_server_url("http://127.0.0.1:8080").expect("url");
    assert_eq!(
        plain.websocket_url().expect("ws url").as_str(),
        "ws://127.0.0.1:8080/ws"
    );
}
