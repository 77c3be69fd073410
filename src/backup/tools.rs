use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{CoreError, CoreResult};
use crate::models::{ConnectionProfile, EngineKind};

const STDERR_CAP: usize = 2000;

/// Engine-native dump binary, when one exists. SQLite always takes the
/// driver-level path.
pub fn dump_tool(engine: EngineKind) -> Option<&'static str> {
    match engine {
        EngineKind::Postgres => Some("pg_dump"),
        EngineKind::MySql | EngineKind::MariaDb => Some("mysqldump"),
        EngineKind::MongoDb => Some("mongodump"),
        EngineKind::Sqlite => None,
    }
}

pub fn restore_tool(engine: EngineKind) -> Option<&'static str> {
    match engine {
        EngineKind::Postgres => Some("psql"),
        EngineKind::MySql | EngineKind::MariaDb => Some("mysql"),
        EngineKind::MongoDb => Some("mongorestore"),
        EngineKind::Sqlite => None,
    }
}

pub fn find_tool(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Surface the tool's stderr verbatim but truncated, so failures stay
/// diagnosable without flooding the UI.
pub fn truncate_stderr(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() > STDERR_CAP {
        format!("{}…", &trimmed[..STDERR_CAP])
    } else {
        trimmed.to_string()
    }
}

async fn run_captured(mut command: Command, timeout: Duration, tool: &str) -> CoreResult<Vec<u8>> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command
        .spawn()
        .map_err(|e| CoreError::Backup(format!("failed to start {}: {}", tool, e)))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| {
            CoreError::Backup(format!(
                "{} timed out after {}s",
                tool,
                timeout.as_secs()
            ))
        })?
        .map_err(|e| CoreError::Backup(format!("{} failed: {}", tool, e)))?;

    if !output.status.success() {
        return Err(CoreError::Backup(format!(
            "{} exited with {}: {}",
            tool,
            output.status,
            truncate_stderr(&output.stderr)
        )));
    }
    Ok(output.stdout)
}

/// Run the engine's dump tool, leaving the artifact at `out_path`.
pub async fn run_native_dump(
    profile: &ConnectionProfile,
    tool_path: &Path,
    out_path: &Path,
    tables: Option<&[String]>,
    timeout: Duration,
) -> CoreResult<()> {
    match profile.engine {
        EngineKind::Postgres => {
            let mut command = Command::new(tool_path);
            command
                .arg("-h")
                .arg(&profile.host)
                .arg("-p")
                .arg(profile.port.to_string())
                .arg("-U")
                .arg(&profile.username)
                .arg("-d")
                .arg(&profile.database)
                .arg("-f")
                .arg(out_path)
                .env("PGPASSWORD", &profile.password);
            for table in tables.unwrap_or_default() {
                command.arg("-t").arg(table);
            }
            run_captured(command, timeout, "pg_dump").await?;
        }
        EngineKind::MySql | EngineKind::MariaDb => {
            let mut command = Command::new(tool_path);
            command
                .arg("-h")
                .arg(&profile.host)
                .arg("-P")
                .arg(profile.port.to_string())
                .arg("-u")
                .arg(&profile.username)
                .arg(&profile.database)
                .env("MYSQL_PWD", &profile.password);
            for table in tables.unwrap_or_default() {
                command.arg(table);
            }
            let stdout = run_captured(command, timeout, "mysqldump").await?;
            tokio::fs::write(out_path, stdout)
                .await
                .map_err(|e| CoreError::Backup(format!("failed to write dump: {}", e)))?;
        }
        EngineKind::MongoDb => {
            let mut command = Command::new(tool_path);
            command
                .arg("--host")
                .arg(&profile.host)
                .arg("--port")
                .arg(profile.port.to_string())
                .arg("--db")
                .arg(&profile.database)
                .arg(format!("--archive={}", out_path.display()));
            if !profile.username.is_empty() {
                command
                    .arg("--username")
                    .arg(&profile.username)
                    .arg("--password")
                    .arg(&profile.password)
                    .arg("--authenticationDatabase")
                    .arg("admin");
            }
            if let Some([collection]) = tables {
                command.arg("--collection").arg(collection);
            }
            run_captured(command, timeout, "mongodump").await?;
        }
        EngineKind::Sqlite => {
            return Err(CoreError::Backup(
                "sqlite has no native dump tool".into(),
            ));
        }
    }
    Ok(())
}

/// Run the engine's restore tool against an existing artifact.
pub async fn run_native_restore(
    profile: &ConnectionProfile,
    tool_path: &Path,
    artifact: &Path,
    timeout: Duration,
) -> CoreResult<()> {
    match profile.engine {
        EngineKind::Postgres => {
            let mut command = Command::new(tool_path);
            command
                .arg("-h")
                .arg(&profile.host)
                .arg("-p")
                .arg(profile.port.to_string())
                .arg("-U")
                .arg(&profile.username)
                .arg("-d")
                .arg(&profile.database)
                .arg("-f")
                .arg(artifact)
                .env("PGPASSWORD", &profile.password);
            run_captured(command, timeout, "psql").await?;
        }
        EngineKind::MySql | EngineKind::MariaDb => {
            let input = std::fs::File::open(artifact)
                .map_err(|e| CoreError::Backup(format!("cannot open backup file: {}", e)))?;
            let mut command = Command::new(tool_path);
            command
                .arg("-h")
                .arg(&profile.host)
                .arg("-P")
                .arg(profile.port.to_string())
                .arg("-u")
                .arg(&profile.username)
                .arg(&profile.database)
                .env("MYSQL_PWD", &profile.password)
                .stdin(Stdio::from(input))
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            let child = command
                .spawn()
                .map_err(|e| CoreError::Backup(format!("failed to start mysql: {}", e)))?;
            let output = tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| {
                    CoreError::Backup(format!("mysql timed out after {}s", timeout.as_secs()))
                })?
                .map_err(|e| CoreError::Backup(format!("mysql failed: {}", e)))?;
            if !output.status.success() {
                return Err(CoreError::Backup(format!(
                    "mysql exited with {}: {}",
                    output.status,
                    truncate_stderr(&output.stderr)
                )));
            }
        }
        EngineKind::MongoDb => {
            let mut command = Command::new(tool_path);
            command
                .arg("--host")
                .arg(&profile.host)
                .arg("--port")
                .arg(profile.port.to_string())
                .arg(format!("--archive={}", artifact.display()));
            if !profile.username.is_empty() {
                command
                    .arg("--username")
                    .arg(&profile.username)
                    .arg("--password")
                    .arg(&profile.password)
                    .arg("--authenticationDatabase")
                    .arg("admin");
            }
            run_captured(command, timeout, "mongorestore").await?;
        }
        EngineKind::Sqlite => {
            return Err(CoreError::Backup(
                "sqlite has no native restore tool".into(),
            ));
        }
    }
    Ok(())
}

/// Gzip an artifact in place, removing the uncompressed intermediate on
/// success. Returns the compressed path.
pub async fn compress_file(path: PathBuf) -> CoreResult<PathBuf> {
    tokio::task::spawn_blocking(move || -> CoreResult<PathBuf> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::{copy, BufReader, BufWriter};

        let gz_path = PathBuf::from(format!("{}.gz", path.display()));
        let mut reader = BufReader::new(std::fs::File::open(&path)?);
        let mut encoder = GzEncoder::new(
            BufWriter::new(std::fs::File::create(&gz_path)?),
            Compression::default(),
        );
        copy(&mut reader, &mut encoder)?;
        encoder.finish()?;
        std::fs::remove_file(&path)?;
        Ok(gz_path)
    })
    .await
    .map_err(|e| CoreError::Backup(format!("compression task failed: {}", e)))?
}

/// Inflate a `.gz` artifact next to itself and return the plain path. The
/// original stays in place; restores clean the inflated copy up afterwards.
pub async fn decompress_file(path: PathBuf) -> CoreResult<PathBuf> {
    tokio::task::spawn_blocking(move || -> CoreResult<PathBuf> {
        use flate2::read::GzDecoder;
        use std::io::{copy, BufReader, BufWriter};

        let plain = path
            .to_str()
            .and_then(|s| s.strip_suffix(".gz"))
            .map(PathBuf::from)
            .ok_or_else(|| CoreError::Backup("compressed artifact lacks .gz suffix".into()))?;
        let mut decoder = GzDecoder::new(BufReader::new(std::fs::File::open(&path)?));
        let mut writer = BufWriter::new(std::fs::File::create(&plain)?);
        copy(&mut decoder, &mut writer)?;
        Ok(plain)
    })
    .await
    .map_err(|e| CoreError::Backup(format!("decompression task failed: {}", e)))?
}
