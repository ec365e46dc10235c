//! Shared fixtures for the integration tests: a small fake device file
//! system and helpers packing it into every supported container type.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

pub const SYSTEM_VERSION_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
	<key>ProductBuildVersion</key>
	<string>20G75</string>
	<key>ProductName</key>
	<string>iPhone OS</string>
	<key>ProductVersion</key>
	<string>14.7</string>
</dict>
</plist>"#;

pub const SYSTEM_VERSION_PATH: &str = "System/Library/CoreServices/SystemVersion.plist";
pub const SMS_DB_PATH: &str = "private/var/mobile/Library/SMS/sms.db";
pub const SAFARI_DB_PATH: &str = "private/var/mobile/Library/Safari/History.db";

/// Write a fake device file system under `root`.
///
/// Contains the OS version plist, a messages database with two messages
/// and a Safari history database with one visit. There is deliberately
/// no application state or knowledgeC database.
pub fn build_device_tree(root: &Path) -> Result<()> {
    write_file(&root.join(SYSTEM_VERSION_PATH), SYSTEM_VERSION_PLIST.as_bytes())?;

    let sms = root.join(SMS_DB_PATH);
    create_database(&sms,
        "CREATE TABLE handle (ROWID INTEGER PRIMARY KEY, id TEXT);
         CREATE TABLE message (ROWID INTEGER PRIMARY KEY, handle_id INTEGER, date INTEGER,
                               is_from_me INTEGER, text TEXT, service TEXT);
         INSERT INTO handle VALUES (1, '+15550001111');
         INSERT INTO message VALUES (1, 1, 650000000000000000, 0, 'are you there?', 'iMessage');
         INSERT INTO message VALUES (2, 1, 650000060000000000, 1, 'yes', 'iMessage');")?;

    let safari = root.join(SAFARI_DB_PATH);
    create_database(&safari,
        "CREATE TABLE history_items (id INTEGER PRIMARY KEY, url TEXT, visit_count INTEGER);
         CREATE TABLE history_visits (id INTEGER PRIMARY KEY, history_item INTEGER, visit_time REAL, title TEXT);
         INSERT INTO history_items VALUES (1, 'https://example.org/', 1);
         INSERT INTO history_visits VALUES (1, 1, 650000000.0, 'Example');")?;

    write_file(&root.join("private/var/mobile/Media/notes.txt"), b"plain text")?;
    Ok(())
}

pub fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)?;
    Ok(())
}

pub fn create_database(path: &Path, sql: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(sql)?;
    Ok(())
}

/// Every regular file under `root` as (relative path, absolute path)
pub fn tree_files(root: &Path) -> Vec<(String, PathBuf)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?.to_string_lossy().replace('\\', "/");
            Some((relative, entry.path().to_path_buf()))
        })
        .collect()
}

/// Pack `root` into a tar (optionally gzip-compressed) archive at `dest`
pub fn create_tar_image(root: &Path, dest: &Path, gzipped: bool) -> Result<PathBuf> {
    let file = File::create(dest)?;
    if gzipped {
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        builder.append_dir_all(".", root)?;
        builder.into_inner()?.finish()?;
    } else {
        let mut builder = tar::Builder::new(file);
        builder.append_dir_all(".", root)?;
        builder.finish()?;
    }
    Ok(dest.to_path_buf())
}

/// Pack `root` into a zip archive at `dest`
pub fn create_zip_image(root: &Path, dest: &Path) -> Result<PathBuf> {
    let mut writer = zip::ZipWriter::new(File::create(dest)?);
    for (relative, path) in tree_files(root) {
        writer.start_file(relative, zip::write::FileOptions::default())?;
        writer.write_all(&fs::read(path)?)?;
    }
    writer.finish()?;
    Ok(dest.to_path_buf())
}

/// File ID of a backed-up file: hex digest of its domain-qualified path
pub fn file_id(relative: &str) -> String {
    format!("{:x}", Sha256::digest(format!("HomeDomain-{}", relative).as_bytes()))[..40].to_string()
}

/// Store every file under `root` as a hashed-manifest backup in `dest`
pub fn create_manifest_backup(root: &Path, dest: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dest)?;
    let conn = Connection::open(dest.join("Manifest.db"))?;
    conn.execute_batch(
        "CREATE TABLE Files (fileID TEXT PRIMARY KEY, domain TEXT, relativePath TEXT, flags INTEGER, file BLOB);",
    )?;

    for (relative, path) in tree_files(root) {
        let id = file_id(&relative);
        conn.execute(
            "INSERT INTO Files (fileID, domain, relativePath, flags) VALUES (?1, 'HomeDomain', ?2, 1)",
            rusqlite::params![id, relative],
        )?;
        let blob_dir = dest.join(&id[..2]);
        fs::create_dir_all(&blob_dir)?;
        fs::copy(path, blob_dir.join(&id))?;
    }

    Ok(dest.to_path_buf())
}
