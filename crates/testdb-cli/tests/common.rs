#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use assert_cmd::assert::Assert;
use serde_json::Value;
use tempfile::TempDir;

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

/// An empty project root with a `var/` directory.
pub fn prepare_project() -> TempDir {
    let temp = tempfile::Builder::new()
        .prefix("testdb-cli")
        .tempdir()
        .expect("tempdir");
    fs::create_dir_all(temp.path().join("var")).expect("var dir");
    temp
}

pub fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
    fs::write(path, contents).expect("write file");
}

pub fn age(path: &Path, by: Duration) {
    let when = filetime::FileTime::from_system_time(SystemTime::now() - by);
    filetime::set_file_mtime(path, when).expect("set mtime");
}

/// A stand-in database client. Queries (`-c SQL`) print `databases`, one per
/// line; anything else is a drop whose stdin lands in `dropped.sql`, unless
/// `fail_drop` makes it exit non-zero instead.
#[cfg(unix)]
pub fn fake_psql(dir: &Path, databases: &[&str], fail_drop: bool) -> PathBuf {
    let listing = databases.join("\\n");
    let drop_branch = if fail_drop {
        "echo 'ERROR:  database is being accessed by other users' >&2; exit 3".to_string()
    } else {
        format!("cat > '{}'", dir.join("dropped.sql").display())
    };
    let script = format!(
        "#!/bin/sh\ncase \"$*\" in\n  *' -c '*) printf '{listing}\\n' ;;\n  *) {drop_branch} ;;\nesac\n"
    );
    let path = dir.join("fake-psql");
    write_executable(&path, &script);
    path
}

/// A stand-in `manage.py` at the project root. Every call appends its
/// arguments and the settings/database environment to `manage.log`;
/// `showmigrations` prints `migrations`.
#[cfg(unix)]
pub fn fake_manage(root: &Path, migrations: &str) {
    let listing = root.join("showmigrations.txt");
    write_file(&listing, migrations);
    let script = format!(
        "#!/bin/sh\n\
         echo \"$* DJANGO_SETTINGS_MODULE=$DJANGO_SETTINGS_MODULE TESTDB_DB_NAME=$TESTDB_DB_NAME\" >> '{log}'\n\
         case \"$1\" in\n  showmigrations) cat '{listing}' ;;\n  *) echo 'Applying migrations' ;;\nesac\n",
        log = root.join("manage.log").display(),
        listing = listing.display(),
    );
    write_executable(&root.join("manage.py"), &script);
}

/// A stand-in fixture generator that appends its arguments to
/// `generate.log`.
#[cfg(unix)]
pub fn fake_generate_fixtures(root: &Path) {
    let log = root.join("generate.log");
    let script = format!("#!/bin/sh\necho \"generate $*\" >> '{}'\n", log.display());
    write_executable(&root.join("tools/setup/generate-fixtures"), &script);
}

#[cfg(unix)]
pub fn write_executable(path: &Path, script: &str) {
    use std::os::unix::fs::PermissionsExt;

    write_file(path, script);
    let mut perms = fs::metadata(path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod");
}
