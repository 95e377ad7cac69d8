use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// A marker file written by a running test session, listing the template
/// clones it owns (one name suffix per line).
#[derive(Clone, Debug)]
pub struct LeakMarker {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub contents: String,
}

impl LeakMarker {
    #[must_use]
    pub fn is_expired(&self, now: SystemTime, expiry: Duration) -> bool {
        age(self.modified, now) >= expiry
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeakPlan {
    /// Databases claimed by unexpired markers.
    pub in_use: BTreeSet<String>,
    /// Live leak candidates nobody claims.
    pub to_drop: BTreeSet<String>,
    /// Markers old enough to be deleted along with their databases.
    pub expired_markers: Vec<PathBuf>,
}

fn age(modified: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or_default()
}

/// Whether a live database name follows the per-test clone naming scheme.
#[must_use]
pub fn is_leak_candidate(name: &str, prefix: &str) -> bool {
    name.contains(prefix)
}

/// Database names registered by a marker file's contents.
pub fn marker_databases<'a>(
    contents: &'a str,
    prefix: &'a str,
) -> impl Iterator<Item = String> + 'a {
    contents
        .lines()
        .map(move |line| format!("{prefix}{line}").trim_end().to_string())
}

/// Decides which live test databases can be dropped and which markers are
/// stale. A database named by any unexpired marker is never scheduled for
/// dropping.
pub fn plan_leak_cleanup<I>(
    live_databases: I,
    markers: &[LeakMarker],
    prefix: &str,
    expiry: Duration,
    now: SystemTime,
) -> LeakPlan
where
    I: IntoIterator<Item = String>,
{
    let candidates: BTreeSet<String> = live_databases
        .into_iter()
        .filter(|name| is_leak_candidate(name, prefix))
        .collect();

    let mut plan = LeakPlan::default();
    for marker in markers {
        if marker.is_expired(now, expiry) {
            plan.expired_markers.push(marker.path.clone());
        } else {
            plan.in_use
                .extend(marker_databases(&marker.contents, prefix));
        }
    }

    plan.to_drop = candidates.difference(&plan.in_use).cloned().collect();
    plan
}

/// Run directories are removed once strictly older than `expiry`.
#[must_use]
pub fn run_dir_expired(modified: SystemTime, now: SystemTime, expiry: Duration) -> bool {
    age(modified, now) > expiry
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "app_test_template_";
    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn marker(name: &str, age_secs: u64, contents: &str, now: SystemTime) -> LeakMarker {
        LeakMarker {
            path: PathBuf::from(name),
            modified: now - Duration::from_secs(age_secs),
            contents: contents.to_string(),
        }
    }

    fn live(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn marker_lines_expand_to_database_names() {
        let names: Vec<_> = marker_databases("12_1\n12_2  \n", PREFIX).collect();
        assert_eq!(names, vec!["app_test_template_12_1", "app_test_template_12_2"]);
    }

    #[test]
    fn referenced_databases_survive() {
        let now = SystemTime::now();
        let markers = vec![marker("run-a", 10, "1_1\n1_2\n", now)];
        let plan = plan_leak_cleanup(
            live(&[
                "app_test_template_1_1",
                "app_test_template_1_2",
                "app_test_template_9_9",
                "app",
                "app_test_template",
            ]),
            &markers,
            PREFIX,
            HOUR,
            now,
        );
        assert_eq!(
            plan.to_drop.into_iter().collect::<Vec<_>>(),
            vec!["app_test_template_9_9"]
        );
        assert!(plan.expired_markers.is_empty());
    }

    #[test]
    fn expired_markers_release_their_databases() {
        let now = SystemTime::now();
        let markers = vec![
            marker("old", 2 * 60 * 60, "1_1\n", now),
            marker("fresh", 5, "2_1\n", now),
        ];
        let plan = plan_leak_cleanup(
            live(&["app_test_template_1_1", "app_test_template_2_1"]),
            &markers,
            PREFIX,
            HOUR,
            now,
        );
        assert_eq!(plan.expired_markers, vec![PathBuf::from("old")]);
        assert!(plan.to_drop.contains("app_test_template_1_1"));
        assert!(!plan.to_drop.contains("app_test_template_2_1"));
    }

    #[test]
    fn marker_exactly_at_expiry_is_expired() {
        let now = SystemTime::now();
        assert!(marker("edge", 3600, "", now).is_expired(now, HOUR));
        assert!(!marker("edge", 3599, "", now).is_expired(now, HOUR));
    }

    #[test]
    fn future_mtime_counts_as_fresh() {
        let now = SystemTime::now();
        let future = LeakMarker {
            path: PathBuf::from("future"),
            modified: now + Duration::from_secs(30),
            contents: "3_1\n".into(),
        };
        let plan = plan_leak_cleanup(
            live(&["app_test_template_3_1"]),
            &[future],
            PREFIX,
            HOUR,
            now,
        );
        assert!(plan.to_drop.is_empty());
    }

    #[test]
    fn run_dirs_need_to_be_strictly_older() {
        let now = SystemTime::now();
        assert!(!run_dir_expired(now - HOUR, now, HOUR));
        assert!(run_dir_expired(now - HOUR - Duration::from_secs(1), now, HOUR));
    }

    #[test]
    fn no_unexpired_marker_claim_is_ever_dropped() {
        let now = SystemTime::now();
        let live_names: Vec<String> = (0..6)
            .flat_map(|run| (0..4).map(move |db| format!("{PREFIX}{run}_{db}")))
            .collect();
        for mask in 0u32..(1 << 6) {
            let markers: Vec<LeakMarker> = (0..6)
                .map(|run| {
                    let age = if mask & (1 << run) == 0 { 10 } else { 7200 };
                    let contents: String = (0..4).map(|db| format!("{run}_{db}\n")).collect();
                    marker(&format!("run-{run}"), age, &contents, now)
                })
                .collect();
            let plan =
                plan_leak_cleanup(live_names.clone(), &markers, PREFIX, HOUR, now);
            for m in markers.iter().filter(|m| !m.is_expired(now, HOUR)) {
                for name in marker_databases(&m.contents, PREFIX) {
                    assert!(!plan.to_drop.contains(&name), "dropped claimed {name}");
                }
            }
        }
    }
}
