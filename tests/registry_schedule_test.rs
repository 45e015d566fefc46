/// Registry, schedule and lock behavior through the public API.
///
/// The registry replay generates random sequences of add/remove/disable
/// operations and checks the persisted file against a simple model:
/// - an add for a known path replaces the record and moves it to the end
/// - removing or disabling an unknown path changes nothing
/// - reopening the file yields exactly the in-memory view
use proptest::prelude::*;
use stackward::lock::LockManager;
use stackward::registry::{ProjectRecord, ProjectStatus, Registry};
use stackward::schedule::{self, Schedule, ScheduleRequest};
use stackward::Error;
use std::path::PathBuf;

#[derive(Debug, Clone)]
enum Operation {
    Add(usize, u8),
    Remove(usize),
    Disable(usize),
}

fn path_for(idx: usize) -> PathBuf {
    PathBuf::from(format!("/srv/project-{}", idx))
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (0usize..5, 1u8..=23).prop_map(|(idx, hours)| Operation::Add(idx, hours)),
        1 => (0usize..5).prop_map(Operation::Remove),
        1 => (0usize..5).prop_map(Operation::Disable),
    ]
}

/// Expected registry contents, in file order.
#[derive(Default)]
struct Model {
    records: Vec<(PathBuf, u8, ProjectStatus)>,
}

impl Model {
    fn apply(&mut self, op: &Operation) {
        match op {
            Operation::Add(idx, hours) => {
                let path = path_for(*idx);
                self.records.retain(|(p, _, _)| *p != path);
                self.records.push((path, *hours, ProjectStatus::Enabled));
            }
            Operation::Remove(idx) => {
                let path = path_for(*idx);
                self.records.retain(|(p, _, _)| *p != path);
            }
            Operation::Disable(idx) => {
                let path = path_for(*idx);
                if let Some(entry) = self.records.iter_mut().find(|(p, _, _)| *p == path) {
                    entry.2 = ProjectStatus::Disabled;
                }
            }
        }
    }
}

fn apply(registry: &mut Registry, op: &Operation) {
    match op {
        Operation::Add(idx, hours) => {
            let record = ProjectRecord::new(
                path_for(*idx),
                format!("project-{}", idx),
                Schedule::Interval(*hours),
            );
            registry.add(record).unwrap();
        }
        Operation::Remove(idx) => {
            registry.remove(&path_for(*idx)).unwrap();
        }
        Operation::Disable(idx) => {
            registry
                .set_status(&path_for(*idx), ProjectStatus::Disabled)
                .unwrap();
        }
    }
}

fn snapshot(registry: &Registry) -> Vec<(PathBuf, u8, ProjectStatus)> {
    registry
        .list()
        .iter()
        .map(|r| {
            let hours = match r.schedule {
                Schedule::Interval(h) => h,
                ref other => panic!("unexpected schedule {:?}", other),
            };
            (r.path.clone(), hours, r.status)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn registry_replay_matches_model(ops in prop::collection::vec(operation_strategy(), 1..30)) {
        let home = tempfile::tempdir().unwrap();
        let file = home.path().join("projects.db");
        let mut registry = Registry::open_file(&file).unwrap();
        let mut model = Model::default();

        for op in &ops {
            apply(&mut registry, op);
            model.apply(op);
            prop_assert_eq!(snapshot(&registry), model.records.clone());
        }

        // Paths stay unique
        let mut paths: Vec<_> = registry.list().iter().map(|r| r.path.clone()).collect();
        paths.sort();
        paths.dedup();
        prop_assert_eq!(paths.len(), registry.list().len());

        // What was persisted is what is in memory
        let reopened = Registry::open_file(&file).unwrap();
        prop_assert_eq!(reopened.list(), registry.list());
        registry.reload().unwrap();
        prop_assert_eq!(snapshot(&registry), model.records);
    }

    #[test]
    fn every_interval_in_range_compiles(hours in 1u8..=23) {
        let compiled = schedule::compile_interval(&hours.to_string()).unwrap();
        prop_assert_eq!(compiled.cron_expression(), format!("0 */{} * * *", hours));
    }
}

#[test]
fn registry_file_is_readable_text() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("projects.db");
    let mut registry = Registry::open_file(&file).unwrap();
    registry
        .add(ProjectRecord::new("/srv/web", "web", Schedule::Interval(6)))
        .unwrap();
    registry
        .add(ProjectRecord::new(
            "/srv/db",
            "db",
            Schedule::Expression("30 4 * * Mon,Thu".to_string()),
        ))
        .unwrap();
    registry
        .set_status(std::path::Path::new("/srv/db"), ProjectStatus::Disabled)
        .unwrap();

    let contents = std::fs::read_to_string(&file).unwrap();
    assert_eq!(
        contents,
        "/srv/web|web|6|enabled\n/srv/db|db|30 4 * * Mon,Thu|disabled\n"
    );
}

#[test]
fn schedule_request_examples() {
    let every = ScheduleRequest {
        every: Some("12".to_string()),
        ..Default::default()
    };
    assert_eq!(
        schedule::compile(&every).unwrap().cron_expression(),
        "0 */12 * * *"
    );

    let at = ScheduleRequest {
        at: Some("2:30pm".to_string()),
        ..Default::default()
    };
    assert_eq!(
        schedule::compile(&at).unwrap().cron_expression(),
        "30 14 * * *"
    );

    let weekly = ScheduleRequest {
        at: Some("04:30".to_string()),
        days: Some("thu,Mon".to_string()),
        ..Default::default()
    };
    let compiled = schedule::compile(&weekly).unwrap();
    assert_eq!(compiled.cron_expression(), "30 4 * * Mon,Thu");
    assert_eq!(compiled.describe(), "at 04:30 on Mon, Thu");
}

#[test]
fn schedule_rejects_bad_input() {
    assert!(matches!(schedule::parse_time("25:00"), Err(Error::Schedule(_))));
    assert!(matches!(schedule::parse_time("12:60"), Err(Error::Schedule(_))));
    assert!(matches!(
        schedule::parse_days("Mon,Tues,Funday"),
        Err(Error::Schedule(_))
    ));
    assert!(schedule::compile_interval("0").is_err());
    assert!(schedule::compile_interval("24").is_err());
    assert!(schedule::compile(&ScheduleRequest::default()).is_err());

    let both = ScheduleRequest {
        every: Some("6".to_string()),
        cron: Some("@daily".to_string()),
        ..Default::default()
    };
    assert!(schedule::compile(&both).is_err());
}

#[test]
fn only_one_holder_per_project_lock() {
    let dir = tempfile::tempdir().unwrap();
    let first = LockManager::new(dir.path());
    let second = LockManager::new(dir.path());

    let handle = first.acquire("web").unwrap();
    assert!(matches!(
        second.acquire("web"),
        Err(Error::LockBusy { ref key }) if key == "web"
    ));

    // Other keys are independent
    let other = second.acquire("db").unwrap();

    let status = second.inspect("web").unwrap();
    assert!(status.held);
    assert_eq!(status.pid, Some(std::process::id()));

    handle.release();
    let again = second.acquire("web").unwrap();
    assert_eq!(again.key(), "web");
    drop(other);
}
