use chrono::NaiveDate;
use eventkeeper_core::{
    AccessCheck, EntityStore, FilePersistenceGateway, PersistError, PersistenceGateway, SaveMode,
    StorageConfig, StoreError,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    day(2030, 6, 15)
}

fn gateway_in(dir: &Path) -> FilePersistenceGateway {
    FilePersistenceGateway::new(&StorageConfig::new(dir))
}

fn open_in(dir: &Path) -> EntityStore<FilePersistenceGateway> {
    EntityStore::open_with_clock(gateway_in(dir), today).unwrap()
}

fn write(dir: &Path, file: &str, content: &str) {
    fs::write(dir.join(file), content).unwrap();
}

#[test]
fn open_creates_empty_files() {
    let dir = TempDir::new().unwrap();
    let store = open_in(dir.path());

    assert_eq!(store.event_count(), 0);
    assert_eq!(store.gateway().events_path(), dir.path().join("events.csv"));
    assert_eq!(store.gateway().attendees_path(), dir.path().join("attendees.csv"));
    assert_eq!(fs::read_to_string(dir.path().join("events.csv")).unwrap(), "");
    assert_eq!(fs::read_to_string(dir.path().join("attendees.csv")).unwrap(), "");
    store.check_accessible().unwrap();
}

#[test]
fn open_creates_missing_data_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("nested").join("data");
    let store = open_in(&nested);
    assert!(nested.join("events.csv").is_file());
    assert_eq!(store.attendee_count(), 0);
}

#[test]
fn mutations_are_written_in_the_documented_layout() {
    let dir = TempDir::new().unwrap();
    let mut store = open_in(dir.path());

    let event = store
        .create_event(r#"Annual Meeting, Part "2""#, day(2030, 7, 1), "Room 1", "Yearly")
        .unwrap();
    let ada = store.create_attendee("Lovelace, Ada", "Ada@X.io", "555").unwrap();
    store.add_attendee_to_event(event.id(), ada.id()).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("attendees.csv")).unwrap(),
        "1,\"Lovelace, Ada\",ada@x.io,555\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("events.csv")).unwrap(),
        "1,\"Annual Meeting, Part \"\"2\"\"\",2030-07-01,Room 1,Yearly,1\n"
    );
}

#[test]
fn store_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open_in(dir.path());
        let expo = store.create_event("Expo", day(2030, 8, 1), "Hall", "Booths").unwrap();
        let fair = store.create_event("Fair", day(2030, 9, 1), "Park", "Stalls").unwrap();
        let ada = store.create_attendee("Ada", "ada@x.io", "1").unwrap();
        let bob = store.create_attendee("Bob", "bob@x.io", "2").unwrap();
        store.add_attendee_to_event(expo.id(), bob.id()).unwrap();
        store.add_attendee_to_event(expo.id(), ada.id()).unwrap();
        store.add_attendee_to_event(fair.id(), ada.id()).unwrap();
        store.persist_now().unwrap();
    }

    let mut store = open_in(dir.path());
    assert_eq!(store.event_count(), 2);
    let expo_names: Vec<String> = store
        .list_attendees(1)
        .iter()
        .map(|a| a.name().to_string())
        .collect();
    assert_eq!(expo_names, vec!["Bob", "Ada"]);
    assert_eq!(store.by_id(2).unwrap().attendee_ids(), &[1]);

    // Counters continue after the highest stored id.
    assert_eq!(store.create_event("Gala", today(), "Hall", "D").unwrap().id(), 3);
    assert_eq!(store.create_attendee("Cy", "cy@x.io", "3").unwrap().id(), 3);
}

#[test]
fn deleted_event_is_not_resurrected_by_reload() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open_in(dir.path());
        let event = store.create_event("Expo", today(), "Hall", "Booths").unwrap();
        store.create_event("Fair", today(), "Park", "Stalls").unwrap();
        store.delete_event(event.id()).unwrap();
    }

    let store = open_in(dir.path());
    assert!(store.by_id(1).is_none());
    assert_eq!(store.list_all().len(), 1);
}

#[test]
fn dangling_attendee_reference_is_dropped_on_load() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "attendees.csv", "3,Cara,cara@x.io,333\n");
    write(
        dir.path(),
        "events.csv",
        "1,Launch,2031-01-01,Dock,Ship it,3;7\n",
    );

    let store = open_in(dir.path());
    let event = store.by_id(1).unwrap();
    assert_eq!(event.attendee_ids(), &[3]);
    assert_eq!(store.list_attendees(1)[0].name(), "Cara");
}

#[test]
fn malformed_lines_are_skipped_and_the_rest_loads() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "attendees.csv",
        "1,Ada,ada@x.io,1\nnot,a,record\n2,Bob,not-an-email,2\n\n3,Cy,cy@x.io,3\n",
    );
    write(
        dir.path(),
        "events.csv",
        concat!(
            "1,Expo,2031-01-01,Hall,Booths,1;3\n",
            "2,Broken,2031-13-45,Hall,Bad date,\n",
            "x,NoId,2031-01-02,Hall,Bad id,\n",
            "4,Short,2031-01-03\n",
            "5,Fair,2031-02-01,Park,Stalls\n",
        ),
    );

    let store = open_in(dir.path());
    let ids: Vec<u32> = store.list_all().iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec![1, 5]);
    assert_eq!(store.attendee_count(), 2);
    assert_eq!(store.by_id(1).unwrap().attendee_ids(), &[1, 3]);
}

#[test]
fn multi_line_description_roundtrips() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open_in(dir.path());
        store
            .create_event("Retreat", today(), "Lake", "Day 1: hike\nDay 2: \"swim\", rest")
            .unwrap();
        store.create_event("Expo", today(), "Hall", "Booths").unwrap();
    }

    let store = open_in(dir.path());
    assert_eq!(
        store.by_id(1).unwrap().description(),
        "Day 1: hike\nDay 2: \"swim\", rest"
    );
    assert_eq!(store.by_id(2).unwrap().name(), "Expo");
}

#[test]
fn windows_line_break_in_description_roundtrips() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open_in(dir.path());
        store.create_event("Retreat", today(), "Lake", "Day 1\r\nDay 2").unwrap();
        store.create_event("Expo", today(), "Hall", "Booths").unwrap();
    }

    let store = open_in(dir.path());
    assert_eq!(store.by_id(1).unwrap().description(), "Day 1\r\nDay 2");
    assert_eq!(store.by_id(2).unwrap().description(), "Booths");
}

#[test]
fn crlf_terminated_files_load() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "attendees.csv", "1,Ada,ada@x.io,555\r\n");
    write(
        dir.path(),
        "events.csv",
        "1,Expo,2031-01-01,Hall,Booths,1\r\n2,Fair,2031-02-01,Park,Stalls\r\n",
    );

    let store = open_in(dir.path());
    assert_eq!(store.attendee_by_id(1).unwrap().phone(), "555");
    assert_eq!(store.by_id(1).unwrap().attendee_ids(), &[1]);
    assert_eq!(store.by_id(2).unwrap().description(), "Stalls");
}

#[test]
fn stray_quote_only_costs_its_own_line() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "events.csv",
        concat!(
            "1,\"Unclosed,2031-01-01,Hall,Desc,\n",
            "2,Expo,2031-01-02,Hall,Booths,\n",
            "3,Fair,2031-01-03,Park,Stalls,\n",
        ),
    );

    let store = open_in(dir.path());
    let ids: Vec<u32> = store.list_all().iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn failed_joined_record_rescans_the_lines_it_swallowed() {
    let dir = TempDir::new().unwrap();
    // Lines 1-3 pair up their stray quotes and decode to a bad date.
    write(
        dir.path(),
        "events.csv",
        concat!(
            "1,Bad\"name,2031-01-01,Hall,Desc,\n",
            "2,Expo,2031-01-02,Hall,Booths,\n",
            "3,Also\"bad,not-a-date,Park,Stalls,\n",
            "4,Fair,2031-01-04,Park,Stalls,\n",
        ),
    );

    let store = open_in(dir.path());
    let ids: Vec<u32> = store.list_all().iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec![2, 4]);
}

#[test]
fn references_to_attendees_skipped_by_the_store_are_dropped() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "attendees.csv",
        "1,Ada,ada@x.io,1\n2,Ada Again,ADA@X.IO,2\n",
    );
    write(dir.path(), "events.csv", "1,Expo,2031-01-01,Hall,Booths,2;1\n");

    let store = open_in(dir.path());
    assert_eq!(store.attendee_count(), 1);
    assert_eq!(store.by_id(1).unwrap().attendee_ids(), &[1]);
}

#[test]
fn direct_save_mode_writes_in_place() {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig::new(dir.path()).with_save_mode(SaveMode::Direct);
    let mut store = EntityStore::open_with_clock(FilePersistenceGateway::new(&config), today).unwrap();
    store.create_attendee("Ada", "ada@x.io", "1").unwrap();

    assert_eq!(
        fs::read_to_string(config.attendees_path()).unwrap(),
        "1,Ada,ada@x.io,1\n"
    );
}

#[test]
fn atomic_save_leaves_no_temp_files() {
    let dir = TempDir::new().unwrap();
    let mut store = open_in(dir.path());
    store.create_attendee("Ada", "ada@x.io", "1").unwrap();

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn check_accessible_lists_every_missing_file() {
    let dir = TempDir::new().unwrap();
    let gateway = gateway_in(dir.path());

    let err = gateway.check_accessible().unwrap_err();
    let PersistError::Inaccessible(failures) = err else {
        panic!("expected accessibility report");
    };
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|f| f.check == AccessCheck::Missing));
    assert!(failures.iter().any(|f| f.path == gateway.events_path()));
    assert!(failures.iter().any(|f| f.path == gateway.attendees_path()));

    gateway.ensure_storage_exists();
    gateway.check_accessible().unwrap();
}

#[cfg(unix)]
#[test]
fn check_accessible_reports_read_only_file() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let gateway = gateway_in(dir.path());
    gateway.ensure_storage_exists();

    let attendees = gateway.attendees_path().to_path_buf();
    fs::set_permissions(&attendees, fs::Permissions::from_mode(0o444)).unwrap();
    if fs::OpenOptions::new().append(true).open(&attendees).is_ok() {
        // Privileged users bypass permission bits.
        return;
    }

    let err = gateway.check_accessible().unwrap_err();
    let PersistError::Inaccessible(failures) = err else {
        panic!("expected accessibility report");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path, attendees);
    assert_eq!(failures[0].check, AccessCheck::NotWritable);
}

#[test]
fn ensure_storage_exists_only_logs_creation_failure() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let gateway = gateway_in(&blocker.join("data"));

    gateway.ensure_storage_exists();

    let err = gateway.check_accessible().unwrap_err();
    let PersistError::Inaccessible(failures) = err else {
        panic!("expected accessibility report");
    };
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|f| f.check == AccessCheck::Missing));
}

#[test]
fn missing_files_load_as_empty_dataset() {
    let dir = TempDir::new().unwrap();
    let dataset = gateway_in(dir.path()).load_all().unwrap();
    assert!(dataset.events.is_empty());
    assert!(dataset.attendees.is_empty());
}

#[test]
fn save_failure_surfaces_as_persistence_error() {
    let dir = TempDir::new().unwrap();
    let mut store = open_in(dir.path());

    // A directory where the events file should be makes every save fail.
    fs::remove_file(dir.path().join("events.csv")).unwrap();
    fs::create_dir(dir.path().join("events.csv")).unwrap();

    let err = store.create_event("Expo", today(), "Hall", "Booths").unwrap_err();
    assert!(matches!(err, StoreError::Persistence { .. }));
    assert_eq!(store.event_count(), 1);
}
