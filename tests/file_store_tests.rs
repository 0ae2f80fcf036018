//! File-backed trackers: state must survive a fresh tracker over the same file.

use settings_tracker::{
    DataStore, FileDataStore, SerializationFormat, Trackable, Tracker, TrackerConfig, tracked,
};
use tempfile::TempDir;

#[derive(Trackable)]
#[trackable]
struct Preferences {
    #[tracking_key]
    profile: String,
    font_size: u32,
    recent_files: Vec<String>,
}

fn preferences(font_size: u32, recent_files: &[&str]) -> Preferences {
    Preferences {
        profile: "default".to_string(),
        font_size,
        recent_files: recent_files.iter().map(|s| s.to_string()).collect(),
    }
}

fn round_trip(format: SerializationFormat) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state").join("settings.bin");
    let config = TrackerConfig::new().file(&path).format(format);

    {
        let tracker = Tracker::from_config(&config).unwrap();
        let prefs = tracked(preferences(14, &["a.txt", "b.txt"]));
        let report = tracker.configure(&prefs).unwrap().persist();
        assert!(report.is_completed());
        assert!(!report.has_failures());
    }
    assert!(path.exists());

    let tracker = Tracker::from_config(&config).unwrap();
    let restored = tracked(preferences(0, &[]));
    tracker.configure(&restored).unwrap().apply();

    let restored = restored.read().unwrap();
    assert_eq!(restored.font_size, 14);
    assert_eq!(restored.recent_files, vec!["a.txt", "b.txt"]);
}

#[test]
fn test_json_file_round_trip() {
    round_trip(SerializationFormat::Json);
}

#[test]
fn test_msgpack_file_round_trip() {
    round_trip(SerializationFormat::MessagePack);
}

#[test]
fn test_config_url_builds_file_tracker() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("url.bin");
    let url = format!("file://{}?format=msgpack&name=kiosk", path.display());

    let config = TrackerConfig::from_url(&url).unwrap();
    let tracker = Tracker::from_config(&config).unwrap();
    assert_eq!(tracker.name(), Some("kiosk"));

    // No class marker for "kiosk", so nothing is tracked there.
    let prefs = tracked(preferences(12, &[]));
    let configuration = tracker.configure(&prefs).unwrap();
    assert!(configuration.tracked_properties().is_empty());
}

#[test]
fn test_data_store_keys_and_removal_persist() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("keys.bin");

    {
        let store = FileDataStore::open(&path).unwrap();
        store.set_data("Preferences_default.FontSize", vec![1]).unwrap();
        store.set_data("Preferences_default.RecentFiles", vec![2]).unwrap();
        store.set_data("Window_main.Width", vec![3]).unwrap();
        assert!(store.remove_data("Window_main.Width").unwrap());
        assert!(!store.remove_data("Window_main.Width").unwrap());
    }

    let store = FileDataStore::open(&path).unwrap();
    assert_eq!(
        store.keys().unwrap(),
        vec![
            "Preferences_default.FontSize".to_string(),
            "Preferences_default.RecentFiles".to_string(),
        ]
    );
    assert_eq!(
        store.get_data("Preferences_default.FontSize").unwrap(),
        Some(vec![1])
    );
}

#[test]
fn test_corrupted_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("corrupt.bin");
    std::fs::write(&path, b"definitely not messagepack").unwrap();

    assert!(FileDataStore::open(&path).is_err());
    assert!(Tracker::from_config(&TrackerConfig::new().file(&path)).is_err());
}
